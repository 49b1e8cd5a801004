//! Plugin slot system.
//!
//! Plugins are compiled in. Each declares UI for some of the fixed slots in
//! the page templates; the loaded set is built once at start-up and shared
//! read-only with the renderers.

pub mod builtin;
mod loader;
mod registry;
mod types;

pub use loader::{LoadFailure, LoadedPlugins};
pub use registry::PluginRegistry;
pub use types::{
    Heading, InitHook, PluginDescriptor, PluginDescriptorBuilder, PluginError, PluginSummary,
    PostContext, SlotContribution, SlotName, SlotProps,
};
