//! Compile-time plugin table.

use super::builtin;
use super::types::{PluginDescriptor, PluginError};
use std::collections::HashSet;

/// Ordered set of plugin descriptors, fixed once built.
#[derive(Debug)]
pub struct PluginRegistry {
    plugins: Vec<PluginDescriptor>,
}

impl PluginRegistry {
    /// Build a registry, keeping the given order. Ids must be non-empty
    /// kebab-case and unique.
    pub fn new(plugins: Vec<PluginDescriptor>) -> Result<Self, PluginError> {
        let mut seen = HashSet::new();
        for plugin in &plugins {
            if !is_valid_id(plugin.id()) {
                return Err(PluginError::InvalidId(plugin.id().to_string()));
            }
            if !seen.insert(plugin.id()) {
                return Err(PluginError::DuplicateId(plugin.id().to_string()));
            }
        }
        Ok(Self { plugins })
    }

    /// The plugins shipped with the blog.
    pub fn builtin() -> Result<Self, PluginError> {
        Self::new(vec![builtin::search_box(), builtin::table_of_contents()])
    }

    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins.iter().find(|plugin| plugin.id() == id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.iter()
    }

    pub(crate) fn into_plugins(self) -> Vec<PluginDescriptor> {
        self.plugins
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
