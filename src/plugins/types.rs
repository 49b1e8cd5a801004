use crate::html::Markup;
use crate::i18n::{Locale, LocaleStrings};
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PluginError {
    #[error("Duplicate plugin id: '{0}'")]
    DuplicateId(String),

    #[error("Invalid plugin id: '{0}'")]
    InvalidId(String),

    #[error("Unknown slot name: '{0}'")]
    UnknownSlot(String),
}

/// Extension points available in page templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotName {
    SidebarTop,
    PostFooter,
    PostSidebar,
    NavbarEnd,
    AdminDashboard,
    FooterMain,
}

impl SlotName {
    pub const ALL: [SlotName; 6] = [
        SlotName::SidebarTop,
        SlotName::PostFooter,
        SlotName::PostSidebar,
        SlotName::NavbarEnd,
        SlotName::AdminDashboard,
        SlotName::FooterMain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::SidebarTop => "sidebar-top",
            SlotName::PostFooter => "post-footer",
            SlotName::PostSidebar => "post-sidebar",
            SlotName::NavbarEnd => "navbar-end",
            SlotName::AdminDashboard => "admin-dashboard",
            SlotName::FooterMain => "footer-main",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotName::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| PluginError::UnknownSlot(s.to_string()))
    }
}

/// A heading of the post being rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// The post a page is showing, for slots on post pages.
#[derive(Debug, Clone, PartialEq)]
pub struct PostContext {
    pub slug: String,
    pub title: String,
    pub headings: Vec<Heading>,
}

/// What a slot contribution gets to render with.
#[derive(Debug, Clone, Copy)]
pub struct SlotProps<'a> {
    pub locale: Locale,
    pub strings: &'a LocaleStrings,
    pub post: Option<&'a PostContext>,
}

impl<'a> SlotProps<'a> {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            strings: LocaleStrings::for_locale(locale),
            post: None,
        }
    }

    pub fn with_post(mut self, post: &'a PostContext) -> Self {
        self.post = Some(post);
        self
    }
}

/// UI a plugin contributes to one slot.
pub trait SlotContribution: Send + Sync {
    fn render(&self, props: &SlotProps<'_>) -> Markup;
}

impl<F> SlotContribution for F
where
    F: Fn(&SlotProps<'_>) -> Markup + Send + Sync,
{
    fn render(&self, props: &SlotProps<'_>) -> Markup {
        self(props)
    }
}

/// One-time initialisation run when plugins are loaded.
pub type InitHook = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Immutable registration record of a plugin.
pub struct PluginDescriptor {
    id: &'static str,
    name: &'static str,
    description: Option<&'static str>,
    contributions: Vec<(SlotName, Arc<dyn SlotContribution>)>,
    on_load: Option<InitHook>,
}

impl PluginDescriptor {
    pub fn builder(id: &'static str, name: &'static str) -> PluginDescriptorBuilder {
        PluginDescriptorBuilder {
            descriptor: PluginDescriptor {
                id,
                name,
                description: None,
                contributions: Vec::new(),
                on_load: None,
            },
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> Option<&'static str> {
        self.description
    }

    /// The contribution for `slot`, if this plugin declares one.
    pub fn contribution(&self, slot: SlotName) -> Option<&Arc<dyn SlotContribution>> {
        self.contributions
            .iter()
            .find(|(name, _)| *name == slot)
            .map(|(_, contribution)| contribution)
    }

    /// Slots this plugin contributes to, in declaration order.
    pub fn slots(&self) -> Vec<SlotName> {
        self.contributions.iter().map(|(slot, _)| *slot).collect()
    }

    pub fn on_load(&self) -> Option<&InitHook> {
        self.on_load.as_ref()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("slots", &self.slots())
            .field("has_on_load", &self.on_load.is_some())
            .finish()
    }
}

pub struct PluginDescriptorBuilder {
    descriptor: PluginDescriptor,
}

impl PluginDescriptorBuilder {
    pub fn description(mut self, description: &'static str) -> Self {
        self.descriptor.description = Some(description);
        self
    }

    /// Declare the contribution for a slot. A later declaration for the same
    /// slot replaces the earlier one.
    pub fn contribute(mut self, slot: SlotName, contribution: impl SlotContribution + 'static) -> Self {
        self.descriptor.contributions.retain(|(name, _)| *name != slot);
        self.descriptor
            .contributions
            .push((slot, Arc::new(contribution)));
        self
    }

    /// Declare a slot contribution from a render function.
    pub fn contribute_fn<F>(self, slot: SlotName, render: F) -> Self
    where
        F: Fn(&SlotProps<'_>) -> Markup + Send + Sync + 'static,
    {
        self.contribute(slot, render)
    }

    pub fn on_load(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.descriptor.on_load = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> PluginDescriptor {
        self.descriptor
    }
}

/// Serializable view of a descriptor for listing endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub slots: Vec<SlotName>,
}

impl From<&PluginDescriptor> for PluginSummary {
    fn from(descriptor: &PluginDescriptor) -> Self {
        Self {
            id: descriptor.id,
            name: descriptor.name,
            description: descriptor.description,
            slots: descriptor.slots(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names_round_trip_through_str() {
        for slot in SlotName::ALL {
            assert_eq!(slot.as_str().parse::<SlotName>(), Ok(slot));
        }
    }

    #[test]
    fn test_unknown_slot_name_rejected() {
        assert_eq!(
            "sidebar".parse::<SlotName>(),
            Err(PluginError::UnknownSlot("sidebar".to_string()))
        );
    }

    #[test]
    fn test_slot_serializes_kebab_case() {
        let json = serde_json::to_string(&SlotName::PostSidebar).unwrap();
        assert_eq!(json, "\"post-sidebar\"");
    }

    #[test]
    fn test_builder_and_contribution_lookup() {
        let plugin = PluginDescriptor::builder("demo", "Demo")
            .description("A demo")
            .contribute_fn(SlotName::FooterMain, |_| Markup::raw("<p>a</p>"))
            .contribute_fn(SlotName::FooterMain, |_| Markup::raw("<p>b</p>"))
            .build();

        assert_eq!(plugin.id(), "demo");
        assert_eq!(plugin.description(), Some("A demo"));
        assert_eq!(plugin.slots(), vec![SlotName::FooterMain]);
        assert!(plugin.on_load().is_none());

        let props = SlotProps::new(Locale::EN);
        let rendered = plugin.contribution(SlotName::FooterMain).unwrap().render(&props);
        assert_eq!(rendered.as_str(), "<p>b</p>");
        assert!(plugin.contribution(SlotName::NavbarEnd).is_none());
    }

    #[test]
    fn test_summary_from_descriptor() {
        let plugin = PluginDescriptor::builder("demo", "Demo")
            .contribute_fn(SlotName::NavbarEnd, |_| Markup::default())
            .on_load(|| Ok(()))
            .build();
        let summary = PluginSummary::from(&plugin);
        assert_eq!(summary.id, "demo");
        assert_eq!(summary.slots, vec![SlotName::NavbarEnd]);
    }
}
