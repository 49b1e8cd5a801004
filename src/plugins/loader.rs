//! Plugin loading and slot rendering.

use super::registry::PluginRegistry;
use super::types::{PluginDescriptor, PluginError, PluginSummary, SlotName, SlotProps};
use crate::html::{escape, Markup};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

/// A plugin whose init hook failed. The plugin itself stays loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub plugin_id: &'static str,
    pub error: String,
}

/// The published set of loaded plugins.
#[derive(Debug, Default)]
pub struct LoadedPlugins {
    plugins: Vec<PluginDescriptor>,
    failures: Vec<LoadFailure>,
    error: Option<String>,
}

impl LoadedPlugins {
    /// Run every init hook in registration order.
    ///
    /// A failing or panicking hook is logged and recorded; loading carries on
    /// and the plugin keeps its slot contributions. If the registry itself
    /// could not be built the result is empty and carries the error.
    pub fn load(registry: Result<PluginRegistry, PluginError>) -> Self {
        let registry = match registry {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Failed to read plugin registry: {}", e);
                return Self {
                    error: Some(e.to_string()),
                    ..Self::default()
                };
            }
        };

        let plugins = registry.into_plugins();
        let mut failures = Vec::new();

        for plugin in &plugins {
            let Some(hook) = plugin.on_load() else {
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook()));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(payload) => panic_message(payload.as_ref()),
            };

            warn!("Plugin '{}' failed to initialise: {}", plugin.id(), error);
            failures.push(LoadFailure {
                plugin_id: plugin.id(),
                error,
            });
        }

        info!(
            "Loaded {} plugin(s), {} init failure(s)",
            plugins.len(),
            failures.len()
        );

        Self {
            plugins,
            failures,
            error: None,
        }
    }

    pub fn list_loaded(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins.iter().map(PluginSummary::from).collect()
    }

    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Set when the registry could not be read.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Loaded plugins contributing to `slot`, in load order.
    pub fn descriptors_for(&self, slot: SlotName) -> Vec<&PluginDescriptor> {
        self.plugins
            .iter()
            .filter(|plugin| plugin.contribution(slot).is_some())
            .collect()
    }

    /// Render every contribution to `slot`, in load order.
    pub fn render_slot(&self, slot: SlotName, props: &SlotProps<'_>) -> Vec<Markup> {
        self.render_each(slot, props)
            .into_iter()
            .map(|(_, markup)| markup)
            .collect()
    }

    /// Render `slot` as a wrapped HTML fragment. Empty when nothing
    /// contributes to the slot.
    pub fn render_slot_html(&self, slot: SlotName, props: &SlotProps<'_>) -> Markup {
        let rendered = self.render_each(slot, props);
        if rendered.is_empty() {
            return Markup::default();
        }

        let mut html = format!(
            r#"<div class="plugin-slot plugin-slot-{name}" data-slot="{name}">"#,
            name = slot
        );
        for (id, markup) in rendered {
            html.push_str(&format!(
                r#"<div class="plugin-component-wrapper" data-plugin="{}">{}</div>"#,
                escape(id),
                markup
            ));
        }
        html.push_str("</div>");
        Markup::raw(html)
    }

    fn render_each(&self, slot: SlotName, props: &SlotProps<'_>) -> Vec<(&'static str, Markup)> {
        self.plugins
            .iter()
            .filter_map(|plugin| {
                let contribution = plugin.contribution(slot)?;
                match panic::catch_unwind(AssertUnwindSafe(|| contribution.render(props))) {
                    Ok(markup) => Some((plugin.id(), markup)),
                    Err(payload) => {
                        warn!(
                            "Plugin '{}' failed to render slot '{}': {}",
                            plugin.id(),
                            slot,
                            panic_message(payload.as_ref())
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Locale;
    use anyhow::anyhow;

    fn contributing(id: &'static str, slot: SlotName) -> PluginDescriptor {
        PluginDescriptor::builder(id, id)
            .contribute_fn(slot, move |_| Markup::raw(format!("<p>{}</p>", id)))
            .build()
    }

    fn registry(plugins: Vec<PluginDescriptor>) -> Result<PluginRegistry, PluginError> {
        PluginRegistry::new(plugins)
    }

    // ==================== Slot Rendering Tests ====================

    #[test]
    fn test_render_slot_keeps_registration_order() {
        let loaded = LoadedPlugins::load(registry(vec![
            contributing("a", SlotName::PostSidebar),
            contributing("b", SlotName::PostFooter),
            contributing("c", SlotName::PostSidebar),
        ]));
        let props = SlotProps::new(Locale::EN);

        let rendered: Vec<_> = loaded
            .render_slot(SlotName::PostSidebar, &props)
            .into_iter()
            .map(Markup::into_string)
            .collect();
        assert_eq!(rendered, vec!["<p>a</p>", "<p>c</p>"]);

        let ids: Vec<_> = loaded
            .descriptors_for(SlotName::PostSidebar)
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_render_slot_without_contributions_is_empty() {
        let loaded = LoadedPlugins::load(registry(vec![contributing("a", SlotName::PostSidebar)]));
        let props = SlotProps::new(Locale::EN);
        assert!(loaded.render_slot(SlotName::AdminDashboard, &props).is_empty());
        assert!(loaded
            .render_slot_html(SlotName::AdminDashboard, &props)
            .is_empty());
    }

    #[test]
    fn test_render_same_slot_twice_is_consistent() {
        let loaded = LoadedPlugins::load(registry(vec![
            contributing("a", SlotName::NavbarEnd),
            contributing("b", SlotName::NavbarEnd),
        ]));
        let props = SlotProps::new(Locale::ZH);
        let first = loaded.render_slot(SlotName::NavbarEnd, &props);
        let second = loaded.render_slot(SlotName::NavbarEnd, &props);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_render_slot_html_wraps_contributions() {
        let loaded = LoadedPlugins::load(registry(vec![contributing("a", SlotName::FooterMain)]));
        let html = loaded.render_slot_html(SlotName::FooterMain, &SlotProps::new(Locale::EN));
        assert_eq!(
            html.as_str(),
            concat!(
                r#"<div class="plugin-slot plugin-slot-footer-main" data-slot="footer-main">"#,
                r#"<div class="plugin-component-wrapper" data-plugin="a"><p>a</p></div>"#,
                "</div>"
            )
        );
    }

    #[test]
    fn test_panicking_contribution_is_skipped() {
        let loaded = LoadedPlugins::load(registry(vec![
            PluginDescriptor::builder("broken", "Broken")
                .contribute_fn(SlotName::NavbarEnd, |_| panic!("render failed"))
                .build(),
            contributing("ok", SlotName::NavbarEnd),
        ]));
        let rendered = loaded.render_slot(SlotName::NavbarEnd, &SlotProps::new(Locale::EN));
        assert_eq!(rendered, vec![Markup::raw("<p>ok</p>")]);
    }

    // ==================== Load Isolation Tests ====================

    #[test]
    fn test_failing_init_hook_keeps_all_plugins() {
        let loaded = LoadedPlugins::load(registry(vec![
            PluginDescriptor::builder("first", "First").on_load(|| Ok(())).build(),
            PluginDescriptor::builder("second", "Second")
                .on_load(|| Err(anyhow!("boom")))
                .contribute_fn(SlotName::SidebarTop, |_| Markup::raw("second"))
                .build(),
            PluginDescriptor::builder("third", "Third").on_load(|| Ok(())).build(),
        ]));

        let ids: Vec<_> = loaded.list_loaded().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert_eq!(
            loaded.failures(),
            &[LoadFailure {
                plugin_id: "second",
                error: "boom".to_string(),
            }]
        );
        assert!(loaded.error().is_none());

        // The failed plugin still renders.
        let rendered = loaded.render_slot(SlotName::SidebarTop, &SlotProps::new(Locale::EN));
        assert_eq!(rendered, vec![Markup::raw("second")]);
    }

    #[test]
    fn test_panicking_init_hook_is_contained() {
        let loaded = LoadedPlugins::load(registry(vec![
            PluginDescriptor::builder("first", "First").build(),
            PluginDescriptor::builder("second", "Second")
                .on_load(|| panic!("init exploded"))
                .build(),
            PluginDescriptor::builder("third", "Third").build(),
        ]));

        assert_eq!(loaded.list_loaded().len(), 3);
        assert_eq!(loaded.failures().len(), 1);
        assert_eq!(loaded.failures()[0].plugin_id, "second");
        assert!(loaded.failures()[0].error.contains("init exploded"));
    }

    #[test]
    fn test_registry_error_yields_empty_set() {
        let loaded = LoadedPlugins::load(Err(PluginError::DuplicateId("a".to_string())));
        assert!(loaded.list_loaded().is_empty());
        assert_eq!(loaded.error(), Some("Duplicate plugin id: 'a'"));
        assert!(loaded
            .render_slot(SlotName::NavbarEnd, &SlotProps::new(Locale::EN))
            .is_empty());
    }
}
