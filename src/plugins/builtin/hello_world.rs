use crate::html::Markup;
use crate::plugins::{PluginDescriptor, SlotName, SlotProps};
use tracing::info;

/// Demo plugin. Not part of the built-in registry.
pub fn hello_world() -> PluginDescriptor {
    PluginDescriptor::builder("hello-world", "Hello World")
        .description("Example plugin that greets from the footer")
        .contribute_fn(SlotName::FooterMain, render)
        .on_load(|| {
            info!("Hello World plugin loaded");
            Ok(())
        })
        .build()
}

fn render(props: &SlotProps<'_>) -> Markup {
    Markup::raw(format!(
        r#"<p class="hello-world">Hello from the plugin system! ({})</p>"#,
        props.locale
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Locale;
    use crate::plugins::{LoadedPlugins, PluginRegistry};

    #[test]
    fn test_hello_world_loads_and_renders() {
        let loaded = LoadedPlugins::load(PluginRegistry::new(vec![hello_world()]));
        assert!(loaded.failures().is_empty());

        let html = loaded.render_slot_html(SlotName::FooterMain, &SlotProps::new(Locale::ZH));
        assert!(html.as_str().contains(r#"data-plugin="hello-world""#));
        assert!(html.as_str().contains("(zh)"));
    }
}
