use crate::html::{escape, Markup};
use crate::plugins::{Heading, PluginDescriptor, SlotName, SlotProps};

const MIN_LEVEL: u8 = 2;
const MAX_LEVEL: u8 = 3;

pub fn table_of_contents() -> PluginDescriptor {
    PluginDescriptor::builder("toc", "Table of Contents")
        .description("Table of contents built from the post's headings")
        .contribute_fn(SlotName::PostSidebar, render)
        .build()
}

fn render(props: &SlotProps<'_>) -> Markup {
    let Some(post) = props.post else {
        return Markup::default();
    };

    let headings: Vec<&Heading> = post
        .headings
        .iter()
        .filter(|h| (MIN_LEVEL..=MAX_LEVEL).contains(&h.level))
        .collect();
    if headings.is_empty() {
        return Markup::default();
    }

    let mut html = format!(
        r#"<nav class="toc" aria-label="{title}"><h2 class="toc-title">{title}</h2><ul>"#,
        title = escape(props.strings.table_of_contents)
    );
    for heading in headings {
        html.push_str(&format!(
            r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
            heading.level,
            escape(&heading.id),
            escape(&heading.text)
        ));
    }
    html.push_str("</ul></nav>");
    Markup::raw(html)
}
