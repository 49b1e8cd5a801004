use crate::html::{escape, Markup};
use crate::plugins::{PluginDescriptor, SlotName, SlotProps};

/// Path of the index written by the `search-index` binary.
pub const SEARCH_INDEX_PATH: &str = "/search-index.json";

pub fn search_box() -> PluginDescriptor {
    PluginDescriptor::builder("search-box", "Search Box")
        .description("Post search in the navigation bar")
        .contribute_fn(SlotName::NavbarEnd, render)
        .build()
}

fn render(props: &SlotProps<'_>) -> Markup {
    let strings = props.strings;
    Markup::raw(format!(
        concat!(
            r#"<form class="search-box" role="search" method="get" action="/{locale}/search" data-index="{index}" data-locale="{locale}">"#,
            r#"<input type="search" name="q" aria-label="{label}" placeholder="{placeholder}">"#,
            r#"<button type="submit">{label}</button>"#,
            "</form>"
        ),
        index = SEARCH_INDEX_PATH,
        locale = props.locale,
        label = escape(strings.search),
        placeholder = escape(strings.search_placeholder),
    ))
}
