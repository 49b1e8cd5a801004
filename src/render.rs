//! Server-side HTML rendering.
//!
//! Markdown goes through pulldown-cmark with generated heading anchors.
//! Pages share one layout that hosts the plugin slots.

use crate::content::{extract_excerpt, Post, SearchResult};
use crate::html::{escape, Markup};
use crate::i18n::{Locale, LocaleRegistry, LocaleStrings};
use crate::plugins::{Heading, LoadedPlugins, PostContext, SlotName, SlotProps};
use chrono::{Datelike, Utc};
use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;

/// Rendered Markdown and the headings found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarkdown {
    pub html: Markup,
    pub headings: Vec<Heading>,
}

struct PendingHeading<'a> {
    level: HeadingLevel,
    id: Option<CowStr<'a>>,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    inner: Vec<Event<'a>>,
}

/// Render Markdown to HTML, giving every heading a unique `id`.
pub fn render_markdown(source: &str) -> RenderedMarkdown {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS;

    let mut events = Vec::new();
    let mut headings = Vec::new();
    let mut anchors = Anchors::default();
    let mut pending: Option<PendingHeading<'_>> = None;

    for event in Parser::new_ext(source, options) {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                pending = Some(PendingHeading {
                    level,
                    id,
                    classes,
                    attrs,
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(level)) => {
                let Some(heading) = pending.take() else {
                    events.push(Event::End(TagEnd::Heading(level)));
                    continue;
                };

                let text: String = heading
                    .inner
                    .iter()
                    .filter_map(|event| match event {
                        Event::Text(text) | Event::Code(text) => Some(text.as_ref()),
                        _ => None,
                    })
                    .collect();
                let id = match heading.id {
                    Some(id) => anchors.claim(id.to_string()),
                    None => anchors.claim(slugify(&text)),
                };

                headings.push(Heading {
                    level: heading.level as u8,
                    id: id.clone(),
                    text: text.trim().to_string(),
                });
                events.push(Event::Start(Tag::Heading {
                    level: heading.level,
                    id: Some(CowStr::from(id)),
                    classes: heading.classes,
                    attrs: heading.attrs,
                }));
                events.extend(heading.inner);
                events.push(Event::End(TagEnd::Heading(level)));
            }
            event => match pending.as_mut() {
                Some(heading) => heading.inner.push(event),
                None => events.push(event),
            },
        }
    }

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    RenderedMarkdown {
        html: Markup::raw(out),
        headings,
    }
}

/// Hands out unique anchor ids, suffixing repeats with `-1`, `-2`, ...
#[derive(Default)]
struct Anchors {
    seen: HashMap<String, usize>,
}

impl Anchors {
    fn claim(&mut self, base: String) -> String {
        let count = self.seen.entry(base.clone()).or_insert(0);
        let id = if *count == 0 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;
        id
    }
}

/// Anchor id for heading text. Keeps letters and digits of any script.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

// ==================== Layout ====================

/// One page to render inside the site layout.
pub struct Page<'a> {
    pub locale: Locale,
    pub title: &'a str,
    /// Request path without the locale prefix, used by the locale switcher
    pub path: &'a str,
    pub body: Markup,
    pub post: Option<&'a PostContext>,
}

/// Wrap a page body in the site layout and render the plugin slots.
pub fn render_page(plugins: &LoadedPlugins, locales: &LocaleRegistry, page: Page<'_>) -> Markup {
    let strings = LocaleStrings::for_locale(page.locale);
    let mut props = SlotProps::new(page.locale);
    if let Some(post) = page.post {
        props = props.with_post(post);
    }
    let code = page.locale.code();

    let mut out = String::new();
    out.push_str(&format!(
        concat!(
            "<!DOCTYPE html>",
            r#"<html lang="{code}"><head><meta charset="utf-8">"#,
            r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#,
            "<title>{title} | {site}</title></head><body>",
        ),
        code = code,
        title = escape(page.title),
        site = escape(strings.site_title),
    ));

    out.push_str(&format!(
        concat!(
            r#"<header><nav class="navbar">"#,
            r#"<a class="brand" href="/{code}">{site}</a>"#,
            r#"<a href="/{code}">{home}</a>"#,
            r#"<a href="/{code}/about">{about}</a>"#,
        ),
        code = code,
        site = escape(strings.site_title),
        home = escape(strings.nav_home),
        about = escape(strings.nav_about),
    ));
    out.push_str(locale_switcher(locales, page.locale, page.path).as_str());
    out.push_str(plugins.render_slot_html(SlotName::NavbarEnd, &props).as_str());
    out.push_str("</nav></header>");

    out.push_str("<main>");
    if page.post.is_some() {
        out.push_str(r#"<aside class="post-sidebar">"#);
        out.push_str(plugins.render_slot_html(SlotName::PostSidebar, &props).as_str());
        out.push_str("</aside>");
    }
    out.push_str("<article>");
    out.push_str(page.body.as_str());
    if page.post.is_some() {
        out.push_str(plugins.render_slot_html(SlotName::PostFooter, &props).as_str());
    }
    out.push_str("</article></main>");

    out.push_str("<footer>");
    out.push_str(plugins.render_slot_html(SlotName::FooterMain, &props).as_str());
    out.push_str(&format!(
        "<p>{}</p>",
        escape(&strings.footer_copyright.replace("{year}", &Utc::now().year().to_string()))
    ));
    out.push_str("</footer></body></html>");

    Markup::raw(out)
}

fn locale_switcher(locales: &LocaleRegistry, current: Locale, path: &str) -> Markup {
    let strings = LocaleStrings::for_locale(current);
    let options: String = locales
        .list_all()
        .into_iter()
        .map(|config| {
            let selected = if config.code == current.code() {
                " selected"
            } else {
                ""
            };
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                config.code,
                selected,
                escape(config.native_name)
            )
        })
        .collect();

    Markup::raw(format!(
        concat!(
            r#"<form class="locale-switcher" method="post" action="/{code}/preferences/locale">"#,
            r#"<select name="locale" aria-label="{label}">{options}</select>"#,
            r#"<input type="hidden" name="redirect" value="{path}">"#,
            r#"<button type="submit">{label}</button></form>"#,
        ),
        code = current.code(),
        label = escape(strings.switch_language),
        options = options,
        path = escape(path),
    ))
}

// ==================== Page Bodies ====================

/// Published posts as a list, newest first.
pub fn post_list_body(locale: Locale, posts: &[Post]) -> Markup {
    let strings = LocaleStrings::for_locale(locale);
    let mut out = format!("<h1>{}</h1>", escape(strings.latest_posts));

    let published: Vec<&Post> = posts.iter().filter(|post| post.published).collect();
    if published.is_empty() {
        out.push_str(&format!(r#"<p class="empty">{}</p>"#, escape(strings.no_posts)));
        return Markup::raw(out);
    }

    out.push_str(r#"<ul class="post-list">"#);
    for post in published {
        out.push_str(&format!(
            concat!(
                r#"<li><a href="/{code}/posts/{slug}">{title}</a>"#,
                r#" <time>{date}</time><p>{excerpt}</p></li>"#,
            ),
            code = locale.code(),
            slug = escape(&post.slug),
            title = escape(&post.title),
            date = escape(&post.date),
            excerpt = escape(&extract_excerpt(&post.content)),
        ));
    }
    out.push_str("</ul>");
    Markup::raw(out)
}

/// Results of a post search, linking into the current locale.
pub fn search_results_body(locale: Locale, query: &str, results: &[SearchResult]) -> Markup {
    let strings = LocaleStrings::for_locale(locale);
    let heading = strings.search_results.replace("{query}", query.trim());
    let mut out = format!("<h1>{}</h1>", escape(&heading));

    if results.is_empty() {
        out.push_str(&format!(r#"<p class="empty">{}</p>"#, escape(strings.no_results)));
        return Markup::raw(out);
    }

    out.push_str(r#"<ul class="search-results">"#);
    for result in results {
        out.push_str(&format!(
            r#"<li><a href="/{code}/posts/{slug}">{title}</a><p>{excerpt}</p></li>"#,
            code = locale.code(),
            slug = escape(&result.slug),
            title = escape(&result.title),
            excerpt = escape(&result.excerpt),
        ));
    }
    out.push_str("</ul>");
    Markup::raw(out)
}

/// A post with its byline. Returns the body and the context handed to the
/// post slots.
pub fn post_body(locale: Locale, post: &Post) -> (Markup, PostContext) {
    let strings = LocaleStrings::for_locale(locale);
    let rendered = render_markdown(&post.content);
    let byline = strings
        .posted_by
        .replace("{author}", post.author.as_deref().unwrap_or("Administrator"))
        .replace("{date}", &post.date);

    let body = Markup::raw(format!(
        r#"<h1>{}</h1><p class="post-meta">{}</p><div class="post-content">{}</div>"#,
        escape(&post.title),
        escape(&byline),
        rendered.html
    ));
    let context = PostContext {
        slug: post.slug.clone(),
        title: post.title.clone(),
        headings: rendered.headings,
    };
    (body, context)
}

/// A standalone page such as "about".
pub fn page_body(page: &Post) -> Markup {
    Markup::raw(format!(
        r#"<h1>{}</h1><div class="page-content">{}</div>"#,
        escape(&page.title),
        render_markdown(&page.content).html
    ))
}

pub fn not_found_body(locale: Locale) -> Markup {
    let strings = LocaleStrings::for_locale(locale);
    Markup::raw(format!(
        r#"<h1>{}</h1><p>{}</p><p><a href="/{}">{}</a></p>"#,
        escape(strings.not_found_title),
        escape(strings.not_found_body),
        locale.code(),
        escape(strings.nav_home)
    ))
}
