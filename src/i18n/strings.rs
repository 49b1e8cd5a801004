use crate::i18n::Locale;

/// All localized user-facing strings for a locale
///
/// Strings are stored raw and must be HTML-escaped by the renderer.
#[derive(Debug, Clone)]
pub struct LocaleStrings {
    // ==================== Site Chrome ====================
    /// Site title shown in the navbar and the document title
    pub site_title: &'static str,

    /// Navigation label for the post list
    pub nav_home: &'static str,

    /// Navigation label for the about page
    pub nav_about: &'static str,

    /// Label of the locale switcher
    pub switch_language: &'static str,

    /// Footer line
    /// Placeholders: {year}
    pub footer_copyright: &'static str,

    // ==================== Post List / Post Page ====================
    /// Heading of the post list
    pub latest_posts: &'static str,

    /// Shown when there is nothing published yet
    pub no_posts: &'static str,

    /// Byline under a post title
    /// Placeholders: {author}, {date}
    pub posted_by: &'static str,

    /// Title of the not-found page
    pub not_found_title: &'static str,

    /// Body of the not-found page
    pub not_found_body: &'static str,

    // ==================== Plugins ====================
    /// Search box button label
    pub search: &'static str,

    /// Search box placeholder
    pub search_placeholder: &'static str,

    /// Heading of the search results page
    /// Placeholders: {query}
    pub search_results: &'static str,

    /// Shown when a search matches nothing
    pub no_results: &'static str,

    /// Heading of the table of contents
    pub table_of_contents: &'static str,
}

impl LocaleStrings {
    /// Strings for a locale; locales without their own table use English.
    pub fn for_locale(locale: Locale) -> &'static LocaleStrings {
        match locale.code() {
            "zh" => &CHINESE_STRINGS,
            _ => &ENGLISH_STRINGS,
        }
    }
}

// ==================== English Strings ====================

pub const ENGLISH_STRINGS: LocaleStrings = LocaleStrings {
    site_title: "Quicksilver Blog",
    nav_home: "Home",
    nav_about: "About",
    switch_language: "Language",
    footer_copyright: "© {year} Quicksilver Blog",

    latest_posts: "Latest Posts",
    no_posts: "No posts yet.",
    posted_by: "By {author} on {date}",
    not_found_title: "Page not found",
    not_found_body: "The page you are looking for does not exist.",

    search: "Search",
    search_placeholder: "Search articles...",
    search_results: "Results for \"{query}\"",
    no_results: "No posts matched your search.",
    table_of_contents: "Contents",
};

// ==================== Chinese Strings ====================

pub const CHINESE_STRINGS: LocaleStrings = LocaleStrings {
    site_title: "Quicksilver 博客",
    nav_home: "首页",
    nav_about: "关于",
    switch_language: "语言",
    footer_copyright: "© {year} Quicksilver 博客",

    latest_posts: "最新文章",
    no_posts: "暂无文章。",
    posted_by: "{author} 发布于 {date}",
    not_found_title: "页面未找到",
    not_found_body: "您访问的页面不存在。",

    search: "搜索",
    search_placeholder: "搜索文章...",
    search_results: "“{query}”的搜索结果",
    no_results: "没有找到匹配的文章。",
    table_of_contents: "目录",
};
