//! Blog content: Markdown posts and pages with YAML front matter.
//!
//! Storage sits behind [`ContentStore`]. The filesystem implementation reads
//! `<dir>/<slug>.md`; the null implementation is used when no content
//! directory is configured and rejects writes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of search results returned.
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Maximum excerpt length in characters, before the trailing `...`.
pub const EXCERPT_LENGTH: usize = 150;

const FRONT_MATTER_DELIMITER: &str = "---";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid slug: '{0}'")]
    InvalidSlug(String),

    #[error("Content store is read-only")]
    ReadOnly,

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid front matter in {}: {source}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize front matter: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// A post or page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Front matter keys without a dedicated field
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

pub trait ContentStore: Send + Sync {
    /// All posts, newest first.
    fn list_posts(&self) -> Result<Vec<Post>, ContentError>;

    fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError>;

    /// Create or overwrite the post stored under `post.slug`.
    fn save_post(&self, post: &Post) -> Result<(), ContentError>;

    /// Remove a post. Returns whether a post was removed.
    fn delete_post(&self, slug: &str) -> Result<bool, ContentError>;

    fn get_page_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError>;

    fn page_exists(&self, slug: &str) -> bool;
}

/// Whether `slug` is safe to use as a file stem.
pub fn is_valid_slug(slug: &str) -> bool {
    static SLUG_RE: OnceLock<Regex> = OnceLock::new();
    SLUG_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("static regex is valid"))
        .is_match(slug)
}

// ==================== Filesystem Store ====================

/// Markdown files in a posts directory and a pages directory.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    posts_dir: PathBuf,
    pages_dir: PathBuf,
}

impl FsContentStore {
    pub fn new(posts_dir: impl Into<PathBuf>, pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            pages_dir: pages_dir.into(),
        }
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    fn post_path(&self, slug: &str) -> PathBuf {
        self.posts_dir.join(format!("{}.md", slug))
    }

    fn page_path(&self, slug: &str) -> PathBuf {
        self.pages_dir.join(format!("{}.md", slug))
    }
}

impl ContentStore for FsContentStore {
    fn list_posts(&self) -> Result<Vec<Post>, ContentError> {
        let entries = match fs::read_dir(&self.posts_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Posts directory {} does not exist", self.posts_dir.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ContentError::Io {
                    path: self.posts_dir.clone(),
                    source,
                })
            }
        };

        let mut posts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ContentError::Io {
                path: self.posts_dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match read_document(&path, slug) {
                Ok(Some(post)) => posts.push(post),
                Ok(None) => {}
                Err(e) => warn!("Skipping post: {}", e),
            }
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        if !is_valid_slug(slug) {
            return Ok(None);
        }
        read_document(&self.post_path(slug), slug)
    }

    fn save_post(&self, post: &Post) -> Result<(), ContentError> {
        if !is_valid_slug(&post.slug) {
            return Err(ContentError::InvalidSlug(post.slug.clone()));
        }
        fs::create_dir_all(&self.posts_dir).map_err(|source| ContentError::Io {
            path: self.posts_dir.clone(),
            source,
        })?;

        let path = self.post_path(&post.slug);
        let document = to_document(post)?;
        fs::write(&path, document).map_err(|source| ContentError::Io { path, source })?;
        debug!("Saved post '{}'", post.slug);
        Ok(())
    }

    fn delete_post(&self, slug: &str) -> Result<bool, ContentError> {
        if !is_valid_slug(slug) {
            return Err(ContentError::InvalidSlug(slug.to_string()));
        }
        let path = self.post_path(slug);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted post '{}'", slug);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ContentError::Io { path, source }),
        }
    }

    fn get_page_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        if !is_valid_slug(slug) {
            return Ok(None);
        }
        read_document(&self.page_path(slug), slug)
    }

    fn page_exists(&self, slug: &str) -> bool {
        is_valid_slug(slug) && self.page_path(slug).is_file()
    }
}

fn read_document(path: &Path, slug: &str) -> Result<Option<Post>, ContentError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ContentError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_document(&raw, slug)
        .map(Some)
        .map_err(|source| ContentError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })
}

/// Split a document into its front matter and Markdown body.
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw
        .strip_prefix(FRONT_MATTER_DELIMITER)
        .and_then(|rest| rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")))
    else {
        return (None, raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body.trim_start_matches(['\r', '\n']));
        }
        offset += line.len();
    }
    (None, raw)
}

fn parse_document(raw: &str, slug: &str) -> Result<Post, serde_yaml::Error> {
    let (front, body) = split_front_matter(raw);
    let front: FrontMatter = match front {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)?,
        _ => FrontMatter {
            title: None,
            date: None,
            published: false,
            author: None,
            extra: BTreeMap::new(),
        },
    };

    Ok(Post {
        slug: slug.to_string(),
        title: front.title.unwrap_or_else(|| slug.to_string()),
        date: front.date.unwrap_or_default(),
        content: body.to_string(),
        published: front.published,
        author: front.author,
        extra: front.extra,
    })
}

fn to_document(post: &Post) -> Result<String, serde_yaml::Error> {
    let front = FrontMatter {
        title: Some(post.title.clone()),
        date: Some(post.date.clone()),
        published: post.published,
        author: post.author.clone(),
        extra: post.extra.clone(),
    };
    let yaml = serde_yaml::to_string(&front)?;
    Ok(format!(
        "{delim}\n{yaml}{delim}\n\n{body}",
        delim = FRONT_MATTER_DELIMITER,
        yaml = yaml,
        body = post.content
    ))
}

// ==================== Null Store ====================

/// Store with no content, for hosts without a content directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullContentStore;

impl ContentStore for NullContentStore {
    fn list_posts(&self) -> Result<Vec<Post>, ContentError> {
        Ok(Vec::new())
    }

    fn get_post_by_slug(&self, _slug: &str) -> Result<Option<Post>, ContentError> {
        Ok(None)
    }

    fn save_post(&self, _post: &Post) -> Result<(), ContentError> {
        Err(ContentError::ReadOnly)
    }

    fn delete_post(&self, _slug: &str) -> Result<bool, ContentError> {
        Err(ContentError::ReadOnly)
    }

    fn get_page_by_slug(&self, _slug: &str) -> Result<Option<Post>, ContentError> {
        Ok(None)
    }

    fn page_exists(&self, _slug: &str) -> bool {
        false
    }
}

// ==================== Search ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
}

/// Case-insensitive title/content search over published posts.
pub fn search_posts(store: &dyn ContentStore, query: &str) -> Result<Vec<SearchResult>, ContentError> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let results = store
        .list_posts()?
        .into_iter()
        .filter(|post| post.published)
        .filter(|post| {
            post.title.to_lowercase().contains(&query) || post.content.to_lowercase().contains(&query)
        })
        .take(MAX_SEARCH_RESULTS)
        .map(|post| SearchResult {
            id: post.slug.clone(),
            excerpt: extract_excerpt(&post.content),
            title: post.title,
            slug: post.slug,
        })
        .collect();
    Ok(results)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub date: String,
    pub author: Option<String>,
}

/// Index entries for every published post. An `excerpt` front matter key
/// overrides the generated excerpt.
pub fn build_search_index(store: &dyn ContentStore) -> Result<Vec<SearchIndexEntry>, ContentError> {
    let entries = store
        .list_posts()?
        .into_iter()
        .filter(|post| post.published)
        .map(|post| {
            let excerpt = post
                .extra
                .get("excerpt")
                .and_then(|value| value.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| extract_excerpt(&post.content));
            SearchIndexEntry {
                id: post.slug.clone(),
                title: post.title,
                slug: post.slug,
                excerpt,
                content: post.content,
                date: post.date,
                author: post.author,
            }
        })
        .collect();
    Ok(entries)
}

struct MarkdownPatterns {
    image: Regex,
    heading: Regex,
    code: Regex,
    link: Regex,
    quote: Regex,
    bullet: Regex,
    numbered: Regex,
}

fn markdown_patterns() -> &'static MarkdownPatterns {
    static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |pattern: &str| Regex::new(pattern).expect("static regex is valid");
        MarkdownPatterns {
            image: re(r"!\[[^\]]*\]\([^)]*\)"),
            heading: re(r"#{1,6}\s+"),
            code: re(r"`{1,3}[^`]*`{1,3}"),
            link: re(r"\[([^\]]+)\]\([^)]+\)"),
            quote: re(r"(?m)^[ \t]*>[ \t]*"),
            bullet: re(r"(?m)^[ \t]*[-+*][ \t]+"),
            numbered: re(r"(?m)^[ \t]*\d+\.[ \t]+"),
        }
    })
}

/// Plain-text excerpt of Markdown content, cut at a word boundary.
pub fn extract_excerpt(content: &str) -> String {
    let patterns = markdown_patterns();

    let text = patterns.image.replace_all(content, "");
    let text = patterns.code.replace_all(&text, "");
    let text = patterns.heading.replace_all(&text, "");
    let text = patterns.link.replace_all(&text, "$1");
    let text = patterns.quote.replace_all(&text, "");
    let text = patterns.bullet.replace_all(&text, "");
    let text = patterns.numbered.replace_all(&text, "");
    let text = text.replace("**", "").replace('*', "").replace("~~", "");
    let text = text.trim();

    if text.chars().count() <= EXCERPT_LENGTH {
        return text.to_string();
    }

    let truncated: String = text.chars().take(EXCERPT_LENGTH).collect();
    match truncated.rfind(' ') {
        Some(index) if index > 0 => format!("{}...", &truncated[..index]),
        _ => format!("{}...", truncated),
    }
}
