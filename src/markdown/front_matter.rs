//! Typed YAML front matter.
//!
//! A source file may open with a `---` fenced YAML block; the block is
//! deserialized into the collection's front-matter type before the remainder
//! is handed to the markdown pipeline. Files without a block parse as the
//! type's `Default`.

use serde::{de::DeserializeOwned, Deserialize};
use time::{Date, OffsetDateTime, Time, UtcOffset};

use crate::error::StrataError;

/// Derived, type-erased page metadata consumed by the TOC builder, feeds,
/// and output planner.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
    /// Sibling ordering; `i32::MAX` means "unordered, sort last".
    pub order: i32,
    /// Whether the page is eligible for the RSS feed.
    pub rss_item: bool,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            title: None,
            description: None,
            last_modified: None,
            order: i32::MAX,
            rss_item: true,
        }
    }
}

/// Capabilities a collection's front-matter type must provide.
///
/// `metadata()` receives the source file's modification timestamp so types
/// without an explicit date can still surface a `last_modified`.
pub trait FrontMatter: DeserializeOwned + Default + Clone + Send + Sync + 'static {
    fn is_draft(&self) -> bool {
        false
    }

    fn tags(&self) -> &[String] {
        &[]
    }

    fn metadata(&self, file_modified: Option<OffsetDateTime>) -> Metadata;
}

/// Front matter for date-stamped, taggable posts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostFrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<Date>,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub featured_image: Option<String>,
    pub reading_time: Option<String>,
    pub uid: Option<String>,
    pub is_draft: bool,
}

impl FrontMatter for PostFrontMatter {
    fn is_draft(&self) -> bool {
        self.is_draft
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn metadata(&self, file_modified: Option<OffsetDateTime>) -> Metadata {
        Metadata {
            title: self.title.clone(),
            description: self.description.clone(),
            last_modified: self
                .date
                .map(|d| d.with_time(Time::MIDNIGHT).assume_offset(UtcOffset::UTC))
                .or(file_modified),
            order: i32::MAX,
            rss_item: true,
        }
    }
}

/// Front matter for ordered documentation pages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocFrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub uid: Option<String>,
    pub is_draft: bool,
}

impl FrontMatter for DocFrontMatter {
    fn is_draft(&self) -> bool {
        self.is_draft
    }

    fn metadata(&self, file_modified: Option<OffsetDateTime>) -> Metadata {
        Metadata {
            title: self.title.clone(),
            description: self.description.clone(),
            last_modified: file_modified,
            order: self.order.unwrap_or(i32::MAX),
            rss_item: false,
        }
    }
}

/// Split a document into its YAML front-matter block and the markdown body.
///
/// The block must start on the very first line with `---` and run until the
/// next `---` line. Returns `(yaml, body)`; `yaml` is `None` when the file
/// has no block (including an unterminated one, which reads as plain body).
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = strip_fence_line(text) else {
        return (None, text);
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, text)
}

fn strip_fence_line(text: &str) -> Option<&str> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() == "---" {
        Some(&text[first.len()..])
    } else {
        None
    }
}

/// Deserialize the front matter of `text`, falling back to `F::default()`
/// when no block is present. Returns the typed front matter and the body.
pub fn parse_front_matter<F: FrontMatter>(text: &str) -> Result<(F, &str), StrataError> {
    match split_front_matter(text) {
        (Some(yaml), body) if !yaml.trim().is_empty() => {
            let front_matter: F = serde_yaml::from_str(yaml)?;
            Ok((front_matter, body))
        }
        (_, body) => Ok((F::default(), body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_fenced_block() {
        let (yaml, body) = split_front_matter("---\ntitle: Hi\n---\n# Heading\n");
        assert_eq!(yaml, Some("title: Hi\n"));
        assert_eq!(body, "# Heading\n");
    }

    #[test]
    fn no_block_yields_default() {
        let (fm, body) = parse_front_matter::<PostFrontMatter>("# Just markdown\n").unwrap();
        assert!(fm.title.is_none());
        assert!(!fm.is_draft());
        assert_eq!(body, "# Just markdown\n");
    }

    #[test]
    fn empty_block_is_default() {
        let (fm, body) = parse_front_matter::<PostFrontMatter>("---\n---\nbody\n").unwrap();
        assert!(fm.title.is_none());
        assert_eq!(body, "body\n");
    }

    #[test]
    fn unterminated_block_reads_as_body() {
        let (yaml, body) = split_front_matter("---\ntitle: Hi\n# no close\n");
        assert!(yaml.is_none());
        assert_eq!(body, "---\ntitle: Hi\n# no close\n");
    }

    #[test]
    fn post_front_matter_camel_case_keys() {
        let (fm, _) = parse_front_matter::<PostFrontMatter>(
            "---\ntitle: Hello\ndate: 2025-01-15\nisDraft: true\ntags: [intro, Intro]\n---\nbody",
        )
        .unwrap();
        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert!(fm.is_draft());
        assert_eq!(fm.tags, vec!["intro", "Intro"]);
        let meta = fm.metadata(None);
        assert_eq!(
            meta.last_modified.map(|d| (d.year(), d.month() as u8, d.day())),
            Some((2025, 1, 15))
        );
    }

    #[test]
    fn doc_front_matter_defaults_order_to_max() {
        let (fm, _) = parse_front_matter::<DocFrontMatter>("---\ntitle: Guide\n---\n").unwrap();
        assert_eq!(fm.metadata(None).order, i32::MAX);
        let (fm, _) =
            parse_front_matter::<DocFrontMatter>("---\ntitle: Guide\norder: 3\n---\n").unwrap();
        assert_eq!(fm.metadata(None).order, 3);
    }
}
