//! Tag encoding, extraction, and lookup.
//!
//! Tags are identified by their encoded name: two raw tags that slugify to
//! the same token are the same tag. The encoder is configurable per
//! collection but must stay total and idempotent; the default is
//! [`crate::paths::slugify`], which is both.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    content::PageSnapshot,
    markdown::FrontMatter,
    paths::{join_url, slugify},
};

/// One site tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub display_name: String,
    pub encoded_name: String,
    pub navigate_url: String,
}

pub type TagEncodeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Tagging options of a content collection.
#[derive(Clone, Deserialize)]
pub struct TagOptions {
    /// Base URL of the tag listing pages, e.g. `/tags`.
    pub tags_page_url: String,
    /// Encoder override; defaults to slugify.
    #[serde(skip)]
    pub encoder: Option<TagEncodeFn>,
}

impl std::fmt::Debug for TagOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagOptions")
            .field("tags_page_url", &self.tags_page_url)
            .field("encoder", &self.encoder.is_some())
            .finish()
    }
}

impl TagOptions {
    pub fn new(tags_page_url: impl Into<String>) -> Self {
        TagOptions {
            tags_page_url: tags_page_url.into(),
            encoder: None,
        }
    }

    pub fn encode(&self, raw: &str) -> String {
        match &self.encoder {
            Some(encoder) => encoder(raw),
            None => slugify(raw),
        }
    }

    pub fn build_tag(&self, raw: &str) -> Tag {
        let encoded_name = self.encode(raw);
        Tag {
            display_name: raw.trim().to_string(),
            navigate_url: join_url(&self.tags_page_url, &encoded_name),
            encoded_name,
        }
    }

    /// Encode the front matter's tags, dropping empty and whitespace-only
    /// entries. Input order is preserved; duplicates survive here and are
    /// collapsed by [`unique_tags`] at aggregation time.
    pub fn extract_from<F: FrontMatter>(&self, front_matter: &F) -> Vec<Tag> {
        front_matter
            .tags()
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| self.build_tag(raw))
            .collect()
    }
}

/// Deduplicate by encoded name across pages, preserving first-seen order.
pub fn unique_tags<'a, I>(pages: I) -> Vec<Tag>
where
    I: IntoIterator<Item = &'a PageSnapshot>,
{
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for page in pages {
        for tag in &page.tags {
            if seen.insert(tag.encoded_name.clone()) {
                unique.push(tag.clone());
            }
        }
    }
    unique
}

/// Pages whose tag set contains the encoded name.
pub fn posts_by_tag<'a>(pages: &'a [PageSnapshot], encoded_name: &str) -> Vec<&'a PageSnapshot> {
    pages
        .iter()
        .filter(|page| page.tags.iter().any(|t| t.encoded_name == encoded_name))
        .collect()
}
