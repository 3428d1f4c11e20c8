//! Content collections: discovery, page records, and generation plans.
//!
//! Each collection owns a directory of markdown sources typed by a
//! front-matter type `F`. Parsed pages live behind a [`DebouncedLazy`] so a
//! burst of file churn collapses into one rebuild; the engine wires watcher
//! callbacks to [`ContentCollection::refresh`]. A rebuild replaces the whole
//! page list; single-file failures are logged with the file path and skipped.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use futures::future::BoxFuture;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use walkdir::WalkDir;

use crate::{
    cache::{DebouncedLazy, DEFAULT_DEBOUNCE},
    error::StrataError,
    event::Event,
    markdown::{FrontMatter, HeadingNode, MarkdownParser, Metadata, ParseHooks},
    paths::{join_url, trim_slashes, url_from_relative_path},
    tags::{unique_tags, Tag, TagOptions},
    watch::FilePattern,
};

/// An on-disk markdown source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub last_modified: Option<OffsetDateTime>,
}

/// A fully built page. Immutable once built; a rebuild replaces the record.
#[derive(Debug, Clone)]
pub struct PageRecord<F> {
    pub front_matter: F,
    pub url: String,
    pub navigate_url: String,
    /// Rendered HTML of the markdown body.
    pub markdown_content: String,
    pub tags: Vec<Tag>,
    pub outline: Vec<HeadingNode>,
    pub metadata: Metadata,
}

/// Type-erased view of a page shared with the TOC builder, feeds, renderer,
/// and dev server.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    pub navigate_url: String,
    pub html: String,
    pub metadata: Metadata,
    pub tags: Vec<Tag>,
    pub outline: Vec<HeadingNode>,
}

impl<F> PageRecord<F> {
    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            url: self.url.clone(),
            navigate_url: self.navigate_url.clone(),
            html: self.markdown_content.clone(),
            metadata: self.metadata.clone(),
            tags: self.tags.clone(),
            outline: self.outline.clone(),
        }
    }
}

/// Output planning priority. Buckets run sequentially, pages within a bucket
/// in parallel; `MustBeLast` exists for routes that depend on everything else
/// having rendered (a scanned stylesheet, say).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
pub enum GenerationPriority {
    MustBeFirst,
    #[default]
    Normal,
    MustBeLast,
}

/// One artifact of the output plan.
#[derive(Debug, Clone)]
pub struct PageToGenerate {
    pub url: String,
    /// Output path relative to the output folder.
    pub output_file: PathBuf,
    pub metadata: Option<Metadata>,
    pub priority: GenerationPriority,
}

impl PageToGenerate {
    pub fn new(url: impl Into<String>, output_file: impl Into<PathBuf>) -> Self {
        PageToGenerate {
            url: url.into(),
            output_file: output_file.into(),
            metadata: None,
            priority: GenerationPriority::Normal,
        }
    }
}

/// A verbatim copy entry: everything under `source_path` mirrors to
/// `target_path` under the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentToCopy {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
}

/// Options of one content collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentOptions {
    pub content_path: PathBuf,
    /// URL prefix the collection's pages live under, e.g. `/blog`.
    #[serde(default)]
    pub base_page_url: String,
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,
    /// Routes excluded from output planning, relative to the collection.
    #[serde(default)]
    pub excluded_routes: Vec<String>,
    #[serde(default)]
    pub tags: Option<TagOptions>,
}

fn default_file_pattern() -> String {
    "*.md".to_string()
}

impl ContentOptions {
    pub fn new(content_path: impl Into<PathBuf>, base_page_url: impl Into<String>) -> Self {
        ContentOptions {
            content_path: content_path.into(),
            base_page_url: base_page_url.into(),
            file_pattern: default_file_pattern(),
            excluded_routes: Vec::new(),
            tags: None,
        }
    }

    pub fn with_tags(mut self, tags: TagOptions) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn file_pattern(&self) -> FilePattern {
        FilePattern::new(self.file_pattern.clone())
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        if !self.content_path.is_dir() {
            return Err(StrataError::Config(format!(
                "Content path is not a directory: {:?}",
                self.content_path
            )));
        }
        Ok(())
    }
}

/// Type-erased collection interface the engine, TOC builder, and output
/// generator work against.
pub trait ContentCollection: Send + Sync {
    fn name(&self) -> &str;
    fn options(&self) -> &ContentOptions;

    /// Schedule a debounced rebuild of the page cache.
    fn refresh(&self);
    fn dispose(&self);

    fn pages(&self) -> BoxFuture<'_, Result<Vec<PageSnapshot>, StrataError>>;
    fn pages_to_generate(&self) -> BoxFuture<'_, Result<Vec<PageToGenerate>, StrataError>>;
    fn content_to_copy(&self) -> BoxFuture<'_, Result<Vec<ContentToCopy>, StrataError>>;
}

/// The typed collection service backing [`ContentCollection`].
pub struct ContentService<F: FrontMatter> {
    name: String,
    options: Arc<ContentOptions>,
    pages: DebouncedLazy<Arc<Vec<Arc<PageRecord<F>>>>>,
}

impl<F: FrontMatter> ContentService<F> {
    /// Must be constructed inside a tokio runtime. `events`, when given,
    /// receives [`Event::CollectionRefreshed`] after every completed rebuild.
    pub fn new(
        name: impl Into<String>,
        options: ContentOptions,
        parser: MarkdownParser,
        hooks: ParseHooks<F>,
        include_drafts: bool,
        events: Option<broadcast::Sender<Event>>,
    ) -> Self {
        Self::with_debounce(name, options, parser, hooks, include_drafts, events, DEFAULT_DEBOUNCE)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_debounce(
        name: impl Into<String>,
        options: ContentOptions,
        parser: MarkdownParser,
        hooks: ParseHooks<F>,
        include_drafts: bool,
        events: Option<broadcast::Sender<Event>>,
        debounce: Duration,
    ) -> Self {
        let name = name.into();
        let options = Arc::new(options);

        let factory_name = name.clone();
        let factory_options = options.clone();
        let pages = DebouncedLazy::with_debounce(
            Arc::new(move || {
                let name = factory_name.clone();
                let options = factory_options.clone();
                let parser = parser.clone();
                let hooks = hooks.clone();
                let events = events.clone();
                Box::pin(async move {
                    let pages = build_pages(&name, &options, &parser, &hooks, include_drafts).await?;
                    if let Some(events) = events {
                        let _ = events.send(Event::CollectionRefreshed {
                            collection: name.clone(),
                        });
                    }
                    Ok(pages)
                })
            }),
            debounce,
        );

        ContentService {
            name,
            options,
            pages,
        }
    }

    /// The typed page records (snapshots are available via the trait).
    pub async fn records(&self) -> Result<Arc<Vec<Arc<PageRecord<F>>>>, StrataError> {
        self.pages.value().await
    }
}

impl<F: FrontMatter> ContentCollection for ContentService<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn options(&self) -> &ContentOptions {
        &self.options
    }

    fn refresh(&self) {
        self.pages.refresh();
    }

    fn dispose(&self) {
        self.pages.dispose();
    }

    fn pages(&self) -> BoxFuture<'_, Result<Vec<PageSnapshot>, StrataError>> {
        Box::pin(async move {
            let records = self.records().await?;
            Ok(records.iter().map(|r| r.snapshot()).collect())
        })
    }

    fn pages_to_generate(&self) -> BoxFuture<'_, Result<Vec<PageToGenerate>, StrataError>> {
        Box::pin(async move {
            let records = self.records().await?;
            let snapshots: Vec<PageSnapshot> = records.iter().map(|r| r.snapshot()).collect();

            let mut planned = Vec::new();
            for page in &snapshots {
                if self.is_excluded(&page.url) {
                    continue;
                }
                planned.push(PageToGenerate {
                    url: page.navigate_url.clone(),
                    output_file: output_file_for(&page.navigate_url),
                    metadata: Some(page.metadata.clone()),
                    priority: GenerationPriority::Normal,
                });
            }

            // One listing page per unique tag, carrying the source page's
            // metadata (kept out of the RSS feed).
            for tag in unique_tags(snapshots.iter()) {
                let source = snapshots
                    .iter()
                    .find(|p| p.tags.iter().any(|t| t.encoded_name == tag.encoded_name));
                let metadata = source.map(|p| Metadata {
                    rss_item: false,
                    ..p.metadata.clone()
                });
                planned.push(PageToGenerate {
                    url: tag.navigate_url.clone(),
                    output_file: output_file_for(&tag.navigate_url),
                    metadata,
                    priority: GenerationPriority::Normal,
                });
            }
            Ok(planned)
        })
    }

    fn content_to_copy(&self) -> BoxFuture<'_, Result<Vec<ContentToCopy>, StrataError>> {
        Box::pin(async move {
            if !self.options.content_path.is_dir() {
                return Ok(Vec::new());
            }
            Ok(vec![ContentToCopy {
                source_path: self.options.content_path.clone(),
                target_path: relative_output_path(trim_slashes(&self.options.base_page_url)),
            }])
        })
    }
}

impl<F: FrontMatter> ContentService<F> {
    fn is_excluded(&self, url: &str) -> bool {
        self.options
            .excluded_routes
            .iter()
            .any(|route| trim_slashes(route).eq_ignore_ascii_case(trim_slashes(url)))
    }
}

/// `{url}.html` relative to the output folder; the empty route is the site
/// index.
pub fn output_file_for(url: &str) -> PathBuf {
    let trimmed = trim_slashes(url);
    if trimmed.is_empty() {
        PathBuf::from("index.html")
    } else {
        relative_output_path(&format!("{trimmed}.html"))
    }
}

fn relative_output_path(url_path: &str) -> PathBuf {
    url_path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Enumerate matching source files, deterministically ordered by path.
/// Inaccessible entries are logged and skipped.
pub fn discover_files(
    content_path: &Path,
    pattern: &FilePattern,
) -> Result<Vec<SourceFile>, StrataError> {
    if !content_path.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(content_path).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("[Content] Skipping inaccessible entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !pattern.matches_path(entry.path()) {
            continue;
        }
        let relative_path = entry.path().strip_prefix(content_path)?.to_path_buf();
        let last_modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(clamp_to_now);
        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative_path,
            last_modified,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// File mtimes can sit ahead of the wall clock (clock skew, archive
/// extraction); a page is never "modified in the future".
fn clamp_to_now(modified: std::time::SystemTime) -> OffsetDateTime {
    let modified = OffsetDateTime::from(modified);
    let now = OffsetDateTime::now_utc();
    if modified > now {
        now
    } else {
        modified
    }
}

async fn build_pages<F: FrontMatter>(
    name: &str,
    options: &ContentOptions,
    parser: &MarkdownParser,
    hooks: &ParseHooks<F>,
    include_drafts: bool,
) -> Result<Arc<Vec<Arc<PageRecord<F>>>>, StrataError> {
    let files = discover_files(&options.content_path, &options.file_pattern())?;
    let mut pages: Vec<Arc<PageRecord<F>>> = Vec::with_capacity(files.len());

    for file in files {
        match build_page(options, parser, hooks, include_drafts, &file).await {
            Ok(Some(page)) => {
                if pages.iter().any(|p| p.url == page.url) {
                    tracing::warn!(
                        "[Content:{name}] Duplicate URL '{}' from {:?}, keeping the first",
                        page.url,
                        file.path
                    );
                    continue;
                }
                pages.push(Arc::new(page));
            }
            Ok(None) => tracing::debug!("[Content:{name}] Skipping draft {:?}", file.path),
            Err(e) => {
                tracing::warn!("[Content:{name}] Failed to process {:?}: {e}", file.path);
            }
        }
    }
    tracing::info!("[Content:{name}] Built {} pages", pages.len());
    Ok(Arc::new(pages))
}

async fn build_page<F: FrontMatter>(
    options: &ContentOptions,
    parser: &MarkdownParser,
    hooks: &ParseHooks<F>,
    include_drafts: bool,
    file: &SourceFile,
) -> Result<Option<PageRecord<F>>, StrataError> {
    let text = tokio::fs::read_to_string(&file.path).await?;
    let parsed = parser.parse::<F>(&text, hooks).await?;
    if parsed.front_matter.is_draft() && !include_drafts {
        return Ok(None);
    }

    let url = url_from_relative_path(&file.relative_path);
    let navigate_url = join_url(&options.base_page_url, &url);
    let tags = options
        .tags
        .as_ref()
        .map(|t| t.extract_from(&parsed.front_matter))
        .unwrap_or_default();
    let metadata = parsed.front_matter.metadata(file.last_modified);

    Ok(Some(PageRecord {
        front_matter: parsed.front_matter,
        url,
        navigate_url,
        markdown_content: parsed.html,
        tags,
        outline: parsed.outline,
        metadata,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        highlight::{HighlightOptions, Highlighter},
        markdown::PostFrontMatter,
    };
    use std::fs;

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn service(root: &Path, include_drafts: bool) -> ContentService<PostFrontMatter> {
        let parser = MarkdownParser::new(Arc::new(Highlighter::new(HighlightOptions::default())));
        let options = ContentOptions::new(root, "/blog").with_tags(TagOptions::new("/tags"));
        ContentService::new("blog", options, parser, ParseHooks::default(), include_drafts, None)
    }

    #[tokio::test]
    async fn single_post_builds_record_with_outline_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "welcome.md",
            "---\ntitle: Hello\ndate: 2025-01-15\ntags: [intro, Intro]\n---\n# H1\n## H2\n",
        );

        let service = service(dir.path(), false);
        let pages = service.pages().await.unwrap();
        assert_eq!(pages.len(), 1);

        let page = &pages[0];
        assert_eq!(page.url, "welcome");
        assert_eq!(page.navigate_url, "/blog/welcome");
        assert_eq!(page.outline.len(), 1);
        assert_eq!(page.outline[0].title, "H2");
        assert_eq!(page.outline[0].id, "h2");

        let tags = unique_tags(pages.iter());
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].encoded_name, "intro");
    }

    #[tokio::test]
    async fn drafts_are_suppressed_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "published.md",
            "---\ntitle: Live\ntags: [shipped]\n---\nbody\n",
        );
        write_file(
            dir.path(),
            "draft.md",
            "---\ntitle: Secret\nisDraft: true\ntags: [wip]\n---\nbody\n",
        );

        let service = service(dir.path(), false);
        let pages = service.pages().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].metadata.title.as_deref(), Some("Live"));

        let planned = service.pages_to_generate().await.unwrap();
        assert!(planned.iter().all(|p| !p.url.contains("draft")));
        // One page plus one tag listing; nothing for the draft's tag.
        assert_eq!(planned.len(), 2);
        assert!(planned.iter().any(|p| p.url == "/tags/shipped"));
    }

    #[tokio::test]
    async fn drafts_appear_in_preview_mode() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "draft.md", "---\nisDraft: true\n---\nbody\n");

        let service = service(dir.path(), true);
        assert_eq!(service.pages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn broken_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "good.md", "---\ntitle: Good\n---\nok\n");
        write_file(dir.path(), "bad.md", "---\ntitle: [unclosed\n---\nbody\n");

        let service = service(dir.path(), false);
        let pages = service.pages().await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "good");
    }

    #[tokio::test]
    async fn nested_paths_slugify_per_segment() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "Guides/Getting Started.md",
            "---\ntitle: GS\n---\nbody\n",
        );

        let service = service(dir.path(), false);
        let pages = service.pages().await.unwrap();
        assert_eq!(pages[0].url, "guides/getting-started");
        assert_eq!(pages[0].navigate_url, "/blog/guides/getting-started");
    }

    #[tokio::test]
    async fn content_to_copy_points_at_collection_root() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.md", "x\n");
        let service = service(dir.path(), false);
        let copies = service.content_to_copy().await.unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].source_path, dir.path());
        assert_eq!(copies[0].target_path, PathBuf::from("blog"));
    }

    #[tokio::test]
    async fn future_mtimes_clamp_to_now() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ahead.md", "---\ntitle: Ahead\n---\nx\n");
        let file = dir.path().join("ahead.md");
        let ahead = std::time::SystemTime::now() + std::time::Duration::from_secs(3600);
        filetime::set_file_mtime(&file, filetime::FileTime::from_system_time(ahead)).unwrap();

        let files = discover_files(dir.path(), &FilePattern::default()).unwrap();
        let modified = files[0].last_modified.unwrap();
        assert!(modified <= OffsetDateTime::now_utc());
    }

    #[test]
    fn output_file_mapping() {
        assert_eq!(output_file_for("/blog/welcome"), PathBuf::from("blog/welcome.html"));
        assert_eq!(output_file_for(""), PathBuf::from("index.html"));
        assert_eq!(output_file_for("/"), PathBuf::from("index.html"));
    }
}
