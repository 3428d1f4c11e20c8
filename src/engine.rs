//! The engine facade: option loading, collection registration, watcher
//! wiring, and the run/build entry points.
//!
//! The facade owns the shared infrastructure (watcher, highlighter, event
//! channel) and the list of type-erased collections. Watcher callbacks only
//! ever enqueue: a content change schedules the owning collection's debounced
//! rebuild, a solution change batches into the fragment store and clears the
//! rendered-snippet cache.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::Deserialize;
use tokio::sync::broadcast;
use url::Url;

use crate::{
    content::{
        ContentCollection, ContentOptions, ContentService, PageSnapshot, PageToGenerate,
    },
    error::StrataError,
    event::Event,
    feeds::{self, FeedOptions},
    highlight::{HighlightOptions, Highlighter, SolutionOptions},
    markdown::{DocFrontMatter, FrontMatter, MarkdownParser, ParseHooks, PostFrontMatter},
    output::{self, BuildSummary, ExplicitPage, OutputGenerator},
    paths::{normalize_route, trim_slashes},
    render::{DefaultRenderer, PageRenderer, RenderContext},
    tags::{posts_by_tag, unique_tags},
    toc::build_toc,
    watch::{ContentWatcher, FilePattern, DEFAULT_WATCH_DEBOUNCE},
};

fn default_base_href() -> String {
    "/".to_string()
}

fn default_output_folder() -> PathBuf {
    PathBuf::from("output")
}

fn default_port() -> u16 {
    9037
}

/// Front-matter shape of a configured collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Date-stamped, taggable posts.
    Posts,
    /// Ordered documentation pages.
    Docs,
}

/// One `[[collections]]` entry of the site configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub kind: CollectionKind,
    #[serde(flatten)]
    pub content: ContentOptions,
}

/// Engine options, usually deserialized from `strata.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineOptions {
    /// Base href used when composing navigation links. Overridden by the
    /// `BaseHref` environment variable.
    #[serde(default = "default_base_href")]
    pub base_href: String,
    pub feed: FeedOptions,
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Output-relative paths excluded from the copy step.
    #[serde(default)]
    pub ignore_paths: Vec<PathBuf>,
    /// Explicit extra pages to plan.
    #[serde(default)]
    pub pages: Vec<ExplicitPage>,
    #[serde(default)]
    pub solution: Option<SolutionOptions>,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

impl EngineOptions {
    pub async fn from_toml_file(path: &std::path::Path) -> Result<Self, StrataError> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply environment overrides; `BaseHref` wins over the config file.
    pub fn apply_environment(&mut self) {
        if let Ok(base_href) = std::env::var("BaseHref") {
            if !base_href.is_empty() {
                self.base_href = base_href;
            }
        }
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        self.feed.validate()?;
        if !self.base_href.starts_with('/') {
            return Err(StrataError::Config(format!(
                "base_href must start with '/': {}",
                self.base_href
            )));
        }
        for collection in &self.collections {
            collection.content.validate()?;
        }
        if let Some(solution) = &self.solution {
            solution.validate()?;
        }
        Ok(())
    }

    fn toc_base(&self) -> &str {
        self.base_href.trim_end_matches('/')
    }
}

type CollectionFactory = Box<
    dyn FnOnce(&MarkdownParser, bool, broadcast::Sender<Event>) -> Arc<dyn ContentCollection>
        + Send,
>;

/// Registration builder for the engine.
pub struct EngineBuilder {
    options: EngineOptions,
    include_drafts: bool,
    renderer: Arc<dyn PageRenderer>,
    registrations: Vec<CollectionFactory>,
}

impl EngineBuilder {
    /// Validates options up front so a misconfigured site fails before any
    /// service spins up.
    pub fn new(mut options: EngineOptions) -> Result<Self, StrataError> {
        options.apply_environment();
        options.validate()?;
        Ok(EngineBuilder {
            options,
            include_drafts: false,
            renderer: Arc::new(DefaultRenderer),
            registrations: Vec::new(),
        })
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Include draft pages (development preview only; builds never do).
    pub fn include_drafts(mut self, include_drafts: bool) -> Self {
        self.include_drafts = include_drafts;
        self
    }

    /// Register a typed content collection.
    pub fn collection<F: FrontMatter>(
        mut self,
        name: impl Into<String>,
        options: ContentOptions,
        hooks: ParseHooks<F>,
    ) -> Result<Self, StrataError> {
        options.validate()?;
        let name = name.into();
        self.registrations.push(Box::new(move |parser, drafts, events| {
            let service: Arc<dyn ContentCollection> = Arc::new(ContentService::new(
                name,
                options,
                parser.clone(),
                hooks,
                drafts,
                Some(events),
            ));
            service
        }));
        Ok(self)
    }

    /// Register every collection declared in the options file.
    pub fn configured_collections(mut self) -> Result<Self, StrataError> {
        for config in self.options.collections.clone() {
            self = match config.kind {
                CollectionKind::Posts => self.collection::<PostFrontMatter>(
                    config.name,
                    config.content,
                    ParseHooks::default(),
                )?,
                CollectionKind::Docs => self.collection::<DocFrontMatter>(
                    config.name,
                    config.content,
                    ParseHooks::default(),
                )?,
            };
        }
        Ok(self)
    }

    /// Wire everything together. Must run inside a tokio runtime; the caches
    /// schedule their debounced work onto it.
    pub fn build(self) -> Result<Engine, StrataError> {
        let (events, _) = broadcast::channel(128);

        let highlighter = Arc::new(Highlighter::new(HighlightOptions {
            solution: self.options.solution.clone(),
            ..Default::default()
        }));
        let parser = MarkdownParser::new(highlighter.clone());

        let collections: Vec<Arc<dyn ContentCollection>> = self
            .registrations
            .into_iter()
            .map(|factory| factory(&parser, self.include_drafts, events.clone()))
            .collect();

        let watcher = ContentWatcher::new();
        for collection in &collections {
            let options = collection.options();
            let pattern = options.file_pattern();
            let handler_collection = collection.clone();
            let handler_events = events.clone();
            let name = collection.name().to_string();
            watcher.watch_directory(
                &options.content_path,
                pattern,
                DEFAULT_WATCH_DEBOUNCE,
                move |path| {
                    let _ = handler_events.send(Event::ContentChanged {
                        collection: name.clone(),
                        paths: vec![path],
                    });
                    handler_collection.refresh();
                },
            )?;
        }

        if let Some(store) = highlighter.fragments() {
            let solution = store.options().clone();
            let handler_highlighter = highlighter.clone();
            let handler_collections = collections.clone();
            let handler_events = events.clone();
            watcher.watch_many(
                &[solution.solution_path.clone()],
                FilePattern::new(solution.file_pattern.clone()),
                DEFAULT_WATCH_DEBOUNCE,
                move |paths| {
                    let _ = handler_events.send(Event::SolutionChanged {
                        paths: paths.clone(),
                    });
                    if let Some(store) = handler_highlighter.fragments() {
                        store.on_files_changed(paths);
                    }
                    // Snippets rendered from the old sources are stale now.
                    handler_highlighter.invalidate_rendered();
                    for collection in &handler_collections {
                        collection.refresh();
                    }
                },
            )?;
        }

        Ok(Engine {
            options: self.options,
            renderer: self.renderer,
            collections,
            watcher,
            highlighter,
            events,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// The wired engine.
pub struct Engine {
    options: EngineOptions,
    renderer: Arc<dyn PageRenderer>,
    collections: Vec<Arc<dyn ContentCollection>>,
    watcher: ContentWatcher,
    highlighter: Arc<Highlighter>,
    events: broadcast::Sender<Event>,
    cancel: Arc<AtomicBool>,
}

impl Engine {
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn collections(&self) -> &[Arc<dyn ContentCollection>] {
        &self.collections
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Snapshots of every page across all collections.
    pub async fn all_pages(&self) -> Result<Vec<PageSnapshot>, StrataError> {
        let mut pages = Vec::new();
        for collection in &self.collections {
            pages.extend(collection.pages().await?);
        }
        Ok(pages)
    }

    /// The aggregated generation plan (content pages, tag pages, renderer
    /// routes, explicit pages). The feeds themselves are not part of it.
    pub async fn planned_pages(&self) -> Result<Vec<PageToGenerate>, StrataError> {
        let mut extra = self.renderer.routes();
        extra.extend(self.options.pages.iter().map(PageToGenerate::from));
        output::aggregate_plan(&self.collections, extra).await
    }

    pub async fn sitemap(&self) -> Result<String, StrataError> {
        Ok(feeds::generate_sitemap(
            &self.options.feed,
            &self.planned_pages().await?,
        ))
    }

    pub async fn rss(&self) -> Result<String, StrataError> {
        Ok(feeds::generate_rss(
            &self.options.feed,
            &self.planned_pages().await?,
        ))
    }

    /// Render the route at `path`, or `None` when nothing matches (the dev
    /// server falls through to static files).
    pub async fn render_route(&self, path: &str) -> Result<Option<String>, StrataError> {
        let pages = self.all_pages().await?;
        let normalized = normalize_route(path);
        let ctx = RenderContext {
            site_title: self.options.feed.title.clone(),
            base_href: self.options.base_href.clone(),
            toc: build_toc(&pages, self.options.toc_base(), path),
        };

        if let Some(page) = pages
            .iter()
            .find(|p| normalize_route(&p.navigate_url) == normalized)
        {
            return Ok(Some(self.renderer.render_page(page, &ctx).await?));
        }

        // Tag listing routes have no page record; they exist by plan only.
        for collection in &self.collections {
            let Some(tags) = &collection.options().tags else {
                continue;
            };
            let prefix = format!("{}/", trim_slashes(&tags.tags_page_url));
            let Some(encoded) = trim_slashes(path).strip_prefix(&prefix) else {
                continue;
            };
            let encoded = encoded.trim_end_matches(".html");
            if let Some(tag) = unique_tags(pages.iter())
                .into_iter()
                .find(|t| t.encoded_name == encoded)
            {
                let posts: Vec<PageSnapshot> = posts_by_tag(&pages, &tag.encoded_name)
                    .into_iter()
                    .cloned()
                    .collect();
                return Ok(Some(self.renderer.render_tag_page(&tag, &posts, &ctx).await?));
            }
        }
        Ok(None)
    }

    /// Run the static build against the dev server at `server_base`.
    pub async fn build_static(&self, server_base: &Url) -> Result<BuildSummary, StrataError> {
        let mut extra = self.renderer.routes();
        extra.extend(self.options.pages.iter().map(PageToGenerate::from));
        extra.push(PageToGenerate::new("/sitemap.xml", "sitemap.xml"));
        extra.push(PageToGenerate::new("/rss.xml", "rss.xml"));

        let generator = OutputGenerator::new(
            self.options.output_folder.clone(),
            self.options.ignore_paths.clone(),
            self.cancel.clone(),
        )?;
        generator
            .generate(
                server_base,
                &self.collections,
                extra,
                self.renderer.asset_roots(),
            )
            .await
    }

    /// Cancel an in-flight build; the output directory stays partially
    /// populated.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Stop watchers, dispose caches, and notify observers. Idempotent.
    pub fn dispose(&self) {
        self.watcher.shutdown();
        for collection in &self.collections {
            collection.dispose();
        }
        if let Some(store) = self.highlighter.fragments() {
            store.dispose();
        }
        let _ = self.events.send(Event::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagOptions;
    use std::fs;
    use std::path::Path;

    fn write_file(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn options() -> EngineOptions {
        EngineOptions {
            base_href: "/".to_string(),
            feed: FeedOptions {
                title: "Site".to_string(),
                description: "Desc".to_string(),
                url: "https://example.com".to_string(),
            },
            output_folder: PathBuf::from("output"),
            port: default_port(),
            ignore_paths: Vec::new(),
            pages: Vec::new(),
            solution: None,
            collections: Vec::new(),
        }
    }

    fn engine_for(root: &Path) -> Engine {
        let content = ContentOptions::new(root, "/blog").with_tags(TagOptions::new("/tags"));
        EngineBuilder::new(options())
            .unwrap()
            .collection::<PostFrontMatter>("blog", content, ParseHooks::default())
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn renders_page_and_tag_routes() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "welcome.md",
            "---\ntitle: Hello\ntags: [intro]\n---\nBody.\n",
        );
        let engine = engine_for(dir.path());

        let page = engine.render_route("/blog/welcome").await.unwrap();
        assert!(page.unwrap().contains("Body."));

        let tag_page = engine.render_route("/tags/intro").await.unwrap();
        assert!(tag_page.unwrap().contains("/blog/welcome"));

        assert!(engine.render_route("/nope").await.unwrap().is_none());
        engine.dispose();
    }

    #[tokio::test]
    async fn feeds_cover_planned_pages_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "post.md",
            "---\ntitle: Post\ndate: 2025-02-01\n---\nx\n",
        );
        write_file(dir.path(), "draft.md", "---\nisDraft: true\n---\nx\n");
        let engine = engine_for(dir.path());

        let sitemap = engine.sitemap().await.unwrap();
        assert!(sitemap.contains("https://example.com/blog/post"));
        assert!(!sitemap.contains("draft"));

        let rss = engine.rss().await.unwrap();
        assert!(rss.contains("<title>Post</title>"));
        assert!(!rss.contains("draft"));
        engine.dispose();
    }

    #[tokio::test]
    async fn duplicate_urls_across_collections_fail_the_plan() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        write_file(dir_a.path(), "same.md", "---\ntitle: A\n---\nx\n");
        write_file(dir_b.path(), "same.md", "---\ntitle: B\n---\nx\n");

        let engine = EngineBuilder::new(options())
            .unwrap()
            .collection::<PostFrontMatter>(
                "a",
                ContentOptions::new(dir_a.path(), "/shared"),
                ParseHooks::default(),
            )
            .unwrap()
            .collection::<PostFrontMatter>(
                "b",
                ContentOptions::new(dir_b.path(), "/shared"),
                ParseHooks::default(),
            )
            .unwrap()
            .build()
            .unwrap();

        let err = engine.planned_pages().await.unwrap_err();
        assert!(matches!(err, StrataError::Config(_)));
        engine.dispose();
    }

    #[test]
    fn options_parse_from_toml() {
        let toml = r#"
            base_href = "/"
            [feed]
            title = "My Site"
            description = "Things"
            url = "https://example.com"

            [[collections]]
            name = "blog"
            kind = "posts"
            content_path = "content/blog"
            base_page_url = "/blog"

            [collections.tags]
            tags_page_url = "/tags"
        "#;
        let options: EngineOptions = toml::from_str(toml).unwrap();
        assert_eq!(options.collections.len(), 1);
        assert_eq!(options.collections[0].name, "blog");
        assert_eq!(options.collections[0].kind, CollectionKind::Posts);
        assert!(options.collections[0].content.tags.is_some());
        assert_eq!(options.port, 9037);
    }
}
