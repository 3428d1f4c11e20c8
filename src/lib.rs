//! # strata
//!
//! A static site generator built around a live-reloading markdown content
//! pipeline. Content is authored on disk as markdown with typed YAML front
//! matter; strata discovers it, parses and transforms it, organizes it into
//! a navigable tree, and either serves it with near-instant preview or emits
//! a complete static output tree plus machine-readable feeds.
//!
//! ## Architecture
//!
//! The pipeline is organized leaves-first:
//!
//! - **[`paths`]**: slug and URL derivation, folder labels, route
//!   normalization.
//! - **[`cache`]**: the two caching primitives behind every derived result —
//!   a debounced lazy value ([`cache::DebouncedLazy`]) and an up-front
//!   populated map ([`cache::PopulatedCache`]).
//! - **[`watch`]**: filesystem watching with pattern filtering; handlers
//!   enqueue, caches coalesce.
//! - **[`markdown`]**: front matter, the admonition/tab container extension,
//!   heading outlines, fenced code routing.
//! - **[`highlight`]**: grammar tokenization with scope-mapped classes,
//!   dedicated GBNF/shell lexers, and source fragment resolution by
//!   documentation ID (including runnable samples).
//! - **[`content`]**: typed content collections producing immutable page
//!   records and generation plans.
//! - **[`tags`]**, **[`toc`]**, **[`feeds`]**: derived structures — tag
//!   aggregation, the site TOC trie, sitemap/RSS.
//! - **[`output`]**: the static build — priority-bucketed page fetching and
//!   verbatim content mirroring.
//! - **[`engine`]**: the facade wiring collections, watcher, highlighter,
//!   and renderer into `serve` and `build` entry points.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::{
//!     content::ContentOptions,
//!     engine::{EngineBuilder, EngineOptions},
//!     markdown::{ParseHooks, PostFrontMatter},
//!     tags::TagOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::StrataError> {
//!     let options = EngineOptions::from_toml_file("strata.toml".as_ref()).await?;
//!     let engine = EngineBuilder::new(options)?
//!         .collection::<PostFrontMatter>(
//!             "blog",
//!             ContentOptions::new("content/blog", "/blog")
//!                 .with_tags(TagOptions::new("/tags")),
//!             ParseHooks::default(),
//!         )?
//!         .build()?;
//!
//!     for page in engine.all_pages().await? {
//!         println!("{} -> {}", page.url, page.navigate_url);
//!     }
//!     engine.dispose();
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//!
//! Everything IO-shaped is async on a multi-threaded tokio runtime. Watcher
//! callbacks run on the watcher's thread and only ever enqueue work; the
//! debounced caches are the single coalescing point, so a branch checkout
//! touching hundreds of files collapses into one rebuild per collection.
//! The TextMate grammar registry serializes behind one lock; the rendered
//! snippet cache and fragment store are safe for concurrent readers.

pub mod cache;
pub mod content;
pub mod engine;
pub mod error;
pub mod event;
pub mod feeds;
pub mod highlight;
pub mod markdown;
pub mod output;
pub mod paths;
pub mod render;
pub mod tags;
pub mod toc;
pub mod watch;

#[cfg(test)]
mod tests;

pub use error::*;
