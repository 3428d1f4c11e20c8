//! Static output generation.
//!
//! A build is a full rebuild: the output directory is cleared and recreated,
//! content roots and asset roots are mirrored in, and every planned page is
//! fetched over HTTP from the running development server and written to its
//! output path. Pages generate in three priority buckets executed
//! sequentially; within a bucket fetches run in parallel. Single-page fetch
//! failures are logged and skipped, a failed output-directory recreate aborts
//! the build.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::Deserialize;
use url::Url;
use walkdir::WalkDir;

use crate::{
    content::{ContentCollection, ContentToCopy, GenerationPriority, PageToGenerate},
    error::StrataError,
    paths::os_path_to_string,
    watch::FilePattern,
};

/// Explicit extra pages from the site configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplicitPage {
    pub url: String,
    pub output_file: PathBuf,
    #[serde(default)]
    pub priority: GenerationPriority,
}

impl From<&ExplicitPage> for PageToGenerate {
    fn from(page: &ExplicitPage) -> PageToGenerate {
        PageToGenerate {
            url: page.url.clone(),
            output_file: page.output_file.clone(),
            metadata: None,
            priority: page.priority,
        }
    }
}

/// Counts reported to the user when a build finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub generated: usize,
    pub skipped_pages: usize,
    pub copied_files: usize,
    pub skipped_copies: usize,
}

impl BuildSummary {
    pub fn skipped_total(&self) -> usize {
        self.skipped_pages + self.skipped_copies
    }
}

pub struct OutputGenerator {
    output_folder: PathBuf,
    /// Paths relative to the output folder excluded from the copy step.
    ignore_paths: Vec<PathBuf>,
    client: reqwest::Client,
    cancel: Arc<AtomicBool>,
}

impl OutputGenerator {
    pub fn new(
        output_folder: PathBuf,
        ignore_paths: Vec<PathBuf>,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, StrataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(OutputGenerator {
            output_folder,
            ignore_paths,
            client,
            cancel,
        })
    }

    /// Run the full build against the server at `server_base`.
    ///
    /// A cancelled build stops between fetches and leaves the output
    /// directory partially populated.
    pub async fn generate(
        &self,
        server_base: &Url,
        collections: &[Arc<dyn ContentCollection>],
        extra_pages: Vec<PageToGenerate>,
        asset_roots: Vec<ContentToCopy>,
    ) -> Result<BuildSummary, StrataError> {
        let planned = aggregate_plan(collections, extra_pages).await?;
        let copies = aggregate_copies(collections, asset_roots).await?;

        // Recreate the output tree; failure here aborts the build.
        match tokio::fs::remove_dir_all(&self.output_folder).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.output_folder).await?;

        let mut summary = BuildSummary::default();
        for (copy, skip_pattern) in copies {
            let (copied, skipped) = self.copy_tree(&copy, skip_pattern.as_ref()).await?;
            summary.copied_files += copied;
            summary.skipped_copies += skipped;
        }

        for priority in [
            GenerationPriority::MustBeFirst,
            GenerationPriority::Normal,
            GenerationPriority::MustBeLast,
        ] {
            let bucket: Vec<&PageToGenerate> =
                planned.iter().filter(|p| p.priority == priority).collect();
            if bucket.is_empty() {
                continue;
            }
            tracing::info!(
                "[OutputGenerator] Generating {} pages ({priority:?})",
                bucket.len()
            );
            let results = futures::future::join_all(
                bucket.iter().map(|page| self.fetch_and_write(server_base, page)),
            )
            .await;
            for generated in results {
                match generated {
                    true => summary.generated += 1,
                    false => summary.skipped_pages += 1,
                }
            }
        }

        tracing::info!(
            "[OutputGenerator] Build complete: {} pages, {} files copied, {} skipped",
            summary.generated,
            summary.copied_files,
            summary.skipped_total()
        );
        Ok(summary)
    }

    /// Fetch one page and write the body; never fails the build.
    async fn fetch_and_write(&self, server_base: &Url, page: &PageToGenerate) -> bool {
        if self.cancel.load(Ordering::SeqCst) {
            tracing::debug!("[OutputGenerator] Cancelled, skipping {}", page.url);
            return false;
        }
        let url = match server_base.join(page.url.trim_start_matches('/')) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("[OutputGenerator] Bad URL '{}': {e}", page.url);
                return false;
            }
        };
        let body = match self.fetch(url.clone()).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("[OutputGenerator] Fetch failed for {url}: {e}");
                return false;
            }
        };

        let target = self.output_folder.join(&page.output_file);
        if let Err(e) = write_with_parents(&target, body.as_bytes()).await {
            tracing::warn!("[OutputGenerator] Write failed for {target:?}: {e}");
            return false;
        }
        true
    }

    async fn fetch(&self, url: Url) -> Result<String, StrataError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Mirror one copy entry into the output tree, skipping ignore paths and
    /// the collection's own source pattern. IO failures skip the single file.
    async fn copy_tree(
        &self,
        copy: &ContentToCopy,
        skip_pattern: Option<&FilePattern>,
    ) -> Result<(usize, usize), StrataError> {
        let source = copy.source_path.clone();
        if !source.is_dir() {
            tracing::debug!("[OutputGenerator] Copy source missing: {source:?}");
            return Ok((0, 0));
        }
        let target_root = self.output_folder.join(&copy.target_path);
        let ignore = self.ignore_paths.clone();
        let skip_pattern = skip_pattern.cloned();
        let target_rel = copy.target_path.clone();

        tokio::task::spawn_blocking(move || {
            let mut copied = 0;
            let mut skipped = 0;
            for entry in WalkDir::new(&source).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = match entry.path().strip_prefix(&source) {
                    Ok(relative) => relative,
                    Err(_) => continue,
                };
                if let Some(pattern) = &skip_pattern {
                    if pattern.matches_path(entry.path()) {
                        continue;
                    }
                }
                let output_relative = target_rel.join(relative);
                if ignore.iter().any(|i| output_relative.starts_with(i)) {
                    tracing::debug!("[OutputGenerator] Ignoring {output_relative:?}");
                    continue;
                }
                let target = target_root.join(relative);
                if let Some(parent) = target.parent() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!("[OutputGenerator] Copy failed for {target:?}: {e}");
                        skipped += 1;
                        continue;
                    }
                }
                match std::fs::copy(entry.path(), &target) {
                    Ok(_) => copied += 1,
                    Err(e) => {
                        tracing::warn!("[OutputGenerator] Copy failed for {target:?}: {e}");
                        skipped += 1;
                    }
                }
            }
            Ok((copied, skipped))
        })
        .await
        .map_err(|e| StrataError::Service(format!("Copy task failed: {e}")))?
    }
}

/// Collect the full generation plan. Two collections emitting the same final
/// URL is a configuration error.
pub(crate) async fn aggregate_plan(
    collections: &[Arc<dyn ContentCollection>],
    extra_pages: Vec<PageToGenerate>,
) -> Result<Vec<PageToGenerate>, StrataError> {
    let mut planned: Vec<PageToGenerate> = Vec::new();
    let mut owners: HashMap<String, String> = HashMap::new();

    for collection in collections {
        for page in collection.pages_to_generate().await? {
            let key = os_path_to_string(&page.output_file);
            if let Some(owner) = owners.get(&key) {
                if owner != collection.name() {
                    return Err(StrataError::Config(format!(
                        "Collections '{}' and '{}' both emit '{}'",
                        owner,
                        collection.name(),
                        key
                    )));
                }
                tracing::debug!("[OutputGenerator] Duplicate plan entry for '{key}'");
                continue;
            }
            owners.insert(key, collection.name().to_string());
            planned.push(page);
        }
    }

    for page in extra_pages {
        let key = os_path_to_string(&page.output_file);
        if owners.contains_key(&key) {
            tracing::debug!("[OutputGenerator] Explicit page duplicates '{key}', skipping");
            continue;
        }
        owners.insert(key, "<explicit>".to_string());
        planned.push(page);
    }
    Ok(planned)
}

async fn aggregate_copies(
    collections: &[Arc<dyn ContentCollection>],
    asset_roots: Vec<ContentToCopy>,
) -> Result<Vec<(ContentToCopy, Option<FilePattern>)>, StrataError> {
    let mut copies = Vec::new();
    for collection in collections {
        let pattern = collection.options().file_pattern();
        for copy in collection.content_to_copy().await? {
            copies.push((copy, Some(pattern.clone())));
        }
    }
    for copy in asset_roots {
        copies.push((copy, None));
    }
    Ok(copies)
}

async fn write_with_parents(target: &Path, bytes: &[u8]) -> Result<(), StrataError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(dir: &Path) -> OutputGenerator {
        OutputGenerator::new(
            dir.to_path_buf(),
            vec![PathBuf::from("ignored")],
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn copy_tree_skips_sources_and_ignored_paths() {
        let source = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("post.md"), "md").unwrap();
        std::fs::write(source.path().join("image.png"), "png").unwrap();
        std::fs::create_dir_all(source.path().join("ignored")).unwrap();
        std::fs::write(source.path().join("ignored/secret.txt"), "no").unwrap();

        let gen = generator(out.path());
        let copy = ContentToCopy {
            source_path: source.path().to_path_buf(),
            target_path: PathBuf::new(),
        };
        let (copied, skipped) = gen
            .copy_tree(&copy, Some(&FilePattern::new("*.md")))
            .await
            .unwrap();

        assert_eq!(copied, 1);
        assert_eq!(skipped, 0);
        assert!(out.path().join("image.png").exists());
        assert!(!out.path().join("post.md").exists());
        assert!(!out.path().join("ignored/secret.txt").exists());
    }

    #[tokio::test]
    async fn missing_copy_source_is_empty() {
        let out = tempfile::tempdir().unwrap();
        let gen = generator(out.path());
        let copy = ContentToCopy {
            source_path: PathBuf::from("/does/not/exist"),
            target_path: PathBuf::new(),
        };
        assert_eq!(gen.copy_tree(&copy, None).await.unwrap(), (0, 0));
    }

    #[test]
    fn build_summary_totals() {
        let summary = BuildSummary {
            generated: 10,
            skipped_pages: 2,
            copied_files: 5,
            skipped_copies: 1,
        };
        assert_eq!(summary.skipped_total(), 3);
    }
}
