//! File watching for content roots and the connected source solution.
//!
//! [`ContentWatcher`] is a long-lived singleton owned by the engine facade.
//! Each watch pairs a directory with a file-name pattern and a handler; the
//! handler runs on the watcher's thread and must only enqueue work (the
//! debounced caches are the coalescing point, watcher handlers never dedup or
//! rebuild themselves). Directories that do not exist are logged and skipped.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use notify_debouncer_full::{
    new_debouncer,
    notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    DebounceEventResult, Debouncer, FileIdMap,
};
use parking_lot::Mutex;

use crate::error::StrataError;

/// A file system watcher with short-interval debouncing for one watch entry.
type DirDebouncer = Debouncer<RecommendedWatcher, FileIdMap>;

/// Interval used to collapse duplicate notifications from editor save dances
/// (save-temp, rename, modify). Real burst coalescing happens downstream in
/// the debounced caches.
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_millis(50);

/// A `*.ext`-style file name filter for watch callbacks and discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern(String);

impl FilePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        FilePattern(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Matches `*` (everything), `*.ext` suffixes, and exact file names.
    /// Dot files never match.
    pub fn matches(&self, file_name: &str) -> bool {
        if file_name.starts_with('.') {
            return false;
        }
        match self.0.as_str() {
            "*" => true,
            pattern => match pattern.strip_prefix('*') {
                Some(suffix) => file_name.ends_with(suffix),
                None => file_name == pattern,
            },
        }
    }

    pub fn matches_path(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| self.matches(name))
            .unwrap_or(false)
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        FilePattern("*.md".to_string())
    }
}

#[derive(Default)]
pub struct ContentWatcher {
    debouncers: Mutex<Vec<DirDebouncer>>,
}

impl ContentWatcher {
    pub fn new() -> Self {
        ContentWatcher::default()
    }

    /// Watch one directory recursively, invoking `handler` with each changed
    /// path whose file name matches `pattern`. Create, modify, remove, and
    /// rename events are observed.
    pub fn watch_directory<F>(
        &self,
        dir: &Path,
        pattern: FilePattern,
        debounce: Duration,
        handler: F,
    ) -> Result<(), StrataError>
    where
        F: Fn(PathBuf) + Send + 'static,
    {
        if !dir.is_dir() {
            tracing::warn!("[Watcher] Directory does not exist, skipping watch: {dir:?}");
            return Ok(());
        }

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events.iter() {
                        if !is_change(&event.event.kind) {
                            continue;
                        }
                        for path in event.paths.iter().filter(|p| pattern.matches_path(p)) {
                            tracing::debug!("[Watcher] Change observed: {path:?}");
                            handler(path.clone());
                        }
                    }
                }
                Err(errors) => {
                    tracing::warn!("[Watcher] Notify debouncer returned errors: {errors:?}");
                }
            }
        })?;
        debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;

        tracing::debug!("[Watcher] Watching {dir:?}");
        self.debouncers.lock().push(debouncer);
        Ok(())
    }

    /// Watch many directories with a single "something changed" callback.
    /// Missing directories are logged and skipped; if none of them exist the
    /// watch is a no-op.
    pub fn watch_many<F>(
        &self,
        dirs: &[PathBuf],
        pattern: FilePattern,
        debounce: Duration,
        handler: F,
    ) -> Result<(), StrataError>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let existing: Vec<&PathBuf> = dirs.iter().filter(|d| d.is_dir()).collect();
        for missing in dirs.iter().filter(|d| !d.is_dir()) {
            tracing::warn!("[Watcher] Directory does not exist, skipping watch: {missing:?}");
        }
        if existing.is_empty() {
            return Ok(());
        }

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let changed: Vec<PathBuf> = events
                        .iter()
                        .filter(|event| is_change(&event.event.kind))
                        .flat_map(|event| event.paths.iter())
                        .filter(|p| pattern.matches_path(p))
                        .cloned()
                        .collect();
                    if !changed.is_empty() {
                        tracing::debug!("[Watcher] {} changed paths", changed.len());
                        handler(changed);
                    }
                }
                Err(errors) => {
                    tracing::warn!("[Watcher] Notify debouncer returned errors: {errors:?}");
                }
            }
        })?;
        for dir in existing {
            debouncer.watcher().watch(dir, RecursiveMode::Recursive)?;
        }

        self.debouncers.lock().push(debouncer);
        Ok(())
    }

    /// Stop every watch. Dropping the watcher has the same effect.
    pub fn shutdown(&self) {
        self.debouncers.lock().clear();
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_extension_globs() {
        let md = FilePattern::default();
        assert!(md.matches("post.md"));
        assert!(!md.matches("post.html"));
        assert!(!md.matches(".hidden.md"));

        let any = FilePattern::new("*");
        assert!(any.matches("anything.txt"));
        assert!(!any.matches(".DS_Store"));

        let exact = FilePattern::new("strata.toml");
        assert!(exact.matches("strata.toml"));
        assert!(!exact.matches("other.toml"));
    }

    #[test]
    fn watching_missing_directory_is_not_fatal() {
        let watcher = ContentWatcher::new();
        let result = watcher.watch_directory(
            Path::new("/definitely/not/a/real/dir"),
            FilePattern::default(),
            DEFAULT_WATCH_DEBOUNCE,
            |_| {},
        );
        assert!(result.is_ok());
    }

    #[test]
    fn watcher_reports_matching_changes_only() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = std::sync::mpsc::channel::<PathBuf>();

        let watcher = ContentWatcher::new();
        watcher
            .watch_directory(
                dir.path(),
                FilePattern::default(),
                DEFAULT_WATCH_DEBOUNCE,
                move |path| {
                    let _ = tx.send(path);
                },
            )
            .unwrap();

        std::fs::write(dir.path().join("note.txt"), "not watched").unwrap();
        std::fs::write(dir.path().join("post.md"), "watched").unwrap();

        let seen = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("a change notification for the markdown file");
        assert_eq!(seen.file_name().unwrap(), "post.md");
        watcher.shutdown();
    }
}
