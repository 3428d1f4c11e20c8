use std::path::PathBuf;

/// Events emitted by the content pipeline for interested observers (the dev
/// server's live-reload stream, the CLI's verbose mode, tests).
///
/// Watcher callbacks never carry out work themselves; they enqueue and emit.
/// The debounced caches are the single coalescing point, so one burst of file
/// system churn produces many `ContentChanged` events but only one
/// `CollectionRefreshed` once the rebuild lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Source files under a collection's content root changed on disk.
    ContentChanged {
        collection: String,
        paths: Vec<PathBuf>,
    },
    /// A collection's page cache finished recomputing.
    CollectionRefreshed { collection: String },
    /// Files under the connected source solution changed on disk.
    SolutionChanged { paths: Vec<PathBuf> },
    /// Browser clients should reload.
    Reload,
    /// The engine is shutting down.
    Shutdown,
    /// Keepalive.
    Ping,
}
