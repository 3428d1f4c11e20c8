//! Source fragment resolution by documentation ID.
//!
//! A site may connect a "solution": a directory of source projects whose
//! type and function declarations become addressable code samples. The store
//! scans matching files, records every declaration under a sanitized
//! documentation ID (`T:module.Type`, `M:module.Type.method`), and keeps the
//! results in a populated cache. Recorded spans start at the declaration
//! line's first column so rendered snippets retain their indentation.
//!
//! When solution files change the watcher batches the paths under a lock and
//! schedules a debounced rebuild; change notifications arriving while a
//! rebuild is in progress are ignored (the cache is about to be re-built
//! anyway). Invalidation swaps the whole fragment map, append-only within a
//! build generation.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Command,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use walkdir::WalkDir;

use crate::{
    cache::{DebouncedLazy, PopulatedCache},
    error::StrataError,
    paths::os_path_to_string,
    watch::FilePattern,
};

/// Placeholder rendered when a documentation ID cannot be resolved.
pub const CODE_NOT_FOUND: &str = "Code not found for specified documentation ID.";

/// Debounce window for solution rebuilds; source trees churn harder than
/// content does.
pub const SOLUTION_DEBOUNCE: Duration = Duration::from_millis(500);

/// Command template for executing runnable samples. `{docid}` in any
/// argument is replaced with the sanitized documentation ID.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SampleRunner {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Options for the connected source solution.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SolutionOptions {
    pub solution_path: PathBuf,
    /// File filter for declaration scanning.
    #[serde(default = "default_solution_pattern")]
    pub file_pattern: String,
    /// Only files whose path contains this substring participate.
    #[serde(default = "default_project_filter")]
    pub project_filter: String,
    #[serde(default)]
    pub sample_runner: Option<SampleRunner>,
}

fn default_solution_pattern() -> String {
    "*.rs".to_string()
}

fn default_project_filter() -> String {
    "blog-projects".to_string()
}

impl SolutionOptions {
    pub fn new(solution_path: impl Into<PathBuf>) -> Self {
        SolutionOptions {
            solution_path: solution_path.into(),
            file_pattern: default_solution_pattern(),
            project_filter: default_project_filter(),
            sample_runner: None,
        }
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        if !self.solution_path.is_dir() {
            return Err(StrataError::Config(format!(
                "Solution path is not a directory: {:?}",
                self.solution_path
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Type,
    Method,
}

/// One addressable declaration from the solution.
#[derive(Debug, Clone)]
pub struct CodeFragment {
    pub doc_id: String,
    pub path: PathBuf,
    /// Full declaration text, leading indentation included.
    pub text: String,
    /// Text between the declaration's outermost braces, if it has a body.
    pub body: Option<String>,
    pub kind: FragmentKind,
}

impl CodeFragment {
    /// Extract per the `bodyonly` flag, falling back to the full text for
    /// bodiless declarations.
    pub fn extract(&self, body_only: bool) -> &str {
        if body_only {
            self.body.as_deref().unwrap_or(&self.text)
        } else {
            &self.text
        }
    }
}

/// Sanitize a documentation ID for cache keying. Total and idempotent:
/// surrounding whitespace and backticks go, a parameter list is cut at `(`,
/// `+` nested-type separators become `.`, and anything outside
/// `[A-Za-z0-9_.:-]` is dropped.
pub fn sanitize_doc_id(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('`');
    let cut = trimmed.split('(').next().unwrap_or(trimmed);
    cut.replace('+', ".")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        .collect()
}

struct StoreInner {
    options: SolutionOptions,
    cache: PopulatedCache<String, Arc<CodeFragment>>,
    /// Paths reported changed since the last completed rebuild.
    pending: Mutex<Vec<PathBuf>>,
    rebuilding: AtomicBool,
}

/// The populated, watcher-invalidated fragment store.
pub struct FragmentStore {
    inner: Arc<StoreInner>,
    refresh: DebouncedLazy<()>,
}

impl FragmentStore {
    /// Must be constructed inside a tokio runtime (the debounced refresh
    /// schedules onto it).
    pub fn new(options: SolutionOptions) -> Self {
        let scan_options = options.clone();
        let cache = PopulatedCache::new(Arc::new(move || {
            let options = scan_options.clone();
            Box::pin(async move {
                tokio::task::spawn_blocking(move || scan_solution(&options))
                    .await
                    .map_err(|e| StrataError::Service(format!("Scan task failed: {e}")))?
            })
        }));

        let inner = Arc::new(StoreInner {
            options,
            cache,
            pending: Mutex::new(Vec::new()),
            rebuilding: AtomicBool::new(false),
        });

        let refresh_inner = inner.clone();
        let refresh = DebouncedLazy::with_debounce(
            Arc::new(move || {
                let inner = refresh_inner.clone();
                Box::pin(async move {
                    inner.rebuilding.store(true, Ordering::SeqCst);
                    let pending = std::mem::take(&mut *inner.pending.lock());
                    tracing::info!(
                        "[FragmentStore] Rebuilding after {} changed paths",
                        pending.len()
                    );
                    inner.cache.invalidate();
                    let result = inner.cache.values().await.map(|_| ());
                    inner.rebuilding.store(false, Ordering::SeqCst);
                    result
                })
            }),
            SOLUTION_DEBOUNCE,
        );

        FragmentStore { inner, refresh }
    }

    pub fn options(&self) -> &SolutionOptions {
        &self.inner.options
    }

    /// Watcher entry point: batch the changed paths and schedule a rebuild.
    pub fn on_files_changed(&self, paths: Vec<PathBuf>) {
        if self.inner.rebuilding.load(Ordering::SeqCst) {
            tracing::debug!("[FragmentStore] Rebuild in progress, ignoring change notification");
            return;
        }
        self.inner.pending.lock().extend(paths);
        self.refresh.refresh();
    }

    /// Resolve a (possibly unsanitized) documentation ID.
    pub async fn resolve(&self, doc_id: &str) -> Result<Option<Arc<CodeFragment>>, StrataError> {
        self.inner.cache.get(&sanitize_doc_id(doc_id)).await
    }

    /// Run the configured sample command for `doc_id` and capture stdout.
    ///
    /// Stdout lines of the form `name<TAB>value` accumulate a dictionary
    /// (continuation lines append to the current value); output with no
    /// tabbed line at all becomes a single entry under the empty key.
    pub async fn execute_sample(
        &self,
        doc_id: &str,
    ) -> Result<HashMap<String, String>, StrataError> {
        let Some(runner) = self.inner.options.sample_runner.clone() else {
            return Err(StrataError::Highlight(
                "No sample runner configured for executable documentation samples".to_string(),
            ));
        };
        let doc_id = sanitize_doc_id(doc_id);

        let output = tokio::task::spawn_blocking(move || {
            let args: Vec<String> = runner
                .args
                .iter()
                .map(|a| a.replace("{docid}", &doc_id))
                .collect();
            Command::new(&runner.command).args(&args).output()
        })
        .await
        .map_err(|e| StrataError::Service(format!("Sample task failed: {e}")))??;

        if !output.status.success() {
            return Err(StrataError::Highlight(format!(
                "Sample process exited with {}",
                output.status
            )));
        }
        Ok(parse_sample_output(&String::from_utf8_lossy(&output.stdout)))
    }

    pub fn dispose(&self) {
        self.refresh.dispose();
    }
}

fn parse_sample_output(stdout: &str) -> HashMap<String, String> {
    if !stdout.lines().any(|l| l.contains('\t')) {
        let mut single = HashMap::new();
        single.insert(String::new(), stdout.to_string());
        return single;
    }
    let mut entries: HashMap<String, String> = HashMap::new();
    let mut current: Option<String> = None;
    for line in stdout.lines() {
        match line.split_once('\t') {
            Some((key, value)) => {
                entries.insert(key.to_string(), value.to_string());
                current = Some(key.to_string());
            }
            None => {
                if let Some(key) = &current {
                    let entry = entries.entry(key.clone()).or_default();
                    entry.push('\n');
                    entry.push_str(line);
                }
            }
        }
    }
    entries
}

static FN_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z0-9_]+)")
        .expect("static regex")
});
static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+([A-Za-z0-9_]+)")
        .expect("static regex")
});
static IMPL_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*impl(?:<[^>]*>)?\s+(?:[A-Za-z0-9_:<>, ]+\s+for\s+)?([A-Za-z0-9_]+)")
        .expect("static regex")
});

fn scan_solution(
    options: &SolutionOptions,
) -> Result<Vec<(String, Arc<CodeFragment>)>, StrataError> {
    let pattern = FilePattern::new(options.file_pattern.clone());
    let mut fragments = Vec::new();

    for entry in WalkDir::new(&options.solution_path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if !pattern.matches_path(path) {
            continue;
        }
        if !os_path_to_string(path).contains(&options.project_filter) {
            continue;
        }
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("[FragmentStore] Unreadable source file {path:?}: {e}");
                continue;
            }
        };
        let module = module_path_of(&options.solution_path, path);
        for fragment in scan_declarations(&text, &module, path) {
            fragments.push((fragment.doc_id.clone(), Arc::new(fragment)));
        }
    }
    tracing::info!("[FragmentStore] Indexed {} declarations", fragments.len());
    Ok(fragments)
}

/// Dotted module path of a source file relative to the solution root.
fn module_path_of(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
    os_path_to_string(relative).replace('/', ".")
}

/// Walk a source file's lines, recording type and function declarations.
///
/// A cheap brace-depth scanner rather than a real parser: enough to find the
/// declaration head, its enclosing `impl` block, and the body between the
/// outermost braces.
fn scan_declarations(text: &str, module: &str, path: &Path) -> Vec<CodeFragment> {
    let mut fragments = Vec::new();
    let mut depth: i32 = 0;
    // (type name, depth at which its impl block opened)
    let mut impl_context: Option<(String, i32)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end();

        if let Some(caps) = IMPL_DECL.captures(bare) {
            if depth == 0 {
                impl_context = Some((caps[1].to_string(), depth));
            }
        } else if let Some(caps) = TYPE_DECL.captures(bare) {
            if depth == 0 {
                let doc_id = format!("T:{module}.{}", &caps[1]);
                if let Some(fragment) =
                    fragment_at(text, offset, doc_id, FragmentKind::Type, path)
                {
                    fragments.push(fragment);
                }
            }
        } else if let Some(caps) = FN_DECL.captures(bare) {
            let in_impl = impl_context.as_ref().filter(|(_, d)| depth == d + 1);
            let eligible = depth == 0 || in_impl.is_some();
            if eligible {
                let doc_id = match in_impl {
                    Some((type_name, _)) => format!("M:{module}.{type_name}.{}", &caps[1]),
                    None => format!("M:{module}.{}", &caps[1]),
                };
                if let Some(fragment) =
                    fragment_at(text, offset, doc_id, FragmentKind::Method, path)
                {
                    fragments.push(fragment);
                }
            }
        }

        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        if matches!(&impl_context, Some((_, open_depth)) if depth <= *open_depth) {
            impl_context = None;
        }
        offset += line.len();
    }
    fragments
}

/// Build the fragment whose declaration starts at the line beginning at
/// `start`. The span runs to the matching close brace (or the terminating
/// semicolon for bodiless declarations).
fn fragment_at(
    text: &str,
    start: usize,
    doc_id: String,
    kind: FragmentKind,
    path: &Path,
) -> Option<CodeFragment> {
    let rest = &text[start..];
    let mut brace_open = None;
    let mut end = None;
    let mut depth = 0;

    for (i, c) in rest.char_indices() {
        match c {
            '{' => {
                if brace_open.is_none() {
                    brace_open = Some(i);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 && brace_open.is_some() {
                    end = Some(i + 1);
                    break;
                }
            }
            ';' if brace_open.is_none() => {
                end = Some(i + 1);
                break;
            }
            _ => {}
        }
    }

    let end = end?;
    let body = brace_open.map(|open| {
        rest[open + 1..end - 1]
            .trim_end_matches([' ', '\t'])
            .trim_matches('\n')
            .to_string()
    });
    Some(CodeFragment {
        doc_id: sanitize_doc_id(&doc_id),
        path: path.to_path_buf(),
        text: rest[..end].to_string(),
        body,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"pub struct Widget {
    pub size: u32,
}

impl Widget {
    pub fn render(&self) -> String {
        format!("{}px", self.size)
    }

    fn helper() {}
}

pub fn standalone(x: u32) -> u32 {
    x + 1
}
"#;

    fn scan(text: &str) -> Vec<CodeFragment> {
        scan_declarations(text, "samples.widgets", Path::new("widgets.rs"))
    }

    #[test]
    fn sanitize_is_idempotent_and_total() {
        for raw in [
            " M:Namespace.Class.Method(System.String) ",
            "`T:Crate.Type`",
            "M:Outer+Inner.Run",
        ] {
            let once = sanitize_doc_id(raw);
            assert_eq!(sanitize_doc_id(&once), once);
            assert!(!once.contains('('));
            assert!(!once.contains('+'));
        }
    }

    #[test]
    fn scanner_finds_types_and_methods() {
        let ids: Vec<String> = scan(SAMPLE).into_iter().map(|f| f.doc_id).collect();
        assert!(ids.contains(&"T:samples.widgets.Widget".to_string()));
        assert!(ids.contains(&"M:samples.widgets.Widget.render".to_string()));
        assert!(ids.contains(&"M:samples.widgets.Widget.helper".to_string()));
        assert!(ids.contains(&"M:samples.widgets.standalone".to_string()));
    }

    #[test]
    fn method_span_keeps_indentation() {
        let fragments = scan(SAMPLE);
        let render = fragments
            .iter()
            .find(|f| f.doc_id.ends_with("Widget.render"))
            .unwrap();
        assert!(render.text.starts_with("    pub fn render"));
        assert!(render.text.ends_with('}'));
    }

    #[test]
    fn body_extraction_trims_frame() {
        let fragments = scan(SAMPLE);
        let render = fragments
            .iter()
            .find(|f| f.doc_id.ends_with("Widget.render"))
            .unwrap();
        assert_eq!(render.extract(true), "        format!(\"{}px\", self.size)");
        assert!(render.extract(false).contains("pub fn render"));
    }

    #[test]
    fn sample_output_dictionary() {
        let parsed = parse_sample_output("json\t{\"a\":1}\ngbnf\troot ::= x\n");
        assert_eq!(parsed.get("json").map(String::as_str), Some("{\"a\":1}"));
        assert_eq!(parsed.get("gbnf").map(String::as_str), Some("root ::= x"));
    }

    #[test]
    fn sample_output_bare_stdout_is_empty_key() {
        let parsed = parse_sample_output("plain output\nsecond line\n");
        assert_eq!(
            parsed.get("").map(String::as_str),
            Some("plain output\nsecond line\n")
        );
    }
}
