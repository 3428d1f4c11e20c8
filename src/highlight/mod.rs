//! The syntax-highlight subsystem.
//!
//! Two responsibilities behind one facade: resolving source fragments by
//! documentation ID (including executing runnable samples), and rendering
//! code to classified HTML spans. Rendering goes through a bounded
//! content-addressed cache so identical snippets are tokenized once.
//!
//! Language routing, by fence info prefix:
//!
//! | info | behavior |
//! |---|---|
//! | `csharp`, `c#`, `cs` | symbolic classification classes |
//! | `vb`, `vbnet` | symbolic classification classes |
//! | `<lang>:xmldocid[,bodyonly]` | resolve fragment, highlight as `<lang>` |
//! | `<lang>:xmldocid` + `data="…"` | execute sample, highlight picked output |
//! | `gbnf` | dedicated GBNF lexer |
//! | `bash`, `shell`, `sh` | dedicated shell lexer |
//! | `text` or empty | raw pre/code |
//! | anything else | TextMate grammar tokenizer |

pub mod fragments;
pub mod grammar;
pub mod tokens;

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::{error::StrataError, markdown::escape_html, markdown::FenceInfo};

pub use fragments::{
    sanitize_doc_id, CodeFragment, FragmentKind, FragmentStore, SampleRunner, SolutionOptions,
    CODE_NOT_FOUND,
};

/// Key of one rendered-HTML cache entry: hash over language, flags, framing,
/// and source text.
type CacheKey = [u8; 32];

#[derive(Debug, Clone, Default)]
pub struct HighlightOptions {
    /// Per-line tokenization budget; a slow grammar degrades to plain text.
    pub line_timeout: Option<Duration>,
    /// Upper bound on memoized rendered blocks.
    pub cache_capacity: Option<usize>,
    pub solution: Option<SolutionOptions>,
}

const DEFAULT_LINE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_CAPACITY: usize = 1024;

struct RenderedCache {
    capacity: usize,
    map: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
}

impl RenderedCache {
    fn new(capacity: usize) -> Self {
        RenderedCache {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &CacheKey) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn insert(&mut self, key: CacheKey, value: String) {
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        if self.map.insert(key, value).is_none() {
            self.order.push_back(key);
        }
    }
}

/// Facade over grammar tokenization, the dedicated lexers, and fragment
/// resolution.
pub struct Highlighter {
    line_timeout: Duration,
    rendered: Mutex<RenderedCache>,
    fragments: Option<FragmentStore>,
}

impl Highlighter {
    /// With a solution configured this must be called inside a tokio runtime
    /// (the fragment store schedules debounced rebuilds onto it).
    pub fn new(options: HighlightOptions) -> Self {
        Highlighter {
            line_timeout: options.line_timeout.unwrap_or(DEFAULT_LINE_TIMEOUT),
            rendered: Mutex::new(RenderedCache::new(
                options.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            )),
            fragments: options.solution.map(FragmentStore::new),
        }
    }

    pub fn fragments(&self) -> Option<&FragmentStore> {
        self.fragments.as_ref()
    }

    /// Drop every memoized rendered block. Called when the connected solution
    /// changes, since doc-id snippets may now render differently.
    pub fn invalidate_rendered(&self) {
        let mut rendered = self.rendered.lock();
        rendered.map.clear();
        rendered.order.clear();
    }

    /// Render one fenced code block to HTML.
    pub async fn highlight_fenced(
        &self,
        fence: &FenceInfo,
        code: &str,
        in_tab: bool,
    ) -> Result<String, StrataError> {
        let key = cache_key(fence, code, in_tab);
        if let Some(cached) = self.rendered.lock().get(&key) {
            return Ok(cached);
        }

        let rendered = if fence.is_doc_id() {
            self.render_doc_id(fence, code, in_tab).await?
        } else {
            self.render_language(&fence.language, code, in_tab)
        };

        self.rendered.lock().insert(key, rendered.clone());
        Ok(rendered)
    }

    async fn render_doc_id(
        &self,
        fence: &FenceInfo,
        code: &str,
        in_tab: bool,
    ) -> Result<String, StrataError> {
        let doc_id = code.trim();
        let Some(store) = &self.fragments else {
            tracing::warn!("[Highlight] No source solution connected, cannot resolve {doc_id}");
            return Ok(plain_block(CODE_NOT_FOUND, "", in_tab));
        };

        if let Some(data_key) = fence.attr("data") {
            // Executable sample: run it and highlight the picked output.
            let entries = match store.execute_sample(doc_id).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("[Highlight] Sample execution failed for {doc_id}: {e}");
                    return Ok(plain_block(CODE_NOT_FOUND, "", in_tab));
                }
            };
            let value = entries
                .get(data_key)
                .or_else(|| entries.get(""))
                .cloned()
                .unwrap_or_default();
            return Ok(self.render_language(&fence.language, &value, in_tab));
        }

        match store.resolve(doc_id).await? {
            Some(fragment) => {
                let source = fragment.extract(fence.body_only());
                Ok(self.render_language(&fence.language, source, in_tab))
            }
            None => {
                tracing::warn!("[Highlight] {CODE_NOT_FOUND} ({doc_id})");
                Ok(plain_block(CODE_NOT_FOUND, "", in_tab))
            }
        }
    }

    /// Route a plain (non-doc-id) block by language token.
    fn render_language(&self, language: &str, code: &str, in_tab: bool) -> String {
        match language {
            "" | "text" => plain_block(code, "", in_tab),
            "csharp" | "c#" | "cs" => {
                self.grammar_block("c#", language, code, grammar::SYMBOLIC_CLASSES, in_tab)
            }
            "vb" | "vbnet" => {
                self.grammar_block("vb", language, code, grammar::SYMBOLIC_CLASSES, in_tab)
            }
            "gbnf" => framed(tokens::highlight_gbnf(code), language, in_tab),
            "bash" | "shell" | "sh" => framed(tokens::highlight_shell(code), language, in_tab),
            lang => self.grammar_block(lang, lang, code, grammar::TEXTMATE_CLASSES, in_tab),
        }
    }

    fn grammar_block(
        &self,
        grammar_token: &str,
        language: &str,
        code: &str,
        classes: grammar::ClassMap,
        in_tab: bool,
    ) -> String {
        match grammar::tokenize_to_html(grammar_token, code, classes, self.line_timeout) {
            Some(spans) => framed(spans, language, in_tab),
            None => plain_block(code, language, in_tab),
        }
    }
}

/// Wrap already-classified span HTML in the pre/code frame.
fn framed(spans: String, language: &str, in_tab: bool) -> String {
    format!("{}{spans}</code></pre>\n", code_open(language, in_tab))
}

/// Raw pre/code emission with no tokenization; also the universal fallback
/// when no grammar matches.
pub fn plain_block(code: &str, language: &str, in_tab: bool) -> String {
    format!(
        "{}{}</code></pre>\n",
        code_open(language, in_tab),
        escape_html(code)
    )
}

/// The opening tag, carrying `language-*` and the standalone frame class.
/// Inside a tab the container already provides the frame, so the frame class
/// is suppressed.
fn code_open(language: &str, in_tab: bool) -> String {
    if language.is_empty() || language == "text" {
        return "<pre><code>".to_string();
    }
    let mut classes = format!("language-{language}");
    if !in_tab {
        classes.push_str(" code");
    }
    format!("<pre><code class=\"{classes}\">")
}

fn cache_key(fence: &FenceInfo, code: &str, in_tab: bool) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(fence.language.as_bytes());
    hasher.update([0u8]);
    for flag in &fence.flags {
        hasher.update(flag.as_bytes());
        hasher.update([1u8]);
    }
    for (k, v) in &fence.attrs {
        hasher.update(k.as_bytes());
        hasher.update([2u8]);
        hasher.update(v.as_bytes());
        hasher.update([3u8]);
    }
    hasher.update([in_tab as u8]);
    hasher.update(code.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlighter() -> Highlighter {
        Highlighter::new(HighlightOptions::default())
    }

    #[tokio::test]
    async fn unknown_language_falls_back_to_classed_plain_block() {
        let fence = FenceInfo::parse("unknownlang");
        let html = highlighter()
            .highlight_fenced(&fence, "code", false)
            .await
            .unwrap();
        assert!(html.contains("<pre><code class=\"language-unknownlang code\">code</code></pre>"));
    }

    #[tokio::test]
    async fn text_and_empty_render_raw() {
        let hl = highlighter();
        for info in ["", "text"] {
            let fence = FenceInfo::parse(info);
            let html = hl.highlight_fenced(&fence, "a < b", false).await.unwrap();
            assert!(html.starts_with("<pre><code>"));
            assert!(html.contains("a &lt; b"));
        }
    }

    #[tokio::test]
    async fn tab_suppresses_frame_class() {
        let fence = FenceInfo::parse("unknownlang");
        let html = highlighter()
            .highlight_fenced(&fence, "code", true)
            .await
            .unwrap();
        assert!(html.contains("class=\"language-unknownlang\""));
        assert!(!html.contains(" code\""));
    }

    #[tokio::test]
    async fn rust_block_is_tokenized() {
        let fence = FenceInfo::parse("rust");
        let html = highlighter()
            .highlight_fenced(&fence, "fn main() {}\n", false)
            .await
            .unwrap();
        assert!(html.contains("class=\"language-rust code\""));
        assert!(html.contains("<span class=\"pl-k\">fn</span>"));
    }

    #[tokio::test]
    async fn gbnf_uses_dedicated_lexer() {
        let fence = FenceInfo::parse("gbnf");
        let html = highlighter()
            .highlight_fenced(&fence, "root ::= x\n", false)
            .await
            .unwrap();
        assert!(html.contains("language-gbnf"));
        assert!(html.contains("<span class=\"pl-k\">::=</span>"));
    }

    #[tokio::test]
    async fn doc_id_without_solution_renders_placeholder() {
        let fence = FenceInfo::parse("csharp:xmldocid");
        let html = highlighter()
            .highlight_fenced(&fence, "M:Some.Doc.Id", false)
            .await
            .unwrap();
        assert!(html.contains(CODE_NOT_FOUND));
    }

    #[tokio::test]
    async fn identical_blocks_hit_the_rendered_cache() {
        let hl = highlighter();
        let fence = FenceInfo::parse("rust");
        let first = hl
            .highlight_fenced(&fence, "let x = 1;\n", false)
            .await
            .unwrap();
        let second = hl
            .highlight_fenced(&fence, "let x = 1;\n", false)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(hl.rendered.lock().map.len(), 1);
    }
}
