//! Grammar-driven tokenization.
//!
//! Arbitrary languages are tokenized against a registry of TextMate grammars.
//! Each token carries a scope stack; the renderer walks the stack deepest
//! first and picks the first scope whose prefix matches a configured mapping.
//! The registry is process-wide state behind a single lock (grammar parse
//! state is not guaranteed thread-safe across implementations), and
//! tokenization is bounded by a per-line timeout.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use syntect::parsing::{ParseState, Scope, ScopeStack, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::markdown::escape_html;

/// Process-wide grammar registry. All tokenization serializes on this lock.
static GRAMMARS: Lazy<Mutex<SyntaxSet>> =
    Lazy::new(|| Mutex::new(SyntaxSet::load_defaults_newlines()));

/// Scope-prefix to CSS-class mapping, checked in order. More specific
/// prefixes come before their generalizations.
pub type ClassMap = &'static [(&'static str, &'static str)];

/// General mapping used for arbitrary grammar-tokenized languages.
pub const TEXTMATE_CLASSES: ClassMap = &[
    ("comment", "pl-c"),
    ("constant.character.escape", "pl-cce"),
    ("constant.numeric", "pl-c1"),
    ("constant.language", "pl-c1"),
    ("constant", "pl-c1"),
    ("entity.name.function", "pl-en"),
    ("entity.name.type", "pl-en"),
    ("entity.name.tag", "pl-ent"),
    ("entity.other.attribute-name", "pl-e"),
    ("entity.name", "pl-en"),
    ("invalid.deprecated", "pl-ba"),
    ("invalid.illegal", "pl-ii"),
    ("keyword.operator", "pl-k"),
    ("keyword.control", "pl-k"),
    ("keyword", "pl-k"),
    ("markup.bold", "pl-mb"),
    ("markup.deleted", "pl-md"),
    ("markup.heading", "pl-mh"),
    ("markup.ignored", "pl-mi2"),
    ("markup.inserted", "pl-mi1"),
    ("markup.italic", "pl-mi"),
    ("markup.list", "pl-ml"),
    ("markup.quote", "pl-ent"),
    ("markup.raw", "pl-c1"),
    ("meta.diff.header", "pl-c1"),
    ("meta.diff.range", "pl-mdr"),
    ("punctuation.definition.comment", "pl-c"),
    ("punctuation.definition.string", "pl-pds"),
    ("punctuation.section.embedded", "pl-pse"),
    ("storage.modifier.import", "pl-smi"),
    ("storage.modifier.package", "pl-smi"),
    ("storage.type", "pl-k"),
    ("storage", "pl-k"),
    ("string.regexp", "pl-sr"),
    ("string", "pl-s"),
    ("support.constant", "pl-c1"),
    ("support.function", "pl-c1"),
    ("support.type", "pl-c1"),
    ("support.variable", "pl-smi"),
    ("variable.language", "pl-c1"),
    ("variable.other", "pl-smi"),
    ("variable.parameter", "pl-smi"),
    ("variable", "pl-v"),
];

/// Fixed classification set used for the symbolic languages (C#, VB). These
/// are the class names a stylesheet targets for compiler-flavored coloring.
pub const SYMBOLIC_CLASSES: ClassMap = &[
    ("comment", "comment"),
    ("constant.numeric", "number"),
    ("constant", "constant"),
    ("entity.name.function", "method-name"),
    ("entity.name.type", "type"),
    ("entity.name.namespace", "namespace"),
    ("entity.name", "identifier"),
    ("keyword.operator", "operator"),
    ("keyword", "keyword"),
    ("punctuation.definition.string", "string"),
    ("punctuation", "punctuation"),
    ("storage.modifier", "keyword"),
    ("storage.type", "keyword"),
    ("storage", "keyword"),
    ("string", "string"),
    ("support.type", "type"),
    ("variable.parameter", "parameter"),
    ("variable", "local-name"),
];

/// Emit one classified span. A token with no matching scope renders bare.
pub(crate) fn push_span(out: &mut String, class: Option<&str>, text: &str) {
    if text.is_empty() {
        return;
    }
    match class {
        Some(class) => {
            out.push_str("<span class=\"");
            out.push_str(class);
            out.push_str("\">");
            out.push_str(&escape_html(text));
            out.push_str("</span>");
        }
        None => out.push_str(&escape_html(text)),
    }
}

fn class_for_scopes(scopes: &ScopeStack, classes: ClassMap) -> Option<&'static str> {
    // Deepest scope wins; within a scope the first matching prefix wins.
    for scope in scopes.as_slice().iter().rev() {
        if let Some(class) = class_for_scope(scope, classes) {
            return Some(class);
        }
    }
    None
}

fn class_for_scope(scope: &Scope, classes: ClassMap) -> Option<&'static str> {
    let name = scope.build_string();
    for (prefix, class) in classes {
        if name == *prefix || name.starts_with(&format!("{prefix}.")) {
            return Some(class);
        }
    }
    None
}

/// Tokenize `code` as `lang` and emit classified spans.
///
/// Returns `None` when no grammar in the registry matches `lang` (the caller
/// falls back to an unhighlighted block). Lines whose tokenization exceeds
/// `line_timeout` mark the rest of the block as plain text; a pathological
/// grammar degrades output instead of stalling the render.
pub fn tokenize_to_html(lang: &str, code: &str, classes: ClassMap, line_timeout: Duration) -> Option<String> {
    let registry = GRAMMARS.lock();
    let syntax = registry.find_syntax_by_token(lang)?;

    let mut parse_state = ParseState::new(syntax);
    let mut scopes = ScopeStack::new();
    let mut out = String::with_capacity(code.len() * 2);
    let mut timed_out = false;

    for line in LinesWithEndings::from(code) {
        if timed_out {
            out.push_str(&escape_html(line));
            continue;
        }
        let started = Instant::now();
        let ops = match parse_state.parse_line(line, &registry) {
            Ok(ops) => ops,
            Err(e) => {
                tracing::warn!("[Highlight] Grammar parse failed for '{lang}': {e}");
                out.push_str(&escape_html(line));
                continue;
            }
        };

        let mut last = 0;
        for (pos, op) in ops {
            if pos > last {
                push_span(&mut out, class_for_scopes(&scopes, classes), &line[last..pos]);
                last = pos;
            }
            if scopes.apply(&op).is_err() {
                // A malformed scope op leaves the stack as-is; the span text
                // still renders.
                tracing::debug!("[Highlight] Scope op failed for '{lang}'");
            }
        }
        if last < line.len() {
            push_span(&mut out, class_for_scopes(&scopes, classes), &line[last..]);
        }

        if started.elapsed() > line_timeout {
            tracing::warn!(
                "[Highlight] Tokenization of a '{lang}' line exceeded {line_timeout:?}, emitting remainder as plain text"
            );
            timed_out = true;
        }
    }
    Some(out)
}

/// Whether the registry knows a grammar for `lang`.
pub fn has_grammar(lang: &str) -> bool {
    GRAMMARS.lock().find_syntax_by_token(lang).is_some()
}
