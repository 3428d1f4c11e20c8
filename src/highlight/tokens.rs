//! Dedicated token highlighters.
//!
//! GBNF grammar files and shell snippets are common enough in documentation
//! to deserve purpose-built lexers instead of a TextMate grammar round trip.
//! Both emit the same `pl-*` span classes the grammar tokenizer uses.

use super::grammar::push_span;

/// Highlight a GBNF grammar: rule names, `::=`, alternation and repetition
/// operators, quoted literals, character classes, and `#` comments.
pub fn highlight_gbnf(code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    for line in code.split_inclusive('\n') {
        highlight_gbnf_line(line, &mut out);
    }
    out
}

fn highlight_gbnf_line(line: &str, out: &mut String) {
    let mut rest = line;

    // Rule definition head: `name ::=`.
    if let Some(idx) = rest.find("::=") {
        let head = &rest[..idx];
        if head
            .trim()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !head.trim().is_empty()
        {
            push_span(out, Some("pl-en"), head);
            push_span(out, Some("pl-k"), "::=");
            rest = &rest[idx + 3..];
        }
    }

    let mut chars = rest.char_indices().peekable();
    let mut plain_start = 0;
    while let Some((i, c)) = chars.next() {
        let token = match c {
            '#' => {
                // Comment runs to end of line.
                push_span(out, None, &rest[plain_start..i]);
                push_span(out, Some("pl-c"), &rest[i..]);
                return;
            }
            '"' => Some(scan_delimited(rest, i, '"')),
            '[' => Some(scan_delimited(rest, i, ']')),
            '|' | '*' | '+' | '?' | '(' | ')' => Some((i + c.len_utf8(), "pl-k")),
            _ => None,
        };
        if let Some((end, class)) = token {
            push_span(out, None, &rest[plain_start..i]);
            push_span(out, Some(class), &rest[i..end]);
            plain_start = end;
            while matches!(chars.peek(), Some((j, _)) if *j < end) {
                chars.next();
            }
        }
    }
    push_span(out, None, &rest[plain_start..]);
}

/// `(end_index, class)` for a delimited token starting at `start`.
fn scan_delimited(text: &str, start: usize, close: char) -> (usize, &'static str) {
    let mut escaped = false;
    for (i, c) in text[start..].char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == close => return (start + i + c.len_utf8(), "pl-s"),
            _ => {}
        }
    }
    (text.len(), "pl-s")
}

const SHELL_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "until", "do", "done", "case", "esac",
    "function", "in", "return", "exit", "export", "local", "set", "source",
];

/// Highlight a bash/shell snippet: comments, strings, `$` expansions,
/// control-flow keywords, and long/short flags.
pub fn highlight_shell(code: &str) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    for line in code.split_inclusive('\n') {
        highlight_shell_line(line, &mut out);
    }
    out
}

fn highlight_shell_line(line: &str, out: &mut String) {
    let bytes = line.as_bytes();
    let mut i = 0;
    let mut plain_start = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            '#' => {
                push_span(out, None, &line[plain_start..i]);
                push_span(out, Some("pl-c"), &line[i..]);
                return;
            }
            '\'' | '"' => {
                push_span(out, None, &line[plain_start..i]);
                let (end, _) = scan_delimited(line, i, c);
                push_span(out, Some("pl-s"), &line[i..end]);
                i = end;
                plain_start = end;
            }
            '$' => {
                push_span(out, None, &line[plain_start..i]);
                let end = scan_expansion(line, i);
                push_span(out, Some("pl-smi"), &line[i..end]);
                i = end;
                plain_start = end;
            }
            '-' if word_boundary(bytes, i) => {
                push_span(out, None, &line[plain_start..i]);
                let end = scan_word(line, i);
                push_span(out, Some("pl-v"), &line[i..end]);
                i = end;
                plain_start = end;
            }
            c if c.is_ascii_alphabetic() && word_boundary(bytes, i) => {
                let end = scan_word(line, i);
                let word = &line[i..end];
                if SHELL_KEYWORDS.contains(&word) {
                    push_span(out, None, &line[plain_start..i]);
                    push_span(out, Some("pl-k"), word);
                    plain_start = end;
                }
                i = end;
            }
            _ => i += 1,
        }
    }
    push_span(out, None, &line[plain_start..]);
}

fn word_boundary(bytes: &[u8], i: usize) -> bool {
    i == 0 || !(bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_' || bytes[i - 1] == b'-')
}

fn scan_word(line: &str, start: usize) -> usize {
    line[start..]
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        .map(|(i, _)| start + i)
        .unwrap_or(line.len())
}

fn scan_expansion(line: &str, start: usize) -> usize {
    let rest = &line[start + 1..];
    if let Some(stripped) = rest.strip_prefix('{') {
        match stripped.find('}') {
            Some(i) => start + 1 + 1 + i + 1,
            None => line.len(),
        }
    } else {
        let end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| start + 1 + i)
            .unwrap_or(line.len());
        // Lone `$` stays plain-ish but keeps the class, it reads fine.
        end.max(start + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbnf_rule_head_and_operators() {
        let html = highlight_gbnf("root ::= expr | term\n");
        assert!(html.contains("<span class=\"pl-en\">root </span>"));
        assert!(html.contains("<span class=\"pl-k\">::=</span>"));
        assert!(html.contains("<span class=\"pl-k\">|</span>"));
    }

    #[test]
    fn gbnf_literals_and_comments() {
        let html = highlight_gbnf("ws ::= [ \\t]* # optional\n");
        assert!(html.contains("pl-s"));
        assert!(html.contains("<span class=\"pl-c\"># optional\n</span>"));
    }

    #[test]
    fn shell_keywords_strings_and_vars() {
        let html = highlight_shell("if [ -f \"$HOME/.bashrc\" ]; then\n  source \"$HOME/.bashrc\"\nfi\n");
        assert!(html.contains("<span class=\"pl-k\">if</span>"));
        assert!(html.contains("<span class=\"pl-k\">then</span>"));
        assert!(html.contains("<span class=\"pl-k\">fi</span>"));
        assert!(html.contains("pl-s"));
    }

    #[test]
    fn shell_comment_swallows_line() {
        let html = highlight_shell("echo hi # trailing\n");
        assert!(html.contains("<span class=\"pl-c\"># trailing\n</span>"));
    }

    #[test]
    fn shell_flags_are_classified() {
        let html = highlight_shell("cargo build --release -v\n");
        assert!(html.contains("<span class=\"pl-v\">--release</span>"));
        assert!(html.contains("<span class=\"pl-v\">-v</span>"));
    }
}
