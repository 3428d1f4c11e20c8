//! The admonition/tab container extension.
//!
//! A fence of three or more forward slashes opens a container:
//!
//! ```text
//! /// note | Watch out
//! Body *markdown* here.
//! ///
//! ```
//!
//! Recognized names are `tab`, `admonition`, and the shortcut admonitions
//! `note`, `tip`, `warning`, `caution`, `danger`, `info`. After parsing, runs
//! of adjacent top-level `tab` containers are grouped into a synthetic tabs
//! container rendered as a tablist plus one panel per tab, first selected.
//! Nested tabs are not grouped.
//!
//! The segmenter never renders markdown itself; it slices the document into
//! raw-HTML framing and markdown stretches for the parser facade to render in
//! order, so container bodies get the full extension pipeline.

use once_cell::sync::Lazy;
use regex::Regex;

use super::escape_html;

static OPEN_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ {0,3}/{3,}\s*(\w+)(?:\s*\|\s*([^\r\n]+?))?\s*$").expect("static regex")
});
static CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/{3,}\s*$").expect("static regex"));

const ADMONITION_KINDS: &[&str] = &["note", "tip", "warning", "caution", "danger", "info"];

/// A document slice produced by [`segment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Markdown to run through the parser pipeline. `in_tab` suppresses the
    /// standalone code-block frame inside tab panels.
    Markdown { text: String, in_tab: bool },
    /// Raw container framing, emitted verbatim.
    Html(String),
}

#[derive(Debug)]
enum Block {
    Text(String),
    Admonition {
        kind: String,
        title: Option<String>,
        children: Vec<Block>,
    },
    Tab {
        title: Option<String>,
        children: Vec<Block>,
    },
}

/// Split markdown into container framing and markdown stretches.
pub fn segment(markdown: &str) -> Vec<Segment> {
    let blocks = parse_blocks(markdown);
    let mut segments = Vec::new();
    render_blocks(&blocks, false, true, &mut segments);
    segments
}

fn parse_blocks(markdown: &str) -> Vec<Block> {
    // Stack of open containers; (is_tab, kind, title, children).
    struct Open {
        is_tab: bool,
        kind: String,
        title: Option<String>,
        children: Vec<Block>,
    }

    let mut root: Vec<Block> = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut text = String::new();
    // Container fences inside fenced code are literal text.
    let mut in_code_fence = false;

    fn flush(text: &mut String, into: &mut Vec<Block>) {
        if !text.is_empty() {
            into.push(Block::Text(std::mem::take(text)));
        }
    }

    for line in markdown.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        let fence_line = {
            let trimmed = bare.trim_start();
            trimmed.starts_with("```") || trimmed.starts_with("~~~")
        };
        if fence_line {
            in_code_fence = !in_code_fence;
            text.push_str(line);
            continue;
        }
        if in_code_fence {
            text.push_str(line);
            continue;
        }
        if let Some(caps) = OPEN_FENCE.captures(bare) {
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default();
            let title = caps.get(2).map(|m| m.as_str().trim().to_string());
            let recognized = name == "tab"
                || name == "admonition"
                || ADMONITION_KINDS.contains(&name.as_str());
            if recognized {
                let target = match stack.last_mut() {
                    Some(open) => &mut open.children,
                    None => &mut root,
                };
                flush(&mut text, target);
                stack.push(Open {
                    is_tab: name == "tab",
                    kind: name,
                    title,
                    children: Vec::new(),
                });
                continue;
            }
        } else if CLOSE_FENCE.is_match(bare) {
            if let Some(open) = stack.pop() {
                let block = if open.is_tab {
                    flushed_tab(open.title, open.children, &mut text)
                } else {
                    let mut children = open.children;
                    flush(&mut text, &mut children);
                    Block::Admonition {
                        kind: open.kind,
                        title: open.title,
                        children,
                    }
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(block),
                    None => root.push(block),
                }
                continue;
            }
            // A bare fence outside any container is ordinary text.
        }
        text.push_str(line);
    }

    // Unterminated containers close at end of input.
    while let Some(open) = stack.pop() {
        let block = if open.is_tab {
            flushed_tab(open.title, open.children, &mut text)
        } else {
            let mut children = open.children;
            flush(&mut text, &mut children);
            Block::Admonition {
                kind: open.kind,
                title: open.title,
                children,
            }
        };
        match stack.last_mut() {
            Some(parent) => parent.children.push(block),
            None => root.push(block),
        }
    }
    flush(&mut text, &mut root);
    root
}

fn flushed_tab(title: Option<String>, mut children: Vec<Block>, text: &mut String) -> Block {
    if !text.is_empty() {
        children.push(Block::Text(std::mem::take(text)));
    }
    Block::Tab { title, children }
}

fn render_blocks(blocks: &[Block], in_tab: bool, top_level: bool, out: &mut Vec<Segment>) {
    let mut i = 0;
    while i < blocks.len() {
        match &blocks[i] {
            Block::Text(text) => {
                out.push(Segment::Markdown {
                    text: text.clone(),
                    in_tab,
                });
                i += 1;
            }
            Block::Admonition {
                kind,
                title,
                children,
            } => {
                let class = if kind == "admonition" {
                    "admonition".to_string()
                } else {
                    format!("admonition {kind}")
                };
                let heading = title.clone().unwrap_or_else(|| capitalize(kind));
                out.push(Segment::Html(format!(
                    "<div class=\"{class}\"><p class=\"admonition-title\">{}</p>\n",
                    escape_html(&heading)
                )));
                render_blocks(children, in_tab, false, out);
                out.push(Segment::Html("</div>\n".to_string()));
                i += 1;
            }
            Block::Tab { .. } if top_level => {
                // Group this run of adjacent tabs (blank text between tabs
                // does not break the run).
                let mut tabs: Vec<(&Option<String>, &Vec<Block>)> = Vec::new();
                let mut j = i;
                while j < blocks.len() {
                    match &blocks[j] {
                        Block::Tab { title, children } => {
                            tabs.push((title, children));
                            j += 1;
                        }
                        Block::Text(text) if text.trim().is_empty() && !tabs.is_empty() => {
                            match blocks.get(j + 1) {
                                Some(Block::Tab { .. }) => j += 1,
                                _ => break,
                            }
                        }
                        _ => break,
                    }
                }
                render_tab_group(&tabs, out);
                i = j;
            }
            Block::Tab { title, children } => {
                // Nested tabs stay plain tab divs.
                out.push(Segment::Html(format!(
                    "<div class=\"tab\" data-title=\"{}\">\n",
                    escape_html(title.as_deref().unwrap_or(""))
                )));
                render_blocks(children, true, false, out);
                out.push(Segment::Html("</div>\n".to_string()));
                i += 1;
            }
        }
    }
}

fn render_tab_group(tabs: &[(&Option<String>, &Vec<Block>)], out: &mut Vec<Segment>) {
    let mut header = String::from("<div class=\"tabs-container\">\n<div role=\"tablist\">\n");
    for (index, (title, _)) in tabs.iter().enumerate() {
        let selected = if index == 0 { "true" } else { "false" };
        header.push_str(&format!(
            "<button role=\"tab\" aria-selected=\"{selected}\">{}</button>\n",
            escape_html(title.as_deref().unwrap_or(""))
        ));
    }
    header.push_str("</div>\n");
    out.push(Segment::Html(header));

    for (index, (title, children)) in tabs.iter().enumerate() {
        let hidden = if index == 0 { "" } else { " hidden" };
        out.push(Segment::Html(format!(
            "<div class=\"tab\" data-title=\"{}\"{hidden}>\n",
            escape_html(title.as_deref().unwrap_or(""))
        )));
        render_blocks(children, true, false, out);
        out.push(Segment::Html("</div>\n".to_string()));
    }
    out.push(Segment::Html("</div>\n".to_string()));
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_of(segments: &[Segment]) -> String {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Html(html) => Some(html.as_str()),
                Segment::Markdown { .. } => None,
            })
            .collect()
    }

    #[test]
    fn plain_markdown_is_one_segment() {
        let segments = segment("# Title\n\nBody.\n");
        assert_eq!(
            segments,
            vec![Segment::Markdown {
                text: "# Title\n\nBody.\n".to_string(),
                in_tab: false
            }]
        );
    }

    #[test]
    fn shortcut_admonition_renders_frame_and_default_title() {
        let segments = segment("/// note\nBe careful.\n///\n");
        let html = html_of(&segments);
        assert!(html.contains("<div class=\"admonition note\">"));
        assert!(html.contains("<p class=\"admonition-title\">Note</p>"));
        assert!(segments.contains(&Segment::Markdown {
            text: "Be careful.\n".to_string(),
            in_tab: false
        }));
    }

    #[test]
    fn admonition_title_overrides_kind() {
        let segments = segment("/// warning | Hic sunt dracones\nText\n///\n");
        assert!(html_of(&segments).contains("<p class=\"admonition-title\">Hic sunt dracones</p>"));
    }

    #[test]
    fn adjacent_tabs_group_into_container() {
        let md = "/// tab | First\none\n///\n\n/// tab | Second\ntwo\n///\n";
        let segments = segment(md);
        let html = html_of(&segments);
        assert_eq!(html.matches("tabs-container").count(), 1);
        assert!(html.contains("role=\"tablist\""));
        assert!(html.contains("aria-selected=\"true\">First</button>"));
        assert!(html.contains("aria-selected=\"false\">Second</button>"));
        assert!(html.contains("data-title=\"Second\" hidden"));
        // Tab bodies are markdown segments flagged as inside a tab.
        assert!(segments.contains(&Segment::Markdown {
            text: "one\n".to_string(),
            in_tab: true
        }));
    }

    #[test]
    fn separated_tabs_form_two_groups() {
        let md = "/// tab | A\na\n///\n\nBetween.\n\n/// tab | B\nb\n///\n";
        let html = html_of(&segment(md));
        assert_eq!(html.matches("tabs-container").count(), 2);
    }

    #[test]
    fn nested_container_inside_admonition() {
        let md = "/// note\nouter\n/// tip\ninner\n///\n///\n";
        let html = html_of(&segment(md));
        assert!(html.contains("admonition note"));
        assert!(html.contains("admonition tip"));
    }

    #[test]
    fn unrecognized_fence_name_is_plain_text() {
        let segments = segment("/// bogus\ntext\n///\n");
        assert!(matches!(&segments[0], Segment::Markdown { text, .. } if text.contains("/// bogus")));
    }

    #[test]
    fn four_slash_fences_also_open_and_close() {
        let html = html_of(&segment("//// danger | Boom\nx\n////\n"));
        assert!(html.contains("admonition danger"));
    }

    #[test]
    fn fence_syntax_inside_code_blocks_is_literal() {
        let md = "```text\n/// note | Not a container\n///\n```\n";
        let segments = segment(md);
        assert_eq!(segments.len(), 1);
        assert!(matches!(&segments[0], Segment::Markdown { text, .. } if text == md));
    }
}
