//! Markdown parsing: typed front matter, the container extension, heading
//! outline collection, and syntax-highlighted code blocks.
//!
//! Rendering happens in three steps per document: the container segmenter
//! slices the source into framing and markdown stretches, each stretch is
//! parsed to a pulldown-cmark event stream whose fenced code blocks are
//! highlighted through the (possibly suspending) highlighter facade, and the
//! substituted stream is pushed to HTML while headings are materialized with
//! stable ids and recorded in the outline.

pub mod codeblocks;
pub mod containers;
pub mod front_matter;
pub mod outline;

use std::{collections::VecDeque, sync::Arc};

use pulldown_cmark::{
    html::push_html, CodeBlockKind, CowStr, Event as MdEvent, HeadingLevel, Options,
    Parser as MdParser, Tag as MdTag, TagEnd as MdTagEnd,
};

pub use codeblocks::FenceInfo;
pub use front_matter::{
    parse_front_matter, DocFrontMatter, FrontMatter, Metadata, PostFrontMatter,
};
pub use outline::{HeadingNode, OutlineBuilder};

use crate::{
    error::StrataError,
    highlight::{plain_block, Highlighter},
    markdown::containers::Segment,
    paths::slugify,
};

/// The extension set active during parsing. Enabled explicitly rather than
/// via `Options::all()` for better reproduceability.
pub fn markdown_options() -> Options {
    let mut md_options = Options::empty();
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_GFM);
    md_options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Caller hooks around the render pipeline; both default to identity.
pub struct ParseHooks<F> {
    /// Runs on the markdown body before parsing.
    pub pre_process: Option<Arc<dyn Fn(String) -> String + Send + Sync>>,
    /// Runs on the rendered HTML with the typed front matter in scope.
    pub post_process: Option<Arc<dyn Fn(&F, String) -> String + Send + Sync>>,
}

impl<F> Default for ParseHooks<F> {
    fn default() -> Self {
        ParseHooks {
            pre_process: None,
            post_process: None,
        }
    }
}

impl<F> Clone for ParseHooks<F> {
    fn clone(&self) -> Self {
        ParseHooks {
            pre_process: self.pre_process.clone(),
            post_process: self.post_process.clone(),
        }
    }
}

/// Result of parsing one source document.
#[derive(Debug, Clone)]
pub struct ParsedPage<F> {
    pub front_matter: F,
    pub html: String,
    pub outline: Vec<HeadingNode>,
}

/// The markdown parser facade. Cheap to clone; the highlighter carries all
/// shared state.
#[derive(Clone)]
pub struct MarkdownParser {
    highlighter: Arc<Highlighter>,
}

impl MarkdownParser {
    pub fn new(highlighter: Arc<Highlighter>) -> Self {
        MarkdownParser { highlighter }
    }

    pub fn highlighter(&self) -> &Arc<Highlighter> {
        &self.highlighter
    }

    /// Parse a full source document (front matter plus body) to HTML.
    pub async fn parse<F: FrontMatter>(
        &self,
        text: &str,
        hooks: &ParseHooks<F>,
    ) -> Result<ParsedPage<F>, StrataError> {
        let (front_matter, body) = parse_front_matter::<F>(text)?;
        let body = match &hooks.pre_process {
            Some(hook) => hook(body.to_string()),
            None => body.to_string(),
        };

        let mut html = String::new();
        let mut outline = OutlineBuilder::new();
        for segment in containers::segment(&body) {
            match segment {
                Segment::Html(raw) => html.push_str(&raw),
                Segment::Markdown { text, in_tab } => {
                    self.render_segment(&text, in_tab, &mut html, &mut outline)
                        .await?;
                }
            }
        }

        let html = match &hooks.post_process {
            Some(hook) => hook(&front_matter, html),
            None => html,
        };
        Ok(ParsedPage {
            front_matter,
            html,
            outline: outline.finish(),
        })
    }

    async fn render_segment(
        &self,
        text: &str,
        in_tab: bool,
        out: &mut String,
        outline: &mut OutlineBuilder,
    ) -> Result<(), StrataError> {
        let events: Vec<MdEvent> = MdParser::new_ext(text, markdown_options()).collect();

        // Highlight every fenced block up front; a cache miss is the only
        // suspension point of the render.
        let mut rendered_blocks = VecDeque::new();
        let mut iter = events.iter();
        while let Some(event) = iter.next() {
            if let MdEvent::Start(MdTag::CodeBlock(kind)) = event {
                let fence = fence_of(kind);
                let mut code = String::new();
                for ev in iter.by_ref() {
                    match ev {
                        MdEvent::End(MdTagEnd::CodeBlock) => break,
                        MdEvent::Text(t) => code.push_str(t),
                        _ => {}
                    }
                }
                let block = match self.highlighter.highlight_fenced(&fence, &code, in_tab).await {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        tracing::warn!(
                            "[Markdown] Highlighting failed for language '{}': {e}",
                            fence.language
                        );
                        plain_block(&code, &fence.language, in_tab)
                    }
                };
                rendered_blocks.push_back(block);
            }
        }

        // Substitute highlighted blocks and materialize headings with ids.
        let mut final_events: Vec<MdEvent> = Vec::with_capacity(events.len());
        let mut iter = events.into_iter();
        while let Some(event) = iter.next() {
            match event {
                MdEvent::Start(MdTag::CodeBlock(_)) => {
                    for ev in iter.by_ref() {
                        if matches!(ev, MdEvent::End(MdTagEnd::CodeBlock)) {
                            break;
                        }
                    }
                    let rendered = rendered_blocks.pop_front().unwrap_or_default();
                    final_events.push(MdEvent::Html(CowStr::from(rendered)));
                }
                MdEvent::Start(MdTag::Heading { level, id, .. }) => {
                    let mut inline: Vec<MdEvent> = Vec::new();
                    let mut title = String::new();
                    loop {
                        let Some(ev) = iter.next() else { break };
                        match ev {
                            MdEvent::End(MdTagEnd::Heading(_)) => break,
                            MdEvent::Text(t) => {
                                title.push_str(&t);
                                inline.push(MdEvent::Text(t));
                            }
                            MdEvent::Code(t) => {
                                title.push_str(&t);
                                inline.push(MdEvent::Code(t));
                            }
                            other => inline.push(other),
                        }
                    }
                    let id = id
                        .map(|custom| custom.to_string())
                        .unwrap_or_else(|| slugify(&title));
                    let mut inner = String::new();
                    push_html(&mut inner, inline.into_iter());
                    let level = heading_level(level);
                    if level >= 2 {
                        outline.push(level, title.trim().to_string(), id.clone());
                    }
                    final_events.push(MdEvent::Html(CowStr::from(format!(
                        "<h{level} id=\"{id}\">{inner}</h{level}>\n"
                    ))));
                }
                other => final_events.push(other),
            }
        }
        push_html(out, final_events.into_iter());
        Ok(())
    }
}

fn fence_of(kind: &CodeBlockKind<'_>) -> FenceInfo {
    match kind {
        CodeBlockKind::Fenced(info) => FenceInfo::parse(info),
        CodeBlockKind::Indented => FenceInfo::default(),
    }
}

fn heading_level(level: HeadingLevel) -> u32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> MarkdownParser {
        MarkdownParser::new(Arc::new(Highlighter::new(Default::default())))
    }

    #[tokio::test]
    async fn renders_headings_with_ids_and_outline() {
        let parsed = parser()
            .parse::<PostFrontMatter>("# H1\n## H2\n", &ParseHooks::default())
            .await
            .unwrap();
        assert!(parsed.html.contains("<h1 id=\"h1\">H1</h1>"));
        assert!(parsed.html.contains("<h2 id=\"h2\">H2</h2>"));
        assert_eq!(parsed.outline.len(), 1);
        assert_eq!(parsed.outline[0].title, "H2");
        assert_eq!(parsed.outline[0].id, "h2");
    }

    #[tokio::test]
    async fn heading_attribute_id_wins_over_slug() {
        let parsed = parser()
            .parse::<PostFrontMatter>("## Custom {#my-anchor}\n", &ParseHooks::default())
            .await
            .unwrap();
        assert!(parsed.html.contains("<h2 id=\"my-anchor\">"));
        assert_eq!(parsed.outline[0].id, "my-anchor");
    }

    #[tokio::test]
    async fn front_matter_feeds_typed_record() {
        let parsed = parser()
            .parse::<PostFrontMatter>(
                "---\ntitle: Hello\ntags: [intro]\n---\nBody text.\n",
                &ParseHooks::default(),
            )
            .await
            .unwrap();
        assert_eq!(parsed.front_matter.title.as_deref(), Some("Hello"));
        assert!(parsed.html.contains("<p>Body text.</p>"));
    }

    #[tokio::test]
    async fn admonition_body_is_rendered_markdown() {
        let parsed = parser()
            .parse::<PostFrontMatter>("/// tip\nSome *emphasis*.\n///\n", &ParseHooks::default())
            .await
            .unwrap();
        assert!(parsed.html.contains("admonition tip"));
        assert!(parsed.html.contains("<em>emphasis</em>"));
    }

    #[tokio::test]
    async fn hooks_wrap_the_pipeline() {
        let hooks = ParseHooks::<PostFrontMatter> {
            pre_process: Some(Arc::new(|md| md.replace("@@version@@", "1.2.3"))),
            post_process: Some(Arc::new(|fm, html| {
                format!("<!-- {} -->\n{html}", fm.title.as_deref().unwrap_or(""))
            })),
        };
        let parsed = parser()
            .parse::<PostFrontMatter>("---\ntitle: V\n---\nRunning @@version@@.\n", &hooks)
            .await
            .unwrap();
        assert!(parsed.html.starts_with("<!-- V -->"));
        assert!(parsed.html.contains("Running 1.2.3."));
    }

    #[tokio::test]
    async fn code_block_in_tab_has_no_standalone_frame() {
        let md = "/// tab | One\n```text\nhello\n```\n///\n\n/// tab | Two\nx\n///\n";
        let parsed = parser()
            .parse::<PostFrontMatter>(md, &ParseHooks::default())
            .await
            .unwrap();
        assert!(parsed.html.contains("tabs-container"));
        assert!(parsed.html.contains("<pre><code>hello\n</code></pre>"));
    }
}
