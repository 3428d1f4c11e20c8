//! The rendering seam between the content pipeline and a UI layer.
//!
//! The pipeline hands a [`PageSnapshot`] plus a [`RenderContext`] to a
//! [`PageRenderer`] and gets final HTML back; it prescribes neither template
//! language nor CSS framework. [`DefaultRenderer`] is a small built-in
//! implementation so a site is usable end-to-end without an external UI
//! layer.

use futures::future::BoxFuture;

use crate::{
    content::{ContentToCopy, PageSnapshot, PageToGenerate},
    error::StrataError,
    markdown::{escape_html, HeadingNode},
    tags::Tag,
    toc::TocEntry,
};

/// Site-level context handed to the renderer alongside the page.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub site_title: String,
    pub base_href: String,
    /// Site TOC with selection computed for the page being rendered.
    pub toc: Vec<TocEntry>,
}

/// Collaborator contract for the UI layer.
pub trait PageRenderer: Send + Sync {
    fn render_page<'a>(
        &'a self,
        page: &'a PageSnapshot,
        ctx: &'a RenderContext,
    ) -> BoxFuture<'a, Result<String, StrataError>>;

    fn render_tag_page<'a>(
        &'a self,
        tag: &'a Tag,
        posts: &'a [PageSnapshot],
        ctx: &'a RenderContext,
    ) -> BoxFuture<'a, Result<String, StrataError>>;

    /// Parameter-free routes the UI layer registers beyond content pages
    /// (a generated stylesheet, a search index).
    fn routes(&self) -> Vec<PageToGenerate> {
        Vec::new()
    }

    /// Static asset roots the UI layer exposes for verbatim copying.
    fn asset_roots(&self) -> Vec<ContentToCopy> {
        Vec::new()
    }
}

/// Minimal built-in renderer: a complete HTML document with head metadata,
/// the site TOC as navigation, and the page outline as a sidebar.
#[derive(Debug, Default)]
pub struct DefaultRenderer;

impl PageRenderer for DefaultRenderer {
    fn render_page<'a>(
        &'a self,
        page: &'a PageSnapshot,
        ctx: &'a RenderContext,
    ) -> BoxFuture<'a, Result<String, StrataError>> {
        Box::pin(async move {
            let title = page
                .metadata
                .title
                .as_deref()
                .map(|t| format!("{t} — {}", ctx.site_title))
                .unwrap_or_else(|| ctx.site_title.clone());

            let mut html = String::with_capacity(page.html.len() + 1024);
            document_head(&mut html, &title, page.metadata.description.as_deref(), ctx);
            html.push_str("<body>\n<nav class=\"site-toc\">\n");
            toc_list(&mut html, &ctx.toc);
            html.push_str("</nav>\n");
            if !page.outline.is_empty() {
                html.push_str("<aside class=\"page-outline\">\n");
                outline_list(&mut html, &page.outline);
                html.push_str("</aside>\n");
            }
            html.push_str("<main>\n");
            html.push_str(&page.html);
            html.push_str("\n</main>\n</body>\n</html>\n");
            Ok(html)
        })
    }

    fn render_tag_page<'a>(
        &'a self,
        tag: &'a Tag,
        posts: &'a [PageSnapshot],
        ctx: &'a RenderContext,
    ) -> BoxFuture<'a, Result<String, StrataError>> {
        Box::pin(async move {
            let title = format!("Tagged '{}' — {}", tag.display_name, ctx.site_title);
            let mut html = String::new();
            document_head(&mut html, &title, None, ctx);
            html.push_str("<body>\n<main>\n");
            html.push_str(&format!(
                "<h1>Tagged &ldquo;{}&rdquo;</h1>\n<ul class=\"tag-posts\">\n",
                escape_html(&tag.display_name)
            ));
            for post in posts {
                let name = post
                    .metadata
                    .title
                    .as_deref()
                    .unwrap_or(post.url.as_str());
                html.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    escape_html(&post.navigate_url),
                    escape_html(name)
                ));
            }
            html.push_str("</ul>\n</main>\n</body>\n</html>\n");
            Ok(html)
        })
    }
}

fn document_head(html: &mut String, title: &str, description: Option<&str>, ctx: &RenderContext) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    if let Some(description) = description {
        html.push_str(&format!(
            "<meta name=\"description\" content=\"{}\">\n",
            escape_html(description)
        ));
    }
    if !ctx.base_href.is_empty() {
        html.push_str(&format!(
            "<base href=\"{}\">\n",
            escape_html(&ctx.base_href)
        ));
    }
    html.push_str("</head>\n");
}

fn toc_list(html: &mut String, entries: &[TocEntry]) {
    if entries.is_empty() {
        return;
    }
    html.push_str("<ul>\n");
    for entry in entries {
        let selected = if entry.is_selected { " class=\"selected\"" } else { "" };
        match &entry.href {
            Some(href) => html.push_str(&format!(
                "<li{selected}><a href=\"{}\">{}</a>\n",
                escape_html(href),
                escape_html(&entry.name)
            )),
            None => html.push_str(&format!(
                "<li{selected}><span>{}</span>\n",
                escape_html(&entry.name)
            )),
        }
        toc_list(html, &entry.items);
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");
}

fn outline_list(html: &mut String, nodes: &[HeadingNode]) {
    if nodes.is_empty() {
        return;
    }
    html.push_str("<ul>\n");
    for node in nodes {
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>\n",
            escape_html(&node.id),
            escape_html(&node.title)
        ));
        outline_list(html, &node.children);
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");
}
