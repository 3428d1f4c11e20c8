//! Machine-readable feeds: sitemap and RSS 2.0.
//!
//! Both are assembled from the aggregated output plan, so anything excluded
//! from planning (drafts, excluded routes) never reaches a feed.

use time::{format_description::well_known::Rfc2822, macros::format_description, OffsetDateTime};
use url::Url;

use crate::{content::PageToGenerate, error::StrataError, paths::trim_slashes};

/// Feed-level metadata from the engine options.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FeedOptions {
    pub title: String,
    pub description: String,
    /// Absolute site URL, e.g. `https://example.com`.
    pub url: String,
}

impl FeedOptions {
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.title.trim().is_empty() {
            return Err(StrataError::Config("Feed title must not be empty".to_string()));
        }
        let parsed = Url::parse(&self.url)?;
        if parsed.cannot_be_a_base() {
            return Err(StrataError::Config(format!(
                "Feed URL is not an absolute base URL: {}",
                self.url
            )));
        }
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Generate `sitemap.xml`: one `<url>` per planned page, `<lastmod>` when the
/// page metadata carries a modification date.
pub fn generate_sitemap(options: &FeedOptions, pages: &[PageToGenerate]) -> String {
    let base_url = options.base_url();
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
    xml.push('\n');

    for page in pages {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}/{}</loc>\n",
            base_url,
            xml_escape(trim_slashes(&page.url))
        ));
        if let Some(modified) = page.metadata.as_ref().and_then(|m| m.last_modified) {
            const FORMAT: &[time::format_description::FormatItem<'static>] =
                format_description!("[year]-[month]-[day]");
            if let Ok(formatted) = modified.format(&FORMAT) {
                xml.push_str(&format!("    <lastmod>{formatted}</lastmod>\n"));
            }
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

/// Generate `rss.xml`: one item per planned page whose metadata is an RSS
/// item with a non-empty title. Publication dates fall back to now.
pub fn generate_rss(options: &FeedOptions, pages: &[PageToGenerate]) -> String {
    let base_url = options.base_url();
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">"#);
    xml.push('\n');
    xml.push_str("  <channel>\n");
    xml.push_str(&format!("    <title>{}</title>\n", xml_escape(&options.title)));
    xml.push_str(&format!("    <link>{base_url}</link>\n"));
    xml.push_str(&format!(
        "    <description>{}</description>\n",
        xml_escape(&options.description)
    ));
    xml.push_str("    <language>en-us</language>\n");
    xml.push_str(&format!(
        "    <atom:link href=\"{base_url}/rss.xml\" rel=\"self\" type=\"application/rss+xml\"/>\n"
    ));

    for page in pages {
        let Some(metadata) = &page.metadata else {
            continue;
        };
        let Some(title) = metadata.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        if !metadata.rss_item {
            continue;
        }

        let link = format!("{}/{}", base_url, trim_slashes(&page.url));
        let pub_date = metadata
            .last_modified
            .unwrap_or_else(OffsetDateTime::now_utc);

        xml.push_str("    <item>\n");
        xml.push_str(&format!("      <title>{}</title>\n", xml_escape(title)));
        xml.push_str(&format!("      <link>{}</link>\n", xml_escape(&link)));
        xml.push_str(&format!("      <guid>{}</guid>\n", xml_escape(&link)));
        if let Some(description) = metadata.description.as_deref() {
            xml.push_str(&format!(
                "      <description>{}</description>\n",
                xml_escape(description)
            ));
        }
        if let Ok(formatted) = pub_date.format(&Rfc2822) {
            xml.push_str(&format!("      <pubDate>{formatted}</pubDate>\n"));
        }
        xml.push_str("    </item>\n");
    }

    xml.push_str("  </channel>\n");
    xml.push_str("</rss>\n");
    xml
}

fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::Metadata;
    use time::macros::datetime;

    fn options() -> FeedOptions {
        FeedOptions {
            title: "Test Site".to_string(),
            description: "A test site".to_string(),
            url: "https://example.com".to_string(),
        }
    }

    fn planned(url: &str, title: Option<&str>, rss_item: bool) -> PageToGenerate {
        let mut page = PageToGenerate::new(url, format!("{}.html", trim_slashes(url)));
        page.metadata = Some(Metadata {
            title: title.map(str::to_string),
            last_modified: Some(datetime!(2025-01-15 10:30 UTC)),
            rss_item,
            ..Default::default()
        });
        page
    }

    #[test]
    fn validate_rejects_bad_config() {
        let mut bad = options();
        bad.title = "  ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = options();
        bad.url = "not a url".to_string();
        assert!(bad.validate().is_err());

        assert!(options().validate().is_ok());
    }

    #[test]
    fn sitemap_lists_locations_with_lastmod() {
        let xml = generate_sitemap(&options(), &[planned("/blog/welcome", Some("W"), true)]);
        assert!(xml.contains("<loc>https://example.com/blog/welcome</loc>"));
        assert!(xml.contains("<lastmod>2025-01-15</lastmod>"));
        assert!(xml.contains(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#));
    }

    #[test]
    fn sitemap_omits_lastmod_without_date() {
        let mut page = planned("/about", Some("About"), true);
        page.metadata.as_mut().unwrap().last_modified = None;
        let xml = generate_sitemap(&options(), &[page]);
        assert!(xml.contains("<loc>https://example.com/about</loc>"));
        assert!(!xml.contains("lastmod"));
    }

    #[test]
    fn rss_filters_untitled_and_excluded_items() {
        let pages = vec![
            planned("/blog/welcome", Some("Welcome"), true),
            planned("/blog/untitled", None, true),
            planned("/tags/intro", Some("Welcome"), false),
        ];
        let xml = generate_rss(&options(), &pages);
        assert!(xml.contains("<title>Welcome</title>"));
        assert!(!xml.contains("untitled"));
        assert!(!xml.contains("tags/intro"));
        assert_eq!(xml.matches("<item>").count(), 1);
    }

    #[test]
    fn rss_channel_metadata_and_language() {
        let xml = generate_rss(&options(), &[]);
        assert!(xml.contains("<title>Test Site</title>"));
        assert!(xml.contains("<description>A test site</description>"));
        assert!(xml.contains("<language>en-us</language>"));
        assert!(xml.contains("<link>https://example.com</link>"));
    }

    #[test]
    fn rss_pub_date_is_rfc2822() {
        let xml = generate_rss(&options(), &[planned("/p", Some("P"), true)]);
        assert!(xml.contains("<pubDate>Wed, 15 Jan 2025 10:30:00 +0000</pubDate>"));
    }

    #[test]
    fn xml_escaping() {
        assert_eq!(
            xml_escape("Tom & Jerry's <adventure>"),
            "Tom &amp; Jerry&apos;s &lt;adventure&gt;"
        );
    }
}
