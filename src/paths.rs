use std::{
    borrow::Cow,
    path::{Component, Path},
};

use titlecase::titlecase;

/// Utility function to replace separators and convert to unicode (via
/// to_string_lossy) on an os path. Strips any root component so the result is
/// always a relative, forward-slash path.
pub fn os_path_to_string<P: AsRef<Path>>(os_path_ref: P) -> String {
    os_path_ref
        .as_ref()
        .components()
        .filter_map(|c| match c {
            Component::RootDir => Some(Cow::from("")),
            Component::Prefix(_) => None,
            Component::Normal(s) => Some(s.to_string_lossy()),
            Component::CurDir => Some(Cow::from(".")),
            Component::ParentDir => Some(Cow::from("..")),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Turn an arbitrary string into a URL-safe lower-case token.
///
/// Total and idempotent: the output contains only ASCII letters, digits, and
/// hyphens, and slugifying a slug returns it unchanged.
pub fn slugify(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(char::is_whitespace, "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

/// Derive a page URL from a source file path relative to its content root:
/// drop the extension, slugify every segment, join with forward slashes.
pub fn url_from_relative_path<P: AsRef<Path>>(relative: P) -> String {
    let relative = relative.as_ref().with_extension("");
    os_path_to_string(relative)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(slugify)
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a base page URL and a page-relative URL with exactly one slash.
pub fn join_url(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    match (base.is_empty(), rel.is_empty()) {
        (true, true) => String::new(),
        (true, false) => format!("/{rel}"),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

pub fn trim_slashes(url: &str) -> &str {
    url.trim_matches('/')
}

/// Human-readable label for a URL segment that has no page of its own.
///
/// Single hyphens read as word separators, a double hyphen is a literal
/// hyphen in the label. Each word run is APA title-cased.
pub fn folder_label(segment: &str) -> String {
    segment
        .split("--")
        .map(|part| titlecase(&part.replace('-', " ")))
        .collect::<Vec<_>>()
        .join("-")
}

/// Normalize a route for selection comparison: ensure a leading slash, map a
/// trailing slash (and the bare root) onto the implicit index page, and
/// lowercase the whole thing.
pub fn normalize_route(url: &str) -> String {
    let mut normalized = if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{url}")
    };
    if normalized == "/" {
        normalized = "/index".to_string();
    } else if normalized.ends_with('/') {
        normalized.push_str("index");
    }
    normalized.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_is_lowercase_ascii() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Spaced  Out "), "spaced--out");
        assert_eq!(slugify("C# In Depth!"), "c-in-depth");
    }

    #[test]
    fn slugify_is_idempotent() {
        for raw in ["Intro", "getting started", "API--Reference", "ümlaut"] {
            let once = slugify(raw);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn url_from_relative_path_drops_extension_and_lowercases() {
        assert_eq!(url_from_relative_path("Content/Welcome.md"), "content/welcome");
        assert_eq!(url_from_relative_path("docs/Getting Started.md"), "docs/getting-started");
    }

    #[test]
    fn join_url_handles_empty_and_slashed_parts() {
        assert_eq!(join_url("/blog", "intro"), "/blog/intro");
        assert_eq!(join_url("/blog/", "/intro"), "/blog/intro");
        assert_eq!(join_url("", "intro"), "/intro");
        assert_eq!(join_url("/blog", ""), "/blog");
    }

    #[test]
    fn folder_label_casing() {
        assert_eq!(folder_label("getting-started"), "Getting Started");
        assert_eq!(folder_label("api--reference"), "Api-Reference");
    }

    #[test]
    fn normalize_route_maps_onto_index() {
        assert_eq!(normalize_route("/"), "/index");
        assert_eq!(normalize_route("docs/"), "/docs/index");
        assert_eq!(normalize_route("Docs/Intro"), "/docs/intro");
    }
}
