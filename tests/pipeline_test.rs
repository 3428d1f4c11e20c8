//! End-to-end pipeline checks through the engine facade.

mod common;

use common::{blog_engine, engine_options, write_file};
use strata::{
    content::ContentOptions,
    engine::EngineBuilder,
    markdown::{DocFrontMatter, ParseHooks},
};

#[tokio::test]
async fn single_post_site() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "welcome.md",
        "---\ntitle: Hello\ndate: 2025-01-15\ntags: [\"intro\", \"Intro\"]\n---\n# H1\n## H2\n",
    );

    let engine = blog_engine(dir.path());
    let pages = engine.all_pages().await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].url, "welcome");
    assert_eq!(pages[0].outline.len(), 1);
    assert_eq!(pages[0].outline[0].title, "H2");
    assert_eq!(pages[0].outline[0].id, "h2");

    // Tags deduplicate by encoded name.
    let tags = strata::tags::unique_tags(pages.iter());
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].encoded_name, "intro");

    // The plan covers the page and one tag listing.
    let planned = engine.planned_pages().await.unwrap();
    assert_eq!(planned.len(), 2);
    assert!(planned.iter().any(|p| p.url == "/blog/welcome"));
    assert!(planned.iter().any(|p| p.url == "/tags/intro"));
    engine.dispose();
}

#[tokio::test]
async fn draft_suppression_is_total() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "live.md",
        "---\ntitle: Live\ntags: [public]\n---\nx\n",
    );
    write_file(
        dir.path(),
        "hidden.md",
        "---\ntitle: Hidden\nisDraft: true\ntags: [secret]\n---\nx\n",
    );

    let engine = blog_engine(dir.path());

    let planned = engine.planned_pages().await.unwrap();
    assert_eq!(planned.len(), 2, "one page, one tag listing");
    assert!(planned.iter().all(|p| !p.url.contains("hidden")));
    assert!(planned.iter().all(|p| !p.url.contains("secret")));

    let sitemap = engine.sitemap().await.unwrap();
    assert!(!sitemap.contains("hidden"));
    let rss = engine.rss().await.unwrap();
    assert!(!rss.contains("Hidden"));

    let route = engine.render_route("/blog/hidden").await.unwrap();
    assert!(route.is_none(), "drafts do not serve either");
    engine.dispose();
}

#[tokio::test]
async fn docs_toc_shows_in_rendered_navigation() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "index.md",
        "---\ntitle: Documentation\norder: 10\n---\nWelcome.\n",
    );
    write_file(
        dir.path(),
        "getting-started.md",
        "---\ntitle: Getting Started\norder: 11\n---\nGo.\n",
    );
    write_file(
        dir.path(),
        "config/index.md",
        "---\ntitle: Configuration\norder: 20\n---\nConf.\n",
    );
    write_file(
        dir.path(),
        "config/basic.md",
        "---\ntitle: Basic\norder: 21\n---\nB.\n",
    );

    let engine = EngineBuilder::new(engine_options())
        .unwrap()
        .collection::<DocFrontMatter>(
            "docs",
            ContentOptions::new(dir.path(), "/docs"),
            ParseHooks::default(),
        )
        .unwrap()
        .build()
        .unwrap();

    let html = engine
        .render_route("/docs/getting-started")
        .await
        .unwrap()
        .unwrap();
    // The folder adopted its index page's name; selection marks the page.
    assert!(html.contains("Documentation"));
    assert!(html.contains("Configuration"));
    assert!(html.contains("class=\"selected\""));
    engine.dispose();
}

#[tokio::test]
async fn feeds_are_served_consistently_with_plan() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "post.md",
        "---\ntitle: A Post\ndate: 2025-03-10\ndescription: Words\n---\nBody.\n",
    );

    let engine = blog_engine(dir.path());

    let sitemap = engine.sitemap().await.unwrap();
    assert!(sitemap.contains("<loc>https://fixture.example/blog/post</loc>"));
    assert!(sitemap.contains("<lastmod>2025-03-10</lastmod>"));

    let rss = engine.rss().await.unwrap();
    assert!(rss.contains("<title>A Post</title>"));
    assert!(rss.contains("<language>en-us</language>"));
    assert!(rss.contains("Mon, 10 Mar 2025"));
    engine.dispose();
}
