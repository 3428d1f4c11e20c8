//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::{fs, path::Path};

use strata::{
    content::ContentOptions,
    engine::{Engine, EngineBuilder, EngineOptions},
    feeds::FeedOptions,
    markdown::{ParseHooks, PostFrontMatter},
    tags::TagOptions,
};

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("create parents");
    fs::write(path, contents).expect("write fixture");
}

pub fn engine_options() -> EngineOptions {
    toml::from_str(
        r#"
        [feed]
        title = "Fixture Site"
        description = "Integration fixtures"
        url = "https://fixture.example"
        "#,
    )
    .expect("static options")
}

pub fn feed_options() -> FeedOptions {
    engine_options().feed
}

/// A single-collection blog engine rooted at `content_root`.
pub fn blog_engine(content_root: &Path) -> Engine {
    let content =
        ContentOptions::new(content_root, "/blog").with_tags(TagOptions::new("/tags"));
    EngineBuilder::new(engine_options())
        .expect("options validate")
        .collection::<PostFrontMatter>("blog", content, ParseHooks::default())
        .expect("collection validates")
        .build()
        .expect("engine builds")
}
