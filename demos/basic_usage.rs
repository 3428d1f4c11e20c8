//! Minimal library usage: build an engine over a content directory and list
//! what the pipeline derived from it.
//!
//! ```bash
//! cargo run --example basic_usage -- ./content
//! ```

use std::sync::Arc;

use strata::{
    content::ContentOptions,
    engine::{EngineBuilder, EngineOptions},
    markdown::{ParseHooks, PostFrontMatter},
    render::DefaultRenderer,
    tags::TagOptions,
    toc::build_toc,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let content_root = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./content".to_string());

    let options: EngineOptions = toml::from_str(
        r#"
        [feed]
        title = "Demo Site"
        description = "strata basic usage"
        url = "https://demo.example"
        "#,
    )?;

    let engine = EngineBuilder::new(options)?
        .renderer(Arc::new(DefaultRenderer))
        .collection::<PostFrontMatter>(
            "content",
            ContentOptions::new(&content_root, "/").with_tags(TagOptions::new("/tags")),
            ParseHooks::default(),
        )?
        .build()?;

    let pages = engine.all_pages().await?;
    println!("Parsed {} pages from {content_root}:", pages.len());
    for page in &pages {
        println!(
            "  {:40} {}",
            page.navigate_url,
            page.metadata.title.as_deref().unwrap_or("<untitled>")
        );
    }

    let toc = build_toc(&pages, "", "/");
    println!("\nTop-level TOC entries:");
    for entry in &toc {
        println!("  {} ({} children)", entry.name, entry.items.len());
    }

    println!("\nPlanned artifacts:");
    for planned in engine.planned_pages().await? {
        println!("  {} -> {}", planned.url, planned.output_file.display());
    }

    engine.dispose();
    Ok(())
}
