//! Watch a content directory and print pipeline events as files change.
//!
//! ```bash
//! cargo run --example watch_pipeline -- ./content
//! ```
//!
//! Edit markdown files under the directory and watch the debounced rebuilds
//! land: many rapid saves collapse into one `CollectionRefreshed`.

use strata::{
    content::ContentOptions,
    engine::{EngineBuilder, EngineOptions},
    event::Event,
    markdown::{ParseHooks, PostFrontMatter},
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
        description = "strata watch demo"
        url = "https://demo.example"
        "#,
    )?;

    let engine = EngineBuilder::new(options)?
        .include_drafts(true)
        .collection::<PostFrontMatter>(
            "content",
            ContentOptions::new(&content_root, "/"),
            ParseHooks::default(),
        )?
        .build()?;

    // Prime the cache so the first change shows as a refresh, not a build.
    let pages = engine.all_pages().await?;
    println!("Watching {content_root} ({} pages). Ctrl-C to stop.", pages.len());

    let mut events = engine.subscribe();
    loop {
        match events.recv().await {
            Ok(Event::ContentChanged { collection, paths }) => {
                println!("changed [{collection}]: {paths:?}");
            }
            Ok(Event::CollectionRefreshed { collection }) => {
                let count = engine.all_pages().await.map(|p| p.len()).unwrap_or(0);
                println!("refreshed [{collection}]: {count} pages");
            }
            Ok(Event::Shutdown) | Err(_) => break,
            Ok(_) => {}
        }
    }

    engine.dispose();
    Ok(())
}
