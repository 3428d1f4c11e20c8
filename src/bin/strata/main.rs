//! strata CLI
//!
//! - `strata serve` (default): start the dev server with file watching and
//!   live reload.
//! - `strata build`: start the server on a loopback port, run the static
//!   output generator against it once, and stop.
//!
//! The first argument is matched case-insensitively, so `strata Build` and
//! `strata BUILD` do what they look like. Exit code is 0 on success and
//! non-zero on an uncaught error; a finished build prints a summary with the
//! count of skipped items.

mod dev_server;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use strata::{
    engine::{Engine, EngineBuilder, EngineOptions},
    StrataError,
};
use url::Url;

#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about = "A static site generator with a live-reloading markdown content pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the site with file watching and live reload
    Serve {
        /// Site configuration file
        #[arg(short, long, default_value = "strata.toml")]
        config: PathBuf,

        /// Include draft pages (development preview only)
        #[arg(long)]
        drafts: bool,

        /// Port override for the dev server
        #[arg(long)]
        port: Option<u16>,
    },

    /// Generate the static output tree once and exit
    Build {
        /// Site configuration file
        #[arg(short, long, default_value = "strata.toml")]
        config: PathBuf,

        /// Output folder override
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Subcommands match case-insensitively: `strata BUILD` builds.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(first) = args.get_mut(1) {
        if first.eq_ignore_ascii_case("build") || first.eq_ignore_ascii_case("serve") {
            *first = first.to_lowercase();
        }
    }
    let cli = Cli::parse_from(args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?;

    match cli.command.unwrap_or(Commands::Serve {
        config: PathBuf::from("strata.toml"),
        drafts: false,
        port: None,
    }) {
        Commands::Serve {
            config,
            drafts,
            port,
        } => runtime.block_on(run_server(config, drafts, port)),
        Commands::Build { config, output } => runtime.block_on(run_build(config, output)),
    }
}

async fn load_engine(
    config: PathBuf,
    drafts: bool,
    port: Option<u16>,
    output: Option<PathBuf>,
) -> Result<Engine, StrataError> {
    let mut options = EngineOptions::from_toml_file(&config).await?;
    if let Some(port) = port {
        options.port = port;
    }
    if let Some(output) = output {
        options.output_folder = output;
    }
    EngineBuilder::new(options)?
        .include_drafts(drafts)
        .configured_collections()?
        .build()
}

async fn run_server(
    config: PathBuf,
    drafts: bool,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(load_engine(config, drafts, port, None).await?);
    let port = engine.options().port;

    // Ctrl-C flips the shutdown flag; the serve future polls it.
    let running = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let handler_running = running.clone();
    ctrlc::set_handler(move || {
        println!("\nShutting down...");
        handler_running.store(false, std::sync::atomic::Ordering::SeqCst);
    })?;

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;
    println!("\n🚀 Dev server running at http://{addr}");
    println!("🔄 Live reload enabled; press Ctrl-C to stop\n");

    let shutdown_running = running.clone();
    let shutdown = async move {
        while shutdown_running.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };

    let server = dev_server::DevServer::new(engine.clone(), true);
    let result = server.serve(listener, shutdown).await;

    engine.dispose();
    result?;
    println!("Shutdown complete");
    Ok(())
}

async fn run_build(
    config: PathBuf,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(load_engine(config, false, None, output).await?);

    // The generator fetches rendered pages over HTTP, so stand the server up
    // on an ephemeral loopback port for the duration of the build.
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    let server_base = Url::parse(&format!("http://{addr}/"))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_engine = engine.clone();
    let server_handle = tokio::spawn(async move {
        let server = dev_server::DevServer::new(server_engine, false);
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = server.serve(listener, shutdown).await {
            tracing::error!("Dev server error during build: {e}");
        }
    });

    let result = engine.build_static(&server_base).await;

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;
    engine.dispose();

    match result {
        Ok(summary) => {
            println!("\n=== Build Results ===");
            println!("Pages generated: {}", summary.generated);
            println!("Files copied: {}", summary.copied_files);
            println!("Skipped items: {}", summary.skipped_total());
            println!("Output: {}", engine.options().output_folder.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("Build failed: {e}");
            std::process::exit(1);
        }
    }
}
