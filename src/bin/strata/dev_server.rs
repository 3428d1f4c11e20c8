//! Development server with live reload.
//!
//! Serves rendered routes straight from the content pipeline (no output
//! directory involved), the feeds, and static files from each collection's
//! content root. An `/events` SSE endpoint notifies connected browsers when a
//! collection cache finishes rebuilding; a small script injected before
//! `</body>` reloads the page.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{
        sse::{Event as SseEvent, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::get,
    Router,
};
use strata::{engine::Engine, event::Event, paths::trim_slashes};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::trace::TraceLayer;

const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    'use strict';

    const eventSource = new EventSource('/events');

    eventSource.addEventListener('reload', function() {
        console.log('[strata] Content changed, reloading...');
        window.location.reload();
    });

    eventSource.addEventListener('close', function() {
        console.log('[strata] Server shutting down, closing connection...');
        eventSource.close();
    });

    window.addEventListener('beforeunload', function() {
        eventSource.close();
    });
})();
</script>"#;

#[derive(Clone)]
struct DevServerState {
    engine: Arc<Engine>,
    /// Inject the reload script into rendered pages (off during builds).
    live_reload: bool,
}

pub struct DevServer {
    engine: Arc<Engine>,
    live_reload: bool,
}

impl DevServer {
    pub fn new(engine: Arc<Engine>, live_reload: bool) -> Self {
        DevServer {
            engine,
            live_reload,
        }
    }

    /// Serve on an already-bound listener until `shutdown_signal` completes.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let state = DevServerState {
            engine: self.engine.clone(),
            live_reload: self.live_reload,
        };

        let app = Router::new()
            .route("/events", get(sse_handler))
            .route("/sitemap.xml", get(sitemap_handler))
            .route("/rss.xml", get(rss_handler))
            .fallback(get(route_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!("Dev server starting on http://{addr}");

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        tracing::info!("Dev server shut down");
        Ok(())
    }
}

/// SSE endpoint: collection refreshes become reload events.
async fn sse_handler(
    State(state): State<DevServerState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.engine.subscribe();
    let stream = BroadcastStream::new(rx);

    let mut saw_shutdown = false;
    let stream = stream.filter_map(move |result| match result {
        Ok(Event::CollectionRefreshed { .. }) => {
            Some(Ok(SseEvent::default().event("reload").data("reload")))
        }
        Ok(Event::Shutdown) => {
            if !saw_shutdown {
                saw_shutdown = true;
                Some(Ok(SseEvent::default()
                    .event("close")
                    .data("Server shutting down")))
            } else {
                None
            }
        }
        Ok(_) => None,
        // Lagged behind; a reload is always safe.
        Err(_) => Some(Ok(SseEvent::default().event("reload").data("reload"))),
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn sitemap_handler(State(state): State<DevServerState>) -> Response {
    match state.engine.sitemap().await {
        Ok(xml) => xml_response(xml),
        Err(e) => error_response(e),
    }
}

async fn rss_handler(State(state): State<DevServerState>) -> Response {
    match state.engine.rss().await {
        Ok(xml) => xml_response(xml),
        Err(e) => error_response(e),
    }
}

/// Every other route: rendered page, tag listing, or a static file from a
/// collection's content root.
async fn route_handler(State(state): State<DevServerState>, uri: Uri) -> Response {
    let path = uri.path().trim_end_matches(".html").to_string();

    match state.engine.render_route(&path).await {
        Ok(Some(mut html)) => {
            if state.live_reload {
                html = inject_live_reload(html);
            }
            return ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response();
        }
        Ok(None) => {}
        Err(e) => return error_response(e),
    }

    if let Some(response) = serve_static(&state.engine, uri.path()).await {
        return response;
    }
    (StatusCode::NOT_FOUND, "Page not found").into_response()
}

fn inject_live_reload(html: String) -> String {
    match html.rfind("</body>") {
        Some(idx) => {
            let mut injected = html;
            injected.insert_str(idx, LIVE_RELOAD_SCRIPT);
            injected
        }
        None => html + LIVE_RELOAD_SCRIPT,
    }
}

/// Resolve `request_path` against each collection's content root, honoring
/// the collection's base page URL prefix.
async fn serve_static(engine: &Engine, request_path: &str) -> Option<Response> {
    let request = trim_slashes(request_path);
    for collection in engine.collections() {
        let options = collection.options();
        let base = trim_slashes(&options.base_page_url);
        let relative = if base.is_empty() {
            request
        } else {
            match request.strip_prefix(base).map(|r| r.trim_start_matches('/')) {
                Some(relative) => relative,
                None => continue,
            }
        };
        if relative.is_empty() || relative.contains("..") {
            continue;
        }
        let candidate = options.content_path.join(relative);
        if !candidate.is_file() {
            continue;
        }
        match tokio::fs::read(&candidate).await {
            Ok(bytes) => {
                let content_type = content_type_for(&candidate);
                return Some(([(header::CONTENT_TYPE, content_type)], bytes).into_response());
            }
            Err(e) => {
                tracing::warn!("[DevServer] Failed to read {candidate:?}: {e}");
                return Some(error_response(e.into()));
            }
        }
    }
    None
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("woff") => "font/woff",
        Some("txt") | Some("md") => "text/plain; charset=utf-8",
        Some("xml") => "application/xml",
        _ => "application/octet-stream",
    }
}

fn xml_response(xml: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

fn error_response(error: strata::StrataError) -> Response {
    (error.status_code(), error.to_string()).into_response()
}
