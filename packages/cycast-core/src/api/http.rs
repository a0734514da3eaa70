//! HTTP route handlers for the listener-facing surface: the audio stream
//! itself, and the read-only status/stats endpoints.
//!
//! Handlers are thin - they delegate to [`Broadcaster`], [`MetadataRegistry`],
//! and [`status::snapshot`] for the actual work.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use serde_json::json;

use crate::api::AppState;
use crate::protocol_constants::{APP_NAME, LISTENER_DEQUEUE_TIMEOUT_MS};
use crate::status;
use crate::stream::broadcaster::Broadcaster;
use crate::stream::icy::IcyMetadataInjector;
use crate::utils::now_millis;

/// Creates the Axum router serving the audio stream, the status page, and
/// the JSON status/stats endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/api/status", get(api_status))
        .route("/api/stats", get(api_stats))
        .route(&state.config.mount_point, get(stream_audio))
        .with_state(state)
}

/// Drops the listener's registration when the stream body is cancelled
/// (client disconnect) or ends (server shutdown).
struct ListenerGuard {
    broadcaster: Arc<Broadcaster>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.broadcaster.remove_listener(self.id);
    }
}

/// `GET <mount_point>`: streams audio chunks from the listener's queue,
/// optionally interleaving ICY metadata blocks.
async fn stream_audio(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.config.max_listeners > 0
        && state.broadcaster.listener_count() >= state.config.max_listeners
    {
        log::info!(
            "rejecting listener: max_listeners ({}) reached",
            state.config.max_listeners
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "max listeners reached").into_response();
    }

    let wants_icy = state.config.enable_icy
        && headers
            .get("icy-metadata")
            .and_then(|value| value.to_str().ok())
            == Some("1");

    let listener = state.broadcaster.add_listener();
    let id = listener.id();
    log::info!("listener {id} connected (icy={wants_icy})");

    let broadcaster = Arc::clone(&state.broadcaster);
    let metadata = Arc::clone(&state.metadata);
    let meta_interval = state.config.icy_metaint;

    let body_stream = stream! {
        let _guard = ListenerGuard { broadcaster: Arc::clone(&broadcaster), id };
        let mut injector = wants_icy.then(|| IcyMetadataInjector::new(meta_interval));
        let timeout = Duration::from_millis(LISTENER_DEQUEUE_TIMEOUT_MS);

        loop {
            match listener.recv(timeout).await {
                Some(chunk) => {
                    let out = match injector.as_mut() {
                        Some(injector) => injector.inject(&chunk, &metadata.get()),
                        None => chunk,
                    };
                    yield Ok::<Bytes, std::io::Error>(out);
                }
                None => {
                    // Either a dequeue timeout (keep waiting, lets cancellation
                    // propagate) or the queue was closed (server shutdown).
                    if listener.is_closed() {
                        break;
                    }
                }
            }
        }
        log::info!("listener {id} disconnected");
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CACHE_CONTROL, "no-cache, no-store")
        .header(header::PRAGMA, "no-cache")
        .header(header::CONNECTION, "close")
        .header("Accept-Ranges", "none");

    if wants_icy {
        builder = builder
            .header("icy-metaint", meta_interval.to_string())
            .header("icy-name", state.config.station_name.as_str())
            .header("icy-genre", state.config.station_genre.as_str())
            .header("icy-url", state.config.station_url.as_str());
    }

    builder
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|err| {
            log::error!("failed to build stream response: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        })
}

fn build_snapshot(state: &AppState) -> status::StatusSnapshot {
    let started_at_secs = state.started_at_millis / 1000;
    let now_secs = now_millis() / 1000;
    status::snapshot(
        &state.ring,
        &state.broadcaster,
        &state.metadata,
        &state.source_slot,
        started_at_secs,
        now_secs,
    )
}

fn format_uptime(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    format!("{hours}h {minutes}m")
}

/// `GET /api/status`: the public status JSON contract (distilled spec §6).
async fn api_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = build_snapshot(&state);
    let source_status = if snapshot.source_connected {
        "Connected"
    } else {
        "Playlist Fallback"
    };

    Json(json!({
        "source_connected": snapshot.source_connected,
        "source_status": source_status,
        "metadata": {
            "title": snapshot.metadata.title,
            "artist": snapshot.metadata.artist,
        },
        "listeners": snapshot.listeners,
        "uptime_seconds": snapshot.uptime_seconds,
        "uptime_formatted": format_uptime(snapshot.uptime_seconds),
        "station_name": state.config.station_name,
        "station_genre": state.config.station_genre,
    }))
}

/// `GET /api/stats`: detailed per-listener statistics. `403` if
/// `advanced.enable_stats` is disabled.
async fn api_stats(State(state): State<AppState>) -> Response {
    if !state.config.enable_stats {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "Stats disabled"}))).into_response();
    }

    let mut stats = serde_json::to_value(state.broadcaster.stats())
        .expect("BroadcasterStats always serializes");
    stats["buffer"] = json!({
        "available": state.ring.available(),
        "space": state.ring.space(),
        "fill_percentage": state.ring.fill_fraction() * 100.0,
    });

    Json(stats).into_response()
}

/// `GET /`: a minimal read-only HTML status page.
async fn status_page(State(state): State<AppState>) -> Html<String> {
    let snapshot = build_snapshot(&state);
    let source_status = if snapshot.source_connected {
        "Connected"
    } else {
        "Playlist Fallback"
    };
    let now_playing = snapshot.metadata.display.unwrap_or_else(|| "-".to_string());

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{station_name} - {app_name}</title>
<style>
body {{ font-family: sans-serif; background: #111; color: #eee; margin: 2rem; }}
h1 {{ margin-bottom: 0; }}
.subtitle {{ color: #999; margin-top: 0.25rem; }}
.stat {{ display: inline-block; margin-right: 2rem; }}
.stat-label {{ color: #999; font-size: 0.8rem; text-transform: uppercase; }}
.stat-value {{ font-size: 1.4rem; }}
a {{ color: #6cf; }}
</style>
</head>
<body>
<h1>{station_name}</h1>
<p class="subtitle">{station_genre}</p>
<div class="stat"><div class="stat-label">Status</div><div class="stat-value">{source_status}</div></div>
<div class="stat"><div class="stat-label">Now Playing</div><div class="stat-value">{now_playing}</div></div>
<div class="stat"><div class="stat-label">Listeners</div><div class="stat-value">{listeners}</div></div>
<div class="stat"><div class="stat-label">Uptime</div><div class="stat-value">{uptime}</div></div>
<p><a href="{mount_point}">Listen</a> &middot; <a href="/api/status">Status JSON</a> &middot; <a href="/api/stats">Statistics JSON</a></p>
</body>
</html>"#,
        station_name = state.config.station_name,
        app_name = APP_NAME,
        station_genre = state.config.station_genre,
        source_status = source_status,
        now_playing = now_playing,
        listeners = snapshot.listeners,
        uptime = format_uptime(snapshot.uptime_seconds),
        mount_point = state.config.mount_point,
    );

    Html(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formats_hours_and_minutes() {
        assert_eq!(format_uptime(0), "0h 0m");
        assert_eq!(format_uptime(59), "0h 0m");
        assert_eq!(format_uptime(3661), "1h 1m");
        assert_eq!(format_uptime(7200), "2h 0m");
    }
}
