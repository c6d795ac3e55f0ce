//! JSON route handlers.

use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use hf_av::ToolInfo;
use hf_core::PlaylistKind;
use hf_media::{CounterSnapshot, ReseedReport};
use hf_pipeline::StatsSnapshot;

use crate::context::AppContext;
use crate::error::AppError;

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub output_root: PathBuf,
    pub segment_duration: u32,
    pub playlist_kind: PlaylistKind,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    /// Next sequence number per rendition seen so far.
    pub renditions: Vec<CounterSnapshot>,
    pub ingest: StatsSnapshot,
}

/// GET /api/status
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        output_root: ctx.config.output.root.clone(),
        segment_duration: ctx.config.output.segment_duration,
        playlist_kind: ctx.config.output.playlist_kind,
        started_at: ctx.started_at,
        uptime_secs: (Utc::now() - ctx.started_at).num_seconds(),
        renditions: ctx.tracker.snapshot(),
        ingest: ctx.stats.snapshot(),
    })
}

/// GET /api/tools
pub async fn tools(State(ctx): State<AppContext>) -> Result<Json<Vec<ToolInfo>>, AppError> {
    let registry = ctx.tools.clone();
    // Version detection runs the tools synchronously.
    let infos = tokio::task::spawn_blocking(move || registry.check_all())
        .await
        .map_err(|e| hf_core::Error::Internal(format!("tool check panicked: {e}")))?;
    Ok(Json(infos))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReseedQuery {
    pub rendition: Option<String>,
}

/// POST /api/reseed[?rendition=NAME]
///
/// Drops cached segment counters and rescans disk. Without a rendition
/// every counter the tracker knows about is re-seeded.
pub async fn reseed(
    State(ctx): State<AppContext>,
    Query(query): Query<ReseedQuery>,
) -> Result<Json<Vec<ReseedReport>>, AppError> {
    let reports = match query.rendition {
        Some(name) => {
            let known = ctx.config.ladder.declared.iter().any(|d| d.name == name)
                || ctx.tracker.snapshot().iter().any(|c| c.rendition == name);
            if !known {
                return Err(hf_core::Error::Validation(format!("unknown rendition '{name}'")).into());
            }
            vec![ctx.tracker.reseed(&name).await]
        }
        None => ctx.tracker.reseed_all().await,
    };
    Ok(Json(reports))
}
