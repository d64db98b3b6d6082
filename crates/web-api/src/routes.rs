//! HTTP 路由
//!
//! 健康检查、事件通道升级与分块上传/下载。上传只向核心汇报进度，
//! 字节流在这里直接落盘。

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use domain::{Upload, UploadId, UploadState};

use crate::{error::ApiError, state::AppState, ws::websocket_upgrade};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .route("/api/upload/init", post(upload_init))
        .route("/api/upload/chunk", post(upload_chunk))
        .route("/api/download/{id}/{name}", get(download))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct UploadInitPayload {
    file_name: String,
    total_size: u64,
    /// 客户端可自带标识，缺省由服务端分配
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadInitResponse {
    file_id: UploadId,
}

async fn upload_init(
    State(state): State<AppState>,
    Json(payload): Json<UploadInitPayload>,
) -> Result<Json<UploadInitResponse>, ApiError> {
    if payload.file_name.is_empty() {
        return Err(ApiError::bad_request("file_name is required"));
    }

    let id = payload
        .id
        .filter(|id| !id.is_empty())
        .map(UploadId::new)
        .unwrap_or_else(UploadId::generate);

    state
        .uploads
        .init(Upload::begin(
            id.clone(),
            payload.file_name,
            payload.total_size,
        ))
        .await?;

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|err| ApiError::internal_server_error(format!("spool dir: {err}")))?;
    tokio::fs::File::create(state.upload_dir.join(id.as_str()))
        .await
        .map_err(|err| ApiError::internal_server_error(format!("spool file: {err}")))?;

    tracing::info!(file_id = %id, "upload initialized");
    Ok(Json(UploadInitResponse { file_id: id }))
}

async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Upload>, ApiError> {
    let mut file_id: Option<String> = None;
    let mut chunk: Option<axum::body::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("multipart: {err}")))?
    {
        match field.name() {
            Some("file_id") => {
                file_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| ApiError::bad_request(format!("file_id: {err}")))?,
                );
            }
            Some("chunk") => {
                chunk = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|err| ApiError::bad_request(format!("chunk: {err}")))?,
                );
            }
            // file_name 等附带字段在 init 时已经登记
            _ => {}
        }
    }

    let file_id = UploadId::new(file_id.ok_or_else(|| ApiError::bad_request("file_id field is required"))?);
    let chunk = chunk.ok_or_else(|| ApiError::bad_request("chunk field is required"))?;

    let mut spool = tokio::fs::OpenOptions::new()
        .append(true)
        .open(state.upload_dir.join(file_id.as_str()))
        .await
        .map_err(|_| ApiError::not_found("unknown upload id"))?;
    spool
        .write_all(&chunk)
        .await
        .map_err(|err| ApiError::internal_server_error(format!("spool write: {err}")))?;

    let upload = state
        .uploads
        .record_chunk(&file_id, chunk.len() as u64)
        .await?
        .ok_or_else(|| ApiError::not_found("unknown upload id"))?;

    Ok(Json(upload))
}

async fn download(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = UploadId::new(id);
    let upload = state
        .uploads
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("unknown upload id"))?;
    if upload.state != UploadState::Completed {
        return Err(ApiError::conflict("upload still in progress"));
    }

    let bytes = tokio::fs::read(state.upload_dir.join(id.as_str()))
        .await
        .map_err(|_| ApiError::not_found("file missing from spool"))?;

    let headers = [
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}
