use crate::error::{AppError, Result};
use crate::models::{CreateServerRequest, ServerRecord, ServerSummary, UpdateServerRequest};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

/// Success envelope shared by every `/servers` endpoint.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<ServerSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerRecord>,
}

impl ServerResponse {
    fn success() -> Self {
        Self {
            status: "success",
            message: None,
            total: None,
            servers: None,
            server: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_server(mut self, server: ServerRecord) -> Self {
        self.server = Some(server);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ListServersQuery {
    pub author: Option<String>,
}

/// GET /health - Liveness probe
pub async fn health() -> Json<ServerResponse> {
    Json(ServerResponse::success())
}

/// GET /servers?author=X - List servers, optionally by exact author
pub async fn list_servers(
    State(state): State<AppState>,
    Query(query): Query<ListServersQuery>,
) -> Result<Json<ServerResponse>> {
    let list = state
        .registry_service
        .list_servers(query.author.as_deref())
        .await?;

    let mut response = ServerResponse::success();
    response.total = Some(list.total);
    response.servers = Some(list.servers);
    Ok(Json(response))
}

/// GET /servers/{name} - Full record including security report and timestamps
pub async fn get_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServerResponse>> {
    let server = state.registry_service.get_server(&name).await?;
    Ok(Json(ServerResponse::success().with_server(server)))
}

/// POST /servers - Scan the repository and register a new server
pub async fn create_server(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateServerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServerResponse>)> {
    let Json(request) = payload.map_err(AppError::from)?;

    let server = state.registry_service.create_server(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(
            ServerResponse::success()
                .with_message("Server created")
                .with_server(server),
        ),
    ))
}

/// PUT /servers/{name} - Merge a partial update, possibly renaming
pub async fn update_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: std::result::Result<Json<UpdateServerRequest>, JsonRejection>,
) -> Result<Json<ServerResponse>> {
    let Json(overlay) = payload.map_err(AppError::from)?;

    let server = state
        .registry_service
        .update_server(&name, overlay)
        .await?;

    Ok(Json(
        ServerResponse::success()
            .with_message(format!("Server '{}' updated successfully", name))
            .with_server(server),
    ))
}

/// DELETE /servers/{name}
pub async fn delete_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServerResponse>> {
    state.registry_service.delete_server(&name).await?;

    Ok(Json(
        ServerResponse::success().with_message(format!("Server '{}' deleted successfully", name)),
    ))
}
