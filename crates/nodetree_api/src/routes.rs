//! Tree REST endpoints.
//!
//! - `GET /tree` and `GET /tree/:id` - whole tree; `:id` is not consulted
//! - `GET /tree/:id/subtree` - tree rooted at one node
//! - `POST /tree/:parent_id` - append a child
//! - `PUT /tree/:id` - rename and optionally re-parent
//! - `DELETE /tree/:id` - delete a subtree
//! - `PUT /tree/:id/move/:new_parent_id` - re-parent to end
//! - `PUT /tree/:id/reorder` - move to front among siblings
//! - `GET /health` - liveness probe

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use nodetree_core::{FieldError, Node, NodeId, NodeTree, TreeServiceError};
use serde::{Deserialize, Serialize};

/// Body of `POST /tree/:parent_id`.
#[derive(Debug, Deserialize)]
pub struct AddNodePayload {
    #[serde(default)]
    pub title: Option<String>,
}

/// Body of `PUT /tree/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateNodePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub parent_node_id: Option<NodeId>,
}

#[derive(Debug, Serialize)]
pub struct SuccessBody {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

type IdPath = Result<Path<NodeId>, PathRejection>;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tree", get(get_tree))
        .route(
            "/tree/:id",
            get(get_tree)
                .post(add_node)
                .put(update_node)
                .delete(delete_node),
        )
        .route("/tree/:id/subtree", get(get_subtree))
        .route("/tree/:id/move/:new_parent_id", put(move_node))
        .route("/tree/:id/reorder", put(reorder_node))
        .with_state(state)
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_tree(State(state): State<AppState>) -> Result<Json<NodeTree>, ApiError> {
    state
        .with_tree_service("fetching the tree", |service| service.get_tree())
        .await
        .map(Json)
}

async fn get_subtree(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<NodeTree>, ApiError> {
    let id = node_id(id)?;
    state
        .with_tree_service("fetching the subtree", move |service| {
            service.get_subtree(id)
        })
        .await
        .map(Json)
}

async fn add_node(
    State(state): State<AppState>,
    parent_id: IdPath,
    payload: Result<Json<AddNodePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let parent_id =
        node_id(parent_id).map_err(|err| err.with_not_found_message("Parent node not found"))?;
    let Json(payload) = payload.map_err(|rejection| body_error(&rejection))?;
    let title = payload.title.unwrap_or_default();

    let node = state
        .with_tree_service("adding the node", move |service| {
            service.add_node(parent_id, &title)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn update_node(
    State(state): State<AppState>,
    id: IdPath,
    payload: Result<Json<UpdateNodePayload>, JsonRejection>,
) -> Result<Json<Node>, ApiError> {
    let id = node_id(id)?;
    // A missing node is reported before a malformed body.
    let payload = payload.map(|Json(payload)| payload).map_err(|rejection| {
        vec![FieldError {
            field: "body",
            message: rejection.body_text(),
        }]
    });

    state
        .with_tree_service("updating the node", move |service| {
            service.get_node(id)?;
            let payload = payload.map_err(TreeServiceError::Validation)?;
            let title = payload.title.unwrap_or_default();
            service.update_node(id, &title, payload.parent_node_id)
        })
        .await
        .map(Json)
}

async fn delete_node(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<SuccessBody>, ApiError> {
    let id = node_id(id)?;
    state
        .with_tree_service("deleting the node", move |service| service.delete_node(id))
        .await?;
    Ok(Json(SuccessBody { success: true }))
}

async fn move_node(
    State(state): State<AppState>,
    ids: Result<Path<(NodeId, NodeId)>, PathRejection>,
) -> Result<Json<Node>, ApiError> {
    const MISSING: &str = "Node or new parent node not found";
    let Path((id, new_parent_id)) = ids.map_err(|_| ApiError::not_found(MISSING))?;
    state
        .with_tree_service("moving the node", move |service| {
            service.move_node(id, new_parent_id)
        })
        .await
        .map(Json)
        .map_err(|err| err.with_not_found_message(MISSING))
}

async fn reorder_node(
    State(state): State<AppState>,
    id: IdPath,
) -> Result<Json<SuccessBody>, ApiError> {
    let id = node_id(id)?;
    state
        .with_tree_service("reordering the node", move |service| {
            service.reorder_node(id)
        })
        .await?;
    Ok(Json(SuccessBody { success: true }))
}

fn node_id(path: IdPath) -> Result<NodeId, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::not_found("Node not found"))
}

fn body_error(rejection: &JsonRejection) -> ApiError {
    ApiError::validation(&[FieldError {
        field: "body",
        message: rejection.body_text(),
    }])
}
