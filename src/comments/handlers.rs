use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{AddCommentRequest, ReplyRequest},
    repo_types::{Comment, CommentWithUser},
    services,
};
use crate::{
    auth::{AdminUser, AuthUser},
    error::{parse_id, ApiResponse, ApiResult, AppJson},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/comments/add", post(add_comment))
        .route("/comments/reply", post(reply_to_comment))
        .route("/comments/:post_id", get(list_comments))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<ApiResponse<Vec<CommentWithUser>>> {
    let id = parse_id(&post_id, "post id")?;
    let comments = services::comments_for_post(&state, id).await?;
    Ok(ApiResponse::ok(comments, "Comments fetched successfully"))
}

#[instrument(skip(state, user, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<AddCommentRequest>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment = services::add_comment(&state, &user, payload).await?;
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

#[instrument(skip(state, _admin, payload))]
pub async fn reply_to_comment(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(payload): AppJson<ReplyRequest>,
) -> ApiResult<ApiResponse<Comment>> {
    let comment = services::reply_to_comment(&state, payload).await?;
    Ok(ApiResponse::ok(comment, "Reply added successfully"))
}
