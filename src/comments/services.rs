use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{AddCommentRequest, ReplyRequest},
    repo_types::{Comment, CommentWithUser},
};
use crate::{
    auth::services::required,
    error::{parse_id, ApiError, ApiResult},
    state::AppState,
    users::repo_types::User,
};

#[instrument(skip(st, user, req), fields(user_id = %user.id))]
pub async fn add_comment(st: &AppState, user: &User, req: AddCommentRequest) -> ApiResult<Comment> {
    const MISSING: &str = "Post ID and content are required";
    let post_id = parse_id(required(&req.post_id, MISSING)?, "post id")?;
    let content = required(&req.content, MISSING)?.to_string();

    if st.posts.find_by_id(post_id).await?.is_none() {
        return Err(ApiError::not_found("Post not found"));
    }

    let comment = st.comments.create(post_id, user.id, content).await?;
    info!(comment_id = %comment.id, %post_id, "comment added");
    Ok(comment)
}

/// Admin-only; the gate is enforced by the caller's extractor.
#[instrument(skip(st, req))]
pub async fn reply_to_comment(st: &AppState, req: ReplyRequest) -> ApiResult<Comment> {
    const MISSING: &str = "Comment ID and reply text are required";
    let comment_id = parse_id(required(&req.comment_id, MISSING)?, "comment id")?;
    let reply = required(&req.reply, MISSING)?.to_string();

    let comment = st
        .comments
        .set_reply(comment_id, reply)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    info!(%comment_id, "reply added");
    Ok(comment)
}

pub async fn comments_for_post(st: &AppState, post_id: Uuid) -> ApiResult<Vec<CommentWithUser>> {
    Ok(st.comments.list_by_post(post_id).await?)
}
