use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreatePostForm, UpdatePostRequest},
    repo_types::{Headline, NewPost, Post, PostPatch, PostWithAuthor},
};
use crate::{
    error::{ApiError, ApiResult},
    media::services::{remove_media, upload_media},
    state::AppState,
    users::repo_types::User,
};

pub const DEFAULT_SLIDER_LIMIT: i64 = 5;
const MAX_SLIDER_LIMIT: i64 = 50;

/// Splits comma-joined entries, trims them and drops blanks.
pub fn parse_list(values: Vec<String>) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[instrument(skip(st, author, form), fields(author_id = %author.id))]
pub async fn create_post(st: &AppState, author: &User, form: CreatePostForm) -> ApiResult<Post> {
    let (Some(headline), Some(detail)) = (non_blank(form.headline), non_blank(form.detail)) else {
        return Err(ApiError::validation("Headline and detail are required"));
    };

    let stored = match form.media {
        Some(item) => Some(upload_media(st, "posts", item).await?),
        None => None,
    };

    let new = NewPost {
        headline,
        detail,
        media_url: stored.as_ref().map(|m| m.url.clone()),
        media_type: stored.as_ref().map(|m| m.kind),
        tags: parse_list(form.tags),
        categories: parse_list(form.categories),
        author_id: author.id,
    };

    match st.posts.create(new).await {
        Ok(post) => {
            info!(post_id = %post.id, "post created");
            Ok(post)
        }
        Err(e) => {
            if let Some(m) = stored {
                remove_media(st, &m.url).await;
            }
            Err(e.into())
        }
    }
}

pub async fn all_posts(st: &AppState) -> ApiResult<Vec<PostWithAuthor>> {
    let posts = st.posts.list(None).await?;
    if posts.is_empty() {
        return Err(ApiError::not_found("No posts found"));
    }
    Ok(posts)
}

pub async fn headlines(st: &AppState) -> ApiResult<Vec<Headline>> {
    let items = st.posts.headlines().await?;
    if items.is_empty() {
        return Err(ApiError::not_found("No headlines found"));
    }
    Ok(items)
}

pub async fn slider(st: &AppState, limit: Option<i64>) -> ApiResult<Vec<PostWithAuthor>> {
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_SLIDER_LIMIT)
        .min(MAX_SLIDER_LIMIT);
    Ok(st.posts.list(Some(limit)).await?)
}

pub async fn get_post(st: &AppState, id: Uuid) -> ApiResult<PostWithAuthor> {
    st.posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

#[instrument(skip(st, req))]
pub async fn update_post(st: &AppState, id: Uuid, req: UpdatePostRequest) -> ApiResult<Post> {
    let patch = PostPatch {
        headline: req.headline.map(|h| h.trim().to_string()),
        detail: req.detail.map(|d| d.trim().to_string()),
        tags: req.tags.map(|t| parse_list(t.into_vec())),
        categories: req.categories.map(|c| parse_list(c.into_vec())),
    };
    if patch.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }
    if matches!(patch.headline.as_deref(), Some("")) || matches!(patch.detail.as_deref(), Some("")) {
        return Err(ApiError::validation("Headline and detail cannot be empty"));
    }

    let post = st
        .posts
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;
    info!("post updated");
    Ok(post)
}

#[instrument(skip(st))]
pub async fn delete_post(st: &AppState, id: Uuid) -> ApiResult<()> {
    let existing = get_post(st, id).await?;
    if !st.posts.delete(id).await? {
        // Removed concurrently.
        warn!("post vanished before delete");
        return Err(ApiError::not_found("Post not found"));
    }
    if let Some(url) = existing.post.media_url.as_deref() {
        remove_media(st, url).await;
    }
    info!("post deleted");
    Ok(())
}
