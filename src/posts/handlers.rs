use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{CreatePostForm, SliderQuery, UpdatePostRequest},
    repo_types::{Headline, Post, PostWithAuthor},
    services,
};
use crate::{
    auth::AdminUser,
    error::{parse_id, ApiResponse, ApiResult, AppJson},
    media::services::read_file,
    state::AppState,
};

const MEDIA_LIMIT: usize = 50 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/post/all", get(list_posts))
        .route("/post/headlines", get(list_headlines))
        .route("/post/slider", get(list_slider))
        .route(
            "/post/:post_id",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/post/create", post(create_post))
        .layer(DefaultBodyLimit::max(MEDIA_LIMIT))
}

/// Text fields may repeat; `media` is the optional attachment.
async fn read_post_form(mut mp: Multipart) -> ApiResult<CreatePostForm> {
    let mut form = CreatePostForm::default();
    while let Some(field) = mp.next_field().await? {
        let name = field.name().map(|s| s.trim_end_matches("[]").to_string());
        match name.as_deref() {
            Some("media") => form.media = read_file(field).await?,
            Some("headline") => form.headline = Some(field.text().await?),
            Some("detail") => form.detail = Some(field.text().await?),
            Some("tags") => form.tags.push(field.text().await?),
            Some("categories") => form.categories.push(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

#[instrument(skip(state, admin, mp), fields(admin_id = %admin.id))]
pub async fn create_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<Post>> {
    let form = read_post_form(mp).await?;
    let post = services::create_post(&state, &admin, form).await?;
    Ok(ApiResponse::created(post, "Post created successfully"))
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<PostWithAuthor>>> {
    let posts = services::all_posts(&state).await?;
    Ok(ApiResponse::ok(posts, "All posts fetched successfully"))
}

#[instrument(skip(state))]
pub async fn list_headlines(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Headline>>> {
    let items = services::headlines(&state).await?;
    Ok(ApiResponse::ok(items, "Headlines fetched successfully"))
}

#[instrument(skip(state))]
pub async fn list_slider(
    State(state): State<AppState>,
    Query(q): Query<SliderQuery>,
) -> ApiResult<ApiResponse<Vec<PostWithAuthor>>> {
    let posts = services::slider(&state, q.limit).await?;
    Ok(ApiResponse::ok(posts, "Slider posts fetched successfully"))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<ApiResponse<PostWithAuthor>> {
    let id = parse_id(&post_id, "post id")?;
    let post = services::get_post(&state, id).await?;
    Ok(ApiResponse::ok(post, "Post fetched successfully"))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<String>,
    AppJson(payload): AppJson<UpdatePostRequest>,
) -> ApiResult<ApiResponse<Post>> {
    let id = parse_id(&post_id, "post id")?;
    let post = services::update_post(&state, id, payload).await?;
    Ok(ApiResponse::ok(post, "Post updated successfully"))
}

#[instrument(skip(state, _admin))]
pub async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<String>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    let id = parse_id(&post_id, "post id")?;
    services::delete_post(&state, id).await?;
    Ok(ApiResponse::ok(serde_json::json!({}), "Post deleted successfully"))
}
