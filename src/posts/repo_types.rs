use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::media::MediaKind;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub headline: String,
    pub detail: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub author_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Author fields embedded in post listings.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub full_name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSummary,
}

/// Joined row: post columns plus the author's public fields.
#[derive(Debug, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub headline: String,
    pub detail: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub author_user_name: Option<String>,
    pub author_full_name: Option<String>,
    pub author_email: String,
}

impl From<PostRow> for PostWithAuthor {
    fn from(r: PostRow) -> Self {
        Self {
            author: AuthorSummary {
                id: r.author_id,
                user_name: r.author_user_name,
                full_name: r.author_full_name,
                email: r.author_email,
            },
            post: Post {
                id: r.id,
                headline: r.headline,
                detail: r.detail,
                media_url: r.media_url,
                media_type: r.media_type,
                tags: r.tags,
                categories: r.categories,
                author_id: r.author_id,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    pub id: Uuid,
    pub headline: String,
    pub media_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub headline: String,
    pub detail: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub author_id: Uuid,
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub headline: Option<String>,
    pub detail: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.headline.is_none()
            && self.detail.is_none()
            && self.tags.is_none()
            && self.categories.is_none()
    }
}
