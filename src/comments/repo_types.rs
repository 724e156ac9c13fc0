use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::Role;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub reply: String, // empty until an admin answers
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithUser {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: CommentAuthor,
}

#[derive(Debug, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub reply: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_name: Option<String>,
    pub user_role: Role,
}

impl From<CommentRow> for CommentWithUser {
    fn from(r: CommentRow) -> Self {
        Self {
            user: CommentAuthor {
                id: r.user_id,
                user_name: r.user_name,
                role: r.user_role,
            },
            comment: Comment {
                id: r.id,
                post_id: r.post_id,
                user_id: r.user_id,
                content: r.content,
                reply: r.reply,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
        }
    }
}
