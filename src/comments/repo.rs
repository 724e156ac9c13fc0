use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Comment, CommentRow, CommentWithUser};

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn create(&self, post_id: Uuid, user_id: Uuid, content: String) -> anyhow::Result<Comment>;
    /// Overwrites any earlier reply. `None` when the comment does not exist.
    async fn set_reply(&self, id: Uuid, reply: String) -> anyhow::Result<Option<Comment>>;
    /// Newest first.
    async fn list_by_post(&self, post_id: Uuid) -> anyhow::Result<Vec<CommentWithUser>>;
}

const COMMENT_COLUMNS: &str = "id, post_id, user_id, content, reply, created_at, updated_at";

#[derive(Clone)]
pub struct PgCommentStore {
    db: PgPool,
}

impl PgCommentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn create(&self, post_id: Uuid, user_id: Uuid, content: String) -> anyhow::Result<Comment> {
        let sql = format!(
            "INSERT INTO comments (post_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING {COMMENT_COLUMNS}"
        );
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .bind(user_id)
            .bind(content)
            .fetch_one(&self.db)
            .await
            .context("insert comment")?;
        Ok(comment)
    }

    async fn set_reply(&self, id: Uuid, reply: String) -> anyhow::Result<Option<Comment>> {
        let sql = format!(
            "UPDATE comments SET reply = $2, updated_at = now() WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        );
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(reply)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("reply to comment {}", id))?;
        Ok(comment)
    }

    async fn list_by_post(&self, post_id: Uuid) -> anyhow::Result<Vec<CommentWithUser>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.post_id, c.user_id, c.content, c.reply, c.created_at, c.updated_at,
                   u.user_name, u.role AS user_role
              FROM comments c
              JOIN users u ON u.id = c.user_id
             WHERE c.post_id = $1
             ORDER BY c.created_at DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.db)
        .await
        .context("list comments by post")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
