use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Headline, NewPost, Post, PostPatch, PostRow, PostWithAuthor};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, new: NewPost) -> anyhow::Result<Post>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<PostWithAuthor>>;
    /// Newest first; `None` returns every post.
    async fn list(&self, limit: Option<i64>) -> anyhow::Result<Vec<PostWithAuthor>>;
    async fn headlines(&self) -> anyhow::Result<Vec<Headline>>;
    async fn update(&self, id: Uuid, patch: PostPatch) -> anyhow::Result<Option<Post>>;
    /// Comments go with the post. Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const POST_COLUMNS: &str = r#"
    id, headline, detail, media_url, media_type, tags, categories, author_id,
    created_at, updated_at
"#;

const JOINED_SELECT: &str = r#"
    SELECT p.id, p.headline, p.detail, p.media_url, p.media_type, p.tags, p.categories,
           p.author_id, p.created_at, p.updated_at,
           u.user_name AS author_user_name, u.full_name AS author_full_name,
           u.email AS author_email
      FROM posts p
      JOIN users u ON u.id = p.author_id
"#;

#[derive(Clone)]
pub struct PgPostStore {
    db: PgPool,
}

impl PgPostStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, new: NewPost) -> anyhow::Result<Post> {
        let sql = format!(
            r#"
            INSERT INTO posts (headline, detail, media_url, media_type, tags, categories, author_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {POST_COLUMNS}
            "#
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(new.headline)
            .bind(new.detail)
            .bind(new.media_url)
            .bind(new.media_type)
            .bind(new.tags)
            .bind(new.categories)
            .bind(new.author_id)
            .fetch_one(&self.db)
            .await
            .context("insert post")?;
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<PostWithAuthor>> {
        let sql = format!("{JOINED_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find post by id")?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, limit: Option<i64>) -> anyhow::Result<Vec<PostWithAuthor>> {
        // LIMIT NULL means no limit in Postgres.
        let sql = format!("{JOINED_SELECT} ORDER BY p.created_at DESC LIMIT $1");
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(limit)
            .fetch_all(&self.db)
            .await
            .context("list posts")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn headlines(&self) -> anyhow::Result<Vec<Headline>> {
        let rows = sqlx::query_as::<_, Headline>(
            r#"
            SELECT id, headline, media_url, created_at
            FROM posts
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list headlines")?;
        Ok(rows)
    }

    async fn update(&self, id: Uuid, patch: PostPatch) -> anyhow::Result<Option<Post>> {
        let sql = format!(
            r#"
            UPDATE posts
               SET headline = COALESCE($2, headline),
                   detail = COALESCE($3, detail),
                   tags = COALESCE($4, tags),
                   categories = COALESCE($5, categories),
                   updated_at = now()
             WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(patch.headline)
            .bind(patch.detail)
            .bind(patch.tags)
            .bind(patch.categories)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("update post {}", id))?;
        Ok(post)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete post {}", id))?;
        Ok(res.rows_affected() > 0)
    }
}
