use crate::auth::{
    mailer::{self, Mailer},
    oauth::{GoogleOAuth, IdentityProvider},
};
use crate::comments::repo::{CommentStore, PgCommentStore};
use crate::config::AppConfig;
use crate::posts::repo::{PgPostStore, PostStore};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserStore, UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub comments: Arc<dyn CommentStore>,
    pub storage: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let mailer = mailer::from_config(&config)?;
        let identity = Arc::new(GoogleOAuth::from_config(&config)) as Arc<dyn IdentityProvider>;

        Ok(Self {
            users: Arc::new(PgUserStore::new(db.clone())),
            posts: Arc::new(PgPostStore::new(db.clone())),
            comments: Arc::new(PgCommentStore::new(db)),
            config,
            storage,
            mailer,
            identity,
        })
    }
}
