//! In-memory collaborators and request helpers for unit and router tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
};
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        mailer::{Mailer, OtpPurpose},
        oauth::{IdentityProvider, OAuthProfile},
        password::hash_password,
        services::Session,
    },
    comments::{
        repo::CommentStore,
        repo_types::{Comment, CommentAuthor, CommentWithUser},
    },
    config::{AppConfig, GoogleConfig, JwtConfig, MailConfig, StorageConfig},
    posts::{
        repo::PostStore,
        repo_types::{AuthorSummary, Headline, NewPost, Post, PostPatch, PostWithAuthor},
    },
    state::AppState,
    storage::{join_url, key_under, StorageClient},
    users::{
        repo::{OtpWrite, UserStore},
        repo_types::{NewUser, Role, User},
    },
};

const PUBLIC_BASE: &str = "https://cdn.test/insightbit";

pub fn config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        cors_origin: None,
        frontend_url: "http://localhost:5173".into(),
        backend_url: "http://localhost:8000".into(),
        production: false,
        otp_ttl_minutes: 10,
        oauth_tokens_in_url: false,
        jwt: JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            issuer: "insightbit".into(),
            audience: "insightbit-users".into(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 3600,
        },
        mail: MailConfig {
            smtp_host: "localhost".into(),
            smtp_port: 2525,
            username: None,
            password: None,
            from_name: "The InsightBit".into(),
        },
        storage: StorageConfig {
            endpoint: "http://localhost:9000".into(),
            bucket: "insightbit".into(),
            access_key: "test".into(),
            secret_key: "test".into(),
            region: "us-east-1".into(),
            public_url: PUBLIC_BASE.into(),
            root_folder: "the-insightbit".into(),
        },
        google: GoogleConfig {
            client_id: None,
            client_secret: None,
        },
    }
}

/// Verified `user` account without a password.
pub fn sample_user(user_name: &str, email: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        full_name: Some(user_name.to_string()),
        user_name: Some(user_name.to_string()),
        email: email.to_string(),
        password_hash: None,
        address: None,
        avatar_url: None,
        google_id: None,
        role: Role::User,
        refresh_token: None,
        is_email_verified: true,
        email_verification_otp: None,
        otp_expiry: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

/// All three stores over one set of vectors, so joins and cascades work.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let t = self.tables.lock().unwrap();
        t.users.iter().find(|u| u.email == email).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn post_count(&self) -> usize {
        self.tables.lock().unwrap().posts.len()
    }

    /// Moves the stored OTP expiry into the past.
    pub fn expire_otp(&self, email: &str) {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.email == email) {
            u.otp_expiry = Some(OffsetDateTime::now_utc() - time::Duration::minutes(1));
        }
    }

    fn with_author(t: &Tables, post: &Post) -> anyhow::Result<PostWithAuthor> {
        let author = t
            .users
            .iter()
            .find(|u| u.id == post.author_id)
            .ok_or_else(|| anyhow::anyhow!("dangling author"))?;
        Ok(PostWithAuthor {
            post: post.clone(),
            author: AuthorSummary {
                id: author.id,
                user_name: author.user_name.clone(),
                full_name: author.full_name.clone(),
                email: author.email.clone(),
            },
        })
    }
}

fn conflicts(existing: &User, candidate: &User) -> bool {
    existing.id != candidate.id
        && (existing.email == candidate.email
            || (candidate.user_name.is_some() && existing.user_name == candidate.user_name)
            || (candidate.google_id.is_some() && existing.google_id == candidate.google_id))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.user_by_email(email))
    }

    async fn find_by_email_or_username(
        &self,
        email: Option<&str>,
        user_name: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().unwrap();
        let by_email = email.and_then(|e| t.users.iter().find(|u| u.email == e));
        let by_name =
            user_name.and_then(|n| t.users.iter().find(|u| u.user_name.as_deref() == Some(n)));
        Ok(by_email.or(by_name).cloned())
    }

    async fn find_by_google_id(&self, google_id: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            full_name: new.full_name,
            user_name: new.user_name,
            email: new.email,
            password_hash: new.password_hash,
            address: new.address,
            avatar_url: new.avatar_url,
            google_id: new.google_id,
            role: new.role,
            refresh_token: None,
            is_email_verified: new.is_email_verified,
            email_verification_otp: new.email_verification_otp,
            otp_expiry: new.otp_expiry,
            created_at: now,
            updated_at: now,
        };
        let mut t = self.tables.lock().unwrap();
        anyhow::ensure!(
            !t.users.iter().any(|u| conflicts(u, &user)),
            "unique violation on users"
        );
        t.users.push(user.clone());
        Ok(user)
    }

    async fn update_fields(&self, user: &User, otp: OtpWrite) -> anyhow::Result<User> {
        let mut t = self.tables.lock().unwrap();
        anyhow::ensure!(
            !t.users.iter().any(|u| conflicts(u, user)),
            "unique violation on users"
        );
        let slot = t
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| anyhow::anyhow!("no user {}", user.id))?;
        let (stored_otp, stored_expiry) = match otp {
            OtpWrite::Replace => (user.email_verification_otp.clone(), user.otp_expiry),
            OtpWrite::Keep => (slot.email_verification_otp.clone(), slot.otp_expiry),
        };
        *slot = User {
            refresh_token: slot.refresh_token.clone(),
            email_verification_otp: stored_otp,
            otp_expiry: stored_expiry,
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(slot.clone())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.refresh_token = token.map(str::to_string);
        }
        Ok(())
    }
}

/// Mirrors the COALESCE update in `PgPostStore::update`.
fn apply_patch(patch: PostPatch, post: &mut Post) {
    if let Some(h) = patch.headline {
        post.headline = h;
    }
    if let Some(d) = patch.detail {
        post.detail = d;
    }
    if let Some(t) = patch.tags {
        post.tags = t;
    }
    if let Some(c) = patch.categories {
        post.categories = c;
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, new: NewPost) -> anyhow::Result<Post> {
        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: Uuid::new_v4(),
            headline: new.headline,
            detail: new.detail,
            media_url: new.media_url,
            media_type: new.media_type,
            tags: new.tags,
            categories: new.categories,
            author_id: new.author_id,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().unwrap().posts.push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<PostWithAuthor>> {
        let t = self.tables.lock().unwrap();
        t.posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| Self::with_author(&t, p))
            .transpose()
    }

    async fn list(&self, limit: Option<i64>) -> anyhow::Result<Vec<PostWithAuthor>> {
        let t = self.tables.lock().unwrap();
        let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        t.posts
            .iter()
            .rev()
            .take(limit)
            .map(|p| Self::with_author(&t, p))
            .collect()
    }

    async fn headlines(&self) -> anyhow::Result<Vec<Headline>> {
        let t = self.tables.lock().unwrap();
        Ok(t.posts
            .iter()
            .rev()
            .map(|p| Headline {
                id: p.id,
                headline: p.headline.clone(),
                media_url: p.media_url.clone(),
                created_at: p.created_at,
            })
            .collect())
    }

    async fn update(&self, id: Uuid, patch: PostPatch) -> anyhow::Result<Option<Post>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.posts.iter_mut().find(|p| p.id == id).map(|p| {
            apply_patch(patch, p);
            p.updated_at = OffsetDateTime::now_utc();
            p.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.posts.len();
        t.posts.retain(|p| p.id != id);
        t.comments.retain(|c| c.post_id != id);
        Ok(t.posts.len() < before)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create(&self, post_id: Uuid, user_id: Uuid, content: String) -> anyhow::Result<Comment> {
        let now = OffsetDateTime::now_utc();
        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            content,
            reply: String::new(),
            created_at: now,
            updated_at: now,
        };
        let mut t = self.tables.lock().unwrap();
        anyhow::ensure!(t.posts.iter().any(|p| p.id == post_id), "fk violation on comments");
        t.comments.push(comment.clone());
        Ok(comment)
    }

    async fn set_reply(&self, id: Uuid, reply: String) -> anyhow::Result<Option<Comment>> {
        let mut t = self.tables.lock().unwrap();
        Ok(t.comments.iter_mut().find(|c| c.id == id).map(|c| {
            c.reply = reply;
            c.updated_at = OffsetDateTime::now_utc();
            c.clone()
        }))
    }

    async fn list_by_post(&self, post_id: Uuid) -> anyhow::Result<Vec<CommentWithUser>> {
        let t = self.tables.lock().unwrap();
        t.comments
            .iter()
            .rev()
            .filter(|c| c.post_id == post_id)
            .map(|c| {
                let u = t
                    .users
                    .iter()
                    .find(|u| u.id == c.user_id)
                    .ok_or_else(|| anyhow::anyhow!("dangling comment user"))?;
                Ok(CommentWithUser {
                    comment: c.clone(),
                    user: CommentAuthor {
                        id: u.id,
                        user_name: u.user_name.clone(),
                        role: u.role,
                    },
                })
            })
            .collect()
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    deletes: AtomicUsize,
}

impl FakeStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().iter().any(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_puts.load(Ordering::SeqCst), "bucket unavailable");
        self.objects.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().retain(|k| k != key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(PUBLIC_BASE, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_under(PUBLIC_BASE, url)
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub code: String,
    pub purpose: OtpPurpose,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail_next: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .map(|m| m.code.clone())
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp(
        &self,
        to: &str,
        _full_name: Option<&str>,
        code: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(!self.fail_next.swap(false, Ordering::SeqCst), "smtp refused");
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            code: code.to_string(),
            purpose,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIdentity {
    profile: Mutex<Option<OAuthProfile>>,
    fail: AtomicBool,
}

impl FakeIdentity {
    pub fn set_profile(&self, profile: OAuthProfile) {
        *self.profile.lock().unwrap() = Some(profile);
    }

    pub fn fail_exchange(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        Ok(format!("https://identity.test/authorize?state={}", state))
    }

    async fn exchange_code(&self, _code: &str) -> anyhow::Result<OAuthProfile> {
        anyhow::ensure!(!self.fail.load(Ordering::SeqCst), "token endpoint returned 400");
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no profile configured"))
    }
}

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<FakeStorage>,
    pub identity: Arc<FakeIdentity>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let storage = Arc::new(FakeStorage::default());
    let identity = Arc::new(FakeIdentity::default());
    let state = AppState {
        config: Arc::new(config()),
        users: store.clone(),
        posts: store.clone(),
        comments: store.clone(),
        storage: storage.clone(),
        mailer: mailer.clone(),
        identity: identity.clone(),
    };
    Harness {
        state,
        store,
        mailer,
        storage,
        identity,
    }
}

impl Harness {
    /// Verified `user` account, with a hashed password when given.
    pub async fn seed_user(&self, user_name: &str, email: &str, password: Option<&str>) -> User {
        let password_hash = password.map(|p| hash_password(p).unwrap());
        UserStore::create(
            self.store.as_ref(),
            NewUser {
                full_name: Some(user_name.to_string()),
                user_name: Some(user_name.to_string()),
                email: email.to_string(),
                password_hash,
                is_email_verified: true,
                ..NewUser::default()
            },
        )
        .await
        .unwrap()
    }

    pub async fn seed_admin(&self, user_name: &str, email: &str) -> User {
        let mut admin = self.seed_user(user_name, email, Some("admin-pass")).await;
        admin.role = Role::Admin;
        self.store.update_fields(&admin, OtpWrite::Keep).await.unwrap()
    }

    pub async fn seed_post(&self, author: &User, headline: &str) -> Post {
        PostStore::create(
            self.store.as_ref(),
            NewPost {
                headline: headline.to_string(),
                detail: "body".into(),
                media_url: None,
                media_type: None,
                tags: vec![],
                categories: vec![],
                author_id: author.id,
            },
        )
        .await
        .unwrap()
    }

    pub fn bearer(&self, user: &User) -> String {
        JwtKeys::from(&self.state.config.jwt).sign_access(user).unwrap()
    }

    /// Issues and stores a pair the way a successful login does.
    pub async fn login(&self, user: &User) -> Session {
        let tokens = JwtKeys::from(&self.state.config.jwt).issue_pair(user).unwrap();
        self.store
            .set_refresh_token(user.id, Some(&tokens.refresh_token))
            .await
            .unwrap();
        Session {
            user: user.clone(),
            tokens,
        }
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `null` sends no body.
pub fn json_request(
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header("authorization", format!("Bearer {}", token));
    }
    if body.is_null() {
        return req.body(Body::empty()).unwrap();
    }
    req.header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Text fields plus an optional `(field, filename, content type, bytes)` file.
pub fn multipart_request(
    uri: &str,
    bearer: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &str, &[u8])>,
) -> Request<Body> {
    const BOUNDARY: &str = "----insightbit-test-boundary";
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header("authorization", format!("Bearer {}", bearer))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
