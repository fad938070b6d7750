use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{multipart, Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::core::config::{normalize_base_url, ApiConfig};
use crate::core::io::Storage;
use crate::services::models::*;

pub const AUTH_KEY: &str = "cms_auth_v1";
pub const LAST_BLOG_KEY: &str = "cms_last_blog_id";

/// The one error type surfaced by the HTTP boundary. `Display` is always a
/// message fit to show next to the control that triggered the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// What to show for a failed action: the server's own message, or
    /// `fallback` when the request never got a usable answer.
    pub fn for_action(self, fallback: &str) -> anyhow::Error {
        match self {
            ApiError::Server { message, .. } if !message.is_empty() => anyhow::anyhow!(message),
            other => {
                debug!("{}: {}", fallback, other);
                anyhow::anyhow!(fallback.to_string())
            }
        }
    }
}

/// Pulls a human-readable message out of a failed response body: `detail`,
/// then `message`, then the JSON itself, then raw text, then `HTTP <status>`.
pub fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if is_blank(&value) {
            return format!("HTTP {}", status);
        }
        for key in ["detail", "message"] {
            match value.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(other) if !is_blank(other) => return other.to_string(),
                _ => {}
            }
        }
        return value.to_string();
    }
    let text = body.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    format!("HTTP {}", status)
}

// Values a falsy check would skip.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
}

impl ApiResponse {
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            ApiResponse::Json(value) => {
                serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
            }
            ApiResponse::Text(text) => {
                serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{}: {}", e, text)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    /// Attach the stored bearer token when one exists.
    pub auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { auth: true }
    }
}

enum RequestBody {
    Empty,
    Json(Value),
    File {
        field: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Persists the login response and the last generated post id in client
/// storage, and keeps the token in memory for request signing.
pub struct AuthStore {
    storage: Arc<dyn Storage>,
    folder: String,
    token: RwLock<Option<AuthToken>>,
}

impl AuthStore {
    pub fn new(storage: Arc<dyn Storage>, folder: &str) -> Self {
        Self {
            storage,
            folder: folder.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        }
    }

    fn key_path(&self, key: &str) -> String {
        if self.folder.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}.json", self.folder, key)
        }
    }

    /// Loads a previously stored login. Unreadable entries count as logged out.
    pub async fn restore(&self) -> anyhow::Result<Option<AuthToken>> {
        let path = self.key_path(AUTH_KEY);
        if !self.storage.exists(&path).await? {
            return Ok(None);
        }
        let bytes = self.storage.read(&path).await?;
        let token = match serde_json::from_slice::<AuthToken>(&bytes) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("Ignoring unreadable stored auth: {}", e);
                None
            }
        };
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token.clone();
        Ok(token)
    }

    pub async fn store(&self, token: AuthToken) -> anyhow::Result<()> {
        let content = serde_json::to_vec(&token)?;
        self.storage.write(&self.key_path(AUTH_KEY), &content).await?;
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        Ok(())
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        self.storage.delete(&self.key_path(AUTH_KEY)).await?;
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    pub fn current(&self) -> Option<AuthToken> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current()
            .map(|t| t.access_token)
            .filter(|t| !t.is_empty())
    }

    pub async fn set_last_blog_id(&self, id: &str) -> anyhow::Result<()> {
        let content = serde_json::to_vec(id)?;
        self.storage.write(&self.key_path(LAST_BLOG_KEY), &content).await
    }

    pub async fn last_blog_id(&self) -> anyhow::Result<Option<String>> {
        let path = self.key_path(LAST_BLOG_KEY);
        if !self.storage.exists(&path).await? {
            return Ok(None);
        }
        let bytes = self.storage.read(&path).await?;
        Ok(serde_json::from_slice::<String>(&bytes).ok())
    }
}

/// Thin fetch wrapper: base URL joining, bearer injection, JSON and multipart
/// bodies, content-type driven decoding.
pub struct ApiClient {
    base_url: String,
    client: Client,
    auth: Arc<AuthStore>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, auth: Arc<AuthStore>) -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        #[cfg(target_arch = "wasm32")]
        let client = Client::new();

        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            client,
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        self.post_with(path, body, RequestOptions::default()).await
    }

    pub async fn post_with<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let json = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(Method::POST, path, RequestBody::Json(json), options)
            .await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ApiResponse, ApiError> {
        let json = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(Method::PUT, path, RequestBody::Json(json), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, path, RequestBody::Empty, RequestOptions::default())
            .await
    }

    pub async fn upload_file(
        &self,
        path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ApiResponse, ApiError> {
        let body = RequestBody::File {
            field: "file".to_string(),
            file_name: file_name.to_string(),
            bytes,
        };
        self.request(Method::POST, path, body, RequestOptions::default())
            .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, &url);
        if options.auth {
            if let Some(token) = self.auth.access_token() {
                builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
            }
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(json) => builder.json(&json),
            RequestBody::File {
                field,
                file_name,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes).file_name(file_name);
                builder.multipart(multipart::Form::new().part(field, part))
            }
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = extract_error_message(status.as_u16(), &text);
            debug!("{} failed with {}: {}", url, status, message);
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        if content_type.contains("application/json") {
            let value = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?
            };
            Ok(ApiResponse::Json(value))
        } else {
            Ok(ApiResponse::Text(text))
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub trait ApiBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> ApiBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait ApiBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> ApiBounds for T {}

/// Typed view of every backend endpoint the client consumes.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait BlogApi: ApiBounds {
    async fn login(&self, req: &LoginRequest) -> Result<AuthToken, ApiError>;
    async fn signup(&self, req: &SignupRequest) -> Result<AuthToken, ApiError>;

    async fn list_blogs(&self, page: u32, limit: u32) -> Result<BlogPage, ApiError>;
    async fn get_blog(&self, id: &str) -> Result<BlogRecord, ApiError>;
    async fn save_blog(&self, req: &BlogCreateRequest) -> Result<SavedBlog, ApiError>;
    async fn update_blog(&self, id: &str, req: &BlogCreateRequest) -> Result<(), ApiError>;
    async fn delete_blog(&self, id: &str) -> Result<(), ApiError>;
    async fn request_publish(&self, id: &str) -> Result<(), ApiError>;
    async fn stats(&self) -> Result<BlogStats, ApiError>;

    async fn topic_ideas(&self, req: &TopicIdeasRequest) -> Result<Vec<String>, ApiError>;
    async fn generate_titles(&self, ctx: &GenerationContext) -> Result<Vec<String>, ApiError>;
    async fn generate_intros(&self, ctx: &GenerationContext) -> Result<Vec<String>, ApiError>;
    async fn generate_outlines(
        &self,
        ctx: &GenerationContext,
    ) -> Result<Vec<Vec<String>>, ApiError>;
    async fn generate_blog(&self, req: &GenerateBlogRequest) -> Result<FinalBlog, ApiError>;
    async fn generate_image(&self, req: &ImageGenerateRequest)
        -> Result<GeneratedImage, ApiError>;

    async fn list_images(&self, limit: u32, source: Option<&str>) -> Result<ImagePage, ApiError>;
    async fn save_image(&self, req: &ImageSaveRequest) -> Result<(), ApiError>;
    async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError>;
}

pub struct HttpBlogApi {
    client: ApiClient,
}

impl HttpBlogApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

fn query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

// Form encoding writes spaces as '+' and escapes literal '+', so swapping
// gives a valid path segment.
fn path_segment(value: &str) -> String {
    query_value(value).replace('+', "%20")
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl BlogApi for HttpBlogApi {
    async fn login(&self, req: &LoginRequest) -> Result<AuthToken, ApiError> {
        self.client
            .post_with("/auth/login", req, RequestOptions { auth: false })
            .await?
            .into_json()
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthToken, ApiError> {
        self.client
            .post_with("/auth/signup", req, RequestOptions { auth: false })
            .await?
            .into_json()
    }

    async fn list_blogs(&self, page: u32, limit: u32) -> Result<BlogPage, ApiError> {
        self.client
            .get(&format!("/blog?page={}&limit={}", page, limit))
            .await?
            .into_json()
    }

    async fn get_blog(&self, id: &str) -> Result<BlogRecord, ApiError> {
        self.client
            .get(&format!("/blogs/{}", path_segment(id)))
            .await?
            .into_json()
    }

    async fn save_blog(&self, req: &BlogCreateRequest) -> Result<SavedBlog, ApiError> {
        self.client.post("/blog", req).await?.into_json()
    }

    async fn update_blog(&self, id: &str, req: &BlogCreateRequest) -> Result<(), ApiError> {
        self.client.put(&format!("/blogs/{}", path_segment(id)), req).await?;
        Ok(())
    }

    async fn delete_blog(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("/blogs/{}", path_segment(id))).await?;
        Ok(())
    }

    async fn request_publish(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .post(&format!("/blogs/{}/publish-request", path_segment(id)), &Value::Null)
            .await?;
        Ok(())
    }

    async fn stats(&self) -> Result<BlogStats, ApiError> {
        self.client.get("/blogs/stats").await?.into_json()
    }

    async fn topic_ideas(&self, req: &TopicIdeasRequest) -> Result<Vec<String>, ApiError> {
        let resp: OptionsResponse = self.client.post("/ai/ideas", req).await?.into_json()?;
        Ok(resp.options)
    }

    async fn generate_titles(&self, ctx: &GenerationContext) -> Result<Vec<String>, ApiError> {
        let resp: OptionsResponse = self.client.post("/ai/titles", ctx).await?.into_json()?;
        Ok(resp.options)
    }

    async fn generate_intros(&self, ctx: &GenerationContext) -> Result<Vec<String>, ApiError> {
        let resp: OptionsResponse = self.client.post("/ai/intros", ctx).await?.into_json()?;
        Ok(resp.options)
    }

    async fn generate_outlines(
        &self,
        ctx: &GenerationContext,
    ) -> Result<Vec<Vec<String>>, ApiError> {
        let resp: OutlineOptionsResponse =
            self.client.post("/ai/outlines", ctx).await?.into_json()?;
        Ok(resp.options.into_iter().map(|o| o.outline).collect())
    }

    async fn generate_blog(&self, req: &GenerateBlogRequest) -> Result<FinalBlog, ApiError> {
        self.client
            .post("/ai/blog-generate", req)
            .await?
            .into_json()
    }

    async fn generate_image(
        &self,
        req: &ImageGenerateRequest,
    ) -> Result<GeneratedImage, ApiError> {
        self.client
            .post("/ai/image-generate", req)
            .await?
            .into_json()
    }

    async fn list_images(&self, limit: u32, source: Option<&str>) -> Result<ImagePage, ApiError> {
        let mut path = format!("/images?limit={}", limit);
        if let Some(source) = source {
            path.push_str("&source=");
            path.push_str(&query_value(source));
        }
        self.client.get(&path).await?.into_json()
    }

    async fn save_image(&self, req: &ImageSaveRequest) -> Result<(), ApiError> {
        self.client.post("/images/save", req).await?;
        Ok(())
    }

    async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        let resp: UploadedImage = self
            .client
            .upload_file("/blogs/uploads/images", file_name, bytes)
            .await?
            .into_json()?;
        Ok(resp.image_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_detail_then_message() {
        assert_eq!(
            extract_error_message(404, r#"{"detail": "Blog not found"}"#),
            "Blog not found"
        );
        assert_eq!(
            extract_error_message(400, r#"{"message": "Bad input"}"#),
            "Bad input"
        );
        assert_eq!(
            extract_error_message(422, r#"{"detail": [{"msg": "field required"}]}"#),
            r#"[{"msg":"field required"}]"#
        );
        assert_eq!(extract_error_message(500, r#"{"oops": 1}"#), r#"{"oops":1}"#);
    }

    #[test]
    fn test_error_message_falls_back_to_text_then_status() {
        assert_eq!(extract_error_message(502, "Bad Gateway\n"), "Bad Gateway");
        assert_eq!(extract_error_message(503, "   "), "HTTP 503");
        assert_eq!(extract_error_message(500, "null"), "HTTP 500");
        assert_eq!(extract_error_message(500, r#""""#), "HTTP 500");
    }

    #[test]
    fn test_error_message_skips_empty_values() {
        assert_eq!(
            extract_error_message(400, r#"{"detail": "", "message": "Bad input"}"#),
            "Bad input"
        );
        assert_eq!(
            extract_error_message(400, r#"{"detail": false, "message": "Bad input"}"#),
            "Bad input"
        );
        assert_eq!(
            extract_error_message(400, r#"{"detail": 0, "message": null}"#),
            r#"{"detail":0,"message":null}"#
        );
    }

    #[test]
    fn test_server_error_displays_message_only() {
        let err = ApiError::Server {
            status: 403,
            message: "Not allowed".into(),
        };
        assert_eq!(err.to_string(), "Not allowed");
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_response_decoding() {
        let page: BlogPage = ApiResponse::Json(serde_json::json!({"items": [], "total": 0}))
            .into_json()
            .unwrap();
        assert_eq!(page.total, Some(0));

        let text: Result<BlogPage, _> = ApiResponse::Text("<html>".into()).into_json();
        assert!(matches!(text, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_query_value_encoding() {
        assert_eq!(query_value("a b&c"), "a+b%26c");
        assert_eq!(path_segment("65f0a1"), "65f0a1");
        assert_eq!(path_segment("a b+c/d"), "a%20b%2Bc%2Fd");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_auth_store_persists_and_restores() {
        use crate::core::io::NativeStorage;

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_str().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());

        let store = AuthStore::new(storage.clone(), folder);
        assert!(store.restore().await.unwrap().is_none());
        store
            .store(AuthToken {
                access_token: "abc".into(),
                token_type: "bearer".into(),
                user: None,
            })
            .await
            .unwrap();
        store.set_last_blog_id("b-42").await.unwrap();

        let fresh = AuthStore::new(storage.clone(), folder);
        assert_eq!(fresh.access_token(), None);
        fresh.restore().await.unwrap();
        assert_eq!(fresh.access_token().as_deref(), Some("abc"));
        assert_eq!(fresh.last_blog_id().await.unwrap().as_deref(), Some("b-42"));

        fresh.logout().await.unwrap();
        assert!(fresh.access_token().is_none());
        assert!(AuthStore::new(storage, folder).restore().await.unwrap().is_none());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_corrupt_auth_entry_is_logged_out() {
        use crate::core::io::NativeStorage;

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_str().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
        storage
            .write(&format!("{}/{}.json", folder, AUTH_KEY), b"not json")
            .await
            .unwrap();

        let store = AuthStore::new(storage, folder);
        assert!(store.restore().await.unwrap().is_none());
    }
}
