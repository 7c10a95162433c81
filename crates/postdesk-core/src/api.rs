//! Admin backend client.
//!
//! Every admin call carries `Authorization: Bearer <token>` and, when the
//! client store holds cookies, a `Cookie` header mirroring what a browser
//! would send.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::storage::ClientStore;

/// Shown for transport failures.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

/// Backend call failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Non-2xx response; `body` is shown to the user verbatim.
    Status { status: u16, body: String },
    /// Request never completed.
    Network(String),
    /// 2xx response that could not be decoded.
    Decode(String),
}

impl ApiError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { body, .. } => body.clone(),
            ApiError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            ApiError::Decode(detail) => format!("Unexpected response from server: {detail}"),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Status { status, body } => write!(f, "HTTP {status}: {}", body.trim()),
            ApiError::Network(e) => write!(f, "Network error: {e}"),
            ApiError::Decode(e) => write!(f, "Decode error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Row of the dashboard post table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Author", default)]
    pub author: String,
    #[serde(rename = "Created", default)]
    pub created: String,
    #[serde(rename = "Edited", default)]
    pub edited: String,
}

impl PostSummary {
    /// `YYYY-MM-DD` of the creation timestamp, or the raw value if unparseable.
    pub fn created_date(&self) -> String {
        chrono::DateTime::parse_from_rfc3339(&self.created)
            .map_or_else(|_| self.created.clone(), |at| at.format("%Y-%m-%d").to_string())
    }
}

/// Single post as returned for editing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Post {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// Metadata-only update body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostUpdate {
    pub title: String,
    pub description: String,
}

/// A file picked or dropped onto a drop zone.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub contents: Bytes,
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        let contents = contents.into();
        Self {
            name: name.into(),
            size: contents.len() as u64,
            contents,
        }
    }

    /// Reads a file from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, contents))
    }

    /// `Selected: <name> (<size> KB)` with one decimal.
    pub fn info_label(&self) -> String {
        format!("Selected: {} ({:.1} KB)", self.name, self.size as f64 / 1024.0)
    }
}

/// Multipart upload for create, or edit with a replacement file.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub title: String,
    pub excerpt: String,
    pub file: SelectedFile,
    /// Post id when replacing an existing post's file.
    pub edit_id: Option<String>,
}

/// HTTP client for the admin backend.
#[derive(Debug, Clone)]
pub struct AdminApi {
    http: reqwest::Client,
    base_url: String,
    store: Arc<ClientStore>,
}

impl AdminApi {
    pub fn new(base_url: &str, store: Arc<ClientStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `/admin/posts/{id}` with the id as one escaped path segment.
    fn post_url(&self, id: &str) -> Result<String, ApiError> {
        let mut url = url::Url::parse(&self.url("/admin/posts"))
            .map_err(|e| ApiError::Network(format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Network(format!("Invalid base URL: {}", self.base_url)))?
            .push(id);
        Ok(String::from(url))
    }

    fn with_cookies(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.cookie_header() {
            Some(cookies) => request.header(reqwest::header::COOKIE, cookies),
            None => request,
        }
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        self.with_cookies(request).bearer_auth(token)
    }

    /// Authorization check: `Ok(())` only on 2xx.
    pub async fn verify(&self, token: &str, email: &str) -> Result<(), ApiError> {
        tracing::debug!("POST /admin/verify");
        let request = self
            .http
            .post(self.url("/admin/verify"))
            .json(&serde_json::json!({ "email": email }));
        let response = self.authorized(request, token).send().await?;
        ensure_success(response).await.map(drop)
    }

    pub async fn list_posts(&self, token: &str) -> Result<Vec<PostSummary>, ApiError> {
        tracing::debug!("GET /admin/posts");
        let request = self.http.get(self.url("/admin/posts"));
        let response = ensure_success(self.authorized(request, token).send().await?).await?;
        let posts: Option<Vec<PostSummary>> = response.json().await?;
        Ok(posts.unwrap_or_default())
    }

    pub async fn get_post(&self, token: &str, id: &str) -> Result<Post, ApiError> {
        tracing::debug!(id, "GET /admin/posts/{{id}}");
        let request = self.http.get(self.post_url(id)?);
        let response = ensure_success(self.authorized(request, token).send().await?).await?;
        Ok(response.json().await?)
    }

    /// Multipart create/replace via the upload endpoint.
    pub async fn upload_post(&self, token: &str, form: UploadForm) -> Result<(), ApiError> {
        tracing::debug!(edit = form.edit_id.is_some(), "POST /admin/posts/upload");
        let part = Part::bytes(form.file.contents.to_vec())
            .file_name(form.file.name.clone())
            .mime_str("text/html")
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let mut multipart = Form::new()
            .text("title", form.title)
            .text("excerpt", form.excerpt)
            .part("htmlFile", part);
        if let Some(id) = form.edit_id {
            multipart = multipart.text("editMode", "true").text("postId", id);
        }
        multipart = multipart.text("authToken", token.to_string());

        let request = self
            .http
            .post(self.url("/admin/posts/upload"))
            .multipart(multipart);
        let response = self.authorized(request, token).send().await?;
        ensure_success(response).await.map(drop)
    }

    /// Metadata-only update.
    pub async fn update_post(&self, token: &str, id: &str, update: &PostUpdate) -> Result<(), ApiError> {
        tracing::debug!(id, "PUT /admin/posts/{{id}}");
        let request = self
            .http
            .put(self.post_url(id)?)
            .json(update);
        let response = self.authorized(request, token).send().await?;
        ensure_success(response).await.map(drop)
    }

    pub async fn delete_post(&self, token: &str, id: &str) -> Result<(), ApiError> {
        tracing::debug!(id, "DELETE /admin/posts/{{id}}");
        let request = self.http.delete(self.post_url(id)?);
        let response = self.authorized(request, token).send().await?;
        ensure_success(response).await.map(drop)
    }

    /// Public, unauthenticated url-encoded form post.
    pub async fn post_form(&self, path: &str, params: &[(String, String)]) -> Result<(), ApiError> {
        tracing::debug!(path, "POST form");
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        let request = self
            .http
            .post(self.url(path))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body);
        let response = self.with_cookies(request).send().await?;
        ensure_success(response).await.map(drop)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}
