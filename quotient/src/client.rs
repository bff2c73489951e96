//! Remote service client for the storefront backend.
//!
//! - Upload: REST multipart with bearer-style `Authorization: JWT <token>`
//! - Status / detail / listing: GraphQL queries over POST
//! - Transport and application failures are distinct: the poll loop
//!   retries both, but only application failures carry a backend message

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::credentials::CredentialProvider;
use crate::protocol::{
    GraphQlEnvelope, MY_QUOTES, MyQuotesData, QUOTE_ANALYSIS, QUOTE_STATUS, QuoteData,
    QuoteDetailData, QuoteDetailRecord, QuoteRecord, SubmittedQuote, UploadErrorBody,
    UploadResponse,
};

pub const QUOTIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network or HTTP-level failure. Never terminal for a polled quote.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Failure reported by the backend itself.
    #[error("{0}")]
    Application(String),
    /// Response body did not match the stated shape.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Abstract backend collaborator. The poller and service depend on this
/// rather than on a concrete HTTP client.
#[async_trait]
pub trait QuoteApi: Send + Sync {
    /// Submit a quote document for analysis.
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        demo_mode: bool,
    ) -> Result<SubmittedQuote, ApiError>;

    /// Lightweight status snapshot for one quote.
    async fn status(&self, id: &str) -> Result<QuoteRecord, ApiError>;

    /// Full detail record, including items and match candidates.
    async fn detail(&self, id: &str) -> Result<QuoteDetailRecord, ApiError>;

    /// All quotes submitted by the current caller.
    async fn list(&self) -> Result<Vec<QuoteRecord>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct ApiClient {
    config: ApiConfig,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();

        let user_agent = format!("quotient/{}", QUOTIENT_VERSION);
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&user_agent) {
            headers.insert(reqwest::header::USER_AGENT, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            credentials,
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Attach `Authorization: JWT <token>` when credentials hold a token.
    /// Read per request so a login mid-session takes effect immediately.
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.token() {
            Some(token) => request.header(
                reqwest::header::AUTHORIZATION,
                format!("JWT {token}"),
            ),
            None => request,
        }
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .authorize(self.client.post(self.endpoint("/graphql/")))
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Application(format!(
                "query failed: {}",
                status.canonical_reason().unwrap_or("request failed")
            )));
        }

        let text = response.text().await?;
        let envelope: GraphQlEnvelope<T> =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let joined = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::Application(joined));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::Decode("response missing data".to_string()))
    }
}

#[async_trait]
impl QuoteApi for ApiClient {
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        demo_mode: bool,
    ) -> Result<SubmittedQuote, ApiError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime.as_ref())?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("demoMode", demo_mode.to_string());

        let response = self
            .authorize(self.client.post(self.endpoint("/upload-quote/")))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Best available message: body `message`, else `detail`,
            // else the HTTP status text.
            let body = response.json::<UploadErrorBody>().await.unwrap_or_default();
            let message = body.message.or(body.detail).unwrap_or_else(|| {
                format!(
                    "Upload failed: {}",
                    status.canonical_reason().unwrap_or("request failed")
                )
            });
            return Err(ApiError::Application(message));
        }

        let text = response.text().await?;
        let body: UploadResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;

        if !body.success {
            return Err(ApiError::Application(
                body.message
                    .unwrap_or_else(|| "upload rejected by backend".to_string()),
            ));
        }

        body.quote
            .ok_or_else(|| ApiError::Decode("upload response missing quote".to_string()))
    }

    async fn status(&self, id: &str) -> Result<QuoteRecord, ApiError> {
        let data: QuoteData = self
            .graphql(QUOTE_STATUS, serde_json::json!({ "id": id }))
            .await?;
        data.quote
            .ok_or_else(|| ApiError::Application(format!("quote {id} not found")))
    }

    async fn detail(&self, id: &str) -> Result<QuoteDetailRecord, ApiError> {
        let data: QuoteDetailData = self
            .graphql(QUOTE_ANALYSIS, serde_json::json!({ "id": id }))
            .await?;
        data.quote
            .ok_or_else(|| ApiError::Application(format!("quote {id} not found")))
    }

    async fn list(&self) -> Result<Vec<QuoteRecord>, ApiError> {
        let data: MyQuotesData = self.graphql(MY_QUOTES, serde_json::json!({})).await?;
        Ok(data.my_quotes)
    }
}
