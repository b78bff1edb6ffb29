//! HTTP implementation of the forum gateway.
//!
//! Sends the instance API key on every request and the caller's bearer
//! token when one is supplied.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use showcase_common::{AppError, AppResult, config::ForumConfig};
use tracing::debug;
use url::Url;

use crate::gateway::ForumGateway;
use crate::models::{
    AuthToken, ForumUser, LoginInput, NewReport, NewThread, Page, Reaction, ReactionKind,
    RegisterInput, Report, ReportQuery, ReportStatus, Thread, ThreadQuery,
};

/// Header carrying the instance API key.
const API_KEY_HEADER: &str = "x-api-key";

/// reqwest-backed [`ForumGateway`].
#[derive(Clone)]
pub struct HttpForumClient {
    client: Client,
    base_url: Url,
    api_key: String,
    user_agent: String,
}

impl HttpForumClient {
    /// Create a new client from configuration.
    pub fn new(config: &ForumConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("Invalid forum base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "Forum base URL cannot carry paths: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            user_agent: format!("showcase-rs/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Build an absolute URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Config("Forum base URL cannot carry paths".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&str>,
    ) -> AppResult<RequestBuilder> {
        let url = self.url(segments)?;
        debug!(method = %method, url = %url, authenticated = token.is_some(), "Forum request");

        let mut builder = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn dispatch(builder: RequestBuilder) -> AppResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Forum request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, retry_after, &body))
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> AppResult<T> {
        Self::dispatch(builder)
            .await?
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse forum response: {e}")))
    }
}

/// Map a non-success forum response onto the application error taxonomy.
#[must_use]
pub fn error_for_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> AppError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::BadRequest(message),
        StatusCode::UNAUTHORIZED => AppError::Unauthorized,
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(retry_after),
        _ => AppError::ExternalService(format!("Forum API error: {status} - {message}")),
    }
}

#[async_trait]
impl ForumGateway for HttpForumClient {
    async fn me(&self, token: &str) -> AppResult<ForumUser> {
        Self::send(self.request(Method::GET, &["auth", "me"], Some(token))?).await
    }

    async fn login(&self, input: LoginInput) -> AppResult<AuthToken> {
        Self::send(self.request(Method::POST, &["auth", "login"], None)?.json(&input)).await
    }

    async fn register(&self, input: RegisterInput) -> AppResult<ForumUser> {
        Self::send(self.request(Method::POST, &["auth", "register"], None)?.json(&input)).await
    }

    async fn create_thread(&self, token: Option<&str>, input: NewThread) -> AppResult<Thread> {
        Self::send(self.request(Method::POST, &["threads"], token)?.json(&input)).await
    }

    async fn list_threads(
        &self,
        token: Option<&str>,
        query: ThreadQuery,
    ) -> AppResult<Page<Thread>> {
        Self::send(self.request(Method::GET, &["threads"], token)?.query(&query)).await
    }

    async fn retrieve_thread(&self, token: Option<&str>, id: &str) -> AppResult<Thread> {
        Self::send(self.request(Method::GET, &["threads", id], token)?).await
    }

    async fn update_thread(
        &self,
        token: Option<&str>,
        id: &str,
        extended_data: Value,
    ) -> AppResult<Thread> {
        let body = json!({ "extendedData": extended_data });
        Self::send(self.request(Method::PATCH, &["threads", id], token)?.json(&body)).await
    }

    async fn list_reactions(
        &self,
        token: Option<&str>,
        thread_id: &str,
        cursor: Option<String>,
    ) -> AppResult<Page<Reaction>> {
        let mut builder = self.request(Method::GET, &["threads", thread_id, "reactions"], token)?;
        if let Some(cursor) = cursor {
            builder = builder.query(&[("cursor", cursor)]);
        }
        Self::send(builder).await
    }

    async fn create_reaction(
        &self,
        token: Option<&str>,
        thread_id: &str,
        kind: ReactionKind,
    ) -> AppResult<Reaction> {
        let body = json!({ "type": kind });
        Self::send(
            self.request(Method::POST, &["threads", thread_id, "reactions"], token)?
                .json(&body),
        )
        .await
    }

    async fn delete_reaction(
        &self,
        token: Option<&str>,
        thread_id: &str,
        reaction_id: &str,
    ) -> AppResult<()> {
        Self::dispatch(self.request(
            Method::DELETE,
            &["threads", thread_id, "reactions", reaction_id],
            token,
        )?)
        .await?;
        Ok(())
    }

    async fn create_report(&self, token: Option<&str>, input: NewReport) -> AppResult<Report> {
        Self::send(self.request(Method::POST, &["reports"], token)?.json(&input)).await
    }

    async fn list_reports(
        &self,
        token: Option<&str>,
        query: ReportQuery,
    ) -> AppResult<Page<Report>> {
        Self::send(self.request(Method::GET, &["reports"], token)?.query(&query)).await
    }

    async fn update_report(
        &self,
        token: Option<&str>,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Report> {
        let body = json!({ "status": status });
        Self::send(self.request(Method::PATCH, &["reports", id], token)?.json(&body)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ForumConfig {
        ForumConfig {
            base_url: base_url.to_string(),
            api_key: "key".to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 5,
            page_size: 50,
        }
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = HttpForumClient::new(&config("https://forum.example.com/api/v1/")).unwrap();
        let url = client.url(&["threads", "a/b c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://forum.example.com/api/v1/threads/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            HttpForumClient::new(&config("not a url")),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            HttpForumClient::new(&config("mailto:admin@example.com")),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_error_for_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, None, r#"{"message":"Thread not found"}"#),
            AppError::NotFound(msg) if msg == "Thread not found"
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(30), ""),
            AppError::RateLimited(Some(30))
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, None, ""),
            AppError::Unauthorized
        ));
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, None, "duplicate"),
            AppError::Conflict(msg) if msg == "duplicate"
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None, ""),
            AppError::ExternalService(_)
        ));
    }
}
