//! HTTP request client for the swiftchat REST service.
//!
//! Routes (relative to the configured base URL):
//!
//! | Operation | Route |
//! |---|---|
//! | fetch_peers | `GET /messages/users` |
//! | fetch_history | `GET /messages/{peer}` |
//! | send_message | `POST /messages/send/{peer}` |
//! | mark_read | `PUT /messages/read/{peer}` |
//! | delete_message | `DELETE /messages/{id}` |
//! | edit_message | `PUT /messages/edit/{id}` |
//!
//! Authentication rides on the session cookie, so the client keeps a cookie
//! store. Every request is bounded by the configured timeout.

use super::ChatApi;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use swiftchat_types::{ApiError, Message, MessageId, OutgoingMessage, Peer, UserId};

use crate::config::ApiConfig;

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// [`ChatApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    /// Build a client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::other(format!("failed to build http client: {}", e)))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The base URL requests are made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Best effort: the body usually carries {"message": "..."}.
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|m| !m.is_empty());
        let mut error = ApiError::status(status.as_u16());
        error.message = message;
        Err(error)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(map_reqwest_error)
    }
}

/// Map a reqwest failure onto the engine's failure classes.
fn map_reqwest_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::timeout()
    } else if error.is_connect() || error.is_request() {
        ApiError::network().with_message(error.to_string())
    } else if let Some(status) = error.status() {
        ApiError::status(status.as_u16())
    } else if error.is_decode() {
        ApiError::other(format!("invalid response body: {}", error))
    } else {
        ApiError::other(error.to_string())
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_peers(&self) -> Result<Vec<Peer>, ApiError> {
        self.json(self.client.get(self.url("messages/users"))).await
    }

    async fn fetch_history(&self, peer: &UserId) -> Result<Vec<Message>, ApiError> {
        self.json(self.client.get(self.url(&format!("messages/{}", peer))))
            .await
    }

    async fn send_message(
        &self,
        to: &UserId,
        draft: &OutgoingMessage,
    ) -> Result<Message, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("messages/send/{}", to)))
            .json(draft);
        self.json(request).await
    }

    async fn mark_read(&self, peer: &UserId) -> Result<(), ApiError> {
        self.execute(self.client.put(self.url(&format!("messages/read/{}", peer))))
            .await
            .map(|_| ())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<(), ApiError> {
        self.execute(self.client.delete(self.url(&format!("messages/{}", id))))
            .await
            .map(|_| ())
    }

    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<Message, ApiError> {
        let request = self
            .client
            .put(self.url(&format!("messages/edit/{}", id)))
            .json(&serde_json::json!({ "text": text }));
        self.json(request).await
    }
}
