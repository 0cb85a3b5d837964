use std::future::Future;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use workdesk_types::api::{
    ConversationResponse, ErrorBody, MarkReadResponse, SendMessageRequest, SendMessageResponse,
};
use workdesk_types::models::Message;

use crate::error::SyncError;

/// The calls a polling client makes against the messaging API.
pub trait MessagingClient: Send + Sync {
    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationResponse>, SyncError>> + Send;

    fn list_messages(
        &self,
        conversation_key: &str,
    ) -> impl Future<Output = Result<Vec<Message>, SyncError>> + Send;

    fn mark_conversation_read(
        &self,
        conversation_key: &str,
    ) -> impl Future<Output = Result<u32, SyncError>> + Send;

    fn send_message(
        &self,
        req: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageResponse, SyncError>> + Send;
}

/// reqwest-backed client authenticating with the caller's bearer token.
#[derive(Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, SyncError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Map non-2xx responses to [`SyncError::Api`], keeping the server's error kind.
async fn check(resp: Response) -> Result<Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let (kind, message) = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => (err.error, err.message),
        Err(_) => ("UNKNOWN".to_string(), body),
    };
    Err(SyncError::Api {
        status: status.as_u16(),
        kind,
        message,
    })
}

impl MessagingClient for HttpClient {
    async fn list_conversations(&self) -> Result<Vec<ConversationResponse>, SyncError> {
        self.send(self.http.get(self.url("/conversations"))).await
    }

    async fn list_messages(&self, conversation_key: &str) -> Result<Vec<Message>, SyncError> {
        let path = format!("/conversations/{}/messages", conversation_key);
        self.send(self.http.get(self.url(&path))).await
    }

    async fn mark_conversation_read(&self, conversation_key: &str) -> Result<u32, SyncError> {
        let path = format!("/conversations/{}/read", conversation_key);
        let resp: MarkReadResponse = self.send(self.http.post(self.url(&path))).await?;
        Ok(resp.updated)
    }

    async fn send_message(&self, req: &SendMessageRequest) -> Result<SendMessageResponse, SyncError> {
        self.send(self.http.post(self.url("/messages")).json(req)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = HttpClient::new("http://portal.local:3000/", "t");
        assert_eq!(client.url("/conversations"), "http://portal.local:3000/conversations");
    }

    #[test]
    fn client_errors_are_rejections() {
        let err = SyncError::Api {
            status: 403,
            kind: "AUTHORIZATION".into(),
            message: "not a participant".into(),
        };
        assert!(err.is_rejection());
        assert!(!SyncError::Stopped.is_rejection());
    }
}
