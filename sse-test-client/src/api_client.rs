use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::Value;

pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Status and decoded body of one `POST /message`.
#[derive(Debug)]
pub struct PostResult {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn post_message(&self, session_id: Option<&str>, payload: &Value) -> Result<PostResult> {
        let url = format!("{}/message", self.base_url);
        let mut request = self.client.post(&url).json(payload);
        if let Some(session_id) = session_id {
            request = request.query(&[("sessionId", session_id)]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.json().await.unwrap_or(Value::Null);

        Ok(PostResult { status, body })
    }
}
