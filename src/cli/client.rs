use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::cli::config::{current_server, load_auth_config};

/// HTTP client bound to the selected server and its stored session
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// Client for the current server, authenticated when a session exists
    pub fn from_current() -> anyhow::Result<Self> {
        let (name, server) = current_server()?;
        let token = load_auth_config()?.sessions.remove(&name).map(|session| session.token);
        Ok(Self::new(server.url(), token))
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> anyhow::Result<Value> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.send(Method::PATCH, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.send(Method::DELETE, path, &[], None).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self.http.request(method, &url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Request to {} failed: {}", url, e))?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        unwrap_envelope(status, body)
    }
}

/// `data` of a success envelope, or an error built from the error body
pub fn unwrap_envelope(status: StatusCode, body: Value) -> anyhow::Result<Value> {
    if status.is_success() {
        return Ok(body.get("data").cloned().unwrap_or(body));
    }

    let message = body.get("message").and_then(Value::as_str).unwrap_or("request failed");
    let code = body.get("code").and_then(Value::as_str).unwrap_or("UNKNOWN");
    let mut error = format!("{} {}: {}", status.as_u16(), code, message);
    if let Some(Value::Object(fields)) = body.get("field_errors") {
        for (field, reason) in fields {
            error.push_str(&format!("\n  {}: {}", field, reason.as_str().unwrap_or_default()));
        }
    }
    Err(anyhow::anyhow!(error))
}
