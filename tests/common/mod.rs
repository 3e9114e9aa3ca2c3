#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

use catalog_api::config::{AppConfig, Environment};
use catalog_api::database::MemoryStore;
use catalog_api::server::{router, AppState};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// In-process server on a free port, backed by a fresh in-memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::for_environment(Environment::Development);
        config.server.port = port;
        config.bootstrap.admin_username = Some(ADMIN_USERNAME.to_string());
        config.bootstrap.admin_password = Some(ADMIN_PASSWORD.to_string());

        let state = AppState::new(config, Arc::new(MemoryStore::new()));
        state.accounts.bootstrap(&state.config.bootstrap).await?;

        let listener = tokio::net::TcpListener::bind(state.config.bind_address())
            .await
            .context("failed to bind test listener")?;
        let app = router(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<Response> {
        Ok(self.request(Method::GET, path, token).send().await?)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Result<Response> {
        Ok(self.request(Method::POST, path, token).json(body).send().await?)
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: &Value) -> Result<Response> {
        Ok(self.request(Method::PUT, path, token).json(body).send().await?)
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: &Value) -> Result<Response> {
        Ok(self.request(Method::PATCH, path, token).json(body).send().await?)
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<Response> {
        Ok(self.request(Method::DELETE, path, token).send().await?)
    }

    /// POST /auth/login and return the token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let res = self
            .post("/auth/login", None, &json!({ "username": username, "password": password }))
            .await?;
        let status = res.status();
        let body = res.json::<Value>().await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed ({}): {}", status, body);
        body["data"]["token"]
            .as_str()
            .map(str::to_string)
            .context("login response missing token")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Register a user, have the admin assign their roles, and log in as them
    pub async fn user_with_roles(&self, username: &str, roles: &[&str]) -> Result<String> {
        let password = format!("{}-password", username);
        let res = self
            .post(
                "/api/users/",
                None,
                &json!({ "username": username, "password": password }),
            )
            .await?;
        let status = res.status();
        anyhow::ensure!(status == StatusCode::CREATED, "user create failed: {}", status);
        let id = data(res).await?["_id"]
            .as_str()
            .map(str::to_string)
            .context("user create response missing _id")?;

        let admin = self.admin_token().await?;
        let res = self
            .patch(&format!("/api/users/{}/", id), Some(&admin), &json!({ "roles": roles }))
            .await?;
        let status = res.status();
        anyhow::ensure!(status == StatusCode::OK, "role assignment failed: {}", status);

        self.login(username, &password).await
    }

    /// Create a record and return its `data` body, failing on any non-201
    pub async fn create(&self, resource: &str, token: &str, body: Value) -> Result<Value> {
        let res = self.post(&format!("/api/{}/", resource), Some(token), &body).await?;
        let status = res.status();
        let body = res.json::<Value>().await?;
        anyhow::ensure!(
            status == StatusCode::CREATED,
            "create {} failed ({}): {}",
            resource,
            status,
            body
        );
        Ok(body["data"].clone())
    }

    /// GET a path and return its `data` body
    pub async fn fetch(&self, path: &str, token: Option<&str>) -> Result<Value> {
        data(self.get(path, token).await?).await
    }
}

/// Unwrap the success envelope, asserting it is well formed
pub async fn data(res: Response) -> Result<Value> {
    let body = res.json::<Value>().await?;
    anyhow::ensure!(body["success"] == json!(true), "success flag false or missing: {}", body);
    Ok(body["data"].clone())
}

/// Error body of a failed request
pub async fn error(res: Response) -> Result<Value> {
    let body = res.json::<Value>().await?;
    anyhow::ensure!(body["error"] == json!(true), "error flag false or missing: {}", body);
    Ok(body)
}

pub fn label_body(name: &str) -> Value {
    json!({
        "name": name,
        "address": "1 Music Row, Nashville",
        "email": "contact@label.example"
    })
}

pub fn musician_body(first: &str, last: &str, instrument: &str) -> Value {
    json!({ "first_name": first, "last_name": last, "instrument": instrument })
}
