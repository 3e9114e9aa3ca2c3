use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub port: u16,
    pub protocol: String,
    pub description: String,
    pub added_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub servers: HashMap<String, ServerInfo>,
}

/// Token obtained by `auth login`, one per server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub sessions: HashMap<String, SessionInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub current_server: Option<String>,
    pub recents: Vec<String>,
}

impl ServerInfo {
    pub fn new(hostname: String, port: u16, protocol: String, description: String) -> Self {
        Self {
            hostname,
            port,
            protocol,
            description,
            added_at: Utc::now(),
            last_ping: None,
            status: ServerStatus::Unknown,
        }
    }

    /// Parse `http://host:port`; the port defaults from the scheme
    pub fn from_url(raw: &str, description: String) -> anyhow::Result<Self> {
        let parsed = url::Url::parse(raw)
            .map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", raw, e))?;
        let protocol = parsed.scheme().to_string();
        if protocol != "http" && protocol != "https" {
            return Err(anyhow::anyhow!("Server URL must use http or https, got '{}'", protocol));
        }
        let hostname = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Server URL '{}' has no host", raw))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("Server URL '{}' has no port", raw))?;
        Ok(Self::new(hostname, port, protocol, description))
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.hostname, self.port)
    }

    pub fn update_ping(&mut self, status: ServerStatus) {
        self.last_ping = Some(Utc::now());
        self.status = status;
    }
}

impl EnvironmentConfig {
    /// Make `name` current and move it to the front of the recents list
    pub fn select(&mut self, name: &str) {
        self.current_server = Some(name.to_string());
        self.recents.retain(|recent| recent != name);
        self.recents.insert(0, name.to_string());
        self.recents.truncate(10);
    }

    pub fn forget(&mut self, name: &str) {
        if self.current_server.as_deref() == Some(name) {
            self.current_server = None;
        }
        self.recents.retain(|recent| recent != name);
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CATALOG_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("catalog").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn load_file<T: DeserializeOwned + Default>(name: &str) -> anyhow::Result<T> {
    let file = get_config_dir()?.join(name);
    if !file.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(&file)?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Corrupt config file {}: {}", file.display(), e))
}

fn save_file<T: Serialize>(name: &str, config: &T) -> anyhow::Result<()> {
    let file = get_config_dir()?.join(name);
    let content = serde_json::to_string_pretty(config)?;
    fs::write(file, content)?;
    Ok(())
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    load_file("server.json")
}

pub fn save_server_config(config: &ServerConfig) -> anyhow::Result<()> {
    save_file("server.json", config)
}

pub fn load_auth_config() -> anyhow::Result<AuthConfig> {
    load_file("auth.json")
}

pub fn save_auth_config(config: &AuthConfig) -> anyhow::Result<()> {
    save_file("auth.json", config)
}

pub fn load_environment_config() -> anyhow::Result<EnvironmentConfig> {
    load_file("env.json")
}

pub fn save_environment_config(config: &EnvironmentConfig) -> anyhow::Result<()> {
    save_file("env.json", config)
}

/// Name and details of the selected server
pub fn current_server() -> anyhow::Result<(String, ServerInfo)> {
    let name = load_environment_config()?
        .current_server
        .ok_or_else(|| anyhow::anyhow!("No current server set (use `catalog server use <name>`)"))?;
    let info = load_server_config()?
        .servers
        .remove(&name)
        .ok_or_else(|| anyhow::anyhow!("Current server '{}' not found in configuration", name))?;
    Ok((name, info))
}

pub async fn ping_server(server_info: &ServerInfo) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", server_info.url());

    match client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}
