use chrono::{Duration, Utc};
use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the current server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, env = "CATALOG_PASSWORD", help = "Password")]
        password: String,
    },

    #[command(about = "Forget the stored token for the current server")]
    Logout,

    #[command(about = "Show the stored session for the current server")]
    Status,

    #[command(about = "Show current user information from the server")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { username, password } => {
            let (name, server) = current_server()?;
            let client = ApiClient::new(server.url(), None);
            let data = client
                .post("/auth/login", &json!({ "username": username, "password": password }))
                .await?;

            let token = data
                .get("token")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Login response carried no token"))?
                .to_string();
            let expires_in = data.get("expires_in").and_then(Value::as_i64).unwrap_or_default();

            let mut auth = load_auth_config()?;
            auth.sessions.insert(
                name.clone(),
                SessionInfo {
                    username: username.clone(),
                    token,
                    expires_at: Utc::now() + Duration::seconds(expires_in),
                },
            );
            save_auth_config(&auth)?;

            output_success(
                &output_format,
                &format!("Logged in to '{}' as {}", name, username),
                Some(json!({ "server": name, "username": username, "expires_in": expires_in })),
            )
        }
        AuthCommands::Logout => {
            let (name, _) = current_server()?;
            let mut auth = load_auth_config()?;
            if auth.sessions.remove(&name).is_none() {
                return Err(anyhow::anyhow!("Not logged in to '{}'", name));
            }
            save_auth_config(&auth)?;
            output_success(&output_format, &format!("Logged out of '{}'", name), None)
        }
        AuthCommands::Status => {
            let (name, server) = current_server()?;
            match load_auth_config()?.sessions.get(&name) {
                Some(session) => {
                    let details = json!({
                        "url": server.url(),
                        "username": session.username,
                        "expires_at": session.expires_at,
                        "expired": session.expires_at <= Utc::now()
                    });
                    output_current_item(&output_format, "session", &name, details)
                }
                None => output_no_current_item(&output_format, "session"),
            }
        }
        AuthCommands::Whoami => {
            let data = ApiClient::from_current()?.get("/api/auth/whoami", &[]).await?;
            output_value(&output_format, &data)
        }
    }
}
