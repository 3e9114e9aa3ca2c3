use clap::Subcommand;
use serde_json::json;

use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Register remote server")]
    Add {
        #[arg(help = "Server URL, e.g. http://localhost:8000")]
        url: String,
        #[arg(help = "Server name (defaults to the hostname)")]
        name: Option<String>,
        #[arg(long, default_value = "", help = "Free-form description")]
        description: String,
    },

    #[command(about = "List all servers")]
    List,

    #[command(about = "Show currently selected server")]
    Current,

    #[command(about = "Switch to server (persistent selection)")]
    Use {
        #[arg(help = "Server name to switch to")]
        name: String,
    },

    #[command(about = "Remove server from registry")]
    Delete {
        #[arg(help = "Server name to delete")]
        name: String,
    },

    #[command(about = "Health check specific server (defaults to current server)")]
    Ping {
        #[arg(help = "Server name to ping")]
        name: Option<String>,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Add { url, name, description } => {
            let info = ServerInfo::from_url(&url, description)?;
            let name = name.unwrap_or_else(|| info.hostname.clone());

            let mut config = load_server_config()?;
            if config.servers.contains_key(&name) {
                return Err(anyhow::anyhow!("Server '{}' already exists", name));
            }
            let server_url = info.url();
            config.servers.insert(name.clone(), info);
            save_server_config(&config)?;

            // The first server registered becomes current
            let mut env_config = load_environment_config()?;
            if env_config.current_server.is_none() {
                env_config.select(&name);
                save_environment_config(&env_config)?;
            }

            output_success(
                &output_format,
                &format!("Server '{}' added ({})", name, server_url),
                Some(json!({ "name": name, "url": server_url })),
            )
        }
        ServerCommands::List => {
            let config = load_server_config()?;
            let env_config = load_environment_config()?;

            if config.servers.is_empty() {
                return output_empty_collection(&output_format, "servers", "No servers configured");
            }

            let mut names: Vec<&String> = config.servers.keys().collect();
            names.sort();

            match output_format {
                OutputFormat::Json => {
                    let servers: Vec<_> = names
                        .iter()
                        .map(|name| {
                            let info = &config.servers[*name];
                            json!({
                                "name": name,
                                "url": info.url(),
                                "description": info.description,
                                "status": info.status,
                                "last_ping": info.last_ping,
                                "current": env_config.current_server.as_ref() == Some(*name)
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json!({ "servers": servers }))?);
                }
                OutputFormat::Text => {
                    println!("{:<15} {:<35} {:<8} {}", "NAME", "URL", "STATUS", "DESCRIPTION");
                    println!("{}", "-".repeat(75));

                    for name in names {
                        let info = &config.servers[name];
                        let current_marker = if env_config.current_server.as_ref() == Some(name) {
                            "*"
                        } else {
                            " "
                        };
                        let status = serde_json::to_value(info.status)?;
                        println!(
                            "{}{:<14} {:<35} {:<8} {}",
                            current_marker,
                            name,
                            info.url(),
                            status.as_str().unwrap_or_default(),
                            info.description
                        );
                    }
                }
            }

            Ok(())
        }
        ServerCommands::Current => match load_environment_config()?.current_server {
            Some(_) => {
                let (name, info) = current_server()?;
                let details = json!({
                    "name": name,
                    "url": info.url(),
                    "description": info.description
                });
                output_current_item(&output_format, "server", &name, details)
            }
            None => output_no_current_item(&output_format, "server"),
        },
        ServerCommands::Use { name } => switch_current_item(
            &name,
            "server",
            |name| Ok(load_server_config()?.servers.contains_key(name)),
            |name| {
                let mut env_config = load_environment_config()?;
                env_config.select(name);
                save_environment_config(&env_config)
            },
            &output_format,
        ),
        ServerCommands::Delete { name } => delete_item_with_current_check(
            &name,
            "server",
            |name| Ok(load_server_config()?.servers.contains_key(name)),
            |name| {
                let mut config = load_server_config()?;
                config.servers.remove(name);
                save_server_config(&config)?;

                let mut auth = load_auth_config()?;
                auth.sessions.remove(name);
                save_auth_config(&auth)
            },
            |name| {
                let mut env_config = load_environment_config()?;
                env_config.forget(name);
                save_environment_config(&env_config)
            },
            &output_format,
        ),
        ServerCommands::Ping { name } => {
            let name = resolve_target_item(
                name,
                || Ok(load_environment_config()?.current_server),
                "server",
            )?;
            let mut config = load_server_config()?;
            let info = config
                .servers
                .get_mut(&name)
                .ok_or_else(|| anyhow::anyhow!("Server '{}' not found", name))?;

            let status = ping_server(info).await;
            info.update_ping(status);
            let url = info.url();
            save_server_config(&config)?;

            match status {
                ServerStatus::Up => output_success(
                    &output_format,
                    &format!("Server '{}' is up ({})", name, url),
                    Some(json!({ "name": name, "status": status })),
                ),
                _ => Err(anyhow::anyhow!("Server '{}' is down ({})", name, url)),
            }
        }
    }
}
