use std::io::Read;

use clap::Subcommand;
use serde_json::Value;

use crate::cli::client::ApiClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "List records with optional filters, sorting and paging")]
    List {
        #[arg(help = "Resource name, e.g. albums")]
        resource: String,
        #[arg(long = "where", value_name = "FIELD=VALUE", help = "Equality filter (repeatable)")]
        filters: Vec<String>,
        #[arg(long, help = "Field to sort by")]
        sort: Option<String>,
        #[arg(long, help = "Sort direction: asc or desc")]
        order: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },

    #[command(about = "Get one record")]
    Get {
        #[arg(help = "Resource name")]
        resource: String,
        #[arg(help = "Record ID")]
        id: String,
    },

    #[command(about = "Create record from --data or stdin")]
    Create {
        #[arg(help = "Resource name")]
        resource: String,
        #[arg(long, help = "JSON body (reads stdin when omitted)")]
        data: Option<String>,
    },

    #[command(about = "Update record fields from --data or stdin")]
    Update {
        #[arg(help = "Resource name")]
        resource: String,
        #[arg(help = "Record ID to update")]
        id: String,
        #[arg(long, help = "JSON body (reads stdin when omitted)")]
        data: Option<String>,
    },

    #[command(about = "Delete a record")]
    Delete {
        #[arg(help = "Resource name")]
        resource: String,
        #[arg(help = "Record ID to delete")]
        id: String,
    },
}

fn read_body(data: Option<String>) -> anyhow::Result<Value> {
    let raw = match data {
        Some(data) => data,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("Invalid JSON body: {}", e))
}

fn list_query(
    filters: &[String],
    sort: Option<String>,
    order: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> anyhow::Result<Vec<(String, String)>> {
    let mut query = parse_pairs(filters)?;
    query.extend(sort.map(|v| ("sort".to_string(), v)));
    query.extend(order.map(|v| ("order".to_string(), v)));
    query.extend(limit.map(|v| ("limit".to_string(), v.to_string())));
    query.extend(offset.map(|v| ("offset".to_string(), v.to_string())));
    Ok(query)
}

pub async fn handle(cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_current()?;

    match cmd {
        DataCommands::List { resource, filters, sort, order, limit, offset } => {
            let query = list_query(&filters, sort, order, limit, offset)?;
            let data = client.get(&format!("/api/{}/", resource), &query).await?;
            match &data {
                Value::Array(items) if items.is_empty() => {
                    let message = format!("No {} found", resource);
                    output_empty_collection(&output_format, &resource, &message)
                }
                _ => output_value(&output_format, &data),
            }
        }
        DataCommands::Get { resource, id } => {
            let data = client.get(&format!("/api/{}/{}/", resource, id), &[]).await?;
            output_value(&output_format, &data)
        }
        DataCommands::Create { resource, data } => {
            let body = read_body(data)?;
            let created = client.post(&format!("/api/{}/", resource), &body).await?;
            output_value(&output_format, &created)
        }
        DataCommands::Update { resource, id, data } => {
            let body = read_body(data)?;
            let updated = client.patch(&format!("/api/{}/{}/", resource, id), &body).await?;
            output_value(&output_format, &updated)
        }
        DataCommands::Delete { resource, id } => {
            match client.delete(&format!("/api/{}/{}/", resource, id)).await? {
                Value::Null => {
                    let message = format!("Deleted {} {}", resource, id);
                    output_success(&output_format, &message, None)
                }
                body => output_value(&output_format, &body),
            }
        }
    }
}
