use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print a response payload: pretty JSON, or YAML for text output
pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: []
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Output current item information in the appropriate format
pub fn output_current_item(
    output_format: &OutputFormat,
    item_type: &str,
    name: &str,
    details: Value,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    format!("current_{}", item_type): details
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Current {}: {}", item_type, name);
            if let Some(url) = details.get("url").and_then(Value::as_str) {
                println!("URL: {}", url);
            }
            if let Some(user) = details.get("username").and_then(Value::as_str) {
                println!("User: {}", user);
            }
            if let Some(desc) = details.get("description").and_then(Value::as_str) {
                if !desc.is_empty() {
                    println!("Description: {}", desc);
                }
            }
        }
    }
    Ok(())
}

/// Output "no current item" message in the appropriate format
pub fn output_no_current_item(output_format: &OutputFormat, item_type: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    format!("current_{}", item_type): null
                }))?
            );
        }
        OutputFormat::Text => {
            println!("No current {} set", item_type);
        }
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Switch the current item after checking it exists
pub fn switch_current_item<F, G>(
    item_name: &str,
    item_type: &str,
    check_exists: F,
    update_current: G,
    output_format: &OutputFormat,
) -> anyhow::Result<()>
where
    F: Fn(&str) -> anyhow::Result<bool>,
    G: Fn(&str) -> anyhow::Result<()>,
{
    if !check_exists(item_name)? {
        return Err(anyhow::anyhow!("{} '{}' not found", capitalize(item_type), item_name));
    }

    update_current(item_name)?;

    output_success(
        output_format,
        &format!("Switched to {} '{}'", item_type, item_name),
        Some(json!({ format!("current_{}", item_type): item_name })),
    )
}

/// Delete an item and clear it as current if it was selected
pub fn delete_item_with_current_check<F, G, H>(
    item_name: &str,
    item_type: &str,
    check_exists: F,
    remove_item: G,
    clear_if_current: H,
    output_format: &OutputFormat,
) -> anyhow::Result<()>
where
    F: Fn(&str) -> anyhow::Result<bool>,
    G: Fn(&str) -> anyhow::Result<()>,
    H: Fn(&str) -> anyhow::Result<()>,
{
    if !check_exists(item_name)? {
        return Err(anyhow::anyhow!("{} '{}' not found", capitalize(item_type), item_name));
    }

    remove_item(item_name)?;
    clear_if_current(item_name)?;

    output_success(
        output_format,
        &format!("{} '{}' deleted successfully", capitalize(item_type), item_name),
        None,
    )
}

/// Extract target item name from optional parameter or use current
pub fn resolve_target_item(
    provided_name: Option<String>,
    current_getter: impl Fn() -> anyhow::Result<Option<String>>,
    item_type: &str,
) -> anyhow::Result<String> {
    match provided_name {
        Some(name) => Ok(name),
        None => match current_getter()? {
            Some(current) => Ok(current),
            None => Err(anyhow::anyhow!("No current {} set", item_type)),
        },
    }
}

/// Parse repeated `key=value` arguments into query pairs
pub fn parse_pairs(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", pair))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_on_first_equals() {
        let pairs = parse_pairs(&["genre=Jazz".into(), "note=a=b".into()]).unwrap();
        assert_eq!(pairs, vec![("genre".into(), "Jazz".into()), ("note".into(), "a=b".into())]);
        assert!(parse_pairs(&["nope".into()]).is_err());
        assert!(parse_pairs(&["=x".into()]).is_err());
    }

    #[test]
    fn current_item_resolution() {
        let name = resolve_target_item(None, || Ok(Some("local".into())), "server").unwrap();
        assert_eq!(name, "local");
        assert!(resolve_target_item(None, || Ok(None), "server").is_err());
        assert_eq!(capitalize("server"), "Server");
    }
}
