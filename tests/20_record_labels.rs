mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{label_body, TestServer};

#[tokio::test]
async fn create_returns_201_with_id_and_fields() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.user_with_roles("clerk", &["user"]).await?;

    let res = server.post("/api/record_labels/", Some(&token), &label_body("Blue Note")).await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let label = common::data(res).await?;
    assert!(label["id"].as_i64().is_some(), "expected numeric id: {}", label);
    assert_eq!(label["name"], json!("Blue Note"));
    assert_eq!(label["address"], json!("1 Music Row, Nashville"));
    assert_eq!(label["email"], json!("contact@label.example"));
    Ok(())
}

#[tokio::test]
async fn created_record_reads_back_identically() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    let created = server.create("record_labels", &token, label_body("Verve")).await?;
    let id = created["id"].as_i64().unwrap_or_default();

    let fetched = server.fetch(&format!("/api/record_labels/{}/", id), Some(&token)).await?;
    assert_eq!(fetched, created);

    // Trailing slash is optional
    let fetched = server.fetch(&format!("/api/record_labels/{}", id), Some(&token)).await?;
    assert_eq!(fetched, created);
    Ok(())
}

#[tokio::test]
async fn partial_update_keeps_other_fields() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    let created = server.create("record_labels", &token, label_body("Impulse")).await?;
    let path = format!("/api/record_labels/{}/", created["id"]);

    let res = server.patch(&path, Some(&token), &json!({ "name": "Impulse!" })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = common::data(res).await?;
    assert_eq!(updated["name"], json!("Impulse!"));
    assert_eq!(updated["address"], created["address"]);
    assert_eq!(updated["email"], created["email"]);

    // PUT is also a partial update
    let res = server.put(&path, Some(&token), &json!({ "address": "Englewood Cliffs" })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = common::data(res).await?;
    assert_eq!(updated["name"], json!("Impulse!"));
    assert_eq!(updated["address"], json!("Englewood Cliffs"));
    Ok(())
}

#[tokio::test]
async fn update_unknown_id_is_404() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    let res = server.put("/api/record_labels/999/", Some(&token), &label_body("Ghost")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(common::error(res).await?["message"], json!("Record label not found"));

    let labels = server.fetch("/api/record_labels/", Some(&token)).await?;
    assert_eq!(labels, json!([]));
    Ok(())
}

#[tokio::test]
async fn delete_returns_204_then_404() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    let created = server.create("record_labels", &token, label_body("Prestige")).await?;
    let path = format!("/api/record_labels/{}/", created["id"]);

    let res = server.delete(&path, Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.bytes().await?.is_empty());

    assert_eq!(server.get(&path, Some(&token)).await?.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.delete(&path, Some(&token)).await?.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_unknown_id_removes_nothing() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    server.create("record_labels", &token, label_body("Riverside")).await?;

    let res = server.delete("/api/record_labels/4242/", Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let labels = server.fetch("/api/record_labels/", Some(&token)).await?;
    assert_eq!(labels.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn validation_errors_are_reported_per_field() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    let res = server
        .post("/api/record_labels/", Some(&token), &json!({ "name": "", "email": "not-an-email" }))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = common::error(res).await?;
    assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    assert_eq!(body["field_errors"]["name"], json!("This field may not be blank."));
    assert_eq!(body["field_errors"]["address"], json!("This field is required."));
    assert_eq!(body["field_errors"]["email"], json!("Enter a valid email address."));

    let labels = server.fetch("/api/record_labels/", Some(&token)).await?;
    assert_eq!(labels, json!([]));
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_401() -> Result<()> {
    let server = TestServer::spawn().await?;

    assert_eq!(server.get("/api/record_labels/", None).await?.status(), StatusCode::UNAUTHORIZED);
    let res = server.post("/api/record_labels/", None, &label_body("Anon")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_resource_is_404() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.admin_token().await?;

    let res = server.get("/api/widgets/", Some(&token)).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
