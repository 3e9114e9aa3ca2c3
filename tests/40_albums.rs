mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{label_body, musician_body, TestServer};

fn album_body(title: &str, label: &Value, members: Value) -> Value {
    json!({
        "title": title,
        "artist": "Miles Davis",
        "release_date": "1959-08-17",
        "genre": "Jazz",
        "label": label,
        "album_members": members
    })
}

#[tokio::test]
async fn album_create_without_permission_is_403_and_stores_nothing() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let viewer = server.user_with_roles("viewer", &["main_app.view_album"]).await?;

    let label = server.create("record_labels", &admin, label_body("Columbia")).await?;

    let res = server
        .post("/api/albums/", Some(&viewer), &album_body("Kind of Blue", &label["id"], json!([])))
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        common::error(res).await?["message"],
        json!("You do not have permission to create an album.")
    );

    // view permission still lists, and there is nothing to list
    let albums = server.fetch("/api/albums/", Some(&viewer)).await?;
    assert_eq!(albums, json!([]));
    Ok(())
}

#[tokio::test]
async fn album_without_view_permission_is_403() -> Result<()> {
    let server = TestServer::spawn().await?;
    let user = server.user_with_roles("plain", &["user"]).await?;

    let res = server.get("/api/albums/", Some(&user)).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        common::error(res).await?["message"],
        json!("You do not have permission to view albums.")
    );
    Ok(())
}

#[tokio::test]
async fn granted_permission_allows_create() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let producer = server
        .user_with_roles("producer", &["main_app.add_album", "main_app.view_album"])
        .await?;

    let label = server.create("record_labels", &admin, label_body("Blue Note")).await?;
    let album = server
        .create("albums", &producer, album_body("Somethin' Else", &label["id"], json!([])))
        .await?;
    assert_eq!(album["title"], json!("Somethin' Else"));

    // No change permission
    let res = server
        .patch(
            &format!("/api/albums/{}/", album["id"]),
            Some(&producer),
            &json!({ "genre": "Hard bop" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn album_nests_label_and_members() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let agent = server.user_with_roles("agent1", &["Talent Agents"]).await?;

    let label = server.create("record_labels", &admin, label_body("Columbia")).await?;
    let miles = server
        .create("musicians", &agent, musician_body("Miles", "Davis", "trumpet"))
        .await?;
    let bill = server.create("musicians", &agent, musician_body("Bill", "Evans", "piano")).await?;

    let members = json!([miles["id"], bill["id"], miles["id"]]);
    let album = server
        .create("albums", &admin, album_body("Kind of Blue", &label["id"], members))
        .await?;

    assert_eq!(album["label"], label);
    let members = album["album_members"].as_array().cloned().unwrap_or_default();
    assert_eq!(members, vec![miles.clone(), bill.clone()]);
    assert_eq!(members[0]["agent_username"], json!("agent1"));

    let fetched = server.fetch(&format!("/api/albums/{}/", album["id"]), Some(&admin)).await?;
    assert_eq!(fetched, album);
    Ok(())
}

#[tokio::test]
async fn album_with_unknown_label_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let res = server
        .post("/api/albums/", Some(&admin), &album_body("Ghost", &json!(99), json!([])))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = common::error(res).await?;
    assert_eq!(body["field_errors"]["label"], json!("Invalid pk \"99\" - object does not exist."));

    let res = server
        .post("/api/albums/", Some(&admin), &album_body("Bad date", &json!(1), json!([])))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let albums = server.fetch("/api/albums/", Some(&admin)).await?;
    assert_eq!(albums, json!([]));
    Ok(())
}

#[tokio::test]
async fn deleting_a_label_deletes_its_albums() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let columbia = server.create("record_labels", &admin, label_body("Columbia")).await?;
    let verve = server.create("record_labels", &admin, label_body("Verve")).await?;
    server.create("albums", &admin, album_body("Kind of Blue", &columbia["id"], json!([]))).await?;
    server.create("albums", &admin, album_body("Getz/Gilberto", &verve["id"], json!([]))).await?;

    let res = server
        .delete(&format!("/api/record_labels/{}/", columbia["id"]), Some(&admin))
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let albums = server.fetch("/api/albums/", Some(&admin)).await?;
    let titles: Vec<&str> = albums
        .as_array()
        .map(|items| items.iter().filter_map(|a| a["title"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(titles, vec!["Getz/Gilberto"]);
    Ok(())
}

#[tokio::test]
async fn deleting_a_musician_detaches_it_from_albums() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let label = server.create("record_labels", &admin, label_body("Prestige")).await?;
    let sonny = server.create("musicians", &admin, musician_body("Sonny", "Rollins", "sax")).await?;
    let max = server.create("musicians", &admin, musician_body("Max", "Roach", "drums")).await?;
    let members = json!([sonny["id"], max["id"]]);
    let album = server
        .create("albums", &admin, album_body("Saxophone Colossus", &label["id"], members))
        .await?;

    let res = server.delete(&format!("/api/musicians/{}/", max["id"]), Some(&admin)).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let fetched = server.fetch(&format!("/api/albums/{}/", album["id"]), Some(&admin)).await?;
    assert_eq!(fetched["album_members"], json!([sonny]));
    Ok(())
}

#[tokio::test]
async fn albums_filter_by_member() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let label = server.create("record_labels", &admin, label_body("Impulse")).await?;
    let trane = server.create("musicians", &admin, musician_body("John", "Coltrane", "sax")).await?;
    server
        .create("albums", &admin, album_body("A Love Supreme", &label["id"], json!([trane["id"]])))
        .await?;
    server.create("albums", &admin, album_body("Ballads", &label["id"], json!([]))).await?;

    let path = format!("/api/albums/?album_members={}", trane["id"]);
    let albums = server.fetch(&path, Some(&admin)).await?;
    assert_eq!(albums.as_array().map(Vec::len), Some(1));
    assert_eq!(albums[0]["title"], json!("A Love Supreme"));
    Ok(())
}
