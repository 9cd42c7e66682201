// tests/e2e_smoke.rs

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use tower::ServiceExt; // for `oneshot` (tower 0.5 with features=["util"])

/// Full app as the binary builds it: repo config + `config/sources.json` fixture.
#[serial_test::serial]
#[tokio::test]
async fn smoke_harvest_with_repo_fixture() {
    std::env::remove_var("HARVEST_CONFIG_PATH");
    std::env::remove_var("HARVEST_FIXTURE_PATH");

    let app = member_harvester::app().expect("build app from repo config");

    let req = Request::builder()
        .method("POST")
        .uri("/api/harvest")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"sourceIdentifiers":"https://t.me/rustaceans\nhttps://t.me/closed_room\n@async_club","excludeBots":true}"#,
        ))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    // 3 humans from the first source + 2 new from the second; the bot is excluded
    assert_eq!(v["totalContacts"], 5, "body: {v}");
    let names: Vec<&str> = v["contacts"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["displayName"].as_str())
        .collect();
    assert_eq!(
        names,
        vec!["Ferris Crab", "borrowck", "Tokio", "User 2001", "Pin Project"]
    );
}

#[serial_test::serial]
#[tokio::test]
async fn smoke_root_is_ok() {
    std::env::remove_var("HARVEST_CONFIG_PATH");
    std::env::remove_var("HARVEST_FIXTURE_PATH");

    let app = member_harvester::app().expect("build app from repo config");
    let resp = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
