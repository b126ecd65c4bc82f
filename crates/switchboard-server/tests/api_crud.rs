//! Entity CRUD and role gating over real HTTP.

use serde_json::{json, Value};
use switchboard_db::{create_pool, run_migrations, DbRuntimeSettings};
use switchboard_events::EventBroadcaster;
use switchboard_server::{app, AppState};
use tempfile::TempDir;
use tokio::net::TcpListener;

const ROLE_HEADER: &str = "x-switchboard-role";

async fn spawn_server() -> (String, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("switchboard.db");
    let pool = create_pool(db_path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
    }

    let state = AppState {
        pool,
        broadcaster: EventBroadcaster::new(64),
    };
    let app = app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), dir)
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    role: &str,
    body: Value,
) -> reqwest::Response {
    client
        .post(url)
        .header(ROLE_HEADER, role)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn get(client: &reqwest::Client, url: &str, role: &str) -> reqwest::Response {
    client
        .get(url)
        .header(ROLE_HEADER, role)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn calls_roundtrip() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = post_json(
        &client,
        &format!("{base}/api/calls"),
        "user",
        json!({ "name": "Support intake" }),
    )
    .await;
    assert_eq!(response.status(), 200);
    let call: Value = response.json().await.unwrap();
    let call_id = call["id"].as_i64().unwrap();
    assert!(call_id > 0);
    assert_eq!(call["name"], "Support intake");
    assert!(call["createdAt"].as_str().is_some_and(|s| !s.is_empty()));

    let listed: Value = get(&client, &format!("{base}/api/calls"), "user")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], call["id"]);

    let fetched: Value = get(&client, &format!("{base}/api/calls/{call_id}"), "user")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, call);

    let missing = get(&client, &format!("{base}/api/calls/9999"), "user").await;
    assert_eq!(missing.status(), 404);

    let blank = post_json(
        &client,
        &format!("{base}/api/calls"),
        "user",
        json!({ "name": "   " }),
    )
    .await;
    assert_eq!(blank.status(), 400);
}

#[tokio::test]
async fn role_gating_rejects_missing_and_insufficient_roles() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    let no_header = client
        .get(format!("{base}/api/calls"))
        .send()
        .await
        .unwrap();
    assert_eq!(no_header.status(), 401);

    let as_user = post_json(
        &client,
        &format!("{base}/api/tags"),
        "user",
        json!({ "name": "Billing" }),
    )
    .await;
    assert_eq!(as_user.status(), 403);

    let task_table = get(&client, &format!("{base}/api/tasks"), "user").await;
    assert_eq!(task_table.status(), 403);

    // The stream and health stay open without a role.
    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
}

#[tokio::test]
async fn tag_crud_lifecycle() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();
    let tags_url = format!("{base}/api/tags");

    let billing: Value = post_json(&client, &tags_url, "admin", json!({ "name": "Billing" }))
        .await
        .json()
        .await
        .unwrap();
    let billing_id = billing["id"].as_i64().unwrap();

    let duplicate = post_json(&client, &tags_url, "admin", json!({ "name": "Billing" })).await;
    assert_eq!(duplicate.status(), 409);

    let sales: Value = post_json(&client, &tags_url, "admin", json!({ "name": "Sales" }))
        .await
        .json()
        .await
        .unwrap();
    let sales_id = sales["id"].as_i64().unwrap();

    // Rename onto a taken name conflicts; renaming to itself does not.
    let taken = client
        .put(format!("{tags_url}/{sales_id}"))
        .header(ROLE_HEADER, "admin")
        .json(&json!({ "name": "Billing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(taken.status(), 409);

    let renamed: Value = client
        .put(format!("{tags_url}/{sales_id}"))
        .header(ROLE_HEADER, "admin")
        .json(&json!({ "name": "Renewals" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(renamed["name"], "Renewals");

    let same_name = client
        .put(format!("{tags_url}/{sales_id}"))
        .header(ROLE_HEADER, "admin")
        .json(&json!({ "name": "Renewals" }))
        .send()
        .await
        .unwrap();
    assert_eq!(same_name.status(), 200);

    let missing = client
        .put(format!("{tags_url}/9999"))
        .header(ROLE_HEADER, "admin")
        .json(&json!({ "name": "Ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let deleted = client
        .delete(format!("{tags_url}/{billing_id}"))
        .header(ROLE_HEADER, "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let gone = get(&client, &format!("{tags_url}/{billing_id}"), "user").await;
    assert_eq!(gone.status(), 404);

    let remaining: Value = get(&client, &tags_url, "user").await.json().await.unwrap();
    assert_eq!(remaining.as_array().unwrap().len(), 1);
    assert_eq!(remaining[0]["name"], "Renewals");
}

#[tokio::test]
async fn suggested_task_catalog_lifecycle() {
    let (base, _dir) = spawn_server().await;
    let client = reqwest::Client::new();
    let suggested_url = format!("{base}/api/tasks/suggested");

    let task: Value = post_json(
        &client,
        &suggested_url,
        "admin",
        json!({ "name": "Verify Invoice" }),
    )
    .await
    .json()
    .await
    .unwrap();
    let task_id = task["id"].as_i64().unwrap();
    assert_eq!(task["isSuggested"], json!(true));

    // The catalog is readable by every role.
    let catalog: Value = get(&client, &suggested_url, "user").await.json().await.unwrap();
    assert_eq!(catalog.as_array().unwrap().len(), 1);

    let renamed: Value = client
        .put(format!("{suggested_url}/{task_id}"))
        .header(ROLE_HEADER, "admin")
        .json(&json!({ "name": "Verify invoice totals" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(renamed["name"], "Verify invoice totals");

    let full_table: Value = get(&client, &format!("{base}/api/tasks"), "admin")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(full_table.as_array().unwrap().len(), 1);

    let deleted = client
        .delete(format!("{suggested_url}/{task_id}"))
        .header(ROLE_HEADER, "admin")
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let update_after_delete = client
        .put(format!("{suggested_url}/{task_id}"))
        .header(ROLE_HEADER, "admin")
        .json(&json!({ "name": "Ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update_after_delete.status(), 404);
}
