//! Integration tests for the event log backend.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{Config, LogFormat, PhotoBackendConfig};
use crate::{create_router, AppState};

const SMALL_PHOTO_LIMIT: usize = 1024;

fn test_config(temp_dir: &TempDir) -> Config {
    let static_dir = temp_dir.path().join("public");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("manifest.json"), r#"{"name":"Event Log"}"#).unwrap();

    Config {
        db_path: temp_dir.path().join("test.sqlite"),
        static_dir,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        log_format: LogFormat::Pretty,
        max_backups: 20,
        max_photo_bytes: SMALL_PHOTO_LIMIT,
        max_body_bytes: 1024 * 1024,
        photo_backend: PhotoBackendConfig::Local {
            uploads_dir: temp_dir.path().join("uploads"),
        },
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = AppState::open(test_config(&temp_dir))
            .await
            .expect("Failed to open state");

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestFixture {
            client: Client::new(),
            base_url,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn post_update(&self, form: Form) -> reqwest::Response {
        self.client
            .post(self.url("/api/updates"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    fn uploads_count(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("uploads"))
            .unwrap()
            .count()
    }
}

fn photo_part(bytes: &'static [u8], name: &str) -> Part {
    Part::bytes(bytes)
        .file_name(name.to_string())
        .mime_str("image/jpeg")
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_documents_start_null() {
    let fixture = TestFixture::new().await;

    assert_eq!(fixture.get_json("/api/settings").await, Value::Null);
    assert_eq!(fixture.get_json("/api/data").await, Value::Null);
}

#[tokio::test]
async fn test_settings_last_write_wins() {
    let fixture = TestFixture::new().await;

    for n in 1..=3 {
        let resp = fixture
            .post_json("/api/settings", json!({ "eventName": "Summit", "rev": n }))
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "ok": true }));

        assert_eq!(
            fixture.get_json("/api/settings").await,
            json!({ "eventName": "Summit", "rev": n })
        );
    }
}

#[tokio::test]
async fn test_data_roundtrip_keeps_arbitrary_json() {
    let fixture = TestFixture::new().await;
    let payload = json!([{ "guest": "A", "table": 4 }, null, "free text", 12.5]);

    let resp = fixture.post_json("/api/data", payload.clone()).await;
    assert_eq!(resp.status(), 200);

    assert_eq!(fixture.get_json("/api/data").await, payload);
    assert_eq!(fixture.get_json("/api/settings").await, Value::Null);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/settings"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_writes_create_backups_of_previous_state() {
    let fixture = TestFixture::new().await;

    // First write: nothing to back up
    fixture.post_json("/api/settings", json!({ "v": 1 })).await;
    let backups = fixture.get_json("/api/backups").await;
    assert_eq!(backups, json!([]));

    fixture.post_json("/api/data", json!({ "rows": [] })).await;
    fixture.post_json("/api/settings", json!({ "v": 2 })).await;

    let backups = fixture.get_json("/api/backups").await;
    let backups = backups.as_array().unwrap();
    assert_eq!(backups.len(), 2);

    let newest = &backups[0];
    assert!(newest["filename"].as_str().unwrap().starts_with("backup-"));
    assert!(newest["filename"].as_str().unwrap().ends_with(".json"));
    assert!(newest["size"].as_i64().unwrap() > 0);
    assert!(newest["created"].is_string());
    assert!(backups[0]["filename"].as_str() > backups[1]["filename"].as_str());
}

#[tokio::test]
async fn test_backup_retention() {
    let fixture = TestFixture::new().await;

    for n in 0..26 {
        let resp = fixture.post_json("/api/data", json!({ "rev": n })).await;
        assert_eq!(resp.status(), 200);
    }

    // 25 backups were taken (the first write had nothing to snapshot)
    let backups = fixture.get_json("/api/backups").await;
    let backups = backups.as_array().unwrap();
    assert_eq!(backups.len(), 20);

    // The newest backup holds the state before the final write
    let newest = backups[0]["filename"].as_str().unwrap();
    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/backups/restore/{}", newest)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(fixture.get_json("/api/data").await, json!({ "rev": 24 }));

    // The oldest survivor holds rev 5: revs 0..=4 were evicted
    let oldest = backups[19]["filename"].as_str().unwrap();
    fixture
        .client
        .post(fixture.url(&format!("/api/backups/restore/{}", oldest)))
        .send()
        .await
        .unwrap();
    assert_eq!(fixture.get_json("/api/data").await, json!({ "rev": 5 }));
}

#[tokio::test]
async fn test_restore_is_field_wise_and_not_backed_up() {
    let fixture = TestFixture::new().await;

    fixture.post_json("/api/settings", json!({ "theme": "light" })).await;
    // Backup now holds settings only
    fixture.post_json("/api/settings", json!({ "theme": "dark" })).await;
    fixture.post_json("/api/data", json!({ "guests": 12 })).await;

    let backups = fixture.get_json("/api/backups").await;
    let oldest = backups.as_array().unwrap().last().unwrap()["filename"]
        .as_str()
        .unwrap()
        .to_string();
    let count_before = backups.as_array().unwrap().len();

    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/backups/restore/{}", oldest)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);

    assert_eq!(fixture.get_json("/api/settings").await, json!({ "theme": "light" }));
    assert_eq!(fixture.get_json("/api/data").await, json!({ "guests": 12 }));

    let backups = fixture.get_json("/api/backups").await;
    assert_eq!(backups.as_array().unwrap().len(), count_before);
}

#[tokio::test]
async fn test_restore_errors() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/backups/restore/settings.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

    let resp = fixture
        .client
        .post(fixture.url(
            "/api/backups/restore/backup-2020-01-01T00-00-00-000000Z.json",
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_restore_traversal_name_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let state = AppState::open(test_config(&temp_dir)).await.unwrap();
    let app = create_router(state);

    // Encoded so the path segment reaches the handler intact
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/backups/restore/..%2Fetc%2Fpasswd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_defaults() {
    let fixture = TestFixture::new().await;

    let resp = fixture.post_update(Form::new()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);

    let update = &body["update"];
    assert_eq!(update["staff"], "Anonymous");
    assert_eq!(update["type"], "general");
    assert_eq!(update["day"], 0);
    assert_eq!(update["message"], "");
    assert!(update["photo"].is_null());
    assert!(update["id"].is_string());
    assert!(update["timestamp"].is_string());

    let list = fixture.get_json("/api/updates").await;
    assert_eq!(&list[0], update);
}

#[tokio::test]
async fn test_update_without_body_uses_defaults() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/updates"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["update"]["staff"], "Anonymous");
    assert_eq!(body["update"]["type"], "general");
    assert_eq!(body["update"]["day"], 0);
    assert_eq!(fixture.get_json("/api/updates").await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_from_json_body() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/updates"))
        .json(&json!({ "staff": "Lena", "message": "Bar restocked", "day": 3, "id": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    let update = &body["update"];
    assert_eq!(update["staff"], "Lena");
    assert_eq!(update["message"], "Bar restocked");
    assert_eq!(update["type"], "general");
    assert_eq!(update["day"], 3);
    assert_ne!(update["id"], "x");
    assert!(update["photo"].is_null());
}

#[tokio::test]
async fn test_update_ignores_client_id_and_timestamp() {
    let fixture = TestFixture::new().await;

    let form = Form::new()
        .text("id", "client-id")
        .text("timestamp", "1999-01-01T00:00:00Z")
        .text("staff", "Mara")
        .text("message", "Doors open")
        .text("type", "announcement")
        .text("day", "2");
    let body: Value = fixture.post_update(form).await.json().await.unwrap();

    let update = &body["update"];
    assert_ne!(update["id"], "client-id");
    assert_ne!(update["timestamp"], "1999-01-01T00:00:00Z");
    assert_eq!(update["staff"], "Mara");
    assert_eq!(update["message"], "Doors open");
    assert_eq!(update["type"], "announcement");
    assert_eq!(update["day"], 2);
}

#[tokio::test]
async fn test_feed_is_newest_first() {
    let fixture = TestFixture::new().await;

    for message in ["first", "second", "third"] {
        let resp = fixture
            .post_update(Form::new().text("message", message))
            .await;
        assert_eq!(resp.status(), 200);
    }

    let list = fixture.get_json("/api/updates").await;
    let messages: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["message"].as_str().unwrap())
        .collect();
    assert_eq!(messages, vec!["third", "second", "first"]);
}

#[tokio::test]
async fn test_photo_lifecycle() {
    let fixture = TestFixture::new().await;

    let form = Form::new()
        .text("staff", "Lee")
        .part("photo", photo_part(b"\xff\xd8\xff fake jpeg", "IMG_2041.JPG"));
    let body: Value = fixture.post_update(form).await.json().await.unwrap();

    let id = body["update"]["id"].as_str().unwrap().to_string();
    let photo = body["update"]["photo"].as_str().unwrap().to_string();
    assert!(photo.ends_with(".jpg"));

    // Photo is served
    let resp = fixture
        .client
        .get(fixture.url(&format!("/uploads/{}", photo)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/jpeg");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"\xff\xd8\xff fake jpeg");

    // Deleting the update removes the photo too
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/updates/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    assert_eq!(fixture.get_json("/api/updates").await, json!([]));
    assert_eq!(fixture.uploads_count(), 0);

    let resp = fixture
        .client
        .get(fixture.url(&format!("/uploads/{}", photo)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_empty_photo_part_is_ignored() {
    let fixture = TestFixture::new().await;

    let form = Form::new().part("photo", photo_part(b"", ""));
    let body: Value = fixture.post_update(form).await.json().await.unwrap();

    assert!(body["update"]["photo"].is_null());
    assert_eq!(fixture.uploads_count(), 0);
}

#[tokio::test]
async fn test_oversized_photo_is_rejected() {
    let fixture = TestFixture::new().await;

    static BIG: [u8; SMALL_PHOTO_LIMIT + 1] = [0u8; SMALL_PHOTO_LIMIT + 1];
    let form = Form::new().part("photo", photo_part(&BIG, "big.jpg"));
    let resp = fixture.post_update(form).await;

    assert_eq!(resp.status(), 413);
    assert_eq!(fixture.get_json("/api/updates").await, json!([]));
    assert_eq!(fixture.uploads_count(), 0);
}

#[tokio::test]
async fn test_delete_unknown_update_is_ok() {
    let fixture = TestFixture::new().await;
    fixture
        .post_update(Form::new().text("message", "keep me"))
        .await;

    let resp = fixture
        .client
        .delete(fixture.url("/api/updates/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true }));

    let list = fixture.get_json("/api/updates").await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_upload_is_not_found() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/uploads/1700000000000-deadbeef.jpg"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_static_files_are_served() {
    let fixture = TestFixture::new().await;

    let manifest = fixture.get_json("/manifest.json").await;
    assert_eq!(manifest["name"], "Event Log");

    let resp = fixture
        .client
        .get(fixture.url("/nope.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
