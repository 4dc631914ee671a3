// ABOUTME: Integration tests for API endpoints
// ABOUTME: Exercises the PIN flow, evidence capture, signed retrieval, and quick exit over HTTP

#[cfg(test)]
mod tests {
    use super::super::*;
    use axum::http::StatusCode;
    use axum_test::{TestServer, TestServerConfig};
    use serde_json::{Value, json};
    use serial_test::serial;
    use tempfile::TempDir;

    async fn create_test_app() -> (TestServer, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_url = format!(
            "sqlite:{}?mode=rwc",
            temp_dir.path().join("test.db").display()
        );

        let storage = Arc::new(Storage::new(&db_url).await.unwrap());
        let objects = Arc::new(ObjectStore::new(temp_dir.path().join("objects")));
        let vault = Arc::new(EvidenceVault::new(Arc::clone(&storage), objects));

        let app_state = AppState {
            storage,
            sessions: SessionStore::new(),
            reconciler: Arc::new(Reconciler::new()),
            vault,
        };

        let app = build_router(app_state);
        let config = TestServerConfig {
            save_cookies: true,
            ..Default::default()
        };

        (TestServer::new_with_config(app, config).unwrap(), temp_dir)
    }

    async fn submit_pin(server: &TestServer, pin: &str, platform_id: &str) -> Value {
        let response = server
            .post("/pin")
            .json(&json!({
                "pin": pin,
                "platform_id": platform_id,
                "display_name": "Ana"
            }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    #[tokio::test]
    #[serial]
    async fn test_disguise_page_loads() {
        let (server, _temp_dir) = create_test_app().await;

        let response = server.get("/").await;
        response.assert_status_ok();
        response.assert_text_contains("Daily Brief");
    }

    #[tokio::test]
    #[serial]
    async fn test_pin_provisions_then_relogs_in() {
        let (server, _temp_dir) = create_test_app().await;

        let first = submit_pin(&server, "1234", "42").await;
        assert_eq!(first["status"], "ok");
        assert_eq!(first["account_id"], "acct_42");
        assert_eq!(first["display_name"], "Ana");

        let second = submit_pin(&server, "1234", "42").await;
        assert_eq!(second["status"], "ok");
        assert_eq!(second["account_id"], "acct_42");
    }

    #[tokio::test]
    #[serial]
    async fn test_wrong_pin_is_a_tagged_outcome_not_an_error() {
        let (server, _temp_dir) = create_test_app().await;

        submit_pin(&server, "1234", "43").await;

        let wrong = submit_pin(&server, "9999", "43").await;
        assert_eq!(wrong["status"], "wrong_pin");
        assert_eq!(wrong["account_id"], Value::Null);

        // The failed attempt invalidated the earlier session too
        let response = server.get("/evidence").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    #[serial]
    async fn test_malformed_pin_rejected_before_any_backend_call() {
        let (server, _temp_dir) = create_test_app().await;

        let response = server
            .post("/pin")
            .json(&json!({"pin": "12a4", "platform_id": "44"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/pin")
            .json(&json!({"pin": "1234", "platform_id": ""}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[serial]
    async fn test_capture_without_session_fails_closed() {
        let (server, _temp_dir) = create_test_app().await;

        let response = server
            .post("/evidence")
            .json(&json!({
                "data": b"photo".to_vec(),
                "mime": "image/jpeg",
                "incident_kind": "physical",
                "description": "",
                "threat_level": 3
            }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["success"], Value::Bool(false));
    }

    #[tokio::test]
    #[serial]
    async fn test_capture_retrieve_purge_destroy_flow() {
        let (server, _temp_dir) = create_test_app().await;
        submit_pin(&server, "1234", "45").await;

        let bytes = b"fake jpeg bytes".to_vec();
        let captured: Value = server
            .post("/evidence")
            .json(&json!({
                "data": bytes,
                "mime": "image/jpeg",
                "incident_kind": "physical",
                "description": "door camera still",
                "threat_level": 4
            }))
            .await
            .json();
        assert_eq!(captured["success"], Value::Bool(true));
        let storage_key = captured["storage_key"].as_str().unwrap().to_string();
        let record_id = captured["record_id"].as_str().unwrap().to_string();

        let listed: Value = server.get("/evidence").await.json();
        assert_eq!(listed["records"].as_array().unwrap().len(), 1);

        // Retrieval goes through a time-limited ticket, never a public path
        let url_body: Value = server
            .post("/media/url")
            .json(&json!({"storage_key": storage_key}))
            .await
            .json();
        let url = url_body["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/objects/"));

        let object = server.get(&url).await;
        object.assert_status_ok();
        assert_eq!(object.as_bytes().to_vec(), b"fake jpeg bytes".to_vec());
        assert_eq!(
            object.headers().get("content-type").unwrap(),
            "image/jpeg"
        );

        // Purge deletes the file but keeps the record
        let purged: Value = server
            .post("/media/purge")
            .json(&json!({"storage_key": storage_key}))
            .await
            .json();
        assert_eq!(purged["success"], Value::Bool(true));

        let url_after_purge: Value = server
            .post("/media/url")
            .json(&json!({"storage_key": storage_key}))
            .await
            .json();
        assert_eq!(url_after_purge["url"], Value::Null);

        let listed: Value = server.get("/evidence").await.json();
        assert_eq!(listed["records"].as_array().unwrap().len(), 1);

        // Destroy removes the record as well
        let destroyed: Value = server
            .delete(&format!("/evidence/{}", record_id))
            .await
            .json();
        assert_eq!(destroyed["success"], Value::Bool(true));

        let listed: Value = server.get("/evidence").await.json();
        assert!(listed["records"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_log_only_entry_uses_sentinel_key() {
        let (server, _temp_dir) = create_test_app().await;
        submit_pin(&server, "1234", "46").await;

        let captured: Value = server
            .post("/evidence")
            .json(&json!({
                "incident_kind": "verbal",
                "description": "threatening call, no recording",
                "threat_level": 2
            }))
            .await
            .json();
        assert_eq!(captured["success"], Value::Bool(true));
        assert_eq!(captured["storage_key"], "no-file");

        let url_body: Value = server
            .post("/media/url")
            .json(&json!({"storage_key": "no-file"}))
            .await
            .json();
        assert_eq!(url_body["url"], Value::Null);
    }

    #[tokio::test]
    #[serial]
    async fn test_threat_level_bounds_enforced() {
        let (server, _temp_dir) = create_test_app().await;
        submit_pin(&server, "1234", "47").await;

        let response = server
            .post("/evidence")
            .json(&json!({
                "incident_kind": "other",
                "threat_level": 7
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[serial]
    async fn test_evidence_edit_over_http() {
        let (server, _temp_dir) = create_test_app().await;
        submit_pin(&server, "1234", "48").await;

        let captured: Value = server
            .post("/evidence")
            .json(&json!({
                "incident_kind": "digital",
                "description": "original",
                "threat_level": 1
            }))
            .await
            .json();
        let record_id = captured["record_id"].as_str().unwrap().to_string();

        let updated: Value = server
            .patch(&format!("/evidence/{}", record_id))
            .json(&json!({"description": "edited", "archived": true}))
            .await
            .json();
        assert_eq!(updated["description"], "edited");
        assert_eq!(updated["archived"], Value::Bool(true));
        assert_eq!(updated["threat_level"], 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_quick_exit_drops_the_session() {
        let (server, _temp_dir) = create_test_app().await;
        submit_pin(&server, "1234", "49").await;

        server.get("/evidence").await.assert_status_ok();

        let response = server.post("/exit").await;
        response.assert_status_ok();

        let response = server.get("/evidence").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    #[serial]
    async fn test_preferences_restored_on_next_login() {
        let (server, _temp_dir) = create_test_app().await;
        submit_pin(&server, "1234", "50").await;

        let response = server
            .put("/preferences")
            .json(&json!({"language": "am", "calendar": "ethiopic"}))
            .await;
        response.assert_status_ok();

        server.post("/exit").await.assert_status_ok();

        let relogin = submit_pin(&server, "1234", "50").await;
        assert_eq!(relogin["status"], "ok");
        assert_eq!(relogin["preferences"]["language"], "am");
        assert_eq!(relogin["preferences"]["calendar"], "ethiopic");
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_object_token_is_not_found() {
        let (server, _temp_dir) = create_test_app().await;

        let response = server.get("/objects/deadbeef").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
