
#[cfg(test)]
mod object_ops_tests {
    use super::test_utils::shared::*;
    use cairn_rs::{CairnError, CairnObject, Pointer};
    use reqwest::Method;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[tokio::test]
    async fn test_save_posts_new_objects_and_merges_the_response() {
        let (client, transport) = mock_client();
        transport.respond(json!({
            "objectId": "abc123",
            "createdAt": "2026-08-01T10:00:00.000Z",
        }));

        let score = new_score(42, "Ann");
        let saved = client.save(&score).await.expect("save failed");

        assert_eq!(saved.object_id.as_deref(), Some("abc123"));
        assert_eq!(saved.created_at.as_deref(), Some("2026-08-01T10:00:00.000Z"));
        // A fresh object has never been updated; the server only sends
        // createdAt, which doubles as the update time.
        assert_eq!(saved.updated_at, saved.created_at);
        assert_eq!(saved.score, 42);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url, format!("{}/classes/GameScore", MOUNT));
        assert_eq!(
            transport.body_json(0),
            json!({"score": 42, "playerName": "Ann"})
        );
    }

    #[tokio::test]
    async fn test_save_puts_existing_objects_without_server_fields() {
        let (client, transport) = mock_client();
        transport.respond(json!({"updatedAt": "2026-08-02T09:30:00.000Z"}));

        let mut score = saved_score("abc123", 42, "Ann");
        score.created_at = Some("2026-08-01T10:00:00.000Z".to_string());
        score.score = 50;
        let saved = client.save(&score).await.expect("save failed");

        assert_eq!(saved.object_id.as_deref(), Some("abc123"));
        assert_eq!(saved.updated_at.as_deref(), Some("2026-08-02T09:30:00.000Z"));
        assert_eq!(saved.created_at.as_deref(), Some("2026-08-01T10:00:00.000Z"));
        assert_eq!(saved.score, 50);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(
            requests[0].url,
            format!("{}/classes/GameScore/abc123", MOUNT)
        );
        assert_eq!(
            transport.body_json(0),
            json!({"score": 50, "playerName": "Ann"})
        );
    }

    #[tokio::test]
    async fn test_fetch_gets_the_object_by_id() {
        let (client, transport) = mock_client();
        transport.respond(json!({
            "objectId": "abc123",
            "score": 42,
            "playerName": "Ann",
            "createdAt": "2026-08-01T10:00:00.000Z",
            "updatedAt": "2026-08-01T10:00:00.000Z",
        }));

        let fetched = client
            .fetch(&saved_score("abc123", 0, ""))
            .await
            .expect("fetch failed");
        assert_eq!(fetched.score, 42);
        assert_eq!(fetched.player_name, "Ann");

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(
            requests[0].url,
            format!("{}/classes/GameScore/abc123", MOUNT)
        );
        assert!(requests[0].body.is_none());

        let unsaved = client.fetch(&new_score(1, "Ben")).await;
        assert!(matches!(unsaved, Err(CairnError::MissingObjectId)));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_pointer_fetch_can_include_related_objects() {
        let (client, transport) = mock_client();
        transport.respond(json!({
            "objectId": "abc123",
            "score": 42,
            "playerName": "Ann",
        }));

        let pointer: Pointer<GameScore> = Pointer::new("abc123");
        let fetched = pointer
            .fetch(Some(&["player"]), &client)
            .await
            .expect("pointer fetch failed");
        assert_eq!(fetched.score, 42);

        let requests = transport.requests();
        assert!(requests[0].url.contains("include=%5B%22player%22%5D"));
    }

    #[tokio::test]
    async fn test_delete_issues_a_delete_and_needs_an_id() {
        let (client, transport) = mock_client();
        transport.respond(json!({}));

        client
            .delete(&saved_score("abc123", 42, "Ann"))
            .await
            .expect("delete failed");

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::DELETE);
        assert_eq!(
            requests[0].url,
            format!("{}/classes/GameScore/abc123", MOUNT)
        );
        assert!(requests[0].body.is_none());

        let unsaved = client.delete(&new_score(1, "Ben")).await;
        assert!(matches!(unsaved, Err(CairnError::MissingObjectId)));
        assert_eq!(transport.request_count(), 1);
    }

    #[derive(Serialize, Deserialize, Debug, Clone)]
    struct Misnamed {
        #[serde(rename = "objectId", skip_serializing_if = "Option::is_none")]
        object_id: Option<String>,
    }

    impl CairnObject for Misnamed {
        fn class_name() -> &'static str {
            "no-dashes-allowed"
        }

        fn object_id(&self) -> Option<&str> {
            self.object_id.as_deref()
        }
    }

    #[tokio::test]
    async fn test_invalid_class_names_fail_before_the_network() {
        let (client, transport) = mock_client();
        let object = Misnamed { object_id: None };
        let result = client.save(&object).await;
        assert!(matches!(result, Err(CairnError::InvalidClassName(_))));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_requests_carry_the_app_id_and_one_credential() {
        let (client, transport) = mock_client();
        transport.respond(json!({"objectId": "abc123", "createdAt": "2026-08-01T10:00:00.000Z"}));
        transport.respond(json!({"objectId": "abc123", "score": 1, "playerName": "Ann"}));

        client
            .save(&new_score(1, "Ann"))
            .await
            .expect("save failed");
        client
            .fetch(&saved_score("abc123", 0, ""))
            .await
            .expect("fetch failed");

        assert_eq!(
            transport.header(0, "X-Cairn-Application-Id").as_deref(),
            Some("test-app-id")
        );
        assert_eq!(
            transport.header(0, "X-Cairn-Client-Key").as_deref(),
            Some("test-client-key")
        );
        assert!(transport.header(0, "X-Cairn-Master-Key").is_none());
        assert_eq!(
            transport.header(0, "Content-Type").as_deref(),
            Some("application/json")
        );
        // GETs carry no body, so no content type either.
        assert!(transport.header(1, "Content-Type").is_none());
    }

    #[tokio::test]
    async fn test_a_restored_session_outranks_the_client_key() {
        let (client, transport) = mock_client();
        let mut user = new_user("ann");
        user.object_id = Some("u1".to_string());
        user.session_token = Some("r:abc".to_string());
        client.remember_user(&user).expect("remember failed");
        let restored: Option<TestUser> = client.restore_session().expect("restore failed");
        assert!(restored.is_some());

        transport.respond(json!({"objectId": "abc123", "createdAt": "2026-08-01T10:00:00.000Z"}));
        client
            .save(&new_score(1, "Ann"))
            .await
            .expect("save failed");

        assert_eq!(
            transport.header(0, "X-Cairn-Session-Token").as_deref(),
            Some("r:abc")
        );
        assert!(transport.header(0, "X-Cairn-Client-Key").is_none());
    }

    #[test]
    fn test_save_blocking_runs_outside_a_runtime() {
        let (client, transport) = mock_client();
        transport.respond(json!({"objectId": "abc123", "createdAt": "2026-08-01T10:00:00.000Z"}));

        let saved = client
            .save_blocking(&new_score(42, "Ann"))
            .expect("save_blocking failed");
        assert_eq!(saved.object_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_delete_with_callback_reports_the_outcome() {
        let (client, transport) = mock_client();
        transport.respond(json!({}));

        let (sender, receiver) = tokio::sync::oneshot::channel();
        client.delete_with_callback(&saved_score("abc123", 1, "Ann"), move |result| {
            sender.send(result).ok();
        });

        receiver
            .await
            .expect("callback dropped")
            .expect("delete failed");
    }
}
