#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the report intake endpoint.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TEST_API_KEY, TestApp, test_config};
use forum_bridge_kernel::Config;
use forum_bridge_kernel::services::report::DEFAULT_CATEGORY_ID;
use forum_bridge_kernel::services::topic_fields::REPORT_URL_FIELD;
use forum_bridge_kernel::settings::REPORT_API_ENABLED;
use forum_bridge_kernel::store::{SettingsStore, TopicStore, UserStore};
use forum_bridge_test_utils::{assert, test_identity, test_report};

#[tokio::test]
async fn missing_required_fields_are_rejected_without_side_effects() {
    let app = TestApp::new();

    for field in ["id", "title", "description", "user_info"] {
        let body = test_report("r1", "Missing field").without(field).into_json();
        let (status, json) = app.post_report(&body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "field {field}");
        assert::error_message(&json, "Missing required parameters");
    }

    assert_eq!(app.counts(), (0, 0, 0));
}

#[tokio::test]
async fn blank_fields_and_empty_user_info_count_as_missing() {
    let app = TestApp::new();

    let mut body = test_report("r1", "Blank").into_json();
    body["description"] = json!("  ");
    let (status, _) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = test_report("r1", "Empty info")
        .with_user_info(json!({}))
        .into_json();
    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_message(&json, "Missing required parameters");

    let (status, json) = app
        .post_report_with_key(Some(TEST_API_KEY), "not json at all")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_message(&json, "Missing required parameters");

    assert_eq!(app.counts(), (0, 0, 0));
}

#[tokio::test]
async fn wrong_key_is_unauthorized_without_side_effects() {
    let app = TestApp::new();
    let body = test_report("r1", "Wrong key").into_json().to_string();

    let (status, json) = app.post_report_with_key(Some("nope"), body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::error_message(&json, "Invalid API key");

    let (status, _) = app.post_report_with_key(None, body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.counts(), (0, 0, 0));
}

#[tokio::test]
async fn key_is_checked_before_fields() {
    let app = TestApp::new();
    let (status, json) = app.post_report_with_key(Some("nope"), "{}").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert::error_message(&json, "Invalid API key");
}

#[tokio::test]
async fn empty_server_secret_rejects_everything() {
    let app = TestApp::with_config(Config {
        report_api_key: String::new(),
        ..test_config()
    });
    let body = test_report("r1", "No secret").into_json().to_string();

    let (status, _) = app.post_report_with_key(Some(""), body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post_report_with_key(None, body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.counts(), (0, 0, 0));
}

#[tokio::test]
async fn disabled_api_is_not_found_after_key_check() {
    let app = TestApp::new();
    app.store
        .set_site_setting(REPORT_API_ENABLED, &json!(false))
        .await
        .unwrap();
    let body = test_report("r1", "Disabled").into_json().to_string();

    let (status, _) = app.post_report_with_key(Some("nope"), body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = app
        .post_report_with_key(Some(TEST_API_KEY), body)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert::error_message(&json, "not found");
    assert_eq!(app.counts(), (0, 0, 0));
}

#[tokio::test]
async fn missing_subject_is_user_not_registered() {
    let app = TestApp::new();
    let body = test_report("r1", "No subject")
        .with_user_info(
            test_identity("ignored")
                .without_subject()
                .with_email("someone@example.com")
                .into_json(),
        )
        .into_json();

    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_message(&json, "user not registered");
    assert_eq!(app.counts(), (0, 0, 0));
}

#[tokio::test]
async fn fresh_identity_creates_one_user_and_one_link() {
    let app = TestApp::new();
    let body = test_report("r1", "Fresh user")
        .with_user_info(
            test_identity("sub-fresh")
                .with_email("fresh@example.com")
                .with_name("Fresh")
                .with_picture("https://img.example.com/f.png")
                .into_json(),
        )
        .into_json();

    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let user = app
        .store
        .find_user_by_email("fresh@example.com")
        .await
        .unwrap()
        .expect("user created");
    assert_eq!(json["user_id"], user.id);
    assert_eq!(json["username"], "fresh");
    assert_eq!(app.store.user_count(), 1);

    let links = app.store.external_accounts();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].user_id, user.id);
    assert_eq!(links[0].provider_name, "oidc");
    assert_eq!(links[0].provider_uid, "sub-fresh");
    assert_eq!(links[0].info["image"], "https://img.example.com/f.png");
}

#[tokio::test]
async fn repeated_reports_from_same_identity_keep_one_link() {
    let app = TestApp::new();
    let identity = test_identity("sub-repeat")
        .with_email("repeat@example.com")
        .into_json();

    let mut user_ids = Vec::new();
    for id in ["r1", "r2", "r3"] {
        let body = test_report(id, "Repeat report")
            .with_user_info(identity.clone())
            .into_json();
        let (status, json) = app.post_report(&body).await;
        assert_eq!(status, StatusCode::OK);
        user_ids.push(json["user_id"].clone());
    }

    assert!(user_ids.iter().all(|id| *id == user_ids[0]));
    assert_eq!(app.store.user_count(), 1);
    assert_eq!(app.store.external_accounts().len(), 1);
    assert_eq!(app.store.topic_count(), 3);
}

#[tokio::test]
async fn report_id_is_not_deduplicated() {
    let app = TestApp::new();
    let body = test_report("same-id", "Duplicate").into_json();

    let (first, _) = app.post_report(&body).await;
    let (second, _) = app.post_report(&body).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(app.store.topic_count(), 2);
}

#[tokio::test]
async fn tags_reuse_existing_and_create_missing() {
    let app = TestApp::new();
    app.store.find_or_create_tag("a").await.unwrap();

    let body = test_report("r1", "Tagged").with_tags(&["a", "b"]).into_json();
    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.store.tag_count(), 2);
    let topic_id = json["topic_id"].as_i64().unwrap();
    let names: Vec<String> = app
        .store
        .topic_tags(topic_id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn report_url_is_stored_only_when_present() {
    let app = TestApp::new();

    let body = test_report("r1", "With url")
        .with_report_url("https://reports.example.com/1")
        .into_json();
    let (_, with_url) = app.post_report(&body).await;

    let body = test_report("r2", "Without url").into_json();
    let (_, without_url) = app.post_report(&body).await;

    let field = |json: &serde_json::Value| {
        let topic_id = json["topic_id"].as_i64().unwrap();
        let store = app.store.clone();
        async move {
            store
                .topic_custom_field(topic_id, REPORT_URL_FIELD)
                .await
                .unwrap()
        }
    };
    assert_eq!(
        field(&with_url).await.as_deref(),
        Some("https://reports.example.com/1")
    );
    assert_eq!(field(&without_url).await, None);
}

#[tokio::test]
async fn chinese_report_end_to_end() {
    let app = TestApp::new();
    let body = json!({
        "id": "test-001",
        "title": "测试报告",
        "description": "这是一个测试报告",
        "report_url": "https://example.com/report/001",
        "tags": ["测试", "报告"],
        "content_type": "text",
        "user_info": {
            "authing_user_id": "test_user_123",
            "email": "test@example.com",
            "name": "测试用户",
            "username": "testuser"
        }
    });

    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["username"], "testuser");

    let topic_id = json["topic_id"].as_i64().unwrap();
    assert_eq!(json["topic_url"], format!("/t/topic/{topic_id}"));

    let user = app
        .store
        .find_user_by_email("test@example.com")
        .await
        .unwrap()
        .expect("user created");
    assert_eq!(user.name, "测试用户");
    assert!(user.active && user.approved);
    assert_eq!(user.trust_level, 1);

    let post = app.store.first_post(topic_id).await.unwrap().unwrap();
    assert_eq!(post.post_number, 1);
    assert_eq!(post.raw, "这是一个测试报告\n\n\n**内容类型：** text");
}

#[tokio::test]
async fn first_post_raw_equals_description_without_content_type() {
    let app = TestApp::new();
    let body = test_report("r1", "测试报告")
        .with_description("这是一个测试报告")
        .into_json();

    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::OK);

    let topic_id = json["topic_id"].as_i64().unwrap();
    let post = app.store.first_post(topic_id).await.unwrap().unwrap();
    assert_eq!(post.raw, "这是一个测试报告");
}

#[tokio::test]
async fn short_title_is_rejected_with_prefix_stripped() {
    let app = TestApp::new();
    let body = test_report("r1", "x").into_json();

    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_message(&json, "Title is too short (minimum is 2 characters)");

    // The user is resolved before the topic fails; nothing is rolled back.
    assert_eq!(app.counts(), (1, 0, 0));
}

#[tokio::test]
async fn report_lands_in_first_public_category() {
    let app = TestApp::new();
    app.store.add_category("Uncategorized", false);
    app.store.add_category("Staff", true);
    let reports = app.store.add_category("Reports", false);

    let (status, json) = app
        .post_report(&test_report("r1", "Categorised").into_json())
        .await;
    assert_eq!(status, StatusCode::OK);

    let topic = app
        .store
        .find_topic(json["topic_id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(topic.category_id, reports.id);
}

#[tokio::test]
async fn report_falls_back_to_default_category() {
    let app = TestApp::new();
    assert!(app.store.list_categories().await.unwrap().is_empty());

    let (status, json) = app
        .post_report(&test_report("r1", "No categories").into_json())
        .await;
    assert_eq!(status, StatusCode::OK);

    let topic = app
        .store
        .find_topic(json["topic_id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(topic.category_id, DEFAULT_CATEGORY_ID);
    assert_eq!(topic.category_id, 1);
}

#[tokio::test]
async fn tag_names_are_matched_exactly() {
    let app = TestApp::new();
    app.store.find_or_create_tag("a").await.unwrap();

    let body = test_report("r1", "Padded tags")
        .with_tags(&[" a ", "a"])
        .into_json();
    let (status, json) = app.post_report(&body).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<String> = app
        .store
        .topic_tags(json["topic_id"].as_i64().unwrap())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec![" a ", "a"]);
    assert_eq!(app.store.tag_count(), 2);
}
