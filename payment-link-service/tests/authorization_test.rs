mod common;

use common::TestApp;
use serde_json::json;

async fn spawn_secured() -> TestApp {
    TestApp::spawn_with(|config| config.authorization.enabled = true).await
}

async fn create_as(app: &TestApp, user: Option<&str>, role: Option<&str>) -> reqwest::Response {
    let mut request = app
        .client
        .post(format!("{}/payment/create", app.address))
        .json(&json!({ "amount": 5000 }));
    if let Some(user) = user {
        request = request.header("x-user-id", user);
    }
    if let Some(role) = role {
        request = request.header("x-user-role", role);
    }
    request.send().await.expect("Failed to execute request")
}

async fn history_as(app: &TestApp, user: &str, role: &str) -> reqwest::Response {
    app.client
        .get(format!("{}/payment/history", app.address))
        .header("x-user-id", user)
        .header("x-user-role", role)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn anonymous_create_is_unauthorized() {
    let app = spawn_secured().await;

    let response = create_as(&app, None, None).await;

    assert_eq!(response.status().as_u16(), 401);
    assert!(app.payos.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn employee_can_create_but_not_read_history() {
    let app = spawn_secured().await;

    let created = create_as(&app, Some("e-1"), Some("employee")).await;
    assert_eq!(created.status().as_u16(), 200);

    let history = history_as(&app, "e-1", "employee").await;
    assert_eq!(history.status().as_u16(), 403);
}

#[tokio::test]
async fn manager_wildcard_grants_everything() {
    let app = spawn_secured().await;

    let created = create_as(&app, Some("m-1"), Some("Manager")).await;
    assert_eq!(created.status().as_u16(), 200);

    let history = history_as(&app, "m-1", "manager").await;
    assert_eq!(history.status().as_u16(), 200);
    let body: Vec<serde_json::Value> = history.json().await.expect("Failed to parse JSON");
    assert_eq!(body.len(), 1);
}

#[tokio::test]
async fn provider_callbacks_need_no_identity() {
    let app = spawn_secured().await;

    let webhook = app
        .post_webhook(&json!({ "paymentLinkId": "plink-unknown", "status": "SUCCESS" }).to_string())
        .await;
    assert_eq!(webhook.status().as_u16(), 200);

    let redirect = app.get("/payment/success?orderCode=1").await;
    assert_eq!(redirect.status().as_u16(), 302);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = spawn_secured().await;

    let response = app
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/payment/create", app.address),
        )
        .header("origin", "https://front.test")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
