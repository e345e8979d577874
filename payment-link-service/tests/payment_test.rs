mod common;

use common::{PayOsResponder, TestApp};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn create_payment_returns_checkout_link() {
    let app = TestApp::spawn().await;

    let response = app
        .create_payment(json!({ "amount": 5000, "description": "Haircut" }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    let order_code = body["orderCode"].as_i64().expect("orderCode missing");
    assert_eq!(body["paymentLinkId"], format!("plink-{}", order_code));
    assert_eq!(
        body["checkoutUrl"],
        format!("https://pay.payos.vn/web/plink-{}", order_code)
    );

    let history = app.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["orderCode"], order_code);
    assert_eq!(history[0]["amount"], 5000);
    assert_eq!(history[0]["description"], "Haircut");
    assert_eq!(history[0]["statusCode"], "PENDING");
    assert_eq!(history[0]["statusLabel"], "Awaiting payment");
}

#[tokio::test]
async fn create_payment_sends_callbacks_to_provider() {
    let app = TestApp::spawn().await;

    let order_code = app.create_pending(12000).await;

    let requests = app
        .payos
        .received_requests()
        .await
        .expect("Request recording disabled");
    assert_eq!(requests.len(), 1);

    let sent: Value = serde_json::from_slice(&requests[0].body).expect("Invalid request body");
    assert_eq!(sent["orderCode"], order_code);
    assert_eq!(
        sent["returnUrl"],
        format!("http://shop.test/payment/success?orderCode={}", order_code)
    );
    assert_eq!(
        sent["cancelUrl"],
        format!("http://shop.test/payment/cancel?orderCode={}", order_code)
    );
    assert_eq!(sent["description"], "Test order");
    assert!(sent["signature"].as_str().is_some_and(|s| s.len() == 64));
}

#[tokio::test]
async fn missing_description_uses_default() {
    let app = TestApp::spawn().await;

    let response = app.create_payment(json!({ "amount": 3000 })).await;
    assert_eq!(response.status().as_u16(), 200);

    let history = app.history().await;
    assert_eq!(history[0]["description"], "Default order");
}

#[tokio::test]
async fn invalid_amounts_are_rejected_without_a_record() {
    let app = TestApp::spawn().await;

    for body in [
        json!({ "amount": 0 }),
        json!({ "amount": -5000 }),
        json!({ "amount": 10.5 }),
        json!({ "amount": "5000" }),
        json!({ "description": "no amount" }),
    ] {
        let response = app.create_payment(body.clone()).await;
        assert_eq!(response.status().as_u16(), 400, "body {} was accepted", body);
    }

    assert!(app.history().await.is_empty());
    assert!(app
        .payos
        .received_requests()
        .await
        .unwrap_or_default()
        .is_empty());
}

#[tokio::test]
async fn overlong_description_is_unprocessable() {
    let app = TestApp::spawn().await;

    let response = app
        .create_payment(json!({ "amount": 5000, "description": "x".repeat(256) }))
        .await;

    assert_eq!(response.status().as_u16(), 422);
    assert!(app.history().await.is_empty());
}

#[tokio::test]
async fn provider_rejection_is_bad_gateway() {
    let app = TestApp::spawn().await;
    app.payos.reset().await;
    Mock::given(method("POST"))
        .and(path("/v2/payment-requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "214",
            "desc": "Cong thanh toan khong ton tai",
            "data": null
        })))
        .mount(&app.payos)
        .await;

    let response = app.create_payment(json!({ "amount": 5000 })).await;

    assert_eq!(response.status().as_u16(), 502);
    assert!(app.history().await.is_empty());
}

#[tokio::test]
async fn provider_timeout_is_bad_gateway() {
    let app = TestApp::spawn().await;
    app.payos.reset().await;
    Mock::given(method("POST"))
        .respond_with(PayOsResponder {
            delay: Some(std::time::Duration::from_secs(5)),
        })
        .mount(&app.payos)
        .await;

    let response = app.create_payment(json!({ "amount": 5000 })).await;

    assert_eq!(response.status().as_u16(), 502);
    assert!(app.history().await.is_empty());
}

#[tokio::test]
async fn creation_completes_when_client_gives_up() {
    let app = TestApp::spawn().await;
    app.payos.reset().await;
    Mock::given(method("POST"))
        .respond_with(PayOsResponder {
            delay: Some(std::time::Duration::from_millis(600)),
        })
        .mount(&app.payos)
        .await;

    let impatient = reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(150))
        .build()
        .expect("Failed to build HTTP client");
    let result = impatient
        .post(format!("{}/payment/create", app.address))
        .json(&json!({ "amount": 7000 }))
        .send()
        .await;
    assert!(result.is_err());

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let history = app.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["amount"], 7000);
    assert_eq!(history[0]["statusCode"], "PENDING");
}

#[tokio::test]
async fn order_codes_are_unique_across_creations() {
    let app = TestApp::spawn().await;

    let mut codes = Vec::new();
    for amount in [1000, 2000, 3000] {
        codes.push(app.create_pending(amount).await);
    }

    assert!(codes.windows(2).all(|pair| pair[1] > pair[0]));
    assert_eq!(app.history().await.len(), 3);
}
