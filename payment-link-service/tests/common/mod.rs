#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use payment_link_service::config::{
    AuthorizationConfig, CallbackConfig, Config, ObservabilityConfig, ProviderConfig,
    ReconciliationConfig, RedirectMode, ServerConfig, StoreBackend, StoreConfig,
};
use payment_link_service::services::{InMemoryTransactionStore, ManualClock, PayOsClient};
use payment_link_service::startup::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const CHECKSUM_KEY: &str = "test-checksum-key";
pub const SUCCESS_PAGE: &str = "https://front.test/payment/success";
pub const CANCEL_PAGE: &str = "https://front.test/payment/cancel";

/// Answers like payOS, echoing the requested order code and amount.
pub struct PayOsResponder {
    pub delay: Option<std::time::Duration>,
}

impl Respond for PayOsResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let order_code = body["orderCode"].as_i64().unwrap_or_default();

        let template = ResponseTemplate::new(200).set_body_json(json!({
            "code": "00",
            "desc": "success",
            "data": {
                "checkoutUrl": format!("https://pay.payos.vn/web/plink-{}", order_code),
                "paymentLinkId": format!("plink-{}", order_code),
                "orderCode": order_code,
                "amount": body["amount"],
                "currency": "VND",
                "status": "PENDING"
            },
            "signature": "unchecked"
        }));

        match self.delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap()
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryTransactionStore>,
    pub payos: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a config tweak applied before startup.
    pub async fn spawn_with(customize: impl FnOnce(&mut Config)) -> Self {
        let payos = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/payment-requests"))
            .respond_with(PayOsResponder { delay: None })
            .mount(&payos)
            .await;

        let mut config = test_config(&payos.uri());
        customize(&mut config);

        let clock = Arc::new(ManualClock::new(start_time()));
        let store = Arc::new(InMemoryTransactionStore::new());
        let provider = Arc::new(PayOsClient::new(config.provider.clone()));

        let app = Application::build_with(config, store.clone(), provider, clock.clone())
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Redirect handlers answer 302; tests inspect them instead of following.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            clock,
            store,
            payos,
            client,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub async fn create_payment(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/payment/create", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a payment and return its order code.
    pub async fn create_pending(&self, amount: i64) -> i64 {
        let response = self
            .create_payment(json!({ "amount": amount, "description": "Test order" }))
            .await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["orderCode"].as_i64().expect("orderCode missing")
    }

    pub async fn history(&self) -> Vec<Value> {
        let response = self
            .client
            .get(format!("{}/payment/history", self.address))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn post_webhook(&self, body: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/payment/webhook", self.address))
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path_and_query))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

pub fn test_config(payos_url: &str) -> Config {
    Config {
        service_name: "payment-link-service-test".to_string(),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            url: Secret::new("mongodb://localhost:27017".to_string()),
            db_name: "payment_test".to_string(),
        },
        provider: ProviderConfig {
            client_id: "test-client".to_string(),
            api_key: Secret::new("test-api-key".to_string()),
            checksum_key: Secret::new(CHECKSUM_KEY.to_string()),
            api_base_url: payos_url.to_string(),
            timeout_secs: 2,
            currency: "VND".to_string(),
            verify_webhooks: false,
        },
        callbacks: CallbackConfig {
            public_base_url: "http://shop.test".to_string(),
            success_redirect_url: SUCCESS_PAGE.to_string(),
            cancel_redirect_url: CANCEL_PAGE.to_string(),
            redirect_mode: RedirectMode::Redirect,
        },
        reconciliation: ReconciliationConfig {
            expiry_window_secs: 600,
            sweep_interval_secs: 0,
            default_description: "Default order".to_string(),
        },
        authorization: AuthorizationConfig {
            enabled: false,
            roles: HashMap::from([
                ("manager".to_string(), vec!["payment.*".to_string()]),
                (
                    "employee".to_string(),
                    vec!["payment.link:create".to_string()],
                ),
            ]),
        },
        observability: ObservabilityConfig {
            log_level: "info".to_string(),
            otlp_endpoint: None,
        },
    }
}
