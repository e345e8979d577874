//! Service configuration.
//!
//! Defaults are registered here, then `service_core::config::load` layers the
//! optional `configuration` file and `PAYMENT__SECTION__KEY` environment
//! variables on top. The deployment variables used by the payOS dashboard
//! setup (`PAYOS_CLIENT_ID`, `FRONTEND_SUCCESS_URL`, `PORT`, ...) win over
//! everything.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config::{self as core_config, Builder};
use service_core::error::AppError;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

pub const ENV_PREFIX: &str = "PAYMENT";

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub service_name: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub provider: ProviderConfig,
    pub callbacks: CallbackConfig,
    pub reconciliation: ReconciliationConfig,
    pub authorization: AuthorizationConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Mongodb,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: Secret<String>,
    pub db_name: String,
}

/// payOS merchant credentials and call settings.
#[derive(Deserialize, Clone, Debug)]
pub struct ProviderConfig {
    pub client_id: String,
    pub api_key: Secret<String>,
    pub checksum_key: Secret<String>,
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub currency: String,
    pub verify_webhooks: bool,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
            && !self.api_key.expose_secret().is_empty()
            && !self.checksum_key.expose_secret().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// 302 to the front-end page.
    Redirect,
    /// JSON echo of the resulting status.
    Json,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CallbackConfig {
    /// Base URL the provider sends browsers back to, without trailing slash.
    pub public_base_url: String,
    pub success_redirect_url: String,
    pub cancel_redirect_url: String,
    pub redirect_mode: RedirectMode,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReconciliationConfig {
    pub expiry_window_secs: i64,
    /// Zero disables the background sweep.
    pub sweep_interval_secs: u64,
    pub default_description: String,
}

impl ReconciliationConfig {
    pub fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiry_window_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthorizationConfig {
    pub enabled: bool,
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Load from defaults, file and environment.
    pub fn load() -> Result<Self, AppError> {
        let builder = Self::with_env_overrides(Self::defaults()?)?;
        core_config::load(ENV_PREFIX, builder)
    }

    pub fn defaults() -> Result<Builder, AppError> {
        Ok(core_config::builder()
            .set_default("service_name", "payment-link-service")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("store.backend", "memory")?
            .set_default("store.url", "mongodb://localhost:27017")?
            .set_default("store.db_name", "payment_db")?
            .set_default("provider.client_id", "")?
            .set_default("provider.api_key", "")?
            .set_default("provider.checksum_key", "")?
            .set_default("provider.api_base_url", "https://api-merchant.payos.vn")?
            .set_default("provider.timeout_secs", 10)?
            .set_default("provider.currency", "VND")?
            .set_default("provider.verify_webhooks", false)?
            .set_default("callbacks.public_base_url", "http://localhost:5000")?
            .set_default("callbacks.success_redirect_url", "/")?
            .set_default("callbacks.cancel_redirect_url", "/")?
            .set_default("callbacks.redirect_mode", "redirect")?
            .set_default("reconciliation.expiry_window_secs", 600)?
            .set_default("reconciliation.sweep_interval_secs", 0)?
            .set_default("reconciliation.default_description", "Thanh toan don hang")?
            .set_default("authorization.enabled", false)?
            .set_default("authorization.roles.admin", vec!["*"])?
            .set_default(
                "authorization.roles.manager",
                vec!["payment.link:create", "payment.history:read"],
            )?
            .set_default("authorization.roles.employee", vec!["payment.link:create"])?
            .set_default("observability.log_level", "info")?)
    }

    fn with_env_overrides(builder: Builder) -> Result<Builder, AppError> {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

        Ok(builder
            .set_override_option("provider.client_id", var("PAYOS_CLIENT_ID"))?
            .set_override_option("provider.api_key", var("PAYOS_API_KEY"))?
            .set_override_option("provider.checksum_key", var("PAYOS_CHECKSUM_KEY"))?
            .set_override_option("callbacks.success_redirect_url", var("FRONTEND_SUCCESS_URL"))?
            .set_override_option("callbacks.cancel_redirect_url", var("FRONTEND_CANCEL_URL"))?
            .set_override_option("server.port", var("PORT"))?
            .set_override_option("observability.otlp_endpoint", var("OTLP_ENDPOINT"))?)
    }
}
