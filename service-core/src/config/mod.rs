//! Layered configuration loading shared by the services.
//!
//! Sources, lowest precedence first: defaults registered on the builder by the
//! service, an optional `configuration.{toml,yaml,json}` file in the working
//! directory, then environment variables `{PREFIX}__SECTION__KEY`. Overrides
//! registered on the builder win over every source.

use crate::error::AppError;
use config::builder::DefaultState;
use config::{Config as Cfg, ConfigBuilder, Environment, File};
use serde::de::DeserializeOwned;

pub type Builder = ConfigBuilder<DefaultState>;

/// Start a builder for a service configuration.
pub fn builder() -> Builder {
    Cfg::builder()
}

/// Read `.env`, add the file and environment sources to `builder`, and
/// deserialize the result.
pub fn load<T: DeserializeOwned>(env_prefix: &str, builder: Builder) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = builder
        .add_source(File::with_name("configuration").required(false))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
