//! Role-based capability checks applied as route middleware.
//!
//! The upstream gateway authenticates users and forwards the caller identity in
//! `x-user-id` / `x-user-role`. A [`CapabilityPolicy`] maps roles to granted
//! capability keys (`{domain}.{resource}:{action}`); grants may be `*` or end
//! with `*` to match a prefix.
//!
//! When the policy is disabled every caller is admitted, and whatever identity
//! headers are present are still attached to the request as a [`Caller`].

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Identity forwarded by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Self {
            user_id: header(USER_ID_HEADER).map(str::to_string),
            role: header(USER_ROLE_HEADER).map(|r| r.to_ascii_lowercase()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityPolicy {
    enabled: bool,
    grants: Arc<HashMap<String, Vec<String>>>,
}

impl CapabilityPolicy {
    pub fn new(enabled: bool, grants: HashMap<String, Vec<String>>) -> Self {
        let grants = grants
            .into_iter()
            .map(|(role, caps)| (role.to_ascii_lowercase(), caps))
            .collect();

        Self {
            enabled,
            grants: Arc::new(grants),
        }
    }

    /// Policy that admits every caller.
    pub fn disabled() -> Self {
        Self::new(false, HashMap::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `role` is granted `capability`.
    pub fn allows(&self, role: &str, capability: &str) -> bool {
        self.grants
            .get(&role.to_ascii_lowercase())
            .is_some_and(|granted| has_capability(granted, capability))
    }

    /// Bind this policy to one capability, producing middleware state for
    /// [`require_capability`].
    pub fn require(&self, capability: &'static str) -> RequiredCapability {
        RequiredCapability {
            policy: self.clone(),
            capability,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequiredCapability {
    policy: CapabilityPolicy,
    capability: &'static str,
}

impl RequiredCapability {
    pub fn capability(&self) -> &'static str {
        self.capability
    }
}

/// Reject the request unless the caller's role grants the bound capability.
///
/// Compose with `route_layer(from_fn_with_state(policy.require(CAP), require_capability))`.
pub async fn require_capability(
    State(required): State<RequiredCapability>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = Caller::from_headers(req.headers());

    if required.policy.is_enabled() {
        let Some(user_id) = caller.user_id.as_deref() else {
            tracing::warn!(
                capability = required.capability,
                path = %req.uri().path(),
                "Missing caller identity"
            );
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Missing {} header",
                USER_ID_HEADER
            )));
        };

        let role = caller.role.as_deref().unwrap_or_default();
        if !required.policy.allows(role, required.capability) {
            tracing::warn!(
                user_id = %user_id,
                role = %role,
                capability = required.capability,
                "Capability denied"
            );
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Missing capability {}",
                required.capability
            )));
        }
    }

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

fn has_capability(granted: &[String], required: &str) -> bool {
    granted.iter().any(|grant| {
        grant == "*"
            || grant == required
            || grant
                .strip_suffix('*')
                .is_some_and(|prefix| required.starts_with(prefix))
    })
}
