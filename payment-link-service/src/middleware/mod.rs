//! Capability keys for the payment routes.
//!
//! Enforcement lives in `service_core::middleware::capability`; the routes bind
//! these keys with `CapabilityPolicy::require`.

pub use service_core::middleware::capability::{require_capability, Caller, CapabilityPolicy};

pub mod capabilities {
    /// Create payment links.
    pub const PAYMENT_LINK_CREATE: &str = "payment.link:create";

    /// View transaction history.
    pub const PAYMENT_HISTORY_READ: &str = "payment.history:read";
}
