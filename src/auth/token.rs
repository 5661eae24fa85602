//! Access-token value types and issuance counters.

pub mod metrics;
pub mod record;
pub mod secret;
