//! Client credentials, token models, the token-issuing seam, and the single-flight
//! [`TokenManager`].

pub mod credentials;
pub mod issuer;
pub mod manager;
pub mod token;

pub use credentials::*;
pub use issuer::*;
pub use manager::*;
pub use token::{metrics::*, record::*, secret::*};
