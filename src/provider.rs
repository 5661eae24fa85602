//! Upstream-facing descriptors.
//!
//! `descriptor` exposes validated metadata ([`UpstreamDescriptor`]) covering the token and
//! states endpoints plus the client authentication style the token endpoint expects.

pub mod descriptor;

pub use descriptor::*;
