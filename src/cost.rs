//! Upstream credit estimation.

// self
use crate::query::{BoundingBox, Query, QueryKey, QueryTarget};

/// Highest credit tier charged by upstream.
pub const MAX_CREDITS: u8 = 4;

/// Maps an area in square degrees to its credit tier.
///
/// `≤ 25 → 1`, `≤ 100 → 2`, `≤ 400 → 3`, anything larger (or NaN) `→ 4`.
pub fn tier_for_area(area: f64) -> u8 {
	match area {
		a if a <= 25. => 1,
		a if a <= 100. => 2,
		a if a <= 400. => 3,
		_ => MAX_CREDITS,
	}
}

/// Pure mapping from queries to the credits upstream charges for them.
#[derive(Clone, Copy, Debug)]
pub struct CostEstimator {
	default_region: BoundingBox,
}
impl CostEstimator {
	/// Creates an estimator; queries against `default_region` are treated as minimal cost.
	pub fn new(default_region: BoundingBox) -> Self {
		Self { default_region }
	}

	/// Credits charged for `query`.
	pub fn estimate(&self, query: &Query) -> u8 {
		match query {
			Query::Region { bbox, .. } => self.estimate_region(bbox),
			Query::Aircraft { .. } | Query::DefaultRegion { .. } => 1,
			Query::Global { .. } => MAX_CREDITS,
		}
	}

	/// Credits charged for an already normalized key.
	pub fn estimate_key(&self, key: &QueryKey) -> u8 {
		match key.target() {
			QueryTarget::Region(bbox) => self.estimate_region(bbox),
			QueryTarget::Aircraft(_) => 1,
			QueryTarget::Global => MAX_CREDITS,
		}
	}

	fn estimate_region(&self, bbox: &BoundingBox) -> u8 {
		if *bbox == self.default_region { 1 } else { tier_for_area(bbox.area()) }
	}
}
