//! Query model and cache-key normalization.
//!
//! A [`Query`] is what callers ask for; a [`QueryKey`] is its canonical form. Coordinates are
//! stored as fixed-point micro-degrees with min/max ordered, aircraft identifiers are
//! lower-cased, deduplicated and sorted, and the default region is resolved to its bounding
//! box, so semantically identical queries share one cache entry.

// std
use std::sync::OnceLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const MICRO: f64 = 1_000_000.;

/// Errors emitted while validating queries.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum QueryError {
	/// A coordinate was NaN or infinite.
	#[error("Coordinate `{field}` must be a finite number.")]
	NonFinite {
		/// Offending coordinate name.
		field: &'static str,
	},
	/// Latitude outside `[-90, 90]`.
	#[error("Latitude {value} is outside [-90, 90].")]
	LatitudeOutOfRange {
		/// Offending value.
		value: f64,
	},
	/// Longitude outside `[-180, 180]`.
	#[error("Longitude {value} is outside [-180, 180].")]
	LongitudeOutOfRange {
		/// Offending value.
		value: f64,
	},
	/// An aircraft query needs at least one identifier.
	#[error("Aircraft queries require at least one ICAO 24-bit address.")]
	NoAircraft,
	/// Identifier is not a 24-bit hex address.
	#[error("`{id}` is not a valid ICAO 24-bit address.")]
	InvalidIcao24 {
		/// The offending identifier.
		id: String,
	},
}

/// Rectangular region in fixed-point micro-degrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
	min_lat: i64,
	max_lat: i64,
	min_lon: i64,
	max_lon: i64,
}
impl BoundingBox {
	/// Reference default region: 38°N to 43°N, 6°W to 1°W (25 square degrees, one credit).
	pub const DEFAULT_REGION: Self =
		Self { min_lat: 38_000_000, max_lat: 43_000_000, min_lon: -6_000_000, max_lon: -1_000_000 };

	/// 0.1° × 0.1° box at the origin used for reachability probes.
	pub const PROBE_REGION: Self =
		Self { min_lat: 0, max_lat: 100_000, min_lon: 0, max_lon: 100_000 };

	/// Validates and normalizes a region; reversed bounds are swapped.
	pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, QueryError> {
		let min_lat = latitude("min_lat", min_lat)?;
		let max_lat = latitude("max_lat", max_lat)?;
		let min_lon = longitude("min_lon", min_lon)?;
		let max_lon = longitude("max_lon", max_lon)?;

		Ok(Self {
			min_lat: min_lat.min(max_lat),
			max_lat: min_lat.max(max_lat),
			min_lon: min_lon.min(max_lon),
			max_lon: min_lon.max(max_lon),
		})
	}

	/// Southern edge in degrees.
	pub fn min_lat(&self) -> f64 {
		self.min_lat as f64 / MICRO
	}

	/// Northern edge in degrees.
	pub fn max_lat(&self) -> f64 {
		self.max_lat as f64 / MICRO
	}

	/// Western edge in degrees.
	pub fn min_lon(&self) -> f64 {
		self.min_lon as f64 / MICRO
	}

	/// Eastern edge in degrees.
	pub fn max_lon(&self) -> f64 {
		self.max_lon as f64 / MICRO
	}

	/// Area in square degrees.
	pub fn area(&self) -> f64 {
		let lat_span = (self.max_lat - self.min_lat) as f64 / MICRO;
		let lon_span = (self.max_lon - self.min_lon) as f64 / MICRO;

		lat_span * lon_span
	}

	/// Returns `true` when `(latitude, longitude)` lies inside the box, edges included.
	pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
		(self.min_lat()..=self.max_lat()).contains(&latitude)
			&& (self.min_lon()..=self.max_lon()).contains(&longitude)
	}
}
impl Display for BoundingBox {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{},{},{},{}", self.min_lat, self.max_lat, self.min_lon, self.max_lon)
	}
}

/// What the caller wants to see.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
	/// All aircraft inside a region.
	Region {
		/// Queried region.
		bbox: BoundingBox,
		/// Maximum number of states returned.
		limit: Option<usize>,
	},
	/// Specific aircraft by ICAO 24-bit address.
	Aircraft {
		/// Normalized addresses.
		ids: Vec<String>,
		/// Maximum number of states returned.
		limit: Option<usize>,
	},
	/// Every aircraft tracked by upstream.
	Global {
		/// Maximum number of states returned.
		limit: Option<usize>,
	},
	/// The gateway's configured default region.
	DefaultRegion {
		/// Maximum number of states returned.
		limit: Option<usize>,
	},
}
impl Query {
	/// Region query.
	pub fn region(bbox: BoundingBox) -> Self {
		Self::Region { bbox, limit: None }
	}

	/// Aircraft query; identifiers are trimmed, lower-cased, deduplicated and sorted.
	pub fn aircraft<I, S>(ids: I) -> Result<Self, QueryError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut normalized = Vec::new();

		for id in ids {
			let id = id.as_ref().trim().to_ascii_lowercase();

			if id.is_empty() || id.len() > 6 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
				return Err(QueryError::InvalidIcao24 { id });
			}

			normalized.push(id);
		}

		normalized.sort_unstable();
		normalized.dedup();

		if normalized.is_empty() {
			return Err(QueryError::NoAircraft);
		}

		Ok(Self::Aircraft { ids: normalized, limit: None })
	}

	/// Global query.
	pub fn global() -> Self {
		Self::Global { limit: None }
	}

	/// Default-region query.
	pub fn default_region() -> Self {
		Self::DefaultRegion { limit: None }
	}

	/// Caps the number of returned states; zero is raised to one.
	pub fn with_limit(mut self, max: usize) -> Self {
		let max = Some(max.max(1));

		match &mut self {
			Self::Region { limit, .. }
			| Self::Aircraft { limit, .. }
			| Self::Global { limit }
			| Self::DefaultRegion { limit } => *limit = max,
		}

		self
	}

	/// Requested limit, if any.
	pub fn limit(&self) -> Option<usize> {
		match self {
			Self::Region { limit, .. }
			| Self::Aircraft { limit, .. }
			| Self::Global { limit }
			| Self::DefaultRegion { limit } => *limit,
		}
	}

	/// Canonical cache key, resolving the default region and the default limit.
	pub fn key(&self, default_region: &BoundingBox, default_limit: Option<usize>) -> QueryKey {
		let target = match self {
			Self::Region { bbox, .. } => QueryTarget::Region(*bbox),
			Self::Aircraft { ids, .. } => QueryTarget::Aircraft(ids.as_slice().into()),
			Self::Global { .. } => QueryTarget::Global,
			Self::DefaultRegion { .. } => QueryTarget::Region(*default_region),
		};

		QueryKey::new(target, self.limit().or(default_limit))
	}
}

/// Normalized upstream selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryTarget {
	/// Bounding-box selector.
	Region(BoundingBox),
	/// Sorted, deduplicated ICAO 24-bit addresses.
	Aircraft(Arc<[String]>),
	/// No selector.
	Global,
}
impl QueryTarget {
	/// Query-string parameters understood by the states endpoint.
	pub fn upstream_params(&self) -> Vec<(&'static str, String)> {
		match self {
			Self::Region(bbox) => vec![
				("lamin", bbox.min_lat().to_string()),
				("lomin", bbox.min_lon().to_string()),
				("lamax", bbox.max_lat().to_string()),
				("lomax", bbox.max_lon().to_string()),
			],
			Self::Aircraft(ids) => ids.iter().map(|id| ("icao24", id.clone())).collect(),
			Self::Global => Vec::new(),
		}
	}
}
impl Display for QueryTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Region(bbox) => write!(f, "region:{bbox}"),
			Self::Aircraft(ids) => write!(f, "aircraft:{}", ids.join(",")),
			Self::Global => f.write_str("global"),
		}
	}
}

/// Cache key derived from a [`Query`].
///
/// Equality and hashing use the normalized target and limit. The
/// [`fingerprint`](Self::fingerprint) is a base64 (no padding) SHA-256 digest of the
/// canonical string, cached after the first call.
#[derive(Clone)]
pub struct QueryKey {
	target: QueryTarget,
	limit: Option<usize>,
	fingerprint_cache: OnceLock<String>,
}
impl QueryKey {
	/// Builds a key from normalized parts.
	pub fn new(target: QueryTarget, limit: Option<usize>) -> Self {
		Self { target, limit, fingerprint_cache: OnceLock::new() }
	}

	/// Normalized selector.
	pub fn target(&self) -> &QueryTarget {
		&self.target
	}

	/// Effective result limit.
	pub fn limit(&self) -> Option<usize> {
		self.limit
	}

	/// Stable digest suitable as a log field.
	pub fn fingerprint(&self) -> &str {
		self.fingerprint_cache.get_or_init(|| {
			let digest = Sha256::digest(self.to_string().as_bytes());

			STANDARD_NO_PAD.encode(digest)
		})
	}
}
impl PartialEq for QueryKey {
	fn eq(&self, other: &Self) -> bool {
		self.target == other.target && self.limit == other.limit
	}
}
impl Eq for QueryKey {}
impl Hash for QueryKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.target.hash(state);
		self.limit.hash(state);
	}
}
impl Debug for QueryKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QueryKey")
			.field("target", &self.target)
			.field("limit", &self.limit)
			.finish()
	}
}
impl Display for QueryKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self.limit {
			Some(limit) => write!(f, "{}|limit:{limit}", self.target),
			None => write!(f, "{}|limit:all", self.target),
		}
	}
}

fn latitude(field: &'static str, value: f64) -> Result<i64, QueryError> {
	if !value.is_finite() {
		return Err(QueryError::NonFinite { field });
	}
	if !(-90. ..=90.).contains(&value) {
		return Err(QueryError::LatitudeOutOfRange { value });
	}

	Ok((value * MICRO).round() as i64)
}

fn longitude(field: &'static str, value: f64) -> Result<i64, QueryError> {
	if !value.is_finite() {
		return Err(QueryError::NonFinite { field });
	}
	if !(-180. ..=180.).contains(&value) {
		return Err(QueryError::LongitudeOutOfRange { value });
	}

	Ok((value * MICRO).round() as i64)
}
