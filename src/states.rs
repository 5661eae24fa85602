//! Aircraft state vectors and the parser for the states endpoint payload.
//!
//! Upstream encodes each aircraft as a positional JSON array of 17 fields, or 18 when the
//! emitter category is included. Trailing fields beyond those are ignored.

// crates.io
use serde::{
	Deserializer,
	de::{self, IgnoredAny, SeqAccess, Visitor},
};
// self
use crate::{_prelude::*, error::ServerError};

/// WGS-84 position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
	/// Longitude in degrees.
	pub longitude: f64,
	/// Latitude in degrees.
	pub latitude: f64,
}

/// Where a position report came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSource {
	/// ADS-B.
	AdsB,
	/// ASTERIX.
	Asterix,
	/// Multilateration.
	Mlat,
	/// FLARM.
	Flarm,
	/// A code this crate does not know.
	Other(u8),
}
impl From<u8> for PositionSource {
	fn from(value: u8) -> Self {
		match value {
			0 => Self::AdsB,
			1 => Self::Asterix,
			2 => Self::Mlat,
			3 => Self::Flarm,
			other => Self::Other(other),
		}
	}
}

/// One aircraft as reported by upstream.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AircraftState {
	/// ICAO 24-bit transponder address, lower-case hex.
	pub icao24: String,
	/// Callsign with padding removed; `None` when blank.
	pub callsign: Option<String>,
	/// Country inferred from the transponder address.
	pub origin_country: String,
	/// Unix seconds of the last position update.
	pub time_position: Option<i64>,
	/// Unix seconds of the last message of any kind.
	pub last_contact: i64,
	/// Last known position; `None` unless both coordinates are known.
	pub position: Option<Position>,
	/// Barometric altitude in meters.
	pub baro_altitude: Option<f64>,
	/// Geometric altitude in meters.
	pub geo_altitude: Option<f64>,
	/// Surface position report.
	pub on_ground: bool,
	/// Ground speed in m/s.
	pub velocity: Option<f64>,
	/// True track in degrees clockwise from north.
	pub heading: Option<f64>,
	/// Climb rate in m/s.
	pub vertical_rate: Option<f64>,
	/// Receivers that contributed, when requested.
	pub sensors: Option<Vec<i64>>,
	/// Transponder code.
	pub squawk: Option<String>,
	/// Special purpose indicator.
	pub spi: bool,
	/// Origin of the position.
	pub position_source: PositionSource,
	/// Emitter category, when upstream sends it.
	pub category: Option<u8>,
}
impl<'de> Deserialize<'de> for AircraftState {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_seq(StateVectorVisitor)
	}
}

struct StateVectorVisitor;
impl<'de> Visitor<'de> for StateVectorVisitor {
	type Value = AircraftState;

	fn expecting(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("a state vector array with 17 or 18 elements")
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
	where
		A: SeqAccess<'de>,
	{
		fn next<'de, A, T>(seq: &mut A, index: usize) -> Result<T, A::Error>
		where
			A: SeqAccess<'de>,
			T: Deserialize<'de>,
		{
			seq.next_element()?.ok_or_else(|| de::Error::invalid_length(index, &StateVectorVisitor))
		}

		let icao24: String = next(&mut seq, 0)?;
		let callsign: Option<String> = next(&mut seq, 1)?;
		let origin_country = next(&mut seq, 2)?;
		let time_position = next(&mut seq, 3)?;
		let last_contact = next(&mut seq, 4)?;
		let longitude: Option<f64> = next(&mut seq, 5)?;
		let latitude: Option<f64> = next(&mut seq, 6)?;
		let baro_altitude = next(&mut seq, 7)?;
		let on_ground = next(&mut seq, 8)?;
		let velocity = next(&mut seq, 9)?;
		let heading = next(&mut seq, 10)?;
		let vertical_rate = next(&mut seq, 11)?;
		let sensors = next(&mut seq, 12)?;
		let geo_altitude = next(&mut seq, 13)?;
		let squawk = next(&mut seq, 14)?;
		let spi = next(&mut seq, 15)?;
		let position_source: u8 = next(&mut seq, 16)?;
		let category = seq.next_element::<Option<u8>>()?.flatten();

		while seq.next_element::<IgnoredAny>()?.is_some() {}

		Ok(AircraftState {
			icao24: icao24.trim().to_ascii_lowercase(),
			callsign: callsign
				.map(|callsign| callsign.trim().to_owned())
				.filter(|callsign| !callsign.is_empty()),
			origin_country,
			time_position,
			last_contact,
			position: longitude
				.zip(latitude)
				.map(|(longitude, latitude)| Position { longitude, latitude }),
			baro_altitude,
			geo_altitude,
			on_ground,
			velocity,
			heading,
			vertical_rate,
			sensors,
			squawk,
			spi,
			position_source: position_source.into(),
			category,
		})
	}
}

/// One states-endpoint response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
	/// Unix seconds the states are valid for.
	pub time: i64,
	/// Aircraft in the response; upstream's `null` becomes an empty list.
	#[serde(default, deserialize_with = "null_as_empty")]
	pub states: Vec<AircraftState>,
}
impl StateSnapshot {
	/// Parses a raw states payload, keeping the JSON path of any failure.
	///
	/// Anything but whitespace after the top-level object is rejected.
	pub fn from_slice(body: &[u8]) -> Result<Self, ServerError> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let snapshot = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			let path = e.path().to_string();

			ServerError::malformed_payload(path, e.into_inner())
		})?;

		deserializer.end().map_err(|e| ServerError::malformed_payload(".", e))?;

		Ok(snapshot)
	}

	/// Keeps at most `limit` states.
	pub fn truncate(&mut self, limit: Option<usize>) {
		if let Some(limit) = limit {
			self.states.truncate(limit);
		}
	}

	/// Number of aircraft.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	/// Returns `true` when no aircraft were reported.
	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<AircraftState>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Vec<AircraftState>>::deserialize(deserializer)?.unwrap_or_default())
}
