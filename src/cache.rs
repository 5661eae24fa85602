//! TTL-bounded response cache keyed by [`QueryKey`].
//!
//! Entries are valid for exactly `ttl` after they were stored and are logically absent
//! afterwards, even while they still occupy the map. Expired entries are overwritten lazily
//! or dropped by [`ResponseCache::purge_expired`]; when a capacity is configured, inserting
//! into a full cache purges expired entries first and then evicts the oldest one.

// self
use crate::{_prelude::*, query::QueryKey};

type EntryMap<V> = RwLock<HashMap<QueryKey, CacheEntry<V>>>;

/// Cached value plus the instant it was stored.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
	/// Cached upstream result.
	pub value: V,
	/// Insertion instant.
	pub stored_at: OffsetDateTime,
}
impl<V> CacheEntry<V> {
	/// Returns `true` while the entry is younger than `ttl` at `now`.
	pub fn is_live_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.stored_at < ttl
	}
}

/// Thread-safe in-memory cache of successful upstream results.
pub struct ResponseCache<V> {
	entries: EntryMap<V>,
	ttl: Duration,
	capacity: Option<usize>,
}
impl<V> ResponseCache<V>
where
	V: Clone,
{
	/// Creates an unbounded cache.
	pub fn new(ttl: Duration) -> Self {
		Self { entries: Default::default(), ttl, capacity: None }
	}

	/// Caps the number of entries; `None` leaves the cache unbounded.
	pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
		self.capacity = capacity.map(|capacity| capacity.max(1));

		self
	}

	/// Configured time-to-live.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Looks up a live entry using the system clock.
	pub fn get(&self, key: &QueryKey) -> Option<V> {
		self.get_at(key, OffsetDateTime::now_utc())
	}

	/// Looks up an entry that is still live at `now`.
	pub fn get_at(&self, key: &QueryKey, now: OffsetDateTime) -> Option<V> {
		self.entries
			.read()
			.get(key)
			.filter(|entry| entry.is_live_at(now, self.ttl))
			.map(|entry| entry.value.clone())
	}

	/// Stores `value` using the system clock.
	pub fn put(&self, key: QueryKey, value: V) {
		self.put_at(key, value, OffsetDateTime::now_utc());
	}

	/// Stores `value` as if inserted at `now`; the last writer wins.
	pub fn put_at(&self, key: QueryKey, value: V, now: OffsetDateTime) {
		let mut entries = self.entries.write();
		let full = self
			.capacity
			.is_some_and(|capacity| !entries.contains_key(&key) && entries.len() >= capacity);

		if full {
			let ttl = self.ttl;

			entries.retain(|_, entry| entry.is_live_at(now, ttl));

			let oldest = self
				.capacity
				.filter(|capacity| entries.len() >= *capacity)
				.and_then(|_| entries.iter().min_by_key(|(_, entry)| entry.stored_at))
				.map(|(key, _)| key.clone());

			if let Some(oldest) = oldest {
				tracing::debug!(key = oldest.fingerprint(), "Evicting oldest cache entry.");

				entries.remove(&oldest);
			}
		}

		entries.insert(key, CacheEntry { value, stored_at: now });
	}

	/// Drops entries that expired before `now` and returns how many were removed.
	pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();
		let ttl = self.ttl;

		entries.retain(|_, entry| entry.is_live_at(now, ttl));

		before - entries.len()
	}

	/// Drops expired entries using the system clock.
	pub fn purge_expired(&self) -> usize {
		self.purge_expired_at(OffsetDateTime::now_utc())
	}

	/// Number of stored entries, expired ones included.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Removes every entry.
	pub fn clear(&self) {
		self.entries.write().clear();
	}
}
impl<V> Debug for ResponseCache<V> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseCache")
			.field("entries", &self.entries.read().len())
			.field("ttl", &self.ttl)
			.field("capacity", &self.capacity)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::query::{BoundingBox, Query};

	const TTL: Duration = Duration::seconds(45);
	const T0: OffsetDateTime = macros::datetime!(2025-01-01 12:00 UTC);

	fn key(lat: f64) -> QueryKey {
		let bbox = BoundingBox::new(lat, lat + 1., 0., 1.).expect("Bounding box should be valid.");

		Query::region(bbox).key(&bbox, None)
	}

	#[test]
	fn entries_expire_exactly_at_ttl() {
		let cache = ResponseCache::new(TTL);

		cache.put_at(key(0.), "payload", T0);

		assert_eq!(cache.get_at(&key(0.), T0 + Duration::seconds(44)), Some("payload"));
		assert_eq!(cache.get_at(&key(0.), T0 + TTL), None);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.purge_expired_at(T0 + TTL), 1);
		assert!(cache.is_empty());
	}

	#[test]
	fn expired_entry_is_overwritten_in_place() {
		let cache = ResponseCache::new(TTL);

		cache.put_at(key(0.), 1, T0);
		cache.put_at(key(0.), 2, T0 + Duration::minutes(1));

		assert_eq!(cache.get_at(&key(0.), T0 + Duration::minutes(1)), Some(2));
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn full_cache_prefers_expired_then_oldest() {
		let cache = ResponseCache::new(TTL).with_capacity(Some(2));

		cache.put_at(key(0.), 0, T0);
		cache.put_at(key(1.), 1, T0 + Duration::seconds(30));
		// key(0) is expired at T0+50s, so it goes first.
		cache.put_at(key(2.), 2, T0 + Duration::seconds(50));

		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get_at(&key(1.), T0 + Duration::seconds(50)), Some(1));

		// Both live: the oldest (key(1)) is evicted.
		cache.put_at(key(3.), 3, T0 + Duration::seconds(60));

		assert_eq!(cache.get_at(&key(1.), T0 + Duration::seconds(60)), None);
		assert_eq!(cache.get_at(&key(2.), T0 + Duration::seconds(60)), Some(2));
		assert_eq!(cache.get_at(&key(3.), T0 + Duration::seconds(60)), Some(3));
	}
}
