use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use cascade_core::PipelineConfig;
use cascade_domain::{PersonRecord, PlateRecord, VehicleRecord};

use crate::stats::CacheStats;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            None => true,
            Some(ttl) => now - self.stored_at < ttl,
        }
    }
}

/// Shared result store.
///
/// Vehicle records are kept by record id so completed chains can be
/// reassembled later. Plate and person records are additionally the dedup
/// namespaces: a fresh entry under a key means that key is never consulted
/// again while the entry lives.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Option<Duration>,
    vehicles: RwLock<HashMap<Uuid, VehicleRecord>>,
    plates: RwLock<HashMap<String, CacheEntry<PlateRecord>>>,
    persons: RwLock<HashMap<String, CacheEntry<PersonRecord>>>,
}

impl ResultCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            vehicles: RwLock::new(HashMap::new()),
            plates: RwLock::new(HashMap::new()),
            persons: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.cache_ttl_seconds.map(|s| Duration::seconds(s as i64)))
    }

    pub async fn put_vehicle(&self, record: VehicleRecord) {
        self.vehicles.write().await.insert(record.id, record);
    }

    pub async fn vehicle(&self, id: &Uuid) -> Option<VehicleRecord> {
        self.vehicles.read().await.get(id).cloned()
    }

    pub async fn put_plate(&self, record: PlateRecord) {
        self.plates
            .write()
            .await
            .insert(record.plate.clone(), CacheEntry::new(record));
    }

    /// Looks up a plate record by normalized plate. Stale entries are
    /// treated as absent but stay in place until overwritten.
    pub async fn plate(&self, key: &str, now: DateTime<Utc>) -> Option<PlateRecord> {
        self.plates
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    pub async fn contains_plate(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.plate(key, now).await.is_some()
    }

    pub async fn put_person(&self, record: PersonRecord) {
        self.persons
            .write()
            .await
            .insert(record.national_id.clone(), CacheEntry::new(record));
    }

    /// Looks up a person record by national id digits.
    pub async fn person(&self, key: &str, now: DateTime<Utc>) -> Option<PersonRecord> {
        self.persons
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    pub async fn contains_person(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.person(key, now).await.is_some()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            vehicles: self.vehicles.read().await.len(),
            plates: self.plates.read().await.len(),
            persons: self.persons.read().await.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_domain::{NationalId, Plate};
    use cascade_testing_utils::{PersonFindingBuilder, PlateFindingBuilder, VehicleFindingBuilder};

    fn vehicle_record() -> VehicleRecord {
        VehicleRecord::from_finding(VehicleFindingBuilder::new().build(), Uuid::new_v4())
    }

    fn plate_record(plate: &str) -> PlateRecord {
        let plate = Plate::parse(plate).unwrap();
        PlateRecord::from_finding(PlateFindingBuilder::new().build(), &plate, Uuid::new_v4())
    }

    fn person_record(national_id: &str) -> PersonRecord {
        let id = NationalId::parse(national_id).unwrap();
        let plate = Plate::parse("ABC1234").unwrap();
        PersonRecord::from_finding(PersonFindingBuilder::new().build(), &id, &plate)
    }

    #[tokio::test]
    async fn test_vehicle_store_round_trip() {
        let cache = ResultCache::new(None);
        let record = vehicle_record();
        let id = record.id;

        cache.put_vehicle(record).await;
        let fetched = cache.vehicle(&id).await.expect("stored vehicle");
        assert_eq!(fetched.plate, "ABC1234");
        assert!(cache.vehicle(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_plate_namespace_keys_by_normalized_plate() {
        let cache = ResultCache::new(None);
        cache.put_plate(plate_record("abc-1234")).await;

        let now = Utc::now();
        assert!(cache.contains_plate("ABC1234", now).await);
        assert!(!cache.contains_plate("XYZ9876", now).await);
    }

    #[tokio::test]
    async fn test_entries_never_expire_without_ttl() {
        let cache = ResultCache::new(None);
        cache.put_person(person_record("529.982.247-25")).await;

        let far_future = Utc::now() + Duration::days(365);
        assert!(cache.contains_person("52998224725", far_future).await);
    }

    #[tokio::test]
    async fn test_ttl_expires_entries() {
        let cache = ResultCache::new(Some(Duration::seconds(300)));
        cache.put_plate(plate_record("ABC1234")).await;

        let now = Utc::now();
        assert!(cache.contains_plate("ABC1234", now).await);
        assert!(
            !cache
                .contains_plate("ABC1234", now + Duration::seconds(301))
                .await
        );
    }

    #[tokio::test]
    async fn test_put_overwrites_and_refreshes() {
        let cache = ResultCache::new(Some(Duration::seconds(10)));
        cache.put_plate(plate_record("ABC1234")).await;
        cache.put_plate(plate_record("ABC1234")).await;

        let stats = cache.stats().await;
        assert_eq!(stats.plates, 1);
        assert!(cache.contains_plate("ABC1234", Utc::now()).await);
    }

    #[tokio::test]
    async fn test_stats_counts_all_namespaces() {
        let cache = ResultCache::new(None);
        cache.put_vehicle(vehicle_record()).await;
        cache.put_plate(plate_record("ABC1234")).await;
        cache.put_plate(plate_record("XYZ9876")).await;
        cache.put_person(person_record("529.982.247-25")).await;

        let stats = cache.stats().await;
        assert_eq!(
            stats,
            CacheStats {
                vehicles: 1,
                plates: 2,
                persons: 1,
            }
        );
    }
}
