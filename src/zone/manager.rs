use super::instance::{ZoneInstance, ZoneServices};
use super::ZoneError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Running zone instances keyed by (zone id, instance id).
#[derive(Debug)]
pub struct ZoneManager {
    zones: RwLock<HashMap<(u32, u32), Arc<ZoneInstance>>>,
    services: ZoneServices,
}

impl ZoneManager {
    pub fn new(services: ZoneServices) -> Self {
        Self {
            zones: RwLock::new(HashMap::new()),
            services,
        }
    }

    pub fn services(&self) -> &ZoneServices {
        &self.services
    }

    pub fn get(&self, zone_id: u32, instance_id: u32) -> Option<Arc<ZoneInstance>> {
        self.zones.read().get(&(zone_id, instance_id)).cloned()
    }

    /// Returns the running instance, starting it first if needed. A zone
    /// that fails to load is reported and not remembered, so a later call
    /// tries again.
    pub fn get_or_create(&self, zone_id: u32, instance_id: u32) -> Result<Arc<ZoneInstance>, ZoneError> {
        if let Some(zone) = self.get(zone_id, instance_id) {
            return Ok(zone);
        }
        let mut zones = self.zones.write();
        if let Some(zone) = zones.get(&(zone_id, instance_id)) {
            return Ok(Arc::clone(zone));
        }
        let zone = match ZoneInstance::new(zone_id, instance_id, self.services.clone()) {
            Ok(zone) => Arc::new(zone),
            Err(err) => {
                tracing::error!(zone = zone_id, instance = instance_id, error = %err, "zone failed to start");
                return Err(err);
            }
        };
        zones.insert((zone_id, instance_id), Arc::clone(&zone));
        Ok(zone)
    }

    pub fn running(&self) -> Vec<Arc<ZoneInstance>> {
        let mut zones: Vec<Arc<ZoneInstance>> = self.zones.read().values().cloned().collect();
        zones.sort_by_key(|zone| (zone.zone_id(), zone.instance_id()));
        zones
    }

    pub fn len(&self) -> usize {
        self.zones.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }

    /// Stops every instance and waits for each loop to exit.
    pub fn shutdown(&self) {
        let zones: Vec<Arc<ZoneInstance>> = self.zones.write().drain().map(|(_, zone)| zone).collect();
        for zone in &zones {
            zone.stop();
        }
        tracing::info!(stopped = zones.len(), "zone manager shut down");
    }
}

impl Drop for ZoneManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneConfig;
    use crate::persistence::store::MemoryCharacterStore;
    use crate::world::zone_data::StaticZoneSource;
    use crate::zone::testing::{zone_data, EMPTY_ZONE, PATROL_ZONE};

    fn manager() -> ZoneManager {
        let source = StaticZoneSource::new()
            .with_zone(zone_data(EMPTY_ZONE))
            .with_zone(zone_data(PATROL_ZONE));
        ZoneManager::new(
            ZoneServices::new(
                Arc::new(source),
                Arc::new(MemoryCharacterStore::new()),
                ZoneConfig::default(),
            )
            .with_rng_seed(1),
        )
    }

    #[test]
    fn get_or_create_reuses_running_instance() {
        let manager = manager();
        assert!(manager.get(2, 0).is_none());
        let first = manager.get_or_create(2, 0).expect("zone");
        let again = manager.get_or_create(2, 0).expect("zone");
        assert!(Arc::ptr_eq(&first, &again));
        let other = manager.get_or_create(2, 1).expect("second instance");
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(manager.len(), 2);
        manager.shutdown();
        assert!(!first.is_running());
        assert!(manager.is_empty());
    }

    #[test]
    fn failed_zone_is_not_cached() {
        let manager = manager();
        assert!(manager.get_or_create(42, 0).is_err());
        assert!(manager.get(42, 0).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn running_is_sorted() {
        let manager = manager();
        manager.get_or_create(2, 0).expect("qeynos");
        manager.get_or_create(1, 0).expect("arena");
        let ids: Vec<u32> = manager.running().iter().map(|zone| zone.zone_id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
