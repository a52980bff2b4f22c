//! Key Mapper: composite key → canonical event id
//!
//! The manual export carries no event id, so one is recovered by looking up
//! (location, event name, event date rounded to the minute) in a map built
//! from the API line items. Later lines win a contested key; each overwrite
//! with a different id is recorded as a [`KeyCollision`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{ApiLineItem, CompositeKey, KeyCollision, ManualRecord};

#[derive(Debug, Clone, Default)]
pub struct KeyMapper {
    map: HashMap<CompositeKey, String>,
    collisions: Vec<KeyCollision>,
}

impl KeyMapper {
    /// Build the map in line order (last write wins)
    pub fn build(lines: &[ApiLineItem]) -> Self {
        let mut mapper = Self::default();
        for line in lines {
            mapper.insert(line.composite_key(), &line.event_id);
        }

        if !mapper.collisions.is_empty() {
            warn!(
                collisions = mapper.collisions.len(),
                "Composite keys mapped to more than one event id"
            );
        }
        debug!(keys = mapper.map.len(), "Built composite key map");
        mapper
    }

    fn insert(&mut self, key: CompositeKey, event_id: &str) {
        if event_id.is_empty() {
            return;
        }
        if let Some(previous) = self.map.insert(key.clone(), event_id.to_string()) {
            if previous != event_id {
                debug!(key = %key, previous = %previous, event_id, "Key collision");
                self.collisions.push(KeyCollision {
                    key,
                    previous_event_id: previous,
                    event_id: event_id.to_string(),
                });
            }
        }
    }

    /// Event id for a manual record, or `None` when its key is unknown
    pub fn lookup(&self, record: &ManualRecord) -> Option<&str> {
        self.lookup_key(&record.composite_key())
    }

    pub fn lookup_key(&self, key: &CompositeKey) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn collisions(&self) -> &[KeyCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
