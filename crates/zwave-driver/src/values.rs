//! Cached node values and change notifications.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use zwave_cc::{CommandClass, NodeId, ValueEntry, ValueId, ValueMetadata};

/// What changed in the value cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ValueEvent {
    Added {
        id: ValueId,
        value: Value,
    },
    Updated {
        id: ValueId,
        previous: Value,
        value: Value,
    },
    Removed {
        id: ValueId,
        previous: Value,
    },
    MetadataUpdated {
        id: ValueId,
        metadata: ValueMetadata,
    },
}

impl ValueEvent {
    pub fn id(&self) -> &ValueId {
        match self {
            Self::Added { id, .. }
            | Self::Updated { id, .. }
            | Self::Removed { id, .. }
            | Self::MetadataUpdated { id, .. } => id,
        }
    }
}

/// Persistence for cached values. Errors are logged by the caller and
/// never interrupt the link.
pub trait ValueStore: Send + Sync {
    fn load_all(&self) -> std::io::Result<Vec<(ValueId, Value)>>;

    fn store(&self, id: &ValueId, value: &Value) -> std::io::Result<()>;

    fn remove(&self, id: &ValueId) -> std::io::Result<()>;
}

/// A [`ValueStore`] that forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryValueStore {
    values: Mutex<BTreeMap<ValueId, Value>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> std::io::Error {
    std::io::Error::other("value store lock poisoned")
}

impl ValueStore for MemoryValueStore {
    fn load_all(&self) -> std::io::Result<Vec<(ValueId, Value)>> {
        let values = self.values.lock().map_err(poisoned)?;
        Ok(values
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect())
    }

    fn store(&self, id: &ValueId, value: &Value) -> std::io::Result<()> {
        self.values
            .lock()
            .map_err(poisoned)?
            .insert(id.clone(), value.clone());
        Ok(())
    }

    fn remove(&self, id: &ValueId) -> std::io::Result<()> {
        self.values.lock().map_err(poisoned)?.remove(id);
        Ok(())
    }
}

/// In-memory cache of the last value and metadata reported for each id.
#[derive(Debug, Default)]
pub struct ValueDb {
    values: BTreeMap<ValueId, Value>,
    metadata: BTreeMap<ValueId, ValueMetadata>,
}

impl ValueDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cache without emitting events.
    pub fn restore(&mut self, entries: impl IntoIterator<Item = (ValueId, Value)>) {
        self.values.extend(entries);
    }

    pub fn get(&self, id: &ValueId) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn metadata(&self, id: &ValueId) -> Option<&ValueMetadata> {
        self.metadata.get(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn node_values(&self, node: NodeId) -> impl Iterator<Item = (&ValueId, &Value)> {
        self.values.iter().filter(move |(id, _)| id.node_id == node)
    }

    /// Store every value a report carries. Unchanged values emit nothing.
    pub fn apply_report(&mut self, node: NodeId, cc: &CommandClass) -> Vec<ValueEvent> {
        let data = cc.innermost();
        let endpoint = cc
            .layers()
            .map(|layer| layer.endpoint)
            .find(|endpoint| *endpoint != 0)
            .unwrap_or(0);
        cc.values()
            .into_iter()
            .flat_map(|entry| self.apply(node, endpoint, data.cc_id(), entry))
            .collect()
    }

    pub fn apply(
        &mut self,
        node: NodeId,
        endpoint: u8,
        cc_id: u16,
        entry: ValueEntry,
    ) -> Vec<ValueEvent> {
        let id = entry.id(node, endpoint, cc_id);
        let mut events = Vec::new();

        if let Some(metadata) = entry.metadata {
            if self.metadata.get(&id) != Some(&metadata) {
                self.metadata.insert(id.clone(), metadata.clone());
                events.push(ValueEvent::MetadataUpdated {
                    id: id.clone(),
                    metadata,
                });
            }
        }

        match self.values.insert(id.clone(), entry.value.clone()) {
            None => events.push(ValueEvent::Added {
                id,
                value: entry.value,
            }),
            Some(previous) if previous != entry.value => events.push(ValueEvent::Updated {
                id,
                previous,
                value: entry.value,
            }),
            Some(_) => {}
        }
        events
    }

    pub fn remove(&mut self, id: &ValueId) -> Option<ValueEvent> {
        self.metadata.remove(id);
        self.values.remove(id).map(|previous| ValueEvent::Removed {
            id: id.clone(),
            previous,
        })
    }

    /// Forget a node entirely, e.g. after it was removed from the network.
    pub fn remove_node(&mut self, node: NodeId) -> Vec<ValueEvent> {
        let ids: Vec<ValueId> = self
            .values
            .keys()
            .filter(|id| id.node_id == node)
            .cloned()
            .collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use zwave_cc::cc::basic::BasicCommand;

    use super::*;

    fn report(value: u8) -> CommandClass {
        CommandClass::new(
            5u8,
            BasicCommand::Report {
                current_value: value,
                target_value: None,
                duration: None,
            },
        )
    }

    #[test]
    fn added_then_updated_then_quiet() {
        let mut db = ValueDb::new();
        let added = db.apply_report(5, &report(10));
        assert!(added
            .iter()
            .any(|event| matches!(event, ValueEvent::Added { id, .. } if id.cc_id == 0x20)));

        let updated = db.apply_report(5, &report(20));
        assert!(updated.iter().any(|event| matches!(
            event,
            ValueEvent::Updated { previous, value, .. } if *previous == json!(10) && *value == json!(20)
        )));

        let unchanged = db.apply_report(5, &report(20));
        assert!(unchanged
            .iter()
            .all(|event| matches!(event, ValueEvent::MetadataUpdated { .. })));
    }

    #[test]
    fn remove_node_emits_removed() {
        let mut db = ValueDb::new();
        db.apply(5, 0, 0x25, ValueEntry::new("currentValue", true));
        db.apply(6, 0, 0x25, ValueEntry::new("currentValue", false));
        let removed = db.remove_node(5);
        assert_eq!(removed.len(), 1);
        assert!(matches!(removed[0], ValueEvent::Removed { .. }));
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryValueStore::new();
        let id = ValueEntry::new("currentValue", 1).id(3, 0, 0x26);
        store.store(&id, &json!(1)).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![(id.clone(), json!(1))]);
        store.remove(&id).unwrap();
        assert!(store.is_empty());
    }
}
