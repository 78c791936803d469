//! Transactional replacement of local catalog data with a remote snapshot.

use crate::contract;
use crate::model::Manufacturer;
use crate::storage::{BatchOp, DeviceStore, OpResult, RowValues};
use crate::uri::{Collection, ResourceUri};
use crate::Result;

/// Replaces the store's entire contents with a snapshot, all or nothing.
pub struct Reconciler<'a> {
    store: &'a DeviceStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a DeviceStore) -> Self {
        Self { store }
    }

    /// Atomically replace every manufacturer and device row with the
    /// snapshot's contents.
    ///
    /// The generated batch deletes all devices, then all manufacturers, then
    /// inserts each manufacturer followed by its devices. A device insert
    /// back-references its manufacturer's position in the batch, since the
    /// manufacturer id is only assigned when the transaction executes.
    ///
    /// On failure the store's prior contents are preserved unchanged. The
    /// per-operation results are returned for diagnostics.
    pub fn replace_all(&self, snapshot: &[Manufacturer]) -> Result<Vec<OpResult>> {
        let operations = generate_operations(snapshot);

        tracing::debug!(
            manufacturers = snapshot.len(),
            operations = operations.len(),
            "replacing catalog from snapshot"
        );

        self.store.apply_batch(&operations)
    }
}

/// Build the ordered operation list for a full replace.
pub(crate) fn generate_operations(snapshot: &[Manufacturer]) -> Vec<BatchOp> {
    let devices = ResourceUri::collection(Collection::Device);
    let manufacturers = ResourceUri::collection(Collection::Manufacturer);

    let mut operations = Vec::new();

    // Devices reference manufacturers, so they go first.
    operations.push(BatchOp::delete(devices.clone()));
    operations.push(BatchOp::delete(manufacturers.clone()));

    for manufacturer in snapshot {
        operations.push(BatchOp::insert(
            manufacturers.clone(),
            RowValues::new()
                .set(
                    contract::manufacturer::SHORT_NAME,
                    manufacturer.short_name.clone(),
                )
                .set(
                    contract::manufacturer::LONG_NAME,
                    manufacturer.long_name.clone(),
                ),
        ));

        let manufacturer_index = operations.len() - 1;

        for device in &manufacturer.devices {
            operations.push(
                BatchOp::insert(
                    devices.clone(),
                    RowValues::new()
                        .set(contract::device::MODEL, device.model.clone())
                        .set(contract::device::NICKNAME, device.nickname.clone())
                        .set(
                            contract::device::DISPLAY_SIZE_INCHES,
                            device.display_size_inches,
                        )
                        .set(contract::device::MEMORY_MB, device.memory_mb),
                )
                .with_back_reference(contract::device::MANUFACTURER_ID, manufacturer_index),
            );
        }
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Device;
    use std::sync::Arc;

    fn snapshot(entries: &[(&str, &str, &[&str])]) -> Vec<Manufacturer> {
        entries
            .iter()
            .map(|(short_name, long_name, models)| Manufacturer {
                id: None,
                short_name: short_name.to_string(),
                long_name: long_name.to_string(),
                devices: models
                    .iter()
                    .map(|model| Device {
                        id: None,
                        model: model.to_string(),
                        nickname: Some("Fast".to_string()),
                        display_size_inches: 5.5,
                        memory_mb: 2048.0,
                        manufacturer_id: None,
                    })
                    .collect(),
            })
            .collect()
    }

    #[test]
    fn test_operation_order_and_back_references() {
        let operations = generate_operations(&snapshot(&[("ACME", "Acme Corp", &["X1", "X2"])]));

        // delete devices, delete manufacturers, insert manufacturer, 2 devices
        assert_eq!(operations.len(), 5);
        assert!(matches!(&operations[0], BatchOp::Delete { uri, .. }
            if uri.collection == Collection::Device));
        assert!(matches!(&operations[1], BatchOp::Delete { uri, .. }
            if uri.collection == Collection::Manufacturer));

        match &operations[3] {
            BatchOp::Insert { back_refs, .. } => {
                assert_eq!(back_refs.len(), 1);
                assert_eq!(back_refs[0].result_index, 2);
                assert_eq!(back_refs[0].column, contract::device::MANUFACTURER_ID);
            }
            other => panic!("expected device insert, got {:?}", other),
        }
    }

    #[test]
    fn test_replace_all_yields_exactly_the_snapshot() {
        let store = DeviceStore::open_in_memory().unwrap();
        let reconciler = Reconciler::new(&store);

        reconciler
            .replace_all(&snapshot(&[("OLD", "Old Corp", &["Legacy"])]))
            .unwrap();

        // A second pass fully supersedes the first, independent of prior
        // contents.
        reconciler
            .replace_all(&snapshot(&[
                ("ACME", "Acme Corp", &["X1"]),
                ("GLOBEX", "Globex Inc", &["G5", "G6"]),
            ]))
            .unwrap();

        let manufacturers = store.manufacturers().unwrap();
        assert_eq!(manufacturers.len(), 2);

        let joined = store.device_manufacturers().unwrap();
        assert_eq!(joined.len(), 3);
        let models: Vec<&str> = joined.iter().map(|row| row.model.as_str()).collect();
        assert_eq!(models, vec!["X1", "G5", "G6"]);
        assert_eq!(joined[0].short_name, "ACME");
        assert_eq!(joined[1].short_name, "GLOBEX");
    }

    #[test]
    fn test_single_manufacturer_scenario() {
        let store = DeviceStore::open_in_memory().unwrap();

        Reconciler::new(&store)
            .replace_all(&snapshot(&[("ACME", "Acme Corp", &["X1"])]))
            .unwrap();

        let joined = store.device_manufacturers().unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].model, "X1");
        assert_eq!(joined[0].short_name, "ACME");
    }

    #[test]
    fn test_empty_snapshot_clears_the_store() {
        let store = DeviceStore::open_in_memory().unwrap();
        let reconciler = Reconciler::new(&store);

        reconciler
            .replace_all(&snapshot(&[("ACME", "Acme Corp", &["X1"])]))
            .unwrap();
        reconciler.replace_all(&[]).unwrap();

        assert!(store.manufacturers().unwrap().is_empty());
        assert!(store.devices().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_replaces_do_not_interleave() {
        let store = Arc::new(DeviceStore::open_in_memory().unwrap());

        let first = snapshot(&[("ACME", "Acme Corp", &["X1", "X2"])]);
        let second = snapshot(&[("GLOBEX", "Globex Inc", &["G5"])]);

        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|snap| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || Reconciler::new(&store).replace_all(&snap).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // The final state is one snapshot or the other, never a mix.
        let manufacturers = store.manufacturers().unwrap();
        let joined = store.device_manufacturers().unwrap();
        match manufacturers[0].short_name.as_str() {
            "ACME" => {
                assert_eq!(manufacturers.len(), 1);
                assert_eq!(joined.len(), 2);
            }
            "GLOBEX" => {
                assert_eq!(manufacturers.len(), 1);
                assert_eq!(joined.len(), 1);
            }
            other => panic!("unexpected manufacturer {}", other),
        }
    }
}
