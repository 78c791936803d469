//! SQLite-backed URI-addressed store for the device catalog.

use crate::contract;
use crate::model::{Device, DeviceManufacturer, Manufacturer};
use crate::storage::batch::{BatchOp, Filter, OpResult};
use crate::storage::notify::{ChangeEvent, ChangeNotifier};
use crate::storage::schema::{SchemaManager, SCHEMA_VERSION};
use crate::storage::values::RowValues;
use crate::uri::{Collection, ResourceUri};
use crate::{Error, Result};
use crossbeam::channel::Receiver;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const JOIN_TABLES: &str =
    "device INNER JOIN manufacturer ON (device.manufacturer_id = manufacturer.id)";

/// URI-addressed CRUD over the device and manufacturer tables and their
/// derived join, with transactional batch support and observer notification.
///
/// All writers serialize on the single underlying connection; readers see
/// only committed state. Query results are materialized snapshots - callers
/// re-query to observe later changes.
pub struct DeviceStore {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

impl DeviceStore {
    /// Open a database file (creates if doesn't exist) using the bundled
    /// migration scripts.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_schema(path, &SchemaManager::bundled())
    }

    /// Open a database file, migrating with the given schema manager.
    pub fn open_with_schema(path: &Path, schema: &SchemaManager) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema.ensure_schema(&conn, SCHEMA_VERSION)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        SchemaManager::bundled().ensure_schema(&conn, SCHEMA_VERSION)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Register an observer for the collection addressed by `uri`.
    pub fn subscribe(&self, uri: &ResourceUri) -> Receiver<ChangeEvent> {
        self.notifier.subscribe(uri)
    }

    // ========== Single Operations ==========

    /// Insert a row, returning the URI of the new row.
    ///
    /// Only collection-level URIs of the base tables accept inserts.
    pub fn insert(&self, uri: &ResourceUri, values: &RowValues) -> Result<ResourceUri> {
        if uri.is_item() {
            return Err(Error::InvalidArgument(format!(
                "cannot insert into a row URI: {}",
                uri
            )));
        }
        if values.is_empty() {
            return Err(Error::InvalidArgument("no values to insert".to_string()));
        }

        let id = {
            let conn = self.lock_conn();
            insert_row(&conn, uri, values)?
        };

        self.notify_changed(&[uri.clone()]);
        Ok(uri.with_id(id))
    }

    /// Query rows, returning a materialized result set.
    ///
    /// The projection must not be empty. Sort order defaults to the primary
    /// key. Row URIs take the row id as the only filter.
    pub fn query(
        &self,
        uri: &ResourceUri,
        projection: &[&str],
        filter: Option<&Filter>,
        sort_order: Option<&str>,
    ) -> Result<ResultSet> {
        if projection.is_empty() {
            return Err(Error::InvalidArgument(
                "projection must not be empty".to_string(),
            ));
        }

        let (sql, args) = select_sql(uri, projection, filter, sort_order)?;

        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                record.push(row.get::<_, Value>(index)?);
            }
            records.push(record);
        }

        Ok(ResultSet {
            columns,
            rows: records,
        })
    }

    /// Update rows, returning the count of rows changed.
    ///
    /// A row URI carries the only permitted filter; passing an explicit
    /// filter alongside it is rejected.
    pub fn update(
        &self,
        uri: &ResourceUri,
        values: &RowValues,
        filter: Option<&Filter>,
    ) -> Result<usize> {
        let count = {
            let conn = self.lock_conn();
            update_rows(&conn, uri, values, filter)?
        };

        self.notify_changed(&[uri.clone()]);
        Ok(count)
    }

    /// Delete rows, returning the count of rows removed.
    pub fn delete(&self, uri: &ResourceUri, filter: Option<&Filter>) -> Result<usize> {
        let count = {
            let conn = self.lock_conn();
            delete_rows(&conn, uri, filter)?
        };

        self.notify_changed(&[uri.clone()]);
        Ok(count)
    }

    // ========== Transactional Operations ==========

    /// Insert many rows into one collection inside a single transaction.
    ///
    /// Any failure rolls back every row of the call.
    pub fn bulk_insert(&self, uri: &ResourceUri, rows: &[RowValues]) -> Result<usize> {
        if uri.is_item() {
            return Err(Error::InvalidArgument(format!(
                "cannot insert into a row URI: {}",
                uri
            )));
        }
        if rows.is_empty() {
            return Ok(0);
        }

        {
            let mut conn = self.lock_conn();
            let tx = conn.transaction().map_err(Error::from)?;

            for values in rows {
                if values.is_empty() {
                    return Err(
                        Error::InvalidArgument("no values to insert".to_string()).into_transaction()
                    );
                }
                insert_row(&tx, uri, values).map_err(Error::into_transaction)?;
            }

            tx.commit().map_err(Error::from)?;
        }

        self.notify_changed(&[uri.clone()]);
        Ok(rows.len())
    }

    /// Apply a batch of operations inside one transaction.
    ///
    /// Operations run in order; an insert may back-reference the row id of an
    /// earlier insert in the same batch. The first failure aborts the whole
    /// batch, rolling back every prior operation, and is surfaced as a single
    /// [`Error::Transaction`]. Observers are notified only after commit.
    pub fn apply_batch(&self, operations: &[BatchOp]) -> Result<Vec<OpResult>> {
        let mut results: Vec<OpResult> = Vec::with_capacity(operations.len());

        {
            let mut conn = self.lock_conn();
            let tx = conn.transaction().map_err(Error::from)?;

            for op in operations {
                let result = apply_op(&tx, op, &results).map_err(Error::into_transaction)?;
                results.push(result);
            }

            tx.commit().map_err(Error::from)?;
        }

        let affected: Vec<ResourceUri> = operations.iter().map(|op| op.uri().clone()).collect();
        self.notify_changed(&affected);

        Ok(results)
    }

    // ========== Typed Reads ==========

    /// All manufacturers, ordered by id.
    pub fn manufacturers(&self) -> Result<Vec<Manufacturer>> {
        let uri = ResourceUri::collection(Collection::Manufacturer);
        let rows = self.query(
            &uri,
            &[
                contract::manufacturer::ID,
                contract::manufacturer::SHORT_NAME,
                contract::manufacturer::LONG_NAME,
            ],
            None,
            None,
        )?;

        let mut out = Vec::with_capacity(rows.len());
        for index in 0..rows.len() {
            out.push(Manufacturer {
                id: rows.i64_value(index, contract::manufacturer::ID),
                short_name: rows
                    .text_value(index, contract::manufacturer::SHORT_NAME)
                    .unwrap_or_default()
                    .to_string(),
                long_name: rows
                    .text_value(index, contract::manufacturer::LONG_NAME)
                    .unwrap_or_default()
                    .to_string(),
                devices: Vec::new(),
            });
        }
        Ok(out)
    }

    /// All devices, ordered by id.
    pub fn devices(&self) -> Result<Vec<Device>> {
        let uri = ResourceUri::collection(Collection::Device);
        let rows = self.query(
            &uri,
            &[
                contract::device::ID,
                contract::device::MODEL,
                contract::device::NICKNAME,
                contract::device::DISPLAY_SIZE_INCHES,
                contract::device::MEMORY_MB,
                contract::device::MANUFACTURER_ID,
            ],
            None,
            None,
        )?;

        let mut out = Vec::with_capacity(rows.len());
        for index in 0..rows.len() {
            out.push(Device {
                id: rows.i64_value(index, contract::device::ID),
                model: rows
                    .text_value(index, contract::device::MODEL)
                    .unwrap_or_default()
                    .to_string(),
                nickname: rows
                    .text_value(index, contract::device::NICKNAME)
                    .map(str::to_string),
                display_size_inches: rows
                    .f64_value(index, contract::device::DISPLAY_SIZE_INCHES)
                    .unwrap_or_default(),
                memory_mb: rows
                    .f64_value(index, contract::device::MEMORY_MB)
                    .unwrap_or_default(),
                manufacturer_id: rows.i64_value(index, contract::device::MANUFACTURER_ID),
            });
        }
        Ok(out)
    }

    /// The device-manufacturer join, ordered by device id.
    pub fn device_manufacturers(&self) -> Result<Vec<DeviceManufacturer>> {
        let uri = ResourceUri::collection(Collection::DeviceManufacturer);
        let rows = self.query(
            &uri,
            &[
                contract::device_manufacturer::DEVICE_ID,
                contract::device_manufacturer::MODEL,
                contract::device_manufacturer::SHORT_NAME,
            ],
            None,
            None,
        )?;

        let mut out = Vec::with_capacity(rows.len());
        for index in 0..rows.len() {
            out.push(DeviceManufacturer {
                device_id: rows
                    .i64_value(index, contract::device_manufacturer::DEVICE_ID)
                    .unwrap_or_default(),
                model: rows
                    .text_value(index, contract::device_manufacturer::MODEL)
                    .unwrap_or_default()
                    .to_string(),
                short_name: rows
                    .text_value(index, contract::device_manufacturer::SHORT_NAME)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(out)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notify observers of the affected URIs plus the derived join, which may
    /// have changed transitively.
    fn notify_changed(&self, affected: &[ResourceUri]) {
        let mut uris: Vec<ResourceUri> = Vec::with_capacity(affected.len() + 1);
        for uri in affected {
            if !uris.contains(uri) {
                uris.push(uri.clone());
            }
        }

        let join = ResourceUri::collection(Collection::DeviceManufacturer);
        if !uris.contains(&join) {
            uris.push(join);
        }

        self.notifier.notify(&uris);
    }
}

// ========== Row-level helpers (shared by single and batched paths) ==========

fn writable_table(uri: &ResourceUri) -> Result<&'static str> {
    uri.collection.table().ok_or_else(|| {
        Error::InvalidArgument(format!("{} is read-only", uri.collection.as_str()))
    })
}

fn insert_row(conn: &Connection, uri: &ResourceUri, values: &RowValues) -> Result<i64> {
    let table = writable_table(uri)?;

    let columns: Vec<&str> = values.columns().collect();
    let placeholders: Vec<&str> = std::iter::repeat("?").take(columns.len()).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );

    conn.execute(&sql, params_from_iter(values.values()))
        .map_err(map_storage_err)?;
    Ok(conn.last_insert_rowid())
}

fn update_rows(
    conn: &Connection,
    uri: &ResourceUri,
    values: &RowValues,
    filter: Option<&Filter>,
) -> Result<usize> {
    let table = writable_table(uri)?;
    if values.is_empty() {
        return Err(Error::InvalidArgument("no values to update".to_string()));
    }

    let assignments: Vec<String> = values.columns().map(|c| format!("{} = ?", c)).collect();
    let mut args: Vec<Value> = values.values().cloned().collect();
    let clause = where_clause(uri, filter, &mut args)?;

    let sql = match clause {
        Some(clause) => format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments.join(", "),
            clause
        ),
        None => format!("UPDATE {} SET {}", table, assignments.join(", ")),
    };

    conn.execute(&sql, params_from_iter(args.iter()))
        .map_err(map_storage_err)
}

fn delete_rows(conn: &Connection, uri: &ResourceUri, filter: Option<&Filter>) -> Result<usize> {
    let table = writable_table(uri)?;

    let mut args: Vec<Value> = Vec::new();
    let clause = where_clause(uri, filter, &mut args)?;

    let sql = match clause {
        Some(clause) => format!("DELETE FROM {} WHERE {}", table, clause),
        None => format!("DELETE FROM {}", table),
    };

    conn.execute(&sql, params_from_iter(args.iter()))
        .map_err(map_storage_err)
}

/// Resolve the effective WHERE clause for a mutation or base-table query.
///
/// A row URI's id is the only filter allowed for it; combining both is the
/// caller's error, not a silent override.
fn where_clause(
    uri: &ResourceUri,
    filter: Option<&Filter>,
    args: &mut Vec<Value>,
) -> Result<Option<String>> {
    match (uri.id, filter) {
        (Some(_), Some(_)) => Err(Error::InvalidArgument(
            "filter must be empty when the URI addresses a row id".to_string(),
        )),
        (Some(id), None) => {
            args.push(Value::Integer(id));
            Ok(Some("id = ?".to_string()))
        }
        (None, Some(filter)) => {
            args.extend(filter.args.iter().cloned());
            Ok(Some(filter.clause.clone()))
        }
        (None, None) => Ok(None),
    }
}

fn apply_op(conn: &Connection, op: &BatchOp, prior: &[OpResult]) -> Result<OpResult> {
    match op {
        BatchOp::Insert {
            uri,
            values,
            back_refs,
        } => {
            if uri.is_item() {
                return Err(Error::InvalidArgument(format!(
                    "cannot insert into a row URI: {}",
                    uri
                )));
            }

            let mut values = values.clone();
            for back_ref in back_refs {
                let id = prior
                    .get(back_ref.result_index)
                    .and_then(OpResult::inserted_id)
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "back-reference {} does not point at a prior insert",
                            back_ref.result_index
                        ))
                    })?;
                values.put(&back_ref.column, id);
            }

            if values.is_empty() {
                return Err(Error::InvalidArgument("no values to insert".to_string()));
            }

            let id = insert_row(conn, uri, &values)?;
            Ok(OpResult::Inserted {
                uri: uri.with_id(id),
                id,
            })
        }
        BatchOp::Update { uri, values, filter } => {
            let count = update_rows(conn, uri, values, filter.as_ref())?;
            Ok(OpResult::Affected { count })
        }
        BatchOp::Delete { uri, filter } => {
            let count = delete_rows(conn, uri, filter.as_ref())?;
            Ok(OpResult::Affected { count })
        }
    }
}

fn select_sql(
    uri: &ResourceUri,
    projection: &[&str],
    filter: Option<&Filter>,
    sort_order: Option<&str>,
) -> Result<(String, Vec<Value>)> {
    match uri.collection {
        Collection::Device | Collection::Manufacturer => {
            // Base collection paths are their table names.
            let table = uri.collection.as_str();
            let mut args: Vec<Value> = Vec::new();
            let clause = where_clause(uri, filter, &mut args)?;
            let sort = sort_order.unwrap_or("id");

            let mut sql = format!("SELECT {} FROM {}", projection.join(", "), table);
            if let Some(clause) = &clause {
                sql.push_str(" WHERE ");
                sql.push_str(clause);
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(sort);

            Ok((sql, args))
        }
        Collection::DeviceManufacturer => {
            if uri.is_item() {
                return Err(Error::InvalidArgument(format!(
                    "the join is addressable only as a collection: {}",
                    uri
                )));
            }

            let mapped: Vec<&str> = projection
                .iter()
                .map(|column| {
                    join_column(column).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "unknown join projection column: {}",
                            column
                        ))
                    })
                })
                .collect::<Result<_>>()?;

            let mut args: Vec<Value> = Vec::new();
            if let Some(filter) = filter {
                args.extend(filter.args.iter().cloned());
            }
            let sort = sort_order.unwrap_or("device.id");

            let mut sql = format!("SELECT {} FROM {}", mapped.join(", "), JOIN_TABLES);
            if let Some(filter) = filter {
                sql.push_str(" WHERE ");
                sql.push_str(&filter.clause);
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(sort);

            Ok((sql, args))
        }
    }
}

/// Projection map of the read-only join.
fn join_column(column: &str) -> Option<&'static str> {
    match column {
        contract::device_manufacturer::MODEL => Some("model"),
        contract::device_manufacturer::SHORT_NAME => Some("short_name"),
        contract::device_manufacturer::DEVICE_ID => Some("device.id AS device_id"),
        contract::device_manufacturer::MANUFACTURER_ID => Some("manufacturer.id AS manufacturer_id"),
        _ => None,
    }
}

/// Map foreign-key constraint failures onto the store's error taxonomy.
fn map_storage_err(e: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return Error::ReferentialIntegrity(e.to_string());
        }
    }
    Error::Storage(e)
}

/// A materialized query result.
///
/// Rows hold raw SQLite values in projection order; the typed accessors look
/// columns up by name.
#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }

    pub fn i64_value(&self, row: usize, column: &str) -> Option<i64> {
        match self.value(row, column)? {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn f64_value(&self, row: usize, column: &str) -> Option<f64> {
        match self.value(row, column)? {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text_value(&self, row: usize, column: &str) -> Option<&str> {
        match self.value(row, column)? {
            Value::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manufacturer_values(short_name: &str, long_name: &str) -> RowValues {
        RowValues::new()
            .set(contract::manufacturer::SHORT_NAME, short_name.to_string())
            .set(contract::manufacturer::LONG_NAME, long_name.to_string())
    }

    fn device_values(model: &str, manufacturer_id: i64) -> RowValues {
        RowValues::new()
            .set(contract::device::MODEL, model.to_string())
            .set(contract::device::NICKNAME, Some("test".to_string()))
            .set(contract::device::DISPLAY_SIZE_INCHES, 5.0)
            .set(contract::device::MEMORY_MB, 1024.0)
            .set(contract::device::MANUFACTURER_ID, manufacturer_id)
    }

    fn row_count(store: &DeviceStore, collection: Collection) -> usize {
        store
            .query(&ResourceUri::collection(collection), &["id"], None, None)
            .unwrap()
            .len()
    }

    #[test]
    fn test_insert_and_query_roundtrip() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        let uri = store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();
        assert!(uri.is_item());

        let rows = store
            .query(
                &uri,
                &[contract::manufacturer::SHORT_NAME, contract::manufacturer::LONG_NAME],
                None,
                None,
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.text_value(0, contract::manufacturer::SHORT_NAME), Some("ACME"));
        assert_eq!(rows.text_value(0, contract::manufacturer::LONG_NAME), Some("Acme Corp"));
    }

    #[test]
    fn test_insert_rejects_row_uri_and_join() {
        let store = DeviceStore::open_in_memory().unwrap();
        let values = manufacturer_values("ACME", "Acme Corp");

        let row_uri = ResourceUri::item(Collection::Manufacturer, 1);
        assert!(matches!(
            store.insert(&row_uri, &values),
            Err(Error::InvalidArgument(_))
        ));

        let join = ResourceUri::collection(Collection::DeviceManufacturer);
        assert!(matches!(
            store.insert(&join, &values),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_query_requires_projection() {
        let store = DeviceStore::open_in_memory().unwrap();
        let result = store.query(
            &ResourceUri::collection(Collection::Device),
            &[],
            None,
            None,
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_query_defaults_to_primary_key_order() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        store.insert(&manufacturers, &manufacturer_values("B", "Beta")).unwrap();
        store.insert(&manufacturers, &manufacturer_values("A", "Alpha")).unwrap();

        let rows = store
            .query(&manufacturers, &[contract::manufacturer::SHORT_NAME], None, None)
            .unwrap();
        assert_eq!(rows.text_value(0, contract::manufacturer::SHORT_NAME), Some("B"));
        assert_eq!(rows.text_value(1, contract::manufacturer::SHORT_NAME), Some("A"));

        let sorted = store
            .query(
                &manufacturers,
                &[contract::manufacturer::SHORT_NAME],
                None,
                Some("short_name"),
            )
            .unwrap();
        assert_eq!(sorted.text_value(0, contract::manufacturer::SHORT_NAME), Some("A"));
    }

    #[test]
    fn test_foreign_key_violation_is_surfaced_and_has_no_effect() {
        let store = DeviceStore::open_in_memory().unwrap();
        let devices = ResourceUri::collection(Collection::Device);

        let result = store.insert(&devices, &device_values("X1", 999));
        assert!(matches!(result, Err(Error::ReferentialIntegrity(_))));
        assert_eq!(row_count(&store, Collection::Device), 0);
    }

    #[test]
    fn test_update_by_row_id() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        let uri = store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();

        let changed = store
            .update(
                &uri,
                &RowValues::new().set(contract::manufacturer::LONG_NAME, "Acme Corporation".to_string()),
                None,
            )
            .unwrap();
        assert_eq!(changed, 1);

        let rows = store
            .query(&uri, &[contract::manufacturer::LONG_NAME], None, None)
            .unwrap();
        assert_eq!(
            rows.text_value(0, contract::manufacturer::LONG_NAME),
            Some("Acme Corporation")
        );
    }

    #[test]
    fn test_row_id_and_filter_are_mutually_exclusive() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        let uri = store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();

        let filter = Filter::new("short_name = ?", vec![Value::Text("ACME".to_string())]);

        let update = store.update(
            &uri,
            &RowValues::new().set(contract::manufacturer::SHORT_NAME, "AC".to_string()),
            Some(&filter),
        );
        assert!(matches!(update, Err(Error::InvalidArgument(_))));

        let delete = store.delete(&uri, Some(&filter));
        assert!(matches!(delete, Err(Error::InvalidArgument(_))));

        // No mutation happened.
        let rows = store
            .query(&uri, &[contract::manufacturer::SHORT_NAME], None, None)
            .unwrap();
        assert_eq!(rows.text_value(0, contract::manufacturer::SHORT_NAME), Some("ACME"));
    }

    #[test]
    fn test_delete_by_row_id_and_by_filter() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        let first = store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();
        store
            .insert(&manufacturers, &manufacturer_values("GLOBEX", "Globex Inc"))
            .unwrap();

        assert_eq!(store.delete(&first, None).unwrap(), 1);

        let filter = Filter::new("short_name = ?", vec![Value::Text("GLOBEX".to_string())]);
        assert_eq!(store.delete(&manufacturers, Some(&filter)).unwrap(), 1);
        assert_eq!(row_count(&store, Collection::Manufacturer), 0);
    }

    #[test]
    fn test_join_query_projects_mapped_columns() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);
        let devices = ResourceUri::collection(Collection::Device);

        let manufacturer = store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();
        let manufacturer_id = manufacturer.id.unwrap();
        store
            .insert(&devices, &device_values("X1", manufacturer_id))
            .unwrap();

        let join = ResourceUri::collection(Collection::DeviceManufacturer);
        let rows = store
            .query(
                &join,
                &[
                    contract::device_manufacturer::DEVICE_ID,
                    contract::device_manufacturer::MODEL,
                    contract::device_manufacturer::SHORT_NAME,
                ],
                None,
                None,
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows.text_value(0, contract::device_manufacturer::MODEL), Some("X1"));
        assert_eq!(
            rows.text_value(0, contract::device_manufacturer::SHORT_NAME),
            Some("ACME")
        );
        assert!(rows.i64_value(0, contract::device_manufacturer::DEVICE_ID).is_some());
    }

    #[test]
    fn test_join_rejects_unknown_projection() {
        let store = DeviceStore::open_in_memory().unwrap();
        let join = ResourceUri::collection(Collection::DeviceManufacturer);

        let result = store.query(&join, &["nickname"], None, None);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_apply_batch_resolves_back_references() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);
        let devices = ResourceUri::collection(Collection::Device);

        let ops = vec![
            BatchOp::insert(manufacturers.clone(), manufacturer_values("ACME", "Acme Corp")),
            BatchOp::insert(
                devices.clone(),
                RowValues::new()
                    .set(contract::device::MODEL, "X1".to_string())
                    .set(contract::device::DISPLAY_SIZE_INCHES, 5.5)
                    .set(contract::device::MEMORY_MB, 2048.0),
            )
            .with_back_reference(contract::device::MANUFACTURER_ID, 0),
        ];

        let results = store.apply_batch(&ops).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].inserted_id().is_some());

        let joined = store.device_manufacturers().unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].model, "X1");
        assert_eq!(joined[0].short_name, "ACME");
    }

    #[test]
    fn test_apply_batch_mixed_operations() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();
        store
            .insert(&manufacturers, &manufacturer_values("GLOBEX", "Globex Inc"))
            .unwrap();

        let ops = vec![
            BatchOp::update(
                manufacturers.clone(),
                RowValues::new().set(contract::manufacturer::LONG_NAME, "Acme Corporation".to_string()),
                Some(Filter::new("short_name = ?", vec![Value::Text("ACME".to_string())])),
            ),
            BatchOp::delete_where(
                manufacturers.clone(),
                Filter::new("short_name = ?", vec![Value::Text("GLOBEX".to_string())]),
            ),
        ];

        let results = store.apply_batch(&ops).unwrap();
        assert_eq!(results, vec![OpResult::Affected { count: 1 }, OpResult::Affected { count: 1 }]);

        let remaining = store.manufacturers().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].long_name, "Acme Corporation");
    }

    #[test]
    fn test_apply_batch_rolls_back_on_failure() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);
        let devices = ResourceUri::collection(Collection::Device);

        store
            .insert(&manufacturers, &manufacturer_values("KEEP", "Keep Corp"))
            .unwrap();

        // Second insert violates NOT NULL on model.
        let ops = vec![
            BatchOp::insert(manufacturers.clone(), manufacturer_values("ACME", "Acme Corp")),
            BatchOp::insert(
                devices.clone(),
                RowValues::new()
                    .set(contract::device::DISPLAY_SIZE_INCHES, 5.5)
                    .set(contract::device::MEMORY_MB, 2048.0),
            )
            .with_back_reference(contract::device::MANUFACTURER_ID, 0),
        ];

        let err = store.apply_batch(&ops).unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));

        // Pre-call contents are intact, the aborted insert is not.
        assert_eq!(row_count(&store, Collection::Manufacturer), 1);
        assert_eq!(row_count(&store, Collection::Device), 0);
    }

    #[test]
    fn test_apply_batch_rejects_dangling_back_reference() {
        let store = DeviceStore::open_in_memory().unwrap();
        let devices = ResourceUri::collection(Collection::Device);

        let ops = vec![BatchOp::insert(
            devices,
            RowValues::new()
                .set(contract::device::MODEL, "X1".to_string())
                .set(contract::device::DISPLAY_SIZE_INCHES, 5.5)
                .set(contract::device::MEMORY_MB, 2048.0),
        )
        .with_back_reference(contract::device::MANUFACTURER_ID, 5)];

        let err = store.apply_batch(&ops).unwrap_err();
        assert!(matches!(err, Error::Transaction(_)));
    }

    #[test]
    fn test_bulk_insert_is_atomic() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);

        let count = store
            .bulk_insert(
                &manufacturers,
                &[
                    manufacturer_values("ACME", "Acme Corp"),
                    manufacturer_values("GLOBEX", "Globex Inc"),
                ],
            )
            .unwrap();
        assert_eq!(count, 2);

        // A bad row anywhere rolls back the whole call.
        let result = store.bulk_insert(
            &manufacturers,
            &[manufacturer_values("INITECH", "Initech LLC"), RowValues::new()],
        );
        assert!(matches!(result, Err(Error::Transaction(_))));
        assert_eq!(row_count(&store, Collection::Manufacturer), 2);
    }

    #[test]
    fn test_mutations_notify_collection_and_join_observers() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);
        let join = ResourceUri::collection(Collection::DeviceManufacturer);

        let manufacturer_rx = store.subscribe(&manufacturers);
        let join_rx = store.subscribe(&join);

        store
            .insert(&manufacturers, &manufacturer_values("ACME", "Acme Corp"))
            .unwrap();

        assert_eq!(
            manufacturer_rx.try_recv().unwrap().uri.collection,
            Collection::Manufacturer
        );
        assert_eq!(
            join_rx.try_recv().unwrap().uri.collection,
            Collection::DeviceManufacturer
        );
    }

    #[test]
    fn test_failed_batch_notifies_nobody() {
        let store = DeviceStore::open_in_memory().unwrap();
        let manufacturers = ResourceUri::collection(Collection::Manufacturer);
        let rx = store.subscribe(&manufacturers);

        let ops = vec![
            BatchOp::insert(manufacturers.clone(), manufacturer_values("ACME", "Acme Corp")),
            BatchOp::insert(manufacturers.clone(), RowValues::new()),
        ];
        assert!(store.apply_batch(&ops).is_err());

        assert!(rx.try_recv().is_err());
    }
}
