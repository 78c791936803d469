//! SQLite storage: schema migrations, the URI-addressed store, batched
//! operations, and change notification.

pub mod batch;
pub mod notify;
pub mod schema;
pub mod sqlite;
pub mod values;

pub use batch::{BackRef, BatchOp, Filter, OpResult};
pub use notify::{ChangeEvent, ChangeNotifier};
pub use schema::{SchemaManager, DB_NAME, SCHEMA_VERSION};
pub use sqlite::{DeviceStore, ResultSet};
pub use values::RowValues;
