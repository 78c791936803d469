//! Versioned schema migrations.
//!
//! One plain SQL script per schema version, named `<dbname>.<version>.sql`
//! (`devices.db.1.sql`, ...). Statements are terminated by `;`; comment lines
//! beginning with `--` and blank lines are ignored. The scripts shipped under
//! `migrations/` are also bundled into the binary so a store can be opened
//! without any on-disk assets.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::PathBuf;

/// Database file name, also the prefix of every migration script.
pub const DB_NAME: &str = "devices.db";

/// Schema version this build targets.
pub const SCHEMA_VERSION: i32 = 3;

const BUNDLED_SCRIPTS: &[&str] = &[
    include_str!("../../migrations/devices.db.1.sql"),
    include_str!("../../migrations/devices.db.2.sql"),
    include_str!("../../migrations/devices.db.3.sql"),
];

/// Applies migration scripts to bring a connection up to a target version.
///
/// The current version lives in SQLite's `user_version` pragma. A failure
/// mid-script is not rolled back; it surfaces as [`Error::SchemaMigration`]
/// and must abort initialization.
pub struct SchemaManager {
    scripts_dir: Option<PathBuf>,
}

impl SchemaManager {
    /// Use the scripts compiled into the binary.
    pub fn bundled() -> Self {
        Self { scripts_dir: None }
    }

    /// Read `<dbname>.<version>.sql` scripts from `dir`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: Some(dir.into()),
        }
    }

    /// Configure the connection and apply every missing migration up to
    /// `target`, in ascending version order.
    pub fn ensure_schema(&self, conn: &Connection, target: i32) -> Result<()> {
        configure_connection(conn)?;

        let current = schema_version(conn)?;
        if current >= target {
            tracing::debug!(current, target, "schema already up to date");
            return Ok(());
        }

        for version in (current + 1)..=target {
            self.apply_script(conn, version)?;
        }

        Ok(())
    }

    fn apply_script(&self, conn: &Connection, version: i32) -> Result<()> {
        let script = self.script(version)?;

        tracing::info!(version, "applying schema migration");

        for statement in statements(&script) {
            tracing::debug!(statement, "running migration statement");
            conn.execute_batch(&statement)
                .map_err(|e| Error::SchemaMigration {
                    version,
                    source: Box::new(Error::Storage(e)),
                })?;
        }

        conn.pragma_update(None, "user_version", version)
            .map_err(|e| Error::SchemaMigration {
                version,
                source: Box::new(Error::Storage(e)),
            })?;

        Ok(())
    }

    fn script(&self, version: i32) -> Result<String> {
        match &self.scripts_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.{}.sql", DB_NAME, version));
                std::fs::read_to_string(&path).map_err(|e| Error::SchemaMigration {
                    version,
                    source: Box::new(Error::Io(e)),
                })
            }
            None => BUNDLED_SCRIPTS
                .get((version - 1) as usize)
                .map(|s| (*s).to_string())
                .ok_or_else(|| Error::SchemaMigration {
                    version,
                    source: Box::new(Error::InvalidArgument(format!(
                        "no bundled script for version {}",
                        version
                    ))),
                }),
        }
    }
}

/// Read the schema version recorded on the connection.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Enable write-ahead logging and foreign-key enforcement.
///
/// Must run before migrations; foreign keys are a per-connection setting.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns the resulting mode as a row
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

/// Split a migration script into `;`-terminated statements.
///
/// Mirrors the script format contract: comment lines start with `--`, blank
/// lines separate nothing, and a statement ends on a line ending with `;`.
pub fn statements(script: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        if line.ends_with(';') {
            out.push(std::mem::take(&mut current));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_connection() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_statement_splitting() {
        let script = "-- a comment\nCREATE TABLE t (\n    id INTEGER\n);\n\nCREATE INDEX i ON t(id);\n";
        let stmts = statements(script);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE"));
        assert!(stmts[0].ends_with(";"));
        assert_eq!(stmts[1], "CREATE INDEX i ON t(id);");
    }

    #[test]
    fn test_fresh_database_migrates_to_target() {
        let conn = raw_connection();
        SchemaManager::bundled().ensure_schema(&conn, SCHEMA_VERSION).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<_, _>>()
                .unwrap()
        };
        assert_eq!(tables, vec!["device".to_string(), "manufacturer".to_string()]);
    }

    #[test]
    fn test_partial_upgrade_applies_only_missing_versions() {
        let conn = raw_connection();
        let manager = SchemaManager::bundled();

        // Stop at version 2: tables exist, nickname exists, no indexes yet.
        manager.ensure_schema(&conn, 2).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 2);

        let index_count =
            |conn: &Connection| -> i64 {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                    [],
                    |row| row.get(0),
                )
                .unwrap()
            };
        assert_eq!(index_count(&conn), 0);

        // Only version 3 remains; re-running must not re-apply 1 or 2 (their
        // CREATE TABLE / ADD COLUMN statements would fail on a second run).
        manager.ensure_schema(&conn, SCHEMA_VERSION).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(index_count(&conn), 2);
    }

    #[test]
    fn test_up_to_date_schema_is_untouched() {
        let conn = raw_connection();
        let manager = SchemaManager::bundled();

        manager.ensure_schema(&conn, SCHEMA_VERSION).unwrap();
        manager.ensure_schema(&conn, SCHEMA_VERSION).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_missing_script_is_a_migration_failure() {
        let conn = raw_connection();
        let err = SchemaManager::bundled()
            .ensure_schema(&conn, SCHEMA_VERSION + 1)
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMigration { .. }));
    }

    #[test]
    fn test_scripts_from_directory() {
        let conn = raw_connection();
        SchemaManager::from_dir("migrations")
            .ensure_schema(&conn, SCHEMA_VERSION)
            .unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = raw_connection();
        SchemaManager::bundled().ensure_schema(&conn, SCHEMA_VERSION).unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
