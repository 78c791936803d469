//! DeviceDb CLI - manage the local device catalog and keep it in sync with
//! the remote web API.

use clap::{Parser, Subcommand};
use devicedb::api::client::DEFAULT_API_URL;
use devicedb::api::WebClient;
use devicedb::config::{self, DeviceDbConfig};
use devicedb::storage::DeviceStore;
use devicedb::sync::SyncService;
use devicedb::{contract, ui, Collection, ResourceUri, RowValues};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "devicedb")]
#[command(version = "0.1.0")]
#[command(about = "Device catalog over a URI-addressed SQLite store, synced from a web API")]
#[command(long_about = r#"
DeviceDb keeps a local catalog of manufacturers and devices, enabling:
  • Listing manufacturers, devices, and the joined device view
  • Adding records from the command line
  • Replacing the whole catalog from the remote JSON API, atomically

Example usage:
  devicedb init
  devicedb add-manufacturer --short-name ACME --long-name "Acme Corp"
  devicedb sync --watch
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local database and a default config file
    Init {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List manufacturers
    Manufacturers {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// List devices with their manufacturers
    Devices {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Add a manufacturer
    AddManufacturer {
        #[arg(long)]
        short_name: String,

        #[arg(long)]
        long_name: String,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Add a device for an existing manufacturer
    AddDevice {
        #[arg(long)]
        model: String,

        #[arg(long)]
        nickname: Option<String>,

        #[arg(long)]
        display_size_inches: f64,

        #[arg(long)]
        memory_mb: f64,

        /// Row id of the device's manufacturer
        #[arg(long)]
        manufacturer_id: i64,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Replace the local catalog with the remote snapshot
    Sync {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Snapshot endpoint (defaults to the configured or built-in URL)
        #[arg(long)]
        api_url: Option<String>,

        /// Keep syncing on an interval instead of running once
        #[arg(long)]
        watch: bool,

        /// Seconds between sync passes with --watch
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let loaded_config = config::load_config(None)?.unwrap_or_default();

    match cli.command {
        Commands::Init { database, force } => {
            let db_path = database_path(database, &loaded_config);
            config::ensure_db_dir(&db_path)?;

            DeviceStore::open(&db_path)?;

            let new_config = DeviceDbConfig {
                database: Some(db_path.display().to_string()),
                api_url: Some(DEFAULT_API_URL.to_string()),
                sync_interval_secs: None,
            };
            config::write_config(&config::default_config_path(), &new_config, force)?;

            ui::success(&format!("Initialized database at {}", db_path.display()));
        }

        Commands::Manufacturers { database } => {
            let store = DeviceStore::open(&database_path(database, &loaded_config))?;
            let manufacturers = store.manufacturers()?;

            if manufacturers.is_empty() {
                println!("∅ No manufacturers in the catalog.");
            } else {
                ui::header("Manufacturers");
                println!("{}", ui::manufacturers_table(&manufacturers));
            }
        }

        Commands::Devices { database } => {
            let store = DeviceStore::open(&database_path(database, &loaded_config))?;
            let rows = store.device_manufacturers()?;

            if rows.is_empty() {
                println!("∅ No devices in the catalog.");
            } else {
                ui::header("Devices");
                println!("{}", ui::devices_table(&rows));
            }
        }

        Commands::AddManufacturer {
            short_name,
            long_name,
            database,
        } => {
            let store = DeviceStore::open(&database_path(database, &loaded_config))?;

            let uri = store.insert(
                &ResourceUri::collection(Collection::Manufacturer),
                &RowValues::new()
                    .set(contract::manufacturer::SHORT_NAME, short_name)
                    .set(contract::manufacturer::LONG_NAME, long_name),
            )?;

            ui::success(&format!("Saved manufacturer {}", uri));
        }

        Commands::AddDevice {
            model,
            nickname,
            display_size_inches,
            memory_mb,
            manufacturer_id,
            database,
        } => {
            let store = DeviceStore::open(&database_path(database, &loaded_config))?;

            let uri = store.insert(
                &ResourceUri::collection(Collection::Device),
                &RowValues::new()
                    .set(contract::device::MODEL, model)
                    .set(contract::device::NICKNAME, nickname)
                    .set(contract::device::DISPLAY_SIZE_INCHES, display_size_inches)
                    .set(contract::device::MEMORY_MB, memory_mb)
                    .set(contract::device::MANUFACTURER_ID, manufacturer_id),
            )?;

            ui::success(&format!("Saved device {}", uri));
        }

        Commands::Sync {
            database,
            api_url,
            watch,
            interval_secs,
        } => {
            let store = Arc::new(DeviceStore::open(&database_path(database, &loaded_config))?);

            let endpoint = api_url
                .or_else(|| loaded_config.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string());
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| loaded_config.sync_interval());

            ui::info("Syncing from", &endpoint);

            let client = WebClient::new(endpoint)?;
            let service = SyncService::new(client, Arc::clone(&store), interval);

            let runtime = tokio::runtime::Runtime::new()?;
            if watch {
                tracing::info!(interval_secs = interval.as_secs(), "starting periodic sync");
                runtime.block_on(service.run());
            } else {
                let results = runtime.block_on(service.sync_once())?;
                ui::success(&format!("Sync applied {} operations", results.len()));

                let rows = store.device_manufacturers()?;
                if !rows.is_empty() {
                    println!("{}", ui::devices_table(&rows));
                }
            }
        }
    }

    Ok(())
}

/// CLI flag wins over config; fall back to the default path under the
/// working directory.
fn database_path(arg: Option<PathBuf>, config: &DeviceDbConfig) -> PathBuf {
    arg.or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config::default_database_path_in(Path::new(".")))
}
