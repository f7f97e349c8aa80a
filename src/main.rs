use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use i18n_store::cache::{CacheStore, SqliteCache};
use i18n_store::config::{CacheBackendConfig, StoreConfig};
use i18n_store::{init_tracing, Catalog};

/// Exports slower than this are reported.
const EXPORT_WARN_MS: u128 = 500;

#[derive(Parser)]
#[command(name = "i18n-store")]
#[command(about = "Localized string store with a read-through translation cache")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file; I18N_STORE_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk-insert generated translations, then flush the cache
    Generate {
        #[arg(default_value_t = 150_000)]
        count: usize,
    },
    /// Print the key/value mapping for a locale as JSON
    Lookup {
        locale: String,
        #[arg(long)]
        group: Option<String>,
    },
    /// Drop every cached mapping
    FlushCache,
    /// Remove expired entries from the sqlite cache backend
    PurgeExpired,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let mut config = StoreConfig::load_from_file(path)?;
            config.apply_overrides(|name| std::env::var(name).ok())?;
            config
        }
        None => StoreConfig::from_env()?,
    };
    init_tracing(&config.logging);

    match cli.command {
        Command::Generate { count } => {
            let catalog = Catalog::open(&config)?;
            let report = catalog.bulk.generate(count)?;
            println!(
                "Inserted {}/{} translations in {:.2}s ({:.2} records/s)",
                report.inserted,
                report.requested,
                report.elapsed.as_secs_f64(),
                report.rate()
            );
            if !report.failed_chunks.is_empty() {
                println!("Failed chunks: {:?}", report.failed_chunks);
            }

            let start = Instant::now();
            let exported = catalog.translations.export_all()?;
            let elapsed = start.elapsed();
            println!(
                "Exported {} translations in {:.2}ms",
                exported.len(),
                elapsed.as_secs_f64() * 1000.0
            );
            if elapsed.as_millis() > EXPORT_WARN_MS {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "export slower than {EXPORT_WARN_MS}ms"
                );
            }
            println!("{}", serde_json::to_string_pretty(&catalog.metrics.summary())?);
        }
        Command::Lookup { locale, group } => {
            let catalog = Catalog::open(&config)?;
            let mapping = catalog
                .lookup
                .get_translations_for(&locale, group.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&mapping)?);
        }
        Command::FlushCache => {
            let catalog = Catalog::open(&config)?;
            catalog.cache.flush_all()?;
            info!("translation cache flushed");
        }
        Command::PurgeExpired => match &config.cache {
            CacheBackendConfig::Sqlite { path } => {
                let removed = SqliteCache::open(path)?.cleanup_expired()?;
                println!("Removed {removed} expired cache entries");
            }
            CacheBackendConfig::Memory => {
                println!("Memory cache is per-process; nothing to purge");
            }
        },
    }
    Ok(())
}
