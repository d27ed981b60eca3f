//! appseek: local application launcher search.
//!
//! Usage:
//!   appseek index                 # Discover and index applications
//!   appseek index --watch         # Keep re-indexing until Ctrl-C
//!   appseek search <query>        # Search the index
//!   appseek launch <query>        # Start the best match
//!   appseek stats | recent        # Inspect the index and launch history
//!   appseek pin | unpin <query>   # Pin or unpin the best match
//!   appseek pins                  # List pinned applications

use appseek::commands;
use appseek::db::Database;
use appseek::launcher::{CommandLauncher, LaunchService};
use appseek::services::{BackgroundIndexer, CachingRepository, Indexer, SearchService};
use appseek::sources::{DiscoverySource, FilesystemSource};
use appseek::{AppRepository, LauncherConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "appseek")]
#[command(about = "Local application launcher search engine")]
#[command(version)]
struct Cli {
    /// Database path (default: <data dir>/appseek/index.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (default: <config dir>/appseek/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search indexed applications
    Search {
        /// Search query
        query: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Discover applications and update the index
    Index {
        /// Directory to scan (repeatable; replaces configured roots)
        #[arg(long = "scan", value_name = "DIR")]
        scan: Vec<PathBuf>,

        /// Keep running and re-index on the configured interval
        #[arg(long)]
        watch: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show recently launched applications
    Recent {
        /// Maximum entries
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Launch the best match for a query
    Launch {
        /// Search query
        query: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Pin the best match for a query
    Pin {
        /// Search query
        query: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Unpin the best match for a query
    Unpin {
        /// Search query
        query: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List pinned applications
    Pins {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Services shared by every command.
struct App {
    config: LauncherConfig,
    database: Arc<Database>,
    cache: Arc<CachingRepository>,
}

impl App {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = LauncherConfig::load(cli.config.as_deref())?;
        if let Some(db) = &cli.db {
            config.db_path = Some(db.clone());
        }

        let db_path = config.resolved_db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let database = Arc::new(Database::open(&db_path)?);
        let cache = Arc::new(CachingRepository::new(
            Arc::clone(&database) as Arc<dyn AppRepository>
        ));
        tracing::debug!("Using database {}", db_path.display());

        Ok(Self {
            config,
            database,
            cache,
        })
    }

    fn search_service(&self) -> SearchService {
        SearchService::new(
            Arc::clone(&self.cache) as Arc<dyn AppRepository>,
            self.config.search.clone(),
        )
    }

    fn indexer(&self, scan: Vec<PathBuf>) -> Indexer {
        let mut scan_config = self.config.scan.clone();
        if !scan.is_empty() {
            scan_config.roots = scan;
        }
        let sources: Vec<Arc<dyn DiscoverySource>> = vec![Arc::new(FilesystemSource::new(scan_config))];
        Indexer::new(Arc::clone(&self.cache) as Arc<dyn AppRepository>, sources)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log to stderr only (stdout carries command output)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("appseek=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color && std::io::stdout().is_terminal();
    let app = App::open(&cli)?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Search { query, json } => {
            let service = app.search_service();
            let input = commands::SearchInput { query };
            let result = commands::execute_search(&service, input, &CancellationToken::new())?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_search(&mut stdout, &result, color)?;
            }
        }

        Commands::Index { scan, watch, json } => {
            let indexer = app.indexer(scan);
            let shutdown = shutdown_on_ctrl_c();

            let result = if watch {
                let background = BackgroundIndexer::new(Arc::new(indexer), app.config.index.clone());
                commands::execute_watch(&background, &shutdown).await?
            } else {
                Some(commands::execute_index(&indexer, &shutdown).await?)
            };

            if let Some(result) = result {
                if json {
                    print_json(&mut stdout, &result)?;
                } else {
                    appseek::fmt::fmt_index(&mut stdout, &result)?;
                }
            }
        }

        Commands::Stats { json } => {
            let result = commands::execute_stats(&app.database, Some(&app.cache))?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_stats(&mut stdout, &result, color)?;
            }
        }

        Commands::Recent { limit, json } => {
            let result = commands::execute_recent(&app.database, limit)?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_recent(&mut stdout, &result, color)?;
            }
        }

        Commands::Launch { query, json } => {
            let search = app.search_service();
            let launches = LaunchService::new(Arc::clone(&app.database), Arc::new(CommandLauncher));
            let result = commands::execute_launch(&search, &launches, &query, &CancellationToken::new())?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_launch(&mut stdout, &result, color)?;
            }
        }

        Commands::Pin { query, json } => {
            let search = app.search_service();
            let result = commands::execute_pin(&search, &app.database, &query, &CancellationToken::new())?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_pin(&mut stdout, &result)?;
            }
        }

        Commands::Unpin { query, json } => {
            let search = app.search_service();
            let result = commands::execute_unpin(&search, &app.database, &query, &CancellationToken::new())?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_pin(&mut stdout, &result)?;
            }
        }

        Commands::Pins { json } => {
            let result = commands::execute_pins(&app.database)?;
            if json {
                print_json(&mut stdout, &result)?;
            } else {
                appseek::fmt::fmt_pins(&mut stdout, &result, color)?;
            }
        }
    }

    Ok(())
}

/// Token that fires on Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            trigger.cancel();
        }
    });
    token
}

fn print_json(w: &mut impl Write, value: &impl Serialize) -> anyhow::Result<()> {
    writeln!(w, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}
