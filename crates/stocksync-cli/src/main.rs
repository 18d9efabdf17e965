mod report;
mod sync;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "stocksync-cli")]
#[command(about = "Supplier stock synchronization command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run stock synchronization
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Inspect and reconcile stock alerts
    Alerts {
        #[command(subcommand)]
        command: AlertCommands,
    },
    /// Change a sync config
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show sync status for every config of a user
    Status {
        #[arg(long)]
        user: Uuid,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Show the stock change history of one product
    History {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        product: Uuid,
        /// Maximum number of entries to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SyncCommands {
    /// Sync every due config of a user
    All {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Sync one supplier now, ignoring its schedule
    Supplier {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        supplier: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Sync every user with due configs, as the server's scheduler does
    Sweep,
}

#[derive(Debug, Subcommand)]
enum AlertCommands {
    /// Raise alerts for products already at or below threshold
    Check {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// List active alerts
    List {
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Update schedule or policy fields; omitted fields are left unchanged
    Update {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        config: Uuid,
        #[arg(long)]
        enabled: Option<bool>,
        /// Minutes between runs (truncated, clamped to 5..=1440)
        #[arg(long)]
        frequency: Option<f64>,
        /// Low-stock threshold (truncated, clamped to 0..=1000)
        #[arg(long)]
        threshold: Option<f64>,
        /// hide, flag or ignore
        #[arg(long)]
        out_of_stock_action: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("stocksync-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = stocksync_core::load_app_config()?;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = stocksync_db::PoolConfig::from_app_config(&config);
    let pool = stocksync_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                stocksync_db::health_check(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = stocksync_db::run_migrations(&pool).await?;
                println!("migrations applied: {applied}");
            }
        },
        Commands::Sync { command } => {
            let orchestrator = sync::build_orchestrator(pool, &config)?;
            match command {
                SyncCommands::All { user, json } => {
                    sync::run_action(&orchestrator, user, sync::sync_all_request(), json).await?;
                }
                SyncCommands::Supplier {
                    user,
                    supplier,
                    json,
                } => {
                    sync::run_action(
                        &orchestrator,
                        user,
                        sync::sync_supplier_request(supplier),
                        json,
                    )
                    .await?;
                }
                SyncCommands::Sweep => sync::run_sweep(&orchestrator).await?,
            }
        }
        Commands::Alerts { command } => match command {
            AlertCommands::Check { user, json } => {
                let orchestrator = sync::build_orchestrator(pool, &config)?;
                sync::run_action(&orchestrator, user, sync::check_alerts_request(), json).await?;
            }
            AlertCommands::List { user } => report::run_alerts_list(&pool, user).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Update {
                user,
                config: config_id,
                enabled,
                frequency,
                threshold,
                out_of_stock_action,
            } => {
                let orchestrator = sync::build_orchestrator(pool, &config)?;
                let request = sync::update_config_request(
                    config_id,
                    enabled,
                    frequency,
                    threshold,
                    out_of_stock_action,
                );
                sync::run_action(&orchestrator, user, request, true).await?;
            }
        },
        Commands::Status { user, json } => {
            let orchestrator = sync::build_orchestrator(pool, &config)?;
            sync::run_action(&orchestrator, user, sync::status_request(), json).await?;
        }
        Commands::History {
            user,
            product,
            limit,
        } => report::run_history(&pool, user, product, limit).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
