use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ecom-cli")]
#[command(about = "Storefront operator tools")]
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
    /// Login session housekeeping
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SessionCommands {
    /// Delete sessions whose expiry has passed
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("ecom-cli: nothing to do, see --help");
        return Ok(());
    };

    let config = ecom_core::load_app_config().context("failed to load configuration")?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = ecom_db::connect_pool(
        &config.database_url,
        ecom_db::PoolConfig::from_app_config(&config),
    )
    .await
    .context("failed to connect to database")?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            ecom_db::ping(&pool).await.context("database ping failed")?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = ecom_db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            println!("applied {applied} migration(s)");
        }
        Commands::Sessions {
            command: SessionCommands::Purge,
        } => {
            let purged = ecom_db::purge_expired_sessions(&pool)
                .await
                .context("failed to purge sessions")?;
            tracing::info!(purged, "expired sessions purged");
            println!("purged {purged} expired session(s)");
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests;
