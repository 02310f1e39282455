use clap::{Parser, Subcommand};
use spendless_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "spendless-cli", version, about = "Spendless challenge CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse challenge templates
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Join (or rejoin) a challenge
    Join {
        user_id: String,
        template_id: String,
    },
    /// Grade settled days and advance the streak
    CheckIn {
        user_id: String,
        template_id: String,
        /// Last day to grade (YYYY-MM-DD); defaults to the latest settled day
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// Show the current streak
    Streak {
        user_id: String,
        template_id: String,
    },
    /// List every attempt at a challenge, newest first
    History {
        user_id: String,
        template_id: String,
    },
    /// List a user's current enrollments
    Enrollments { user_id: String },
    /// Pull recent transactions from the configured provider
    Sync {
        user_id: String,
        /// Number of days to fetch, today included
        #[arg(long)]
        days: Option<u32>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// SPENDLESS_LOG, then RUST_LOG, then `logging.filter` from the config.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env("SPENDLESS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action, config),
        Commands::Catalog { action } => commands::catalog::run(action, &config).await,
        Commands::Join { user_id, template_id } => commands::challenge::join(&config, &user_id, &template_id).await,
        Commands::CheckIn {
            user_id,
            template_id,
            date,
        } => commands::challenge::check_in(&config, &user_id, &template_id, date).await,
        Commands::Streak { user_id, template_id } => {
            commands::challenge::streak(&config, &user_id, &template_id).await
        }
        Commands::History { user_id, template_id } => {
            commands::challenge::history(&config, &user_id, &template_id).await
        }
        Commands::Enrollments { user_id } => commands::challenge::enrollments(&config, &user_id).await,
        Commands::Sync { user_id, days } => commands::sync::run(&config, &user_id, days).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
