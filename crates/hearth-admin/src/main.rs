//! # hearth-admin
//!
//! Operator tool for a Hearth database.  It loads its settings from the
//! environment, opens (and migrates) the store with the configured cascade
//! policy, runs one maintenance subcommand and prints the result as JSON.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hearth_shared::ProfileId;
use hearth_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AdminConfig;

#[derive(Parser)]
#[command(name = "hearth-admin", author, version, about = "Maintenance tool for a Hearth database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and report the schema version
    Migrate,
    /// Pick a featured profile at random
    Featured,
    /// Friends, followers and followings of a profile
    Network { profile: i64 },
    /// Comments two profiles left on each other's walls, newest first
    Wall {
        a: i64,
        b: i64,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Activate a profile, or deactivate it with --inactive
    SetActive {
        profile: i64,
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a profile, resolving its dependents with the configured policy
    DeleteProfile { profile: i64 },
    /// Replace a profile's icon with an image file, or clear it
    SetIcon {
        profile: i64,
        file: Option<PathBuf>,
    },
    /// Send a contact-page message built from key=value fields
    Contact {
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Rebuild the profile search index and query it
    Search { query: String },
    /// Search a profile's photos by caption tags
    Photos {
        profile: i64,
        #[arg(long)]
        tags: Option<String>,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.trim().is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hearth_store=debug")),
        )
        .init();

    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = AdminConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => {
            info!(path = %path.display(), "opening database");
            Database::open_at(path)?
        }
        None => Database::new()?,
    }
    .with_cascade_policy(config.cascade_policy())?;

    // -----------------------------------------------------------------------
    // 4. Run the command
    // -----------------------------------------------------------------------
    let output = match cli.command {
        Commands::Migrate => commands::migrate(&db),
        Commands::Featured => commands::featured(&db)?,
        Commands::Network { profile } => commands::network(&db, ProfileId(profile))?,
        Commands::Wall { a, b, page } => {
            commands::wall(&db, &config, ProfileId(a), ProfileId(b), page)?
        }
        Commands::SetActive { profile, inactive } => {
            commands::set_active(&db, ProfileId(profile), !inactive)?
        }
        Commands::DeleteProfile { profile } => {
            commands::delete_profile(&db, ProfileId(profile))?
        }
        Commands::SetIcon { profile, file } => {
            commands::set_icon(&db, &config, ProfileId(profile), file.as_deref()).await?
        }
        Commands::Contact { fields } => commands::contact(&config, fields).await?,
        Commands::Search { query } => commands::search(&db, &query)?,
        Commands::Photos { profile, tags } => {
            commands::photos(&db, &config, ProfileId(profile), tags.as_deref()).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_split_on_first_equals() {
        assert_eq!(
            parse_field("message=a=b").unwrap(),
            ("message".to_string(), "a=b".to_string())
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn cli_parses_repeated_fields() {
        let cli = Cli::try_parse_from([
            "hearth-admin",
            "contact",
            "--field",
            "name=Ada",
            "--field",
            "email=ada@example.org",
        ])
        .unwrap();
        match cli.command {
            Commands::Contact { fields } => assert_eq!(fields.len(), 2),
            _ => panic!("expected contact"),
        }
    }
}
