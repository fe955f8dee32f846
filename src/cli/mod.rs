//! Command-line interface.
//!
//! Without a subcommand the binary starts the server. Subcommands work
//! directly against the configured database:
//! - `user add <username> --password <pw> [--role admin|operator]`
//! - `user list`
//! - `config check` - Validate configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::auth::hash_password;
use crate::api::validation::{validate_password, validate_username};
use crate::config::Config;
use crate::db::{DbPool, User, UserRole};

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "salesboard")]
#[command(author, version, about = "Gamified sales tracking board", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SALESBOARD_CONFIG", default_value = "salesboard.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create a user
    Add {
        username: String,
        #[arg(short, long)]
        password: String,
        /// `admin` or `operator`
        #[arg(short, long, default_value = "operator", value_parser = parse_role)]
        role: UserRole,
    },
    /// List all users
    List,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

fn parse_role(s: &str) -> Result<UserRole, String> {
    UserRole::from_str(s).ok_or_else(|| format!("unknown role '{}' (admin|operator)", s))
}

/// Run a CLI subcommand. Returns Ok(()) without doing anything when no
/// subcommand was given; main.rs starts the server in that case.
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::User(UserCommands::Add {
            username,
            password,
            role,
        })) => {
            let db = open_db(cli).await?;
            let user = add_user(&db, username, password, *role).await?;
            println!("[OK] Created {} '{}'", user.role(), user.username);
            Ok(())
        }
        Some(Commands::User(UserCommands::List)) => {
            let db = open_db(cli).await?;
            cmd_user_list(&db).await
        }
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        None => Ok(()),
    }
}

async fn open_db(cli: &Cli) -> Result<DbPool> {
    let config = Config::load(&cli.config)?;
    crate::utils::ensure_dir(&config.server.data_dir)?;
    crate::db::init(&config.server.data_dir)
        .await
        .context("Failed to open database")
}

/// Validate and insert a user
pub async fn add_user(
    db: &DbPool,
    username: &str,
    password: &str,
    role: UserRole,
) -> Result<User> {
    let username = username.trim();
    validate_username(username).map_err(anyhow::Error::msg)?;
    validate_password(password).map_err(anyhow::Error::msg)?;

    if User::find_by_username(db, username).await?.is_some() {
        anyhow::bail!("User '{}' already exists", username);
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    User::create(db, username, &password_hash, role)
        .await
        .context("Failed to create user")
}

async fn cmd_user_list(db: &DbPool) -> Result<()> {
    let users = User::list_all(db).await?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!("{:<32} {:<10} CREATED", "USERNAME", "ROLE");
    for user in users {
        println!(
            "{:<32} {:<10} {}",
            user.username,
            user.role().as_str(),
            user.created_at
        );
    }
    Ok(())
}

fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        return Ok(());
    }

    let config = Config::load(config_path)?;

    println!("[OK] Configuration file is valid!");
    println!();
    println!("Server:");
    println!("  Host:         {}", config.server.host);
    println!("  API Port:     {}", config.server.api_port);
    println!("  Data Dir:     {}", config.server.data_dir.display());
    println!();
    println!("Auth:");
    println!("  Admin:        {}", config.auth.admin_username);
    println!("  Session TTL:  {} days", config.auth.session_ttl_days);
    println!(
        "  Registration: {}",
        if config.auth.allow_registration {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!(
        "  Rate Limiting: {}",
        if config.rate_limit.enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!();
    println!("Scoring:");
    println!("  Commission:   {}", config.commission.policy);
    println!("  Streak:       {}", config.streak.policy);
    println!("  Ticker feed:  {} sales", config.ticker.recent_limit);

    Ok(())
}
