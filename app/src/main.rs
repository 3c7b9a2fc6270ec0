use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{check, permission, role, serve, user as user_cmd};
use config::GateConfig;

/// realm-gate - session-based access control in front of a static site
#[derive(Parser)]
#[command(name = "realm-gate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true, env = "REALM_GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gate HTTP server
    Serve,

    /// Principal management
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Role assignment
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },

    /// Permission assignment
    Permission {
        #[command(subcommand)]
        action: PermissionAction,
    },

    /// Show which rule applies to a request path
    Check {
        /// Request path, e.g. /cars.jsp
        path: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a principal
    Add {
        username: String,

        #[arg(short, long, env = "REALM_GATE_PASSWORD", hide_env_values = true)]
        password: String,

        /// Roles to grant right away
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },

    /// Change a principal's password
    Passwd {
        username: String,

        #[arg(short, long, env = "REALM_GATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// List principals
    List,
}

#[derive(Subcommand)]
enum RoleAction {
    /// Create a role
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Grant a role to a principal
    Grant { username: String, role: String },

    /// Revoke a role from a principal
    Revoke { username: String, role: String },
}

#[derive(Subcommand)]
enum PermissionAction {
    /// Grant a permission to a role
    Grant { role: String, permission: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = GateConfig::load(cli.config.as_deref())?;

    // Only the server writes log files
    let _guard = if matches!(cli.command, Commands::Serve) {
        Some(logging::init_logging(
            &config.logging.directory,
            if cli.verbose { "debug" } else { "info" },
        )?)
    } else {
        logging::init_console_logging(if cli.verbose { "debug" } else { "warn" })?;
        None
    };

    match cli.command {
        Commands::Serve => {
            serve::execute(config).await?;
            logging::log_shutdown();
        }
        Commands::User { action } => match action {
            UserAction::Add {
                username,
                password,
                roles,
            } => user_cmd::add(&config, &username, &password, &roles).await?,
            UserAction::Passwd { username, password } => {
                user_cmd::passwd(&config, &username, &password).await?
            }
            UserAction::List => user_cmd::list(&config).await?,
        },
        Commands::Role { action } => match action {
            RoleAction::Create { name, description } => {
                role::create(&config, &name, description.as_deref()).await?
            }
            RoleAction::Grant { username, role } => {
                role::grant(&config, &username, &role).await?
            }
            RoleAction::Revoke { username, role } => {
                role::revoke(&config, &username, &role).await?
            }
        },
        Commands::Permission { action } => match action {
            PermissionAction::Grant { role, permission } => {
                permission::grant(&config, &role, &permission).await?
            }
        },
        Commands::Check { path, format } => check::execute(&config, &path, &format)?,
        Commands::Config => print!("{}", config.to_yaml()?),
    }

    Ok(())
}
