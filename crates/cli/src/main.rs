//! Edubook CLI - Database migrations and order administration.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! edubook-cli migrate
//!
//! # Move an order along its lifecycle
//! edubook-cli orders set-status 42 shipping --admin 1
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `orders set-status` - Administrative status transition

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "edubook-cli")]
#[command(author, version, about = "Edubook CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Change an order's status
    SetStatus {
        /// Order id
        order_id: i64,

        /// Target status (`confirmed`, `processing`, `shipping`, `delivered`, `cancelled`)
        status: String,

        /// User id of the acting admin
        #[arg(short, long)]
        admin: i64,

        /// Cancellation reason
        #[arg(short, long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Orders { action } => match action {
            OrderAction::SetStatus {
                order_id,
                status,
                admin,
                reason,
            } => {
                let status =
                    commands::orders::set_status(order_id, &status, admin, reason).await?;
                #[allow(clippy::print_stdout)]
                {
                    println!("Order {order_id} is now {status}");
                }
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_status() {
        let cli = Cli::try_parse_from([
            "edubook-cli",
            "orders",
            "set-status",
            "42",
            "cancelled",
            "--admin",
            "1",
            "--reason",
            "customer request",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        let Commands::Orders {
            action:
                OrderAction::SetStatus {
                    order_id,
                    status,
                    admin,
                    reason,
                },
        } = cli.command
        else {
            panic!("expected orders set-status");
        };
        assert_eq!(order_id, 42);
        assert_eq!(status, "cancelled");
        assert_eq!(admin, 1);
        assert_eq!(reason.as_deref(), Some("customer request"));
    }
}
