pub mod health;
pub mod reminders;
pub mod stress;
pub mod token;
pub mod version;

use anyhow::Result;
use clap::Subcommand;

use crate::client::ApiClient;
use crate::Opts;

#[derive(Subcommand)]
pub enum Commands {
    /// Check server liveness and store readiness
    Health,
    /// Create and list reminders through the idempotent API
    #[command(subcommand)]
    Reminders(reminders::RemindersCmd),
    /// Fire concurrent duplicates at the server and verify one execution
    Stress(stress::StressCmd),
    /// Mint a bearer token for a caller
    Token(token::TokenCmd),
    /// Print version information
    Version,
}

pub async fn run(opts: Opts) -> Result<()> {
    let mode = opts.output_mode();
    match opts.cmd {
        Commands::Version => {
            version::run(mode);
            Ok(())
        }
        Commands::Token(cmd) => token::run(mode, cmd),
        Commands::Health => {
            let client = ApiClient::new(&opts.server, opts.token)?;
            health::run(mode, &client).await
        }
        Commands::Reminders(cmd) => {
            let client = ApiClient::new(&opts.server, opts.token)?;
            reminders::run(mode, &client, cmd).await
        }
        Commands::Stress(cmd) => {
            let client = ApiClient::new(&opts.server, opts.token)?;
            stress::run(mode, &client, cmd).await
        }
    }
}
