use std::time::Duration;

use anyhow::Result;
use clap::Args;

use idemgate_common::time::{duration_ms, now_ms};
use idemgate_common::token::create_token;

use crate::output::{print_json, OutputMode};

#[derive(Args)]
pub struct TokenCmd {
    /// Caller identity embedded in the token
    #[arg(long)]
    pub subject: String,

    #[arg(long, env = "IDEMGATE_JWT_SECRET")]
    pub secret: String,

    #[arg(long, default_value_t = 3600)]
    pub ttl_secs: u64,
}

pub fn mint(cmd: &TokenCmd, now_ms: i64) -> Result<String> {
    if cmd.subject.trim().is_empty() {
        anyhow::bail!("subject must not be empty");
    }
    if cmd.secret.is_empty() {
        anyhow::bail!("secret must not be empty");
    }
    let expires = now_ms + duration_ms(Duration::from_secs(cmd.ttl_secs));
    Ok(create_token(cmd.secret.as_bytes(), &cmd.subject, expires))
}

pub fn run(mode: OutputMode, cmd: TokenCmd) -> Result<()> {
    let token = mint(&cmd, now_ms())?;
    match mode {
        OutputMode::Json => print_json(&serde_json::json!({
            "subject": cmd.subject,
            "token": token,
        })),
        OutputMode::Human => {
            println!("{token}");
            Ok(())
        }
    }
}
