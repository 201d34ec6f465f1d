use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{print_error, print_json, print_success, spinner, OutputMode};

pub async fn run(mode: OutputMode, client: &ApiClient) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create(&format!("Checking {}...", client.base()))),
        OutputMode::Json => None,
    };
    let live = client.check("/healthz").await;
    let ready = client.check("/ready").await;
    if let Some(sp) = &sp {
        spinner::finish_clear(sp);
    }

    match mode {
        OutputMode::Json => {
            print_json(&serde_json::json!({
                "server": client.base(),
                "live": live.is_ok(),
                "ready": ready.is_ok(),
            }))?;
        }
        OutputMode::Human => {
            match &live {
                Ok(()) => print_success(&format!("{} is live", client.base())),
                Err(e) => print_error(&format!("{} is not reachable: {e:#}", client.base())),
            }
            match &ready {
                Ok(()) => print_success("idempotency store is ready"),
                Err(e) => print_error(&format!("idempotency store not ready: {e:#}")),
            }
        }
    }

    if live.is_err() || ready.is_err() {
        anyhow::bail!("server unhealthy");
    }
    Ok(())
}
