use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;

use idemgate_common::IdempotencyKey;

use crate::client::{ApiClient, RetryPolicy};
use crate::output::{build_table, print_json, print_outcome, spinner, theme, OutputMode};

#[derive(Subcommand)]
pub enum RemindersCmd {
    /// Create a reminder, retrying with the same idempotency key
    Create(CreateArgs),
    /// List the caller's reminders
    List,
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long, conflicts_with = "data")]
    pub title: Option<String>,

    /// Request body as inline JSON or a path to a JSON file
    #[arg(long)]
    pub data: Option<String>,

    #[arg(long)]
    pub due_at_ms: Option<i64>,

    /// Idempotency key. Generated when omitted and printed so it can be reused.
    #[arg(long)]
    pub key: Option<String>,

    #[arg(long, default_value_t = 5)]
    pub attempts: u32,
}

pub async fn run(mode: OutputMode, client: &ApiClient, cmd: RemindersCmd) -> Result<()> {
    match cmd {
        RemindersCmd::Create(args) => create(mode, client, args).await,
        RemindersCmd::List => list(mode, client).await,
    }
}

pub fn load_payload(data: &str) -> Result<serde_json::Value> {
    let path = Path::new(data);
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).context("invalid JSON in file")
    } else {
        serde_json::from_str(data).context("invalid inline JSON")
    }
}

pub fn build_payload(args: &CreateArgs) -> Result<serde_json::Value> {
    match (&args.title, &args.data) {
        (_, Some(data)) => load_payload(data),
        (Some(title), None) => {
            let mut body = serde_json::json!({ "title": title });
            if let Some(due) = args.due_at_ms {
                body["due_at_ms"] = due.into();
            }
            Ok(body)
        }
        (None, None) => anyhow::bail!("either --title or --data is required"),
    }
}

async fn create(mode: OutputMode, client: &ApiClient, args: CreateArgs) -> Result<()> {
    let payload = build_payload(&args)?;
    let key = match &args.key {
        Some(raw) => IdempotencyKey::parse(raw).context("invalid --key")?,
        None => IdempotencyKey::generate(),
    };
    let client = client.clone().with_policy(RetryPolicy {
        attempts: args.attempts,
        ..RetryPolicy::default()
    });

    let sp = match mode {
        OutputMode::Human => Some(spinner::create("Creating reminder...")),
        OutputMode::Json => None,
    };
    let resp = client.post_idempotent("/v1/reminders", &key, &payload).await;
    let resp = match resp {
        Ok(resp) => resp,
        Err(e) => {
            if let Some(sp) = &sp {
                spinner::finish_err(sp, &format!("{e:#}"));
            }
            return Err(e);
        }
    };

    match mode {
        OutputMode::Json => print_json(&serde_json::json!({
            "key": key.as_str(),
            "response": resp,
        }))?,
        OutputMode::Human => {
            if let Some(sp) = &sp {
                spinner::finish_clear(sp);
            }
            print_outcome("Reminder", &resp);
            theme::print_kv("Key", key.as_str());
            theme::print_kv("Attempts", &resp.attempts.to_string());
            theme::print_kv_colored("Status", &resp.status.to_string(), resp.is_success());
        }
    }

    if !resp.is_success() {
        anyhow::bail!("create failed: {}", resp.error_message());
    }
    Ok(())
}

async fn list(mode: OutputMode, client: &ApiClient) -> Result<()> {
    let value = client.get_json("/v1/reminders").await?;
    if mode == OutputMode::Json {
        return print_json(&value);
    }

    let items = value.as_array().cloned().unwrap_or_default();
    if items.is_empty() {
        println!("No reminders.");
        return Ok(());
    }
    let mut table = build_table(&["ID", "Title", "Due (ms)", "Created (ms)"]);
    for r in &items {
        table.add_row(vec![
            Cell::new(r["id"].as_str().unwrap_or("-")),
            Cell::new(r["title"].as_str().unwrap_or("-")),
            Cell::new(r["due_at_ms"].as_i64().map_or("-".to_string(), |v| v.to_string())),
            Cell::new(r["created_at_ms"].as_i64().unwrap_or_default()),
        ]);
    }
    println!("{table}");
    Ok(())
}
