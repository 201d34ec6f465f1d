use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};
use serde::Serialize;
use tokio::task::JoinSet;

use idemgate_common::IdempotencyKey;

use crate::client::{ApiClient, ApiResponse};
use crate::output::{
    build_table, print_error, print_json, print_success, spinner, theme, OutputMode,
};

#[derive(Args)]
pub struct StressCmd {
    /// Number of concurrent duplicates sharing one key
    #[arg(long, default_value_t = 20)]
    pub count: usize,

    #[arg(long, default_value = "stress reminder")]
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct StressReport {
    pub key: String,
    pub requests: usize,
    pub succeeded: usize,
    pub fresh: usize,
    pub distinct_ids: usize,
    pub follow_up_replayed: bool,
    pub new_key_distinct: bool,
    pub elapsed_ms: u128,
    pub failures: Vec<String>,
}

impl StressReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn summarize(
    key: &IdempotencyKey,
    burst: &[ApiResponse],
    follow_up: &ApiResponse,
    new_key: &ApiResponse,
) -> StressReport {
    let mut failures = Vec::new();
    let succeeded: Vec<&ApiResponse> = burst.iter().filter(|r| r.is_success()).collect();
    let fresh = succeeded.iter().filter(|r| !r.replayed).count();
    let ids: BTreeSet<&str> = succeeded.iter().filter_map(|r| r.resource_id()).collect();

    for r in burst.iter().filter(|r| !r.is_success()) {
        failures.push(format!("duplicate failed: {}", r.error_message()));
    }
    if fresh != 1 {
        failures.push(format!("expected 1 fresh execution, saw {fresh}"));
    }
    if ids.len() != 1 {
        failures.push(format!("expected 1 resource id, saw {}", ids.len()));
    }

    let original = ids.iter().next().copied();
    let follow_up_replayed = follow_up.replayed && follow_up.resource_id() == original;
    if !follow_up_replayed {
        failures.push("follow-up with the same key was not a replay of the original".into());
    }
    let new_key_distinct = new_key.is_success()
        && !new_key.replayed
        && new_key.resource_id().is_some()
        && new_key.resource_id() != original;
    if !new_key_distinct {
        failures.push("a fresh key did not produce a new resource".into());
    }

    StressReport {
        key: key.to_string(),
        requests: burst.len(),
        succeeded: succeeded.len(),
        fresh,
        distinct_ids: ids.len(),
        follow_up_replayed,
        new_key_distinct,
        elapsed_ms: 0,
        failures,
    }
}

pub async fn execute(client: &ApiClient, cmd: &StressCmd) -> Result<StressReport> {
    let key = IdempotencyKey::generate();
    let body = serde_json::json!({ "title": cmd.title });
    let started = Instant::now();

    let mut set = JoinSet::new();
    for _ in 0..cmd.count.max(1) {
        let client = client.clone();
        let key = key.clone();
        let body = body.clone();
        set.spawn(async move { client.post_idempotent("/v1/reminders", &key, &body).await });
    }
    let mut burst = Vec::with_capacity(cmd.count);
    while let Some(joined) = set.join_next().await {
        burst.push(joined??);
    }

    let follow_up = client.post_idempotent("/v1/reminders", &key, &body).await?;
    let new_key = client
        .post_idempotent("/v1/reminders", &IdempotencyKey::generate(), &body)
        .await?;

    let mut report = summarize(&key, &burst, &follow_up, &new_key);
    report.elapsed_ms = started.elapsed().as_millis();
    Ok(report)
}

pub async fn run(mode: OutputMode, client: &ApiClient, cmd: StressCmd) -> Result<()> {
    let sp = match mode {
        OutputMode::Human => Some(spinner::create(&format!(
            "Sending {} duplicates...",
            cmd.count
        ))),
        OutputMode::Json => None,
    };
    let report = execute(client, &cmd).await;
    if let Some(sp) = &sp {
        spinner::finish_clear(sp);
    }
    let report = report?;

    match mode {
        OutputMode::Json => print_json(&report)?,
        OutputMode::Human => {
            theme::print_header("Stress");
            theme::print_kv("Key", &report.key);
            let mut table = build_table(&["Check", "Observed", "Result"]);
            let rows = [
                ("requests", report.requests.to_string(), true),
                ("succeeded", report.succeeded.to_string(), report.succeeded == report.requests),
                ("fresh executions", report.fresh.to_string(), report.fresh == 1),
                ("distinct ids", report.distinct_ids.to_string(), report.distinct_ids == 1),
                ("follow-up replayed", report.follow_up_replayed.to_string(), report.follow_up_replayed),
                ("new key distinct", report.new_key_distinct.to_string(), report.new_key_distinct),
            ];
            for (check, observed, ok) in rows {
                let verdict = if ok {
                    Cell::new("ok").fg(Color::Green)
                } else {
                    Cell::new("FAIL").fg(Color::Red)
                };
                table.add_row(vec![Cell::new(check), Cell::new(observed), verdict]);
            }
            println!("{table}");
            theme::print_kv("Elapsed", &format!("{} ms", report.elapsed_ms));
            println!();
            if report.passed() {
                print_success("exactly one execution observed");
            } else {
                for f in &report.failures {
                    print_error(f);
                }
            }
        }
    }

    if !report.passed() {
        anyhow::bail!("{} check(s) failed", report.failures.len());
    }
    Ok(())
}
