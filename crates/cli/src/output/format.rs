use colored::Colorize;
use serde::Serialize;

use crate::client::ApiResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

pub fn outcome_message(noun: &str, resp: &ApiResponse) -> String {
    if !resp.is_success() {
        return resp.error_message();
    }
    let verb = if resp.replayed { "replayed" } else { "created" };
    format!("{noun} {} {verb}", resp.resource_id().unwrap_or("?"))
}

pub fn print_outcome(noun: &str, resp: &ApiResponse) {
    let msg = outcome_message(noun, resp);
    match (resp.is_success(), resp.replayed) {
        (false, _) => print_error(&msg),
        (true, false) => print_success(&msg),
        (true, true) => println!("{} {}", "↺".yellow().bold(), msg),
    }
}
