use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "];

pub fn create(msg: &str) -> ProgressBar {
    let sp = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
        sp.set_style(style.tick_strings(TICKS));
    }
    sp.set_message(msg.to_string());
    sp.enable_steady_tick(Duration::from_millis(80));
    sp
}

fn finish(sp: &ProgressBar, mark: colored::ColoredString, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        sp.set_style(style);
    }
    sp.finish_with_message(format!("{mark} {msg}"));
}

pub fn finish_err(sp: &ProgressBar, msg: &str) {
    finish(sp, "✗".red().bold(), msg);
}

pub fn finish_clear(sp: &ProgressBar) {
    sp.finish_and_clear();
}
