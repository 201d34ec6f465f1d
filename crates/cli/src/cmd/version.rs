use crate::output::{print_json, theme, OutputMode};

pub fn run(mode: OutputMode) {
    let version = env!("CARGO_PKG_VERSION");
    match mode {
        OutputMode::Json => {
            let _ = print_json(&serde_json::json!({ "name": "idemgate", "version": version }));
        }
        OutputMode::Human => {
            theme::print_header("idemgate");
            theme::print_kv("Version", version);
            theme::print_kv("Key header", idemgate_common::IDEMPOTENCY_KEY_HEADER);
            theme::print_kv("Replay header", idemgate_common::REPLAY_HEADER);
            println!();
        }
    }
}
