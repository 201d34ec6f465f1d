use std::sync::Arc;

use idemgate_common::retry::RetryConfig;
use idemgate_common::time::now_ms;
use idemgate_common::token::create_token;
use idemgate_server::coordinator::{Coordinator, CoordinatorSettings};
use idemgate_server::metrics::CoordinatorMetrics;
use idemgate_server::rest::{router, AppState};
use idemgate_server::store::MemoryFingerprintStore;

use crate::client::ApiClient;

pub const SECRET: &[u8] = b"cli-test-secret";

/// Serves the real router on an ephemeral port.
pub async fn spawn_server() -> (String, AppState) {
    let coordinator = Coordinator::new(
        Arc::new(MemoryFingerprintStore::new()),
        CoordinatorSettings::default(),
        RetryConfig::no_retry(),
        CoordinatorMetrics::new(),
    );
    let state = AppState::new(coordinator, SECRET);
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

pub fn client_for(base: &str, caller: &str) -> ApiClient {
    let token = create_token(SECRET, caller, now_ms() + 3_600_000);
    ApiClient::new(base, Some(token)).unwrap()
}
