//! Test support: a controllable clock and a fully wired router
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests.

use crate::auth::{Clock, InMemoryCredentialStore, PasswordConfig, TokenCodec};
use crate::state::AppState;
use axum::Router;
use chrono::{DateTime, Utc};
use fitnote_core::AppConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Self::at(Utc::now())
    }

    /// Clock frozen at `now`
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Router plus the handles a test needs to steer it
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
}

/// Build the full application over an in-memory store, a manual clock and
/// fast password hashing
pub async fn test_app() -> TestApp {
    test_app_with_config(AppConfig::default()).await
}

pub async fn test_app_with_config(config: AppConfig) -> TestApp {
    let clock = ManualClock::new();
    let codec = TokenCodec::new(&config.auth)
        .unwrap_or_else(|e| panic!("invalid test token configuration: {e}"))
        .with_clock(clock.clone());

    let state = AppState::with_components(
        config,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(codec),
        PasswordConfig::fast(),
    )
    .await
    .unwrap_or_else(|e| panic!("failed to build test state: {e}"));

    let state = Arc::new(state);
    TestApp {
        router: crate::create_router(state.clone()),
        state,
        clock,
    }
}
