//! Application state.
//!
//! The pipeline is the single injected dependency of every handler; it owns
//! the storage, repositories, validator, and extractor wired at startup.

use std::sync::Arc;

use kvitto_core::Config;
use kvitto_processing::ReceiptPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReceiptPipeline>,
    pub config: Config,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
