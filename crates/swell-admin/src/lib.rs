//! swell-admin — server-rendered admin form.
//!
//! Operators tune a workload's replica bounds here without touching
//! the ConfigMap by hand. The form only edits `min` and `max`; every
//! other field of the stored entry is preserved as-is. All reads and
//! writes go through the [`swell_config::ConfigStore`], never the
//! orchestrator directly.

pub mod actions;
pub mod pages;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use swell_config::ConfigStore;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn ConfigStore>,
}

/// Build the admin router.
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(pages::entries).post(actions::update_bounds))
        .with_state(state)
}
