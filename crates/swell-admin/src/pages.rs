//! Admin page handlers.

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};

use swell_config::WorkloadConfig;

use crate::AdminState;

/// One row of the entries table.
pub struct EntryView {
    pub name: String,
    pub namespace: String,
    pub deployment: String,
    pub backend: String,
    pub min: i32,
    pub max: i32,
    pub active: bool,
}

#[derive(Template)]
#[template(path = "entries.html")]
struct EntriesTemplate {
    entries: Vec<EntryView>,
}

/// GET / — list every configuration entry with an editable bounds form.
pub async fn entries(State(state): State<AdminState>) -> impl IntoResponse {
    let raw_entries = match state.store.read_all().await {
        Ok(entries) => entries,
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let mut entries = Vec::new();
    for (name, raw) in &raw_entries {
        let conf: WorkloadConfig = match serde_json::from_str(raw) {
            Ok(conf) => conf,
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("entry `{name}`: {e}"),
                )
                    .into_response();
            }
        };
        entries.push(EntryView {
            name: name.clone(),
            namespace: conf.namespace,
            deployment: conf.deployment,
            backend: conf.backend,
            min: conf.min,
            max: conf.max,
            active: conf.active,
        });
    }

    let page = EntriesTemplate { entries };
    match page.render() {
        Ok(body) => Html(body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
