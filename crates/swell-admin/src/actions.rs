//! Admin form actions.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use serde::Deserialize;
use tracing::info;

use crate::AdminState;

#[derive(Deserialize)]
pub struct BoundsForm {
    pub name: String,
    pub min: i32,
    pub max: i32,
}

/// POST / — update one entry's replica bounds.
///
/// The stored blob is edited as a generic JSON object so the backend's
/// own fields (queue identifiers, credentials, divisor) survive the
/// round trip untouched.
pub async fn update_bounds(
    State(state): State<AdminState>,
    Form(form): Form<BoundsForm>,
) -> impl IntoResponse {
    if form.min > form.max {
        return (
            StatusCode::BAD_REQUEST,
            format!("min {} exceeds max {}", form.min, form.max),
        )
            .into_response();
    }

    let entries = match state.store.read_all().await {
        Ok(entries) => entries,
        Err(e) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };
    let raw = match entries.get(&form.name) {
        Some(raw) => raw,
        None => {
            return (
                StatusCode::NOT_FOUND,
                format!("entry `{}` not found", form.name),
            )
                .into_response();
        }
    };

    let mut value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("entry `{}`: {e}", form.name),
            )
                .into_response();
        }
    };
    let Some(obj) = value.as_object_mut() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("entry `{}` is not an object", form.name),
        )
            .into_response();
    };
    obj.insert("min".to_string(), form.min.into());
    obj.insert("max".to_string(), form.max.into());

    let updated = value.to_string();
    if let Err(e) = state.store.write_entry(&form.name, &updated).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    info!(entry = %form.name, min = form.min, max = form.max, "replica bounds updated");
    Redirect::to("/admin").into_response()
}
