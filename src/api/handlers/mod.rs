//! REST endpoint handlers organized by resource.

pub mod billing;
pub mod listing;
pub mod map;
pub mod search;
pub mod system;
pub mod webhook;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(search::routes())
        .merge(map::routes())
        .merge(listing::routes())
        .merge(billing::routes())
}
