pub mod health;
pub mod submit;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;
use crate::views;

pub fn form_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(views::form_page).post(submit::submit))
        .route("/submit", post(submit::submit))
        .route("/submit_form", post(submit::submit))
        .route("/healthz", get(health::healthz))
}
