use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::{
    AppState,
    handlers::{agents, leads},
    middleware::admin,
};

/// Create all v1 API routes
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Lead intake and claim resolution
        .route("/leads", post(leads::create_lead_handler))
        .route("/leads/{id}", get(leads::get_lead_handler))
        .route(
            "/leads/{id}/claims",
            post(leads::claim_lead_handler).get(leads::list_lead_claims_handler),
        )
        // Agent directory
        .route("/agents", post(agents::register_agent_handler))
        .route(
            "/agents/{id}",
            patch(agents::update_agent_handler).get(agents::get_agent_handler),
        )
        // Merge admin routes
        .merge(create_admin_routes(state))
}

/// Routes gated behind the admin token.
fn create_admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/leads/{id}/reject", post(leads::reject_lead_handler))
        .layer(middleware::from_fn_with_state(state, admin::require_admin))
}
