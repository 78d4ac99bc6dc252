mod index;
mod v1;
use crate::app_state::AppState;
use axum::{http::header, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

pub fn create_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .merge(index::index_routes())
        .nest("/api/v1", v1::v1_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The full application: routes, cookie sessions and state.
pub fn create_app<S>(state: AppState, session_store: S, secure_cookies: bool) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(session_store).with_secure(secure_cookies);

    create_routes().layer(session_layer).with_state(state)
}
