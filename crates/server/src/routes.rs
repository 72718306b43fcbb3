//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::session::session_middleware;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// CORS policy for the configured browser origins. Credentials are allowed so
/// the session cookie travels with cross-origin requests.
fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        // Health check (unauthenticated for load balancers and probes)
        .route("/v1/health", get(handlers::health_check))
        // Accounts
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        // Catalogue
        .route("/api/volumes", get(handlers::list_volumes))
        .route("/api/volumes/{slug}", get(handlers::get_volume))
        .route("/api/issues", get(handlers::list_issues))
        .route("/api/issues/{slug}", get(handlers::get_issue))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/{slug}", get(handlers::get_article))
        // Session-deduplicated counters
        .route("/api/articles/{slug}/read", post(handlers::record_read))
        .route(
            "/api/articles/{slug}/download",
            post(handlers::record_download),
        );

    let author_routes = Router::new()
        .route(
            "/api/submissions",
            get(handlers::list_my_submissions).post(handlers::create_submission),
        )
        .route(
            "/api/submissions/{id}",
            get(handlers::get_my_submission).delete(handlers::delete_my_submission),
        );

    // Every handler below takes an AdminUser
    let admin_routes = Router::new()
        .route("/api/admin/users", get(handlers::list_users))
        .route(
            "/api/admin/users/{id}",
            delete(handlers::delete_user),
        )
        .route(
            "/api/admin/submissions",
            get(handlers::admin_list_submissions),
        )
        .route(
            "/api/admin/submissions/{id}",
            get(handlers::admin_get_submission).delete(handlers::admin_delete_submission),
        )
        .route(
            "/api/admin/submissions/{id}/approve",
            patch(handlers::approve_submission),
        )
        .route(
            "/api/admin/submissions/{id}/reject",
            patch(handlers::reject_submission),
        )
        .route(
            "/api/admin/volumes",
            get(handlers::admin_list_volumes).post(handlers::create_volume),
        )
        .route(
            "/api/admin/volumes/{id}",
            delete(handlers::delete_volume),
        )
        .route(
            "/api/admin/issues",
            get(handlers::admin_list_issues).post(handlers::create_issue),
        )
        .route(
            "/api/admin/issues/{id}",
            delete(handlers::delete_issue),
        )
        .route(
            "/api/admin/articles",
            get(handlers::admin_list_articles).post(handlers::create_article),
        )
        // GET takes a slug, DELETE an id; axum needs one parameter name per segment
        .route(
            "/api/admin/articles/{article}",
            get(handlers::admin_get_article).delete(handlers::delete_article),
        )
        .route(
            "/api/admin/articles/{article}/download",
            get(handlers::download_article_pdf),
        )
        .route(
            "/api/admin/articles/featured/{id}",
            put(handlers::set_featured_article),
        );

    let mut router = Router::new()
        .merge(public_routes)
        .merge(author_routes)
        .merge(admin_routes);

    // SECURITY: when enabled, restrict /metrics to the scraper at the network level.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let cors = cors_layer(&state);

    // Layers run outermost first: Trace -> CORS -> Auth -> Session -> body limit -> handler
    router
        .layer(DefaultBodyLimit::max(state.config.server.body_limit()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
