use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::SecurityConfig;
use crate::database::DatabaseManager;
use crate::directory::DirectoryStore;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::{EnrollmentService, GuardianService};

/// Shared handles every request handler needs
#[derive(Clone)]
pub struct AppState {
    pub databases: DatabaseManager,
    pub directory: DirectoryStore,
    pub enrollment: EnrollmentService,
    pub guardians: GuardianService,
    pub security: Arc<SecurityConfig>,
}

impl AppState {
    pub fn new(databases: DatabaseManager, security: SecurityConfig) -> Self {
        let directory = DirectoryStore::new(databases.directory_pool().clone());
        Self {
            enrollment: EnrollmentService::new(directory.clone()),
            guardians: GuardianService::new(databases.clone(), directory.clone()),
            directory,
            databases,
            security: Arc::new(security),
        }
    }
}

pub fn app(state: AppState, enable_request_logging: bool) -> Router {
    let cors = cors_layer(&state.security.cors_origins);

    let router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .merge(protected_routes(state.clone()))
        .layer(cors)
        .with_state(state);

    if enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(affiliate_routes())
        .merge(school_routes())
        .merge(guardian_routes())
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn affiliate_routes() -> Router<AppState> {
    use protected::affiliates;

    Router::new()
        .route("/api/school/affiliates/generate-token", post(affiliates::generate_token))
        .route("/api/school/affiliates/join", post(affiliates::join))
        .route("/api/school/affiliates/list", get(affiliates::list))
        .route("/api/school/affiliates/remove/:id", delete(affiliates::remove))
        .route("/api/school/affiliates/switch/:school_id", post(affiliates::switch))
}

fn school_routes() -> Router<AppState> {
    use protected::school;

    Router::new()
        .route("/api/school/students", get(school::list_students).post(school::create_student))
        .route("/api/school/classes", get(school::list_classes).post(school::create_class))
        .route("/api/school/teachers", get(school::list_teachers).post(school::create_teacher))
        .route("/api/school/inspectors", post(school::create_inspector))
        .route("/api/school/employees", get(school::list_employees).post(school::create_employee))
        .route("/api/school/access-logs", post(school::record_access_event))
}

fn guardian_routes() -> Router<AppState> {
    use protected::guardian;

    Router::new()
        .route("/api/guardian/students", get(guardian::students))
        .route("/api/guardian/notifications", get(guardian::notifications))
}

/// Permissive unless explicit origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    if allowed.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}
