pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::BridgeConfig;
use crate::middleware::PublicAuthPaths;
use crate::services::{
    http::build_idp_client, AdminTokenProvider, AuthorityMapper, CredentialExchangeGateway,
    EmailProvider, IdentityStore, IdpProvisioningClient, PasswordResetService,
    RegistrationService, TokenValidator,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::session::login,
        handlers::auth::session::me,
        handlers::auth::session::hello,
        handlers::auth::password::forgot_password,
        handlers::auth::password::reset_password,
        handlers::user::list_users,
        handlers::user::get_user,
    ),
    components(
        schemas(
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::auth::MeResponse,
            dtos::ErrorResponse,
            dtos::MessageResponse,
            models::UserResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login relay and password reset"),
        (name = "User", description = "Local user records"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub store: Arc<dyn IdentityStore>,
    pub email: Arc<dyn EmailProvider>,
    pub token_validator: Arc<TokenValidator>,
    pub authority_mapper: Arc<AuthorityMapper>,
    pub gateway: CredentialExchangeGateway,
    pub registration: RegistrationService,
    pub password_reset: PasswordResetService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every component from configuration. One HTTP client, with the
    /// configured timeouts, is shared by all identity provider calls.
    pub fn new(
        config: BridgeConfig,
        store: Arc<dyn IdentityStore>,
        email: Arc<dyn EmailProvider>,
    ) -> Result<Self, AppError> {
        let http = build_idp_client(config.idp.connect_timeout_ms, config.idp.read_timeout_ms)?;

        let token_validator = Arc::new(TokenValidator::new(
            http.clone(),
            config.idp.jwks_uri.clone(),
            config.idp.issuer_uri.clone(),
            config.idp.token_leeway_seconds,
            Duration::from_secs(config.idp.jwks_min_refresh_seconds),
        ));
        let authority_mapper = Arc::new(AuthorityMapper::new(config.idp.client_id.clone()));

        let gateway = CredentialExchangeGateway::new(
            http.clone(),
            config.idp.token_uri.clone(),
            config.idp.client_id.clone(),
            config.idp.client_secret.clone(),
        );

        let admin_tokens = Arc::new(AdminTokenProvider::new(
            http.clone(),
            config.admin.token_uri.clone(),
            config.admin.client_id.clone(),
            config.admin.username.clone(),
            config.admin.password.clone(),
            Duration::from_secs(config.admin.safety_margin_seconds),
        ));
        let provisioner = Arc::new(IdpProvisioningClient::new(
            http,
            config.admin.base_url.clone(),
            admin_tokens,
        ));
        let registration = RegistrationService::new(store.clone(), provisioner);

        let password_reset = PasswordResetService::new(
            store.clone(),
            email.clone(),
            chrono::Duration::minutes(config.reset.token_ttl_minutes),
            config.reset.client_base_url.clone(),
        );

        let rl = &config.rate_limit;
        let login_rate_limiter = create_ip_rate_limiter(rl.login_attempts, rl.login_window_seconds);
        let register_rate_limiter =
            create_ip_rate_limiter(rl.register_attempts, rl.register_window_seconds);
        let password_reset_rate_limiter =
            create_ip_rate_limiter(rl.password_reset_attempts, rl.password_reset_window_seconds);
        let ip_rate_limiter = create_ip_rate_limiter(rl.global_ip_limit, rl.global_ip_window_seconds);

        Ok(Self {
            config: Arc::new(config),
            store,
            email,
            token_validator,
            authority_mapper,
            gateway,
            registration,
            password_reset,
            login_rate_limiter,
            register_rate_limiter,
            password_reset_rate_limiter,
            ip_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let prefix = state.config.security.public_auth_prefix.clone();
    let auth_path = |suffix: &str| format!("{}{}", prefix.trim_end_matches('/'), suffix);

    let login_route = Router::new()
        .route(&auth_path("/login"), post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route(&auth_path("/register"), post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let forgot_route = Router::new()
        .route(&auth_path("/forgot"), post(handlers::auth::forgot_password))
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(handlers::user::list_users))
        .route_layer(from_fn(middleware::require_admin));

    let protected_routes = Router::new()
        .route(&auth_path("/me"), get(handlers::auth::me))
        .route("/users/:id", get(handlers::user::get_user))
        .merge(admin_routes)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.config.swagger.enabled {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    app.route(&auth_path("/hello"), get(handlers::auth::hello))
        .route(&auth_path("/reset"), post(handlers::auth::reset_password))
        .merge(login_route)
        .merge(register_route)
        .merge(forgot_route)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        // Runs before any route-level authentication
        .layer(from_fn_with_state(
            Arc::new(PublicAuthPaths::new(&prefix)),
            middleware::strip_authorization_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
