//! API Router with Swagger UI

use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::{
    BookingService, NotificationFeed, PaymentReconciler, SettlementService, SlotGrid,
};
use crate::interfaces::http::common::{ApiResponse, EmptyData};
use crate::interfaces::http::middleware::actor_middleware;

use super::modules::admin::{self, AdminAppState};
use super::modules::bookings::{self, BookingAppState};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::payments::{self, PaymentAppState};
use super::modules::request_id::request_id_middleware;
use super::modules::slots::{self, SlotAppState};

/// Unified state for every `/api/v1` route.
/// Axum extracts the specific handler state via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    pub grid: Arc<SlotGrid>,
    pub bookings: Arc<BookingService>,
    pub settlement: Arc<SettlementService>,
    pub payments: Arc<PaymentReconciler>,
    pub feed: Arc<NotificationFeed>,
    pub recent_window: chrono::Duration,
}

impl FromRef<ApiState> for SlotAppState {
    fn from_ref(s: &ApiState) -> Self {
        SlotAppState {
            grid: Arc::clone(&s.grid),
        }
    }
}

impl FromRef<ApiState> for BookingAppState {
    fn from_ref(s: &ApiState) -> Self {
        BookingAppState {
            bookings: Arc::clone(&s.bookings),
            settlement: Arc::clone(&s.settlement),
        }
    }
}

impl FromRef<ApiState> for PaymentAppState {
    fn from_ref(s: &ApiState) -> Self {
        PaymentAppState {
            payments: Arc::clone(&s.payments),
            feed: Arc::clone(&s.feed),
            recent_window: s.recent_window,
        }
    }
}

impl FromRef<ApiState> for AdminAppState {
    fn from_ref(s: &ApiState) -> Self {
        AdminAppState {
            settlement: Arc::clone(&s.settlement),
        }
    }
}

/// Identity header scheme for OpenAPI
struct IdentityAddon;

impl Modify for IdentityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-User-Id",
                    "Caller id forwarded by the upstream gateway",
                ))),
            );
            components.add_security_scheme(
                "user_role",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-User-Role",
                    "user | operator; defaults to user",
                ))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Slots
        slots::query_slots,
        // Bookings
        bookings::create_booking,
        bookings::list_bookings,
        bookings::list_active_bookings,
        bookings::get_booking,
        bookings::cancel_booking,
        bookings::start_session,
        bookings::mark_completed,
        // Settlement
        bookings::set_amount,
        admin::list_awaiting_settlement,
        admin::list_flagged,
        // Payments
        payments::initiate_payment,
        payments::verify_payment,
        payments::pay_later,
        payments::payment_status,
        payments::pending_payments,
        payments::recent_confirmations,
        payments::payment_webhook,
        payments::payment_callback,
    ),
    components(
        schemas(
            // Common
            ApiResponse<EmptyData>,
            health::HealthResponse,
            health::ComponentHealth,
            // Slots
            slots::SlotQueryRequest,
            slots::SlotDto,
            // Bookings
            bookings::CreateBookingRequest,
            bookings::SetAmountRequest,
            bookings::BookingDto,
            bookings::PaymentDataDto,
            // Payments
            payments::BookingRefRequest,
            payments::PaymentInitiationDto,
            payments::VerifyPaymentRequest,
            payments::VerificationDto,
            payments::PaymentStatusDto,
            payments::WebhookRequest,
        )
    ),
    modifiers(&IdentityAddon),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Slots", description = "Per-station slot availability"),
        (name = "Bookings", description = "Booking lifecycle: create, cancel, start, complete"),
        (name = "Settlement", description = "Operator pricing of completed sessions"),
        (name = "Payments", description = "Payment initiation, verification and gateway notifications"),
    ),
    info(
        title = "EV Charger Booking API",
        version = "1.0.0",
        description = "Slot booking and payment reconciliation for EV charging stations",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes.
///
/// `metrics` is `None` when no Prometheus recorder is installed.
pub fn create_api_router(
    state: ApiState,
    health_state: HealthState,
    metrics: Option<MetricsState>,
) -> Router {
    // Public: availability is not user specific
    let slot_routes = Router::new()
        .route("/query", post(slots::query_slots))
        .with_state(state.clone());

    let booking_routes = Router::new()
        .route(
            "/",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/active", get(bookings::list_active_bookings))
        .route("/{booking_id}", get(bookings::get_booking))
        .route("/{booking_id}/cancel", post(bookings::cancel_booking))
        .route("/{booking_id}/start", post(bookings::start_session))
        .route("/{booking_id}/mark-completed", post(bookings::mark_completed))
        .route("/{booking_id}/set-amount", post(bookings::set_amount))
        .layer(middleware::from_fn(actor_middleware))
        .with_state(state.clone());

    let payment_routes = Router::new()
        .route("/initiate", post(payments::initiate_payment))
        .route("/verify", post(payments::verify_payment))
        .route("/pay-later", post(payments::pay_later))
        .route("/status/{booking_id}", get(payments::payment_status))
        .route("/pending", get(payments::pending_payments))
        .route("/recent", get(payments::recent_confirmations))
        .layer(middleware::from_fn(actor_middleware))
        .with_state(state.clone());

    // Gateway-facing routes carry no caller identity
    let gateway_routes = Router::new()
        .route("/webhook", post(payments::payment_webhook))
        .route("/callback", get(payments::payment_callback))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/settlements", get(admin::list_awaiting_settlement))
        .route("/reviews", get(admin::list_flagged))
        .layer(middleware::from_fn(actor_middleware))
        .with_state(state);

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health_state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes =
        SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        .merge(swagger_routes)
        .merge(health_routes)
        .nest("/api/v1/slots", slot_routes)
        .nest("/api/v1/bookings", booking_routes)
        .nest("/api/v1/payments", payment_routes)
        .nest("/api/v1/payments", gateway_routes)
        .nest("/api/v1/admin", admin_routes);

    if let Some(metrics_state) = metrics {
        router = router.merge(
            Router::new()
                .route("/metrics", get(prometheus_metrics))
                .with_state(metrics_state),
        );
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
