//! HTTP surface consumed by the storefront UI and operator tooling.
//!
//! Checkout failures come back with the specific reason (empty cart vs
//! unavailable product) so the client can re-prompt instead of showing
//! a generic error. The operator listing is guarded by the same
//! injected admin configuration the bot dispatcher uses.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use cm_core::{Address, AdminConfig, CartLine, Money, OrderError, OrderStatus, PaymentMethod};
use cm_orders::{AddressProvider, OrderManager};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<OrderManager>,
    pub addresses: Arc<dyn AddressProvider>,
    pub admin: AdminConfig,
}

pub fn router(state: AppState) -> Router {
    let operator = Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{id}", patch(transition_order))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_operator,
        ));

    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/healthz", get(healthz))
        .merge(operator)
        // The storefront UI calls this API from the browser.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Bearer-token gate for the operator routes. The token comes from the
/// single admin configuration value; an unconfigured token keeps the
/// surface closed.
async fn require_operator(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| state.admin.token_matches(token));
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    next.run(request).await
}

#[derive(Debug, Deserialize)]
pub struct NewOrderLine {
    pub product_id: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub lines: Vec<NewOrderLine>,
    /// Omitted means "use the customer's saved default address".
    #[serde(default)]
    pub shipping_address: Option<Address>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
}

struct ApiError(OrderError);

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrderError::EmptyCart
            | OrderError::ProductUnavailable { .. }
            | OrderError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
            OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Store(err) => {
                error!(error = %err, "order store failure");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal error"})),
                )
                    .into_response();
            }
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let address = match req.shipping_address {
        Some(address) => address,
        None => {
            let found = state
                .addresses
                .default_address(&req.customer_id)
                .await
                .map_err(cm_core::StoreError::Internal)
                .map_err(OrderError::from)?;
            match found {
                Some(address) => address,
                None => {
                    return Ok((
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": "no shipping address on file"})),
                    )
                        .into_response());
                }
            }
        }
    };

    let cart_lines: Vec<CartLine> = req
        .lines
        .into_iter()
        .map(|line| CartLine {
            product_id: line.product_id,
            variant: line.variant,
            quantity: line.quantity,
            // Resolved against the catalog by the manager; the client's
            // display price is not trusted here.
            unit_price: Money::ZERO,
        })
        .collect();

    let order = state
        .manager
        .create_order(&req.customer_id, &cart_lines, address, req.payment_method)
        .await?;
    Ok((StatusCode::CREATED, Json(order)).into_response())
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let order = state.manager.get_order(&id).await?;
    Ok(Json(order).into_response())
}

async fn list_orders(State(state): State<AppState>) -> Result<Response, ApiError> {
    let orders = state.manager.list_orders().await?;
    Ok(Json(orders).into_response())
}

async fn transition_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Response, ApiError> {
    let order = state.manager.transition_status(&id, req.status).await?;
    Ok(Json(order).into_response())
}
