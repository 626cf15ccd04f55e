use std::sync::Arc;

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request, State as AxumState,
        rejection::JsonRejection,
    },
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    response::IntoResponse,
};
use catalog::Address;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use crate::{
    accounts::{
        PasswordChange, ProfileUpdate, RegisterRequest, account_overview, authenticate,
        list_clients, profile, register, update_address, update_password, update_profile,
    },
    cart::{add_to_cart, cart, clear_cart, remove_from_cart, set_cart_quantity},
    dashboard::dashboard,
    error::AppError,
    feedback::{FeedbackRequest, list_feedback, submit_feedback},
    inventory::{
        ProductUpdate, audit_log, collection, list_products, product, product_detail, restock,
        set_stock, update_item,
    },
    orders::{CheckoutRequest, cancel_order, confirm_received, list_orders, mark_paid, place_order, receipt},
    reviews::{ReviewRequest, submit_review},
    session::{AdminSession, CustomerSession, MaybeSession, Session, SessionKeys},
    state::State,
};

const MAX_AUDIT_ROWS: usize = 1000;

/// JSON body whose decode failures answer as [`AppError::MalformedPayload`].
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            warn!("Rejected payload: {e}");
            AppError::MalformedPayload
        })?;

        Ok(Payload(value))
    }
}

/// Path segments whose parse failures answer as [`AppError::Validation`].
pub struct PathParam<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await.map_err(|e| {
            warn!("Rejected path: {e}");
            AppError::validation("Invalid path parameter.")
        })?;

        Ok(PathParam(value))
    }
}

/// Query string whose parse failures answer as [`AppError::Validation`].
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await.map_err(|e| {
            warn!("Rejected query: {e}");
            AppError::validation("Invalid query parameters.")
        })?;

        Ok(QueryParams(value))
    }
}

/// Runs store work off the async workers.
async fn run<T, F>(state: &Arc<State>, f: F) -> Result<T, AppError>
where
    F: FnOnce(&State) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();

    spawn_blocking(move || f(&state))
        .await
        .map_err(|e| AppError::InternalError(e.into()))?
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct CartAdd {
    inventory_id: i64,
    #[serde(default = "one")]
    quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Deserialize)]
pub struct CartQuantity {
    quantity: i64,
}

#[derive(Deserialize)]
pub struct StockUpdate {
    inventory_id: i64,
    new_stock: i64,
}

#[derive(Deserialize)]
pub struct Restock {
    inventory_id: i64,
    quantity: i64,
}

#[derive(Deserialize)]
pub struct InventoryEdit {
    inventory_id: i64,
    #[serde(flatten)]
    update: ProductUpdate,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    limit: Option<usize>,
    inventory_id: Option<i64>,
}

pub async fn test_server_handler() -> impl IntoResponse {
    (StatusCode::OK, "Server is running")
}

pub async fn test_admin_handler(AdminSession(session): AdminSession) -> impl IntoResponse {
    Json(json!({ "success": true, "client_id": session.client_id, "role": session.role }))
}

pub async fn register_handler(
    AxumState(state): AxumState<Arc<State>>,
    Payload(request): Payload<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = run(&state, move |state| state.store.with_conn(|c| register(c, &request))).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful! Please log in.",
            "client_id": account.client_id,
        })),
    ))
}

pub async fn login_handler(
    AxumState(state): AxumState<Arc<State>>,
    Payload(request): Payload<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = request.email.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::validation("Please enter email and password."));
    }

    let account = run(&state, move |state| {
        state.store.with_conn(|c| authenticate(c, &email, &password))
    })
    .await?;

    let token = state.sessions.issue(account.client_id, account.role)?;
    let cookie = state.sessions.cookie(&token)?;
    let redirect = if account.role.is_admin() { "/admin" } else { "/" };

    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "message": "Login successful!",
            "full_name": account.full_name,
            "role": account.role,
            "redirect": redirect,
        })),
    ))
}

pub async fn logout_handler() -> impl IntoResponse {
    (
        [(SET_COOKIE, SessionKeys::clear_cookie())],
        Json(json!({ "success": true, "message": "You have been logged out." })),
    )
}

pub async fn check_login_handler(
    AxumState(state): AxumState<Arc<State>>,
    MaybeSession(session): MaybeSession,
) -> Result<impl IntoResponse, AppError> {
    let Some(session) = session else {
        return Ok(Json(json!({ "logged_in": false })));
    };

    let account = run(&state, move |state| {
        state.store.with_conn(|c| profile(c, session.client_id))
    })
    .await;

    Ok(Json(match account {
        Ok(account) => json!({
            "logged_in": true,
            "full_name": account.full_name,
            "role": account.role,
        }),
        Err(AppError::NotFound(_)) => json!({ "logged_in": false }),
        Err(e) => return Err(e),
    }))
}

pub async fn user_info_handler(
    AxumState(state): AxumState<Arc<State>>,
    MaybeSession(session): MaybeSession,
) -> Result<impl IntoResponse, AppError> {
    let Some(session) = session else {
        return Ok(Json(json!({ "logged_in": false })));
    };

    let account = run(&state, move |state| {
        state.store.with_conn(|c| profile(c, session.client_id))
    })
    .await?;

    Ok(Json(json!({ "logged_in": true, "user": account })))
}

pub async fn account_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
) -> Result<impl IntoResponse, AppError> {
    let overview = run(&state, move |state| {
        state.store.with_conn(|c| account_overview(c, session.client_id))
    })
    .await?;

    Ok(Json(overview))
}

pub async fn update_profile_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    Payload(update): Payload<ProfileUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let account = run(&state, move |state| {
        state.store.with_conn(|c| update_profile(c, session.client_id, &update))
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Profile updated.", "user": account })))
}

pub async fn update_address_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    Payload(address): Payload<Address>,
) -> Result<impl IntoResponse, AppError> {
    let account = run(&state, move |state| {
        state.store.with_conn(|c| update_address(c, session.client_id, &address))
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Address updated.", "user": account })))
}

pub async fn update_password_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    Payload(change): Payload<PasswordChange>,
) -> Result<impl IntoResponse, AppError> {
    run(&state, move |state| {
        state.store.with_conn(|c| update_password(c, session.client_id, &change))
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Password updated." })))
}

pub async fn inventory_handler(
    AxumState(state): AxumState<Arc<State>>,
) -> Result<impl IntoResponse, AppError> {
    let products = run(&state, |state| state.store.with_conn(list_products)).await?;

    Ok(Json(products))
}

pub async fn inventory_item_handler(
    AxumState(state): AxumState<Arc<State>>,
    PathParam(inventory_id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let item = run(&state, move |state| {
        state.store.with_conn(|c| product(c, inventory_id))
    })
    .await?;

    Ok(Json(item))
}

pub async fn collection_handler(
    AxumState(state): AxumState<Arc<State>>,
    PathParam(category): PathParam<String>,
) -> Result<impl IntoResponse, AppError> {
    let products = run(&state, move |state| {
        state.store.with_conn(|c| collection(c, &category))
    })
    .await?;

    Ok(Json(products))
}

pub async fn product_handler(
    AxumState(state): AxumState<Arc<State>>,
    PathParam(product_code): PathParam<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = run(&state, move |state| {
        state.store.with_conn(|c| product_detail(c, &product_code))
    })
    .await?;

    Ok(Json(detail))
}

pub async fn cart_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
) -> Result<impl IntoResponse, AppError> {
    let cart = run(&state, move |state| {
        state.store.with_conn(|c| cart(c, session.client_id))
    })
    .await?;

    Ok(Json(cart))
}

pub async fn add_to_cart_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
    Payload(add): Payload<CartAdd>,
) -> Result<impl IntoResponse, AppError> {
    let cart = run(&state, move |state| {
        add_to_cart(&state.store, session.client_id, add.inventory_id, add.quantity)
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Added to cart.", "cart": cart })))
}

pub async fn update_cart_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
    PathParam(inventory_id): PathParam<i64>,
    Payload(update): Payload<CartQuantity>,
) -> Result<impl IntoResponse, AppError> {
    let cart = run(&state, move |state| {
        set_cart_quantity(&state.store, session.client_id, inventory_id, update.quantity)
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Cart updated.", "cart": cart })))
}

pub async fn remove_cart_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
    PathParam(inventory_id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let cart = run(&state, move |state| {
        remove_from_cart(&state.store, session.client_id, inventory_id)
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Removed from cart.", "cart": cart })))
}

pub async fn clear_cart_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
) -> Result<impl IntoResponse, AppError> {
    run(&state, move |state| {
        state.store.with_conn(|c| clear_cart(c, session.client_id))
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Cart cleared." })))
}

pub async fn place_order_handler(
    AxumState(state): AxumState<Arc<State>>,
    CustomerSession(session): CustomerSession,
    Payload(request): Payload<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let placed = run(&state, move |state| {
        place_order(
            &state.store,
            &state.events,
            state.config.shipping_fee,
            session.client_id,
            &request,
        )
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order placed successfully!",
            "order_id": placed.order_id,
            "order_number": placed.order_number,
            "status": placed.status,
            "subtotal": placed.subtotal,
            "shipping_fee": placed.shipping_fee,
            "total_amount": placed.total_amount,
        })),
    ))
}

pub async fn receipt_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    PathParam(order_id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let order = run(&state, move |state| {
        state.store.with_conn(|c| receipt(c, &session, order_id))
    })
    .await?;

    Ok(Json(order))
}

pub async fn order_paid_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    PathParam(order_id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let status = run(&state, move |state| {
        mark_paid(&state.store, &state.events, &session, order_id)
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Order marked as paid.", "status": status })))
}

pub async fn order_received_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    PathParam(order_id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let status = run(&state, move |state| {
        confirm_received(&state.store, &state.events, &session, order_id)
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Order marked as received.", "status": status })))
}

pub async fn order_cancel_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    PathParam(order_id): PathParam<i64>,
) -> Result<impl IntoResponse, AppError> {
    let status = run(&state, move |state| {
        cancel_order(&state.store, &state.events, &session, order_id)
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Order cancelled.", "status": status })))
}

pub async fn submit_review_handler(
    AxumState(state): AxumState<Arc<State>>,
    session: Session,
    Payload(request): Payload<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let review_id = run(&state, move |state| {
        state.store.with_conn(|c| submit_review(c, session.client_id, &request))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Thank you for your review!", "review_id": review_id })),
    ))
}

pub async fn submit_feedback_handler(
    AxumState(state): AxumState<Arc<State>>,
    Payload(request): Payload<FeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    run(&state, move |state| {
        state.store.with_conn(|c| submit_feedback(c, &request))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Thank you for your feedback!" })),
    ))
}

pub async fn admin_handler(
    AxumState(state): AxumState<Arc<State>>,
    _admin: AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let view = run(&state, |state| state.store.with_conn(dashboard)).await?;

    Ok(Json(view))
}

pub async fn update_stock_handler(
    AxumState(state): AxumState<Arc<State>>,
    AdminSession(admin): AdminSession,
    Payload(update): Payload<StockUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let event = run(&state, move |state| {
        set_stock(
            &state.store,
            &state.events,
            update.inventory_id,
            update.new_stock,
            Some(admin.client_id),
        )
    })
    .await?;
    info!(inventory_id = event.inventory_id, admin = admin.client_id, "Manual stock adjustment");

    Ok(Json(json!({
        "success": true,
        "message": "Stock updated successfully.",
        "current_stock": event.current_stock,
        "previous_stock": event.previous_stock,
    })))
}

pub async fn restock_handler(
    AxumState(state): AxumState<Arc<State>>,
    AdminSession(admin): AdminSession,
    Payload(request): Payload<Restock>,
) -> Result<impl IntoResponse, AppError> {
    let event = run(&state, move |state| {
        restock(
            &state.store,
            &state.events,
            request.inventory_id,
            request.quantity,
            Some(admin.client_id),
        )
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Item restocked.",
        "current_stock": event.current_stock,
        "previous_stock": event.previous_stock,
    })))
}

pub async fn update_inventory_handler(
    AxumState(state): AxumState<Arc<State>>,
    AdminSession(admin): AdminSession,
    Payload(edit): Payload<InventoryEdit>,
) -> Result<impl IntoResponse, AppError> {
    let item = run(&state, move |state| {
        update_item(
            &state.store,
            &state.events,
            edit.inventory_id,
            edit.update,
            Some(admin.client_id),
        )
    })
    .await?;

    Ok(Json(json!({ "success": true, "message": "Inventory updated successfully.", "item": item })))
}

pub async fn inventory_logs_handler(
    AxumState(state): AxumState<Arc<State>>,
    _admin: AdminSession,
    QueryParams(query): QueryParams<AuditQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(state.config.audit_limit)
        .clamp(1, MAX_AUDIT_ROWS);

    let entries = run(&state, move |state| {
        state
            .store
            .with_conn(|c| audit_log(c, limit, query.inventory_id))
    })
    .await?;

    Ok(Json(entries))
}

pub async fn orders_handler(
    AxumState(state): AxumState<Arc<State>>,
    _admin: AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let orders = run(&state, |state| state.store.with_conn(list_orders)).await?;

    Ok(Json(orders))
}

pub async fn clients_handler(
    AxumState(state): AxumState<Arc<State>>,
    _admin: AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let clients = run(&state, |state| state.store.with_conn(list_clients)).await?;

    Ok(Json(clients))
}

pub async fn feedback_handler(
    AxumState(state): AxumState<Arc<State>>,
    _admin: AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let feedback = run(&state, |state| state.store.with_conn(list_feedback)).await?;

    Ok(Json(feedback))
}
