use super::common::*;
use crate::domain::entities::subscription::BillingCycle;

#[derive(Deserialize)]
struct CheckoutPayload {
    cycle: BillingCycle,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscription", get(get_subscription))
        .route("/checkout", post(start_checkout))
        .route("/cancel", post(cancel_subscription))
        .route("/payments", get(list_payments))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let overview = app_state.billing_use_cases.get_subscription(user_id).await?;
    Ok(Json(overview))
}

async fn start_checkout(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let checkout = app_state
        .billing_use_cases
        .start_checkout(user_id, payload.cycle)
        .await?;
    Ok(Json(checkout))
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let subscription = app_state
        .billing_use_cases
        .cancel_subscription(user_id)
        .await?;
    Ok(Json(subscription))
}

async fn list_payments(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let payments = app_state.billing_use_cases.list_payments(user_id).await?;
    Ok(Json(payments))
}
