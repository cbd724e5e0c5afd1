use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{ExpenseRequest, ExpenseResponse, MessageResponse};
use crate::{auth::extractors::AuthUser, error::ApiError, state::AppState};

const NOT_FOUND: &str = "Expense not found";

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses))
        .route("/expenses/create", post(create_expense))
        .route("/expenses/:id", put(update_expense).delete(delete_expense))
}

#[instrument(skip(state))]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<ExpenseResponse>>, ApiError> {
    let rows = state.expenses.list_by_user(user_id).await?;
    Ok(Json(rows.into_iter().map(ExpenseResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ExpenseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    let Json(payload) = payload?;
    let input = payload.validate()?;
    let expense = state.expenses.create(user_id, input).await?;
    info!(%user_id, expense_id = %expense.id, "expense created");
    Ok((StatusCode::CREATED, Json(expense.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<ExpenseRequest>, JsonRejection>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let Json(payload) = payload?;
    let input = payload.validate()?;
    let expense = state
        .expenses
        .update(user_id, id, input)
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    info!(%user_id, expense_id = %id, "expense updated");
    Ok(Json(expense.into()))
}

#[instrument(skip(state))]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.expenses.delete(user_id, id).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }
    info!(%user_id, expense_id = %id, "expense deleted");
    Ok(Json(MessageResponse {
        message: "Expense deleted successfully".into(),
    }))
}
