use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub spent_on: Date,
    pub created_at: OffsetDateTime,
}

/// Validated fields for create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseInput {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: Date,
}
