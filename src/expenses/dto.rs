use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{Expense, ExpenseInput};
use crate::error::ApiError;

/// `YYYY-MM-DD` (de)serialization for expense dates.
pub(crate) mod iso_date {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use time::{macros::format_description, Date};

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        let text = date
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(serde::ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let text = String::deserialize(d)?;
        parse(&text).map_err(D::Error::custom)
    }

    /// Accepts a bare date or the date part of an ISO timestamp.
    pub fn parse(text: &str) -> Result<Date, time::error::Parse> {
        let text = text.trim();
        let day = match text.split_once('T') {
            Some((day, _)) => day,
            None => text,
        };
        Date::parse(day, format_description!("[year]-[month]-[day]"))
    }
}

/// Body of create and update requests. Everything is optional so missing
/// fields become validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl ExpenseRequest {
    pub fn validate(self) -> Result<ExpenseInput, ApiError> {
        let title = self.title.as_deref().map(str::trim).unwrap_or_default();
        let category = self.category.as_deref().map(str::trim).unwrap_or_default();
        let date = self.date.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() || category.is_empty() || date.is_empty() || self.amount.is_none() {
            return Err(ApiError::validation("All fields are required"));
        }

        // The client sends numbers, older forms send numeric strings.
        let amount = match &self.amount {
            Some(serde_json::Value::Number(n)) => n.as_f64(),
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|a| a.is_finite())
        .ok_or_else(|| ApiError::validation("Amount must be a valid number"))?;
        if amount <= 0.0 {
            return Err(ApiError::validation("Amount must be greater than 0"));
        }

        let date = iso_date::parse(date).map_err(|_| ApiError::validation("Invalid date"))?;

        Ok(ExpenseInput {
            title: title.to_string(),
            amount,
            category: category.to_string(),
            date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseResponse {
    pub id: Uuid,
    pub title: String,
    pub amount: f64,
    pub category: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Expense> for ExpenseResponse {
    fn from(e: Expense) -> Self {
        Self {
            id: e.id,
            title: e.title,
            amount: e.amount,
            category: e.category,
            date: e.spent_on,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    fn req(v: serde_json::Value) -> ExpenseRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn accepts_complete_body() {
        let input = req(json!({
            "title": " Lunch ", "amount": 12.5, "category": "Food", "date": "2024-03-01"
        }))
        .validate()
        .expect("valid");
        assert_eq!(input.title, "Lunch");
        assert_eq!(input.amount, 12.5);
        assert_eq!(input.date, date!(2024 - 03 - 01));
    }

    #[test]
    fn accepts_string_amount_and_timestamp_date() {
        let input = req(json!({
            "title": "Bus", "amount": "2.40", "category": "Transport",
            "date": "2024-03-01T08:30:00.000Z"
        }))
        .validate()
        .expect("valid");
        assert_eq!(input.amount, 2.4);
        assert_eq!(input.date, date!(2024 - 03 - 01));
    }

    #[test]
    fn rejects_missing_fields() {
        let err = req(json!({ "title": "Lunch", "amount": 3 })).validate().unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");
    }

    #[test]
    fn rejects_bad_amounts() {
        for amount in [json!(0), json!(-4.5), json!("abc"), json!(true)] {
            let err = req(json!({
                "title": "x", "amount": amount, "category": "Food", "date": "2024-03-01"
            }))
            .validate()
            .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
    }

    #[test]
    fn rejects_bad_date() {
        for date in ["03/01/2024", "2024-03-01xyz", "2024-03-01 08:30"] {
            let err = req(json!({
                "title": "x", "amount": 1, "category": "Food", "date": date
            }))
            .validate()
            .unwrap_err();
            assert_eq!(err.to_string(), "Invalid date", "{date}");
        }
    }

    #[test]
    fn response_date_is_plain_day() {
        let res = ExpenseResponse {
            id: Uuid::new_v4(),
            title: "Lunch".into(),
            amount: 9.0,
            category: "Food".into(),
            date: date!(2024 - 12 - 31),
            created_at: OffsetDateTime::now_utc(),
        };
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["date"], "2024-12-31");
    }
}
