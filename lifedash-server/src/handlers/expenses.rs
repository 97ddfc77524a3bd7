//! Expense handlers and spending summaries.

use super::{nullable, parse_date, parse_optional_date, required, today};
use crate::auth::Subject;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Duration, NaiveDate, Utc};
use lifedash_core::database::Expense;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateExpenseRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub payment_method: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct ExpenseSummary {
    pub total: f64,
    pub period: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub category_breakdown: Vec<CategoryTotal>,
    pub daily_expenses: Vec<DailyTotal>,
}

/// Days covered by a summary period. Anything unrecognised means a month.
fn period_days(period: &str) -> (&'static str, i64) {
    match period {
        "week" => ("week", 7),
        "year" => ("year", 365),
        _ => ("month", 30),
    }
}

fn check_amount(amount: f64) -> Result<f64, ApiError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(ApiError::BadRequest("Amount must be positive".to_string()))
    }
}

fn load_expense(conn: &Connection, user_id: i64, expense_id: i64) -> Result<Expense, ApiError> {
    conn.query_row(
        &format!(
            "SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2",
            Expense::COLUMNS
        ),
        params![expense_id, user_id],
        Expense::from_row,
    )
    .optional()?
    .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(filter): Query<ExpenseFilter>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let user_id = subject.user_id()?;
    let start = parse_optional_date(filter.start_date.as_deref(), "start_date")?;
    let end = parse_optional_date(filter.end_date.as_deref(), "end_date")?;

    let mut sql = format!("SELECT {} FROM expenses WHERE user_id = ?", Expense::COLUMNS);
    let mut args = vec![SqlValue::Integer(user_id)];
    if let Some(category) = filter.category.filter(|c| !c.is_empty()) {
        sql.push_str(" AND category = ?");
        args.push(SqlValue::Text(category));
    }
    if let Some(start) = start {
        sql.push_str(" AND date >= ?");
        args.push(SqlValue::Text(start.to_string()));
    }
    if let Some(end) = end {
        sql.push_str(" AND date <= ?");
        args.push(SqlValue::Text(end.to_string()));
    }
    sql.push_str(" ORDER BY date DESC, id DESC");

    let conn = state.storage.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let expenses = stmt
        .query_map(params_from_iter(args), Expense::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(expenses))
}

pub async fn create_expense(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = subject.user_id()?;
    let amount = req
        .amount
        .ok_or_else(|| ApiError::BadRequest("Amount and category are required".to_string()))?;
    let amount = check_amount(amount)?;
    let category = required(req.category, "Amount and category are required")?;
    let date = parse_optional_date(req.date.as_deref(), "date")?.unwrap_or_else(today);
    let now = Utc::now();

    let conn = state.storage.conn()?;
    conn.execute(
        "INSERT INTO expenses (user_id, amount, category, description, date, payment_method,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            user_id,
            amount,
            category,
            req.description,
            date,
            req.payment_method,
            now
        ],
    )?;
    let expense = load_expense(&conn, user_id, conn.last_insert_rowid())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Expense created successfully", "expense": expense })),
    ))
}

pub async fn update_expense(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(expense_id): Path<i64>,
    Json(req): Json<UpdateExpenseRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let mut expense = load_expense(&conn, user_id, expense_id)?;

    if let Some(amount) = req.amount {
        expense.amount = check_amount(amount)?;
    }
    if let Some(category) = req.category {
        expense.category = required(Some(category), "Category cannot be empty")?;
    }
    if let Some(description) = req.description {
        expense.description = description;
    }
    if let Some(date) = req.date {
        expense.date = parse_date(&date, "date")?;
    }
    if let Some(payment_method) = req.payment_method {
        expense.payment_method = payment_method;
    }

    conn.execute(
        "UPDATE expenses SET amount = ?1, category = ?2, description = ?3, date = ?4,
                             payment_method = ?5, updated_at = ?6
         WHERE id = ?7 AND user_id = ?8",
        params![
            expense.amount,
            expense.category,
            expense.description,
            expense.date,
            expense.payment_method,
            Utc::now(),
            expense_id,
            user_id
        ],
    )?;
    let expense = load_expense(&conn, user_id, expense_id)?;

    Ok(Json(
        json!({ "message": "Expense updated successfully", "expense": expense }),
    ))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Path(expense_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let deleted = conn.execute(
        "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
        params![expense_id, user_id],
    )?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Expense not found".to_string()));
    }

    Ok(Json(json!({ "message": "Expense deleted successfully" })))
}

pub async fn expense_summary(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ExpenseSummary>, ApiError> {
    let user_id = subject.user_id()?;
    let (period, days) = period_days(query.period.as_deref().unwrap_or("month"));
    let end_date = today();
    let start_date = end_date - Duration::days(days);

    let conn = state.storage.conn()?;
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM expenses WHERE user_id = ?1 AND date >= ?2",
        params![user_id, start_date],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT category, SUM(amount) FROM expenses
         WHERE user_id = ?1 AND date >= ?2
         GROUP BY category ORDER BY SUM(amount) DESC",
    )?;
    let category_breakdown = stmt
        .query_map(params![user_id, start_date], |row| {
            Ok(CategoryTotal {
                category: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT date, SUM(amount) FROM expenses
         WHERE user_id = ?1 AND date >= ?2
         GROUP BY date ORDER BY date",
    )?;
    let daily_expenses = stmt
        .query_map(params![user_id, start_date], |row| {
            Ok(DailyTotal {
                date: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ExpenseSummary {
        total,
        period: period.to_string(),
        start_date,
        end_date,
        category_breakdown,
        daily_expenses,
    }))
}

pub async fn expense_categories(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
) -> Result<Json<Vec<String>>, ApiError> {
    let user_id = subject.user_id()?;
    let conn = state.storage.conn()?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT category FROM expenses WHERE user_id = ?1 ORDER BY category",
    )?;
    let categories = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(Json(categories))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_days() {
        assert_eq!(period_days("week"), ("week", 7));
        assert_eq!(period_days("year"), ("year", 365));
        assert_eq!(period_days("month"), ("month", 30));
        assert_eq!(period_days("decade"), ("month", 30));
    }

    #[test]
    fn test_check_amount() {
        assert!(check_amount(12.5).is_ok());
        assert!(check_amount(0.0).is_err());
        assert!(check_amount(-3.0).is_err());
        assert!(check_amount(f64::NAN).is_err());
    }
}
