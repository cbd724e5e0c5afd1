use std::collections::HashMap;

use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{Expense, ExpenseInput};

/// Expense storage. Every call is scoped to `user_id`; rows owned by anyone
/// else are invisible.
#[async_trait]
pub trait ExpenseRepo: Send + Sync {
    /// Newest date first, most recently created first within a day.
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Expense>>;
    async fn create(&self, user_id: Uuid, input: ExpenseInput) -> anyhow::Result<Expense>;
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: ExpenseInput,
    ) -> anyhow::Result<Option<Expense>>;
    /// Returns whether a row was removed.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgExpenseRepo {
    db: PgPool,
}

impl PgExpenseRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseRepo for PgExpenseRepo {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, user_id, title, amount, category, spent_on, created_at
            FROM expenses
            WHERE user_id = $1
            ORDER BY spent_on DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list expenses")?;
        Ok(rows)
    }

    async fn create(&self, user_id: Uuid, input: ExpenseInput) -> anyhow::Result<Expense> {
        let row = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (id, user_id, title, amount, category, spent_on)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, title, amount, category, spent_on, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.title)
        .bind(input.amount)
        .bind(&input.category)
        .bind(input.date)
        .fetch_one(&self.db)
        .await
        .context("insert expense")?;
        Ok(row)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: ExpenseInput,
    ) -> anyhow::Result<Option<Expense>> {
        let row = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
               SET title = $3, amount = $4, category = $5, spent_on = $6
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, amount, category, spent_on, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.title)
        .bind(input.amount)
        .bind(&input.category)
        .bind(input.date)
        .fetch_optional(&self.db)
        .await
        .context("update expense")?;
        Ok(row)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete expense")?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(Default)]
pub struct MemoryExpenseRepo {
    rows: RwLock<HashMap<Uuid, Expense>>,
}

#[async_trait]
impl ExpenseRepo for MemoryExpenseRepo {
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Expense>> {
        let rows = self.rows.read().await;
        let mut out: Vec<Expense> = rows
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.spent_on
                .cmp(&a.spent_on)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }

    async fn create(&self, user_id: Uuid, input: ExpenseInput) -> anyhow::Result<Expense> {
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id,
            title: input.title,
            amount: input.amount,
            category: input.category,
            spent_on: input.date,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.write().await.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: ExpenseInput,
    ) -> anyhow::Result<Option<Expense>> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id).filter(|e| e.user_id == user_id) else {
            return Ok(None);
        };
        row.title = input.title;
        row.amount = input.amount;
        row.category = input.category;
        row.spent_on = input.date;
        Ok(Some(row.clone()))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().await;
        let owned = rows.get(&id).is_some_and(|e| e.user_id == user_id);
        if owned {
            rows.remove(&id);
        }
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn input(title: &str, day: time::Date) -> ExpenseInput {
        ExpenseInput {
            title: title.into(),
            amount: 10.0,
            category: "Food".into(),
            date: day,
        }
    }

    #[tokio::test]
    async fn list_is_scoped_and_sorted() {
        let repo = MemoryExpenseRepo::default();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        repo.create(ann, input("old", date!(2024 - 01 - 01))).await.unwrap();
        repo.create(ann, input("new", date!(2024 - 02 - 01))).await.unwrap();
        repo.create(bob, input("bob's", date!(2024 - 03 - 01))).await.unwrap();

        let titles: Vec<String> = repo
            .list_by_user(ann)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn foreign_rows_cannot_be_changed() {
        let repo = MemoryExpenseRepo::default();
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let e = repo.create(ann, input("lunch", date!(2024 - 01 - 01))).await.unwrap();

        let updated = repo
            .update(bob, e.id, input("hijack", date!(2024 - 01 - 02)))
            .await
            .unwrap();
        assert!(updated.is_none());
        assert!(!repo.delete(bob, e.id).await.unwrap());

        let still = repo.list_by_user(ann).await.unwrap();
        assert_eq!(still.len(), 1);
        assert_eq!(still[0].title, "lunch");
    }

    #[tokio::test]
    async fn owner_can_update_and_delete() {
        let repo = MemoryExpenseRepo::default();
        let ann = Uuid::new_v4();
        let e = repo.create(ann, input("lunch", date!(2024 - 01 - 01))).await.unwrap();

        let updated = repo
            .update(ann, e.id, input("dinner", date!(2024 - 01 - 02)))
            .await
            .unwrap()
            .expect("owner update");
        assert_eq!(updated.title, "dinner");
        assert_eq!(updated.created_at, e.created_at);

        assert!(repo.delete(ann, e.id).await.unwrap());
        assert!(!repo.delete(ann, e.id).await.unwrap());
    }
}
