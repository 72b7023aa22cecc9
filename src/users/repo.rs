use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::query::{count_query, page_query, update_query, ListFilter, USER_COLUMNS};
use super::repo_types::{NewUser, User, UserChanges, UserPage};

/// Persistence seam for users. Every method is a single store round-trip
/// and any error is terminal for the calling request.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self, filter: &ListFilter) -> anyhow::Result<UserPage>;
    /// `Ok(false)` when no row has `id`.
    async fn update(&self, id: Uuid, changes: &UserChanges) -> anyhow::Result<bool>;
    /// Hard delete. `Ok(false)` when no row has `id`.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, password_hash, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.deleted_at)
            .fetch_one(&self.db)
            .await
            .context("insert user")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn list(&self, filter: &ListFilter) -> anyhow::Result<UserPage> {
        let (total,) = count_query(filter)
            .build_query_as::<(i64,)>()
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        let users = page_query(filter)
            .build_query_as::<User>()
            .fetch_all(&self.db)
            .await
            .context("list users")?;

        Ok(UserPage::from_rows(users, total))
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> anyhow::Result<bool> {
        let Some(mut qb) = update_query(id, changes) else {
            return Ok(self.find_by_id(id).await?.is_some());
        };
        let result = qb
            .build()
            .execute(&self.db)
            .await
            .context("update user")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration, OffsetDateTime};

    use super::*;
    use crate::users::memory::MemoryUserStore;
    use crate::users::query::{Keyset, SortDirection};

    const BASE: OffsetDateTime = datetime!(2025-06-11 08:00 UTC);

    fn new_user(second: i64, email: &str) -> NewUser {
        let at = BASE + Duration::seconds(second);
        NewUser {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "unused".into(),
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    /// 14 numbered users, one sharing a timestamp with user 7, and one whose
    /// email only matches `test_user_1` if `_` were a wildcard.
    fn fixture() -> Vec<NewUser> {
        let mut users: Vec<NewUser> = (1..=14)
            .map(|i| new_user(i, &format!("test_user_{i}@user.com")))
            .collect();
        users.push(new_user(7, "twin@user.com"));
        users.push(new_user(3, "testxuser_1@user.com"));
        users
    }

    async fn walk(
        store: &dyn UserStore,
        emails: &[&str],
        direction: SortDirection,
    ) -> (Vec<Uuid>, i64) {
        let mut filter = ListFilter {
            emails: emails.iter().map(|e| e.to_string()).collect(),
            limit: 4,
            after: None,
            direction,
        };
        let mut seen = Vec::new();
        loop {
            let page = store.list(&filter).await.unwrap();
            if page.users.is_empty() {
                return (seen, page.total);
            }
            assert!(page.users.len() <= 4);
            seen.extend(page.users.iter().map(|u| u.id));
            filter.after = Some(Keyset {
                created_at: page.last_timestamp.unwrap(),
                id: page.cursor.unwrap(),
            });
        }
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres server in DATABASE_URL"]
    async fn postgres_paging_matches_memory_store(pool: PgPool) {
        let pg = PgUserStore::new(pool);
        let memory = MemoryUserStore::new();
        for user in fixture() {
            pg.create(user.clone()).await.unwrap();
            memory.create(user).await.unwrap();
        }

        for direction in [SortDirection::Desc, SortDirection::Asc] {
            for emails in [&[][..], &["test_user_1"][..], &["twin@", "test_user_2@"][..]] {
                let (pg_ids, pg_total) = walk(&pg, emails, direction).await;
                let (memory_ids, memory_total) = walk(&memory, emails, direction).await;
                assert_eq!(pg_ids, memory_ids, "{direction:?} {emails:?}");
                assert_eq!(pg_total, memory_total, "{direction:?} {emails:?}");
            }
        }

        let (all, total) = walk(&pg, &[], SortDirection::Desc).await;
        assert_eq!(all.len(), 16);
        assert_eq!(total, 16);
        let (_, prefixed) = walk(&pg, &["test_user_1"], SortDirection::Asc).await;
        assert_eq!(prefixed, 6);
    }

    #[sqlx::test]
    #[ignore = "needs a Postgres server in DATABASE_URL"]
    async fn postgres_update_and_delete_report_missing_rows(pool: PgPool) {
        let pg = PgUserStore::new(pool);
        let user = pg.create(new_user(1, "a@x.com")).await.unwrap();

        let changes = UserChanges {
            email: Some("b@x.com".into()),
            deleted_at: Some(Some(BASE)),
            ..Default::default()
        };
        assert!(pg.update(user.id, &changes).await.unwrap());
        let stored = pg.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "b@x.com");
        assert_eq!(stored.deleted_at, Some(BASE));
        assert_eq!(stored.created_at, user.created_at);

        assert!(!pg.update(Uuid::new_v4(), &changes).await.unwrap());
        assert!(pg.create(new_user(2, "b@x.com")).await.is_err());
        assert!(pg.delete(user.id).await.unwrap());
        assert!(!pg.delete(user.id).await.unwrap());
    }
}
