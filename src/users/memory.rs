use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::query::{Keyset, ListFilter, SortDirection};
use super::repo::UserStore;
use super::repo_types::{NewUser, User, UserChanges, UserPage};

/// `UserStore` over a `Vec`, reproducing the ordering, keyset and prefix
/// semantics of the SQL built in `query.rs`.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts directly, skipping validation and hashing.
    pub fn seed(&self, user: User) {
        self.rows.lock().unwrap().push(user);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

/// Row-value comparison `(created_at, id) < / > (ts, id)`.
fn after_keyset(keyset: &Keyset, user: &User, direction: SortDirection) -> bool {
    let row = (user.created_at, user.id);
    let mark = (keyset.created_at, keyset.id);
    match direction {
        SortDirection::Asc => row > mark,
        SortDirection::Desc => row < mark,
    }
}

fn matches_emails(filter: &ListFilter, email: &str) -> bool {
    filter.emails.is_empty() || filter.emails.iter().any(|p| email.starts_with(p.as_str()))
}

fn apply_changes(changes: &UserChanges, user: &mut User) {
    if let Some(email) = &changes.email {
        user.email = email.clone();
    }
    if let Some(hash) = &changes.password_hash {
        user.password_hash = hash.clone();
    }
    if let Some(ts) = changes.created_at {
        user.created_at = ts;
    }
    if let Some(ts) = changes.updated_at {
        user.updated_at = ts;
    }
    if let Some(ts) = changes.deleted_at {
        user.deleted_at = ts;
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.id == user.id) {
            anyhow::bail!("duplicate key value violates unique constraint \"users_pkey\"");
        }
        if rows.iter().any(|u| u.email == user.email) {
            anyhow::bail!("duplicate key value violates unique constraint \"users_email_key\"");
        }
        let user = User {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            created_at: user.created_at,
            updated_at: user.updated_at,
            deleted_at: user.deleted_at,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, filter: &ListFilter) -> anyhow::Result<UserPage> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<User> = rows
            .iter()
            .filter(|u| matches_emails(filter, &u.email))
            .cloned()
            .collect();
        let total = matching.len() as i64;

        matching.sort_by_key(|u| (u.created_at, u.id));
        if filter.direction == SortDirection::Desc {
            matching.reverse();
        }

        let page: Vec<User> = matching
            .into_iter()
            .filter(|u| match &filter.after {
                Some(keyset) => after_keyset(keyset, u, filter.direction),
                None => true,
            })
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok(UserPage::from_rows(page, total))
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = &changes.email {
            if rows.iter().any(|u| u.id != id && &u.email == email) {
                anyhow::bail!("duplicate key value violates unique constraint \"users_email_key\"");
            }
        }
        match rows.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                apply_changes(changes, user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        Ok(rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn user(id: u128) -> User {
        let ts = datetime!(2025-01-01 00:00 UTC);
        User {
            id: Uuid::from_u128(id),
            email: format!("user{id}@x.com"),
            password_hash: "hash".into(),
            created_at: ts,
            updated_at: ts,
            deleted_at: None,
        }
    }

    #[test]
    fn equal_timestamps_fall_back_to_id() {
        let low = user(1);
        let high = user(2);
        let mark = Keyset {
            created_at: high.created_at,
            id: high.id,
        };
        assert!(after_keyset(&mark, &low, SortDirection::Desc));
        assert!(!after_keyset(&mark, &low, SortDirection::Asc));
        assert!(!after_keyset(&mark, &high, SortDirection::Desc));
        assert!(!after_keyset(&mark, &high, SortDirection::Asc));
    }

    #[test]
    fn changes_merge_only_present_fields() {
        let mut u = user(1);
        u.deleted_at = Some(datetime!(2025-02-01 00:00 UTC));
        let before = u.clone();

        let changes = UserChanges {
            email: Some("b@x.com".into()),
            deleted_at: Some(None),
            ..Default::default()
        };
        apply_changes(&changes, &mut u);

        assert_eq!(u.email, "b@x.com");
        assert_eq!(u.deleted_at, None);
        assert_eq!(u.password_hash, before.password_hash);
        assert_eq!(u.created_at, before.created_at);
    }

    #[tokio::test]
    async fn emails_stay_unique() {
        let store = MemoryUserStore::new();
        store.seed(user(1));
        store.seed(user(2));
        let err = store
            .update(
                Uuid::from_u128(2),
                &UserChanges {
                    email: Some("user1@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("users_email_key"));
        assert_eq!(store.len(), 2);
    }
}
