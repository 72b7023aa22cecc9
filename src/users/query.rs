//! SQL for the `GET /user` listing and for field-mask updates.
//!
//! Pages are ordered by `(created_at, id)` so that rows sharing a timestamp
//! still have a total order, and continuation uses a row-value comparison
//! against the last row seen rather than an OFFSET. Every user-supplied value
//! is bound as a parameter.

use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::UserChanges;

pub const USER_COLUMNS: &str = "id, email, password_hash, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than `DESC` (case-insensitive) selects ascending order;
    /// a missing or blank value keeps the default.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case("desc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn comparator(self) -> &'static str {
        match self {
            SortDirection::Asc => ">",
            SortDirection::Desc => "<",
        }
    }
}

/// Position of the last row of the previous page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyset {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Email prefixes, ORed together. Empty means no email restriction.
    pub emails: Vec<String>,
    pub limit: i64,
    pub after: Option<Keyset>,
    pub direction: SortDirection,
}

/// Non-positive limits fall back to `default`; larger ones are capped at `max`.
pub fn effective_limit(requested: i64, default: i64, max: i64) -> i64 {
    if requested <= 0 {
        default
    } else {
        requested.min(max)
    }
}

/// Escapes LIKE metacharacters so `value` only ever matches as a literal prefix.
pub fn prefix_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 1);
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

struct Conditions {
    any: bool,
}

impl Conditions {
    fn new() -> Self {
        Self { any: false }
    }

    fn next(&mut self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(if self.any { " AND " } else { " WHERE " });
        self.any = true;
    }
}

fn push_email_filter(
    qb: &mut QueryBuilder<'static, Postgres>,
    conditions: &mut Conditions,
    emails: &[String],
) {
    if emails.is_empty() {
        return;
    }
    conditions.next(qb);
    qb.push("(");
    let mut alternatives = qb.separated(" OR ");
    for email in emails {
        alternatives
            .push("email LIKE ")
            .push_bind_unseparated(prefix_pattern(email));
    }
    qb.push(")");
}

/// `SELECT ... ORDER BY created_at, id LIMIT n` with the keyset and email predicates.
pub fn page_query(filter: &ListFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
    let mut conditions = Conditions::new();

    if let Some(keyset) = filter.after {
        conditions.next(&mut qb);
        qb.push("(created_at, id) ")
            .push(filter.direction.comparator())
            .push(" (")
            .push_bind(keyset.created_at)
            .push(", ")
            .push_bind(keyset.id)
            .push(")");
    }

    push_email_filter(&mut qb, &mut conditions, &filter.emails);

    let dir = filter.direction.keyword();
    qb.push(format!(" ORDER BY created_at {dir}, id {dir} LIMIT "))
        .push_bind(filter.limit);
    qb
}

/// Rows matching the email filter, ignoring the keyset window and the limit.
pub fn count_query(filter: &ListFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users");
    let mut conditions = Conditions::new();
    push_email_filter(&mut qb, &mut conditions, &filter.emails);
    qb
}

/// `UPDATE users SET <present fields> WHERE id = $n`, or `None` when the
/// mask is empty.
pub fn update_query(id: Uuid, changes: &UserChanges) -> Option<QueryBuilder<'static, Postgres>> {
    if changes.is_empty() {
        return None;
    }

    let mut qb = QueryBuilder::new("UPDATE users SET ");
    let mut set = qb.separated(", ");
    if let Some(email) = &changes.email {
        set.push("email = ").push_bind_unseparated(email.clone());
    }
    if let Some(hash) = &changes.password_hash {
        set.push("password_hash = ").push_bind_unseparated(hash.clone());
    }
    if let Some(ts) = changes.created_at {
        set.push("created_at = ").push_bind_unseparated(ts);
    }
    if let Some(ts) = changes.updated_at {
        set.push("updated_at = ").push_bind_unseparated(ts);
    }
    if let Some(ts) = changes.deleted_at {
        set.push("deleted_at = ").push_bind_unseparated(ts);
    }
    qb.push(" WHERE id = ").push_bind(id);
    Some(qb)
}
