use crate::domain;
use crate::domain::paging::{PageRequest, PagedRecords};
use crate::domain::user::driven_ports::{UserChanges, UserRecord};
use crate::domain::user::{User, UserFilter};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(value: UserRow) -> Self {
        User {
            id: value.id,
            name: value.name,
            email: value.email,
            password_hash: value.password_hash,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Appends the WHERE clause shared by the user count and user page queries
fn push_user_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    if let Some(ref search) = filter.search {
        let pattern = format!("%{search}%");
        query
            .push(" WHERE (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct DbReadUsers;

impl domain::user::driven_ports::UserReader for DbReadUsers {
    async fn search(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<PagedRecords<User>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let mut count_query = QueryBuilder::new("SELECT count(*) FROM users");
        push_user_filters(&mut count_query, filter);
        let (total,): (i64,) = count_query
            .build_query_as()
            .fetch_one(cxn.borrow_connection())
            .await
            .context("counting users matching a search")?;

        let mut page_query =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_user_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY name ASC, id ASC LIMIT ")
            .push_bind(i64::from(page.per_page))
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items: Vec<User> = page_query
            .build_query_as::<UserRow>()
            .fetch_all(cxn.borrow_connection())
            .await
            .context("fetching a page of users")?
            .into_iter()
            .map(User::from)
            .collect();

        Ok(PagedRecords { items, total })
    }

    async fn by_id(
        &self,
        id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<User>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let user: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("fetching a user by ID")?;

        Ok(user.map(User::from))
    }
}

pub struct DbWriteUsers;

impl domain::user::driven_ports::UserWriter for DbWriteUsers {
    async fn insert(
        &self,
        user: UserRecord<'_>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<User, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let inserted: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("inserting a new user")?;

        Ok(User::from(inserted))
    }

    async fn update(
        &self,
        id: i32,
        changes: UserChanges<'_>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<User>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let refreshed: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users \
             SET name = $1, email = $2, password_hash = COALESCE($3, password_hash), updated_at = now() \
             WHERE id = $4 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("updating a user")?;

        Ok(refreshed.map(User::from))
    }

    async fn delete(
        &self,
        id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let delete_result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(cxn.borrow_connection())
            .await
            .context("deleting a user")?;

        Ok(delete_result.rows_affected() > 0)
    }
}

pub struct DbDetectUser;

impl domain::user::driven_ports::DetectUser for DbDetectUser {
    async fn user_exists(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let (user_count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(cxn.borrow_connection())
                .await
                .context("detecting a user by ID")?;

        Ok(user_count > 0)
    }

    async fn email_in_use(
        &self,
        email: &str,
        excluded_user: Option<i32>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let (email_count,): (i64,) = match excluded_user {
            Some(excluded_id) => {
                sqlx::query_as(
                    "SELECT count(*) FROM users WHERE lower(email) = lower($1) AND id <> $2",
                )
                .bind(email)
                .bind(excluded_id)
                .fetch_one(cxn.borrow_connection())
                .await
            }
            None => {
                sqlx::query_as("SELECT count(*) FROM users WHERE lower(email) = lower($1)")
                    .bind(email)
                    .fetch_one(cxn.borrow_connection())
                    .await
            }
        }
        .context("detecting a user via email")?;

        Ok(email_count > 0)
    }
}

/// Counts the tasks owned by a user, backing the user-deletion guard
pub struct DbDetectOwnedTasks;

impl domain::user::driven_ports::DetectOwnedTasks for DbDetectOwnedTasks {
    async fn owned_task_count(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<i64, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let (task_count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM tasks WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(cxn.borrow_connection())
                .await
                .context("counting tasks owned by a user")?;

        Ok(task_count)
    }
}
