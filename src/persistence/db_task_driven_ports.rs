use crate::domain;
use crate::domain::paging::{PageRequest, PagedRecords};
use crate::domain::task::driven_ports::{TaskChanges, TaskRecord};
use crate::domain::task::{Task, TaskFilter, TaskPriority, TaskStatus, TaskWithOwner};
use crate::domain::user::User;
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, user_id, created_at, updated_at";

const TASK_WITH_OWNER_COLUMNS: &str = "t.id, t.title, t.description, t.status, t.priority, \
     t.due_date, t.user_id, t.created_at, t.updated_at, \
     u.name AS owner_name, u.email AS owner_email, u.password_hash AS owner_password_hash, \
     u.created_at AS owner_created_at, u.updated_at AS owner_updated_at";

#[derive(FromRow)]
struct TaskRow {
    id: i32,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> Result<Task, Error> {
        let status = TaskStatus::parse(&self.status)
            .ok_or_else(|| anyhow!("unrecognized task status in storage: {}", self.status))?;
        let priority = TaskPriority::parse(&self.priority)
            .ok_or_else(|| anyhow!("unrecognized task priority in storage: {}", self.priority))?;

        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            status,
            priority,
            due_date: self.due_date,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TaskWithOwnerRow {
    id: i32,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_name: String,
    owner_email: String,
    owner_password_hash: String,
    owner_created_at: DateTime<Utc>,
    owner_updated_at: DateTime<Utc>,
}

impl TaskWithOwnerRow {
    fn into_task_with_owner(self) -> Result<TaskWithOwner, Error> {
        let owner = User {
            id: self.user_id,
            name: self.owner_name,
            email: self.owner_email,
            password_hash: self.owner_password_hash,
            created_at: self.owner_created_at,
            updated_at: self.owner_updated_at,
        };
        let task_row = TaskRow {
            id: self.id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };

        Ok(TaskWithOwner {
            task: task_row.into_task()?,
            owner,
        })
    }
}

/// Appends the WHERE clause shared by the task count and task page queries
fn push_task_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    let mut prefix = " WHERE ";

    if let Some(status) = filter.status {
        query
            .push(prefix)
            .push("t.status = ")
            .push_bind(status.as_str());
        prefix = " AND ";
    }
    if let Some(priority) = filter.priority {
        query
            .push(prefix)
            .push("t.priority = ")
            .push_bind(priority.as_str());
        prefix = " AND ";
    }
    if let Some(ref search) = filter.search {
        let pattern = format!("%{search}%");
        query
            .push(prefix)
            .push("(t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct DbTaskReader;

impl domain::task::driven_ports::TaskReader for DbTaskReader {
    async fn search(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<PagedRecords<TaskWithOwner>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let mut count_query = QueryBuilder::new("SELECT count(*) FROM tasks t");
        push_task_filters(&mut count_query, filter);
        let (total,): (i64,) = count_query
            .build_query_as()
            .fetch_one(cxn.borrow_connection())
            .await
            .context("counting tasks matching a search")?;

        let mut page_query = QueryBuilder::new(format!(
            "SELECT {TASK_WITH_OWNER_COLUMNS} FROM tasks t JOIN users u ON u.id = t.user_id"
        ));
        push_task_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(i64::from(page.per_page))
            .push(" OFFSET ")
            .push_bind(page.offset());
        let items: Vec<TaskWithOwner> = page_query
            .build_query_as::<TaskWithOwnerRow>()
            .fetch_all(cxn.borrow_connection())
            .await
            .context("fetching a page of tasks")?
            .into_iter()
            .map(TaskWithOwnerRow::into_task_with_owner)
            .collect::<Result<_, _>>()?;

        Ok(PagedRecords { items, total })
    }

    async fn by_id(
        &self,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<TaskWithOwner>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let task: Option<TaskWithOwnerRow> = sqlx::query_as(&format!(
            "SELECT {TASK_WITH_OWNER_COLUMNS} FROM tasks t \
             JOIN users u ON u.id = t.user_id WHERE t.id = $1"
        ))
        .bind(task_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("fetching a task by ID")?;

        task.map(TaskWithOwnerRow::into_task_with_owner).transpose()
    }
}

pub struct DbTaskWriter;

impl domain::task::driven_ports::TaskWriter for DbTaskWriter {
    async fn insert(
        &self,
        task: TaskRecord<'_>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Task, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let inserted: TaskRow = sqlx::query_as(&format!(
            "INSERT INTO tasks (title, description, status, priority, due_date, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(task.title)
        .bind(task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(task.user_id)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("inserting a new task")?;

        inserted.into_task()
    }

    async fn update(
        &self,
        task_id: i32,
        changes: TaskChanges<'_>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Task>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let refreshed: Option<TaskRow> = sqlx::query_as(&format!(
            "UPDATE tasks \
             SET title = $1, description = $2, status = $3, priority = $4, due_date = $5, \
                 updated_at = now() \
             WHERE id = $6 \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.status.as_str())
        .bind(changes.priority.as_str())
        .bind(changes.due_date)
        .bind(task_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("updating a task")?;

        refreshed.map(TaskRow::into_task).transpose()
    }

    async fn delete(
        &self,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let delete_result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("deleting a task")?;

        Ok(delete_result.rows_affected() > 0)
    }
}
