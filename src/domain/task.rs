use crate::domain::paging::{Page, PageRequest};
use crate::domain::task::driven_ports::{TaskReader, TaskWriter};
use crate::domain::task::driving_ports::{CreateTaskError, DeleteTaskError, UpdateTaskError};
use crate::domain::user::driving_ports::UserPort;
use crate::domain::{FieldErrors, user};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use tracing::error;

/// Where a task sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// The storage/API representation of this status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<TaskStatus> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How urgent a task is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// The storage/API representation of this priority
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<TaskPriority> {
        match value {
            "low" => Some(TaskPriority::Low),
            "medium" => Some(TaskPriority::Medium),
            "high" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of work assigned to a user
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task joined with the user who owns it, as listings expose it
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub struct TaskWithOwner {
    pub task: Task,
    pub owner: user::User,
}

/// Who a brand new task should belong to. Choosing [New][UserAssignment::New]
/// registers the owner on the fly with a placeholder password.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(Clone))]
pub enum UserAssignment {
    Existing { user_id: i32 },
    New { name: String, email: String },
}

/// Data required to create a task
#[cfg_attr(test, derive(Clone, Debug))]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub assignment: UserAssignment,
}

/// Full-replace update of a task's fields. The owner is deliberately not
/// part of this set, so a task cannot be reassigned after creation.
#[cfg_attr(test, derive(Clone, Debug))]
pub struct UpdateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Criteria narrowing a task listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
}

const DUE_DATE_PAST_MESSAGE: &str = "The due date cannot be in the past.";
const OWNER_MISSING_MESSAGE: &str = "The selected user does not exist.";
const NEW_OWNER_NAME_REQUIRED_MESSAGE: &str = "The user name is required.";
const NEW_OWNER_NAME_TOO_LONG_MESSAGE: &str =
    "The user name may not be greater than 255 characters.";
const NEW_OWNER_EMAIL_INVALID_MESSAGE: &str = "Please enter a valid email address.";
const NEW_OWNER_EMAIL_TOO_LONG_MESSAGE: &str =
    "The user email may not be greater than 255 characters.";
const NEW_OWNER_EMAIL_TAKEN_MESSAGE: &str = "A user with this email already exists.";

pub mod driven_ports {
    use super::*;
    use crate::domain::paging::PagedRecords;
    use crate::external_connections::ExternalConnectivity;

    /// Storage shape of a brand new task row
    pub struct TaskRecord<'strings> {
        pub title: &'strings str,
        pub description: Option<&'strings str>,
        pub status: TaskStatus,
        pub priority: TaskPriority,
        pub due_date: Option<DateTime<Utc>>,
        pub user_id: i32,
    }

    /// Replacement values for an existing task row. The owning user is not
    /// replaceable.
    pub struct TaskChanges<'strings> {
        pub title: &'strings str,
        pub description: Option<&'strings str>,
        pub status: TaskStatus,
        pub priority: TaskPriority,
        pub due_date: Option<DateTime<Utc>>,
    }

    pub trait TaskReader: Sync {
        /// Fetches a page of tasks matching [filter], newest first, each
        /// joined with its owning user
        async fn search(
            &self,
            filter: &TaskFilter,
            page: &PageRequest,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<PagedRecords<TaskWithOwner>, anyhow::Error>;

        async fn by_id(
            &self,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<TaskWithOwner>, anyhow::Error>;
    }

    pub trait TaskWriter: Sync {
        async fn insert(
            &self,
            task: TaskRecord<'_>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Task, anyhow::Error>;

        /// Applies [changes] to the task with the given ID, returning the
        /// refreshed row or None if no such task exists
        async fn update(
            &self,
            task_id: i32,
            changes: TaskChanges<'_>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Task>, anyhow::Error>;

        /// Removes a task row, reporting whether anything was deleted
        async fn delete(
            &self,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use crate::external_connections::ExternalConnectivity;

    #[derive(Debug, Error)]
    pub enum CreateTaskError {
        #[error("invalid task data")]
        Invalid(FieldErrors),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[derive(Debug, Error)]
    pub enum UpdateTaskError {
        #[error("task with ID {0} does not exist")]
        NotFound(i32),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[derive(Debug, Error)]
    pub enum DeleteTaskError {
        #[error("task with ID {0} does not exist")]
        NotFound(i32),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }


    pub trait TaskPort {
        async fn list_tasks(
            &self,
            filter: &TaskFilter,
            page: &PageRequest,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
        ) -> Result<Page<TaskWithOwner>, anyhow::Error>;

        async fn task_by_id(
            &self,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl driven_ports::TaskReader,
        ) -> Result<Option<TaskWithOwner>, anyhow::Error>;

        async fn create_task(
            &self,
            new_task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl user::driven_ports::DetectUser,
            u_write: &impl user::driven_ports::UserWriter,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<Task, CreateTaskError>;

        async fn update_task(
            &self,
            task_id: i32,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<Task, UpdateTaskError>;

        async fn delete_task(
            &self,
            task_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl driven_ports::TaskWriter,
        ) -> Result<(), DeleteTaskError>;
    }
}

pub struct TaskService {}

impl driving_ports::TaskPort for TaskService {
    async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: &PageRequest,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Page<TaskWithOwner>, anyhow::Error> {
        let search_result = task_read.search(filter, page, &mut *ext_cxn).await;
        if let Err(ref port_err) = search_result {
            error!("Task search failure: {port_err}");
        }

        let records = search_result.context("Failed searching tasks")?;
        Ok(Page::assemble(records, page))
    }

    async fn task_by_id(
        &self,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Option<TaskWithOwner>, anyhow::Error> {
        let task_result = task_read
            .by_id(task_id, &mut *ext_cxn)
            .await
            .context("Fetching a task by ID")?;

        Ok(task_result)
    }

    async fn create_task(
        &self,
        new_task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl user::driven_ports::DetectUser,
        u_write: &impl user::driven_ports::UserWriter,
        task_write: &impl TaskWriter,
    ) -> Result<Task, CreateTaskError> {
        let mut problems = FieldErrors::new();

        if let Some(due_date) = new_task.due_date {
            if due_date.date_naive() < Utc::now().date_naive() {
                problems.add("due_date", DUE_DATE_PAST_MESSAGE);
            }
        }

        match new_task.assignment {
            UserAssignment::Existing { user_id } => {
                let owner_exists = u_detect
                    .user_exists(user_id, &mut *ext_cxn)
                    .await
                    .context("Checking the assigned user during task creation")?;
                if !owner_exists {
                    problems.add("user_id", OWNER_MISSING_MESSAGE);
                }
            }
            UserAssignment::New {
                ref name,
                ref email,
            } => {
                if name.trim().is_empty() {
                    problems.add("new_user_name", NEW_OWNER_NAME_REQUIRED_MESSAGE);
                } else if name.chars().count() > 255 {
                    problems.add("new_user_name", NEW_OWNER_NAME_TOO_LONG_MESSAGE);
                }

                if !validator::validate_email(email.as_str()) {
                    problems.add("new_user_email", NEW_OWNER_EMAIL_INVALID_MESSAGE);
                } else if email.chars().count() > 255 {
                    problems.add("new_user_email", NEW_OWNER_EMAIL_TOO_LONG_MESSAGE);
                } else {
                    let email_taken = u_detect
                        .email_in_use(email, None, &mut *ext_cxn)
                        .await
                        .context("Checking the new owner's email during task creation")?;
                    if email_taken {
                        problems.add("new_user_email", NEW_OWNER_EMAIL_TAKEN_MESSAGE);
                    }
                }
            }
        }

        if !problems.is_empty() {
            return Err(CreateTaskError::Invalid(problems));
        }

        let owner_id = match new_task.assignment {
            UserAssignment::Existing { user_id } => user_id,
            UserAssignment::New {
                ref name,
                ref email,
            } => {
                let owner_create = user::CreateUser {
                    name: name.clone(),
                    email: email.clone(),
                    password: None,
                };
                let created_owner = user::UserService {}
                    .create_user(&owner_create, &mut *ext_cxn, u_write, u_detect)
                    .await
                    .map_err(|create_err| match create_err {
                        // email uniqueness raced between the pre-check and the insert
                        user::driving_ports::CreateUserError::Invalid(_) => {
                            let mut raced = FieldErrors::new();
                            raced.add("new_user_email", NEW_OWNER_EMAIL_TAKEN_MESSAGE);
                            CreateTaskError::Invalid(raced)
                        }
                        user::driving_ports::CreateUserError::PortError(port_err) => {
                            CreateTaskError::from(
                                port_err.context("Creating a task's new owner"),
                            )
                        }
                    })?;
                created_owner.id
            }
        };

        let created_task = task_write
            .insert(
                driven_ports::TaskRecord {
                    title: &new_task.title,
                    description: new_task.description.as_deref(),
                    status: new_task.status,
                    priority: new_task.priority,
                    due_date: new_task.due_date,
                    user_id: owner_id,
                },
                &mut *ext_cxn,
            )
            .await
            .context("Trying to create task at service level")?;

        Ok(created_task)
    }

    async fn update_task(
        &self,
        task_id: i32,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<Task, UpdateTaskError> {
        let refreshed_task = task_write
            .update(
                task_id,
                driven_ports::TaskChanges {
                    title: &update.title,
                    description: update.description.as_deref(),
                    status: update.status,
                    priority: update.priority,
                    due_date: update.due_date,
                },
                &mut *ext_cxn,
            )
            .await
            .context("Trying to update task at service level")?;

        refreshed_task.ok_or(UpdateTaskError::NotFound(task_id))
    }

    async fn delete_task(
        &self,
        task_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<(), DeleteTaskError> {
        let removed = task_write
            .delete(task_id, &mut *ext_cxn)
            .await
            .context("Trying to delete task at service level")?;

        if removed {
            Ok(())
        } else {
            Err(DeleteTaskError::NotFound(task_id))
        }
    }
}
