use crate::domain;
use crate::domain::paging::PageRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Default page size on the task listing surface
pub(crate) const DEFAULT_TASK_PAGE_SIZE: u32 = 12;

/// Task lifecycle states accepted and returned by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl From<TaskStatus> for domain::task::TaskStatus {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Pending => domain::task::TaskStatus::Pending,
            TaskStatus::InProgress => domain::task::TaskStatus::InProgress,
            TaskStatus::Completed => domain::task::TaskStatus::Completed,
        }
    }
}

impl From<domain::task::TaskStatus> for TaskStatus {
    fn from(value: domain::task::TaskStatus) -> Self {
        match value {
            domain::task::TaskStatus::Pending => TaskStatus::Pending,
            domain::task::TaskStatus::InProgress => TaskStatus::InProgress,
            domain::task::TaskStatus::Completed => TaskStatus::Completed,
        }
    }
}

/// Task urgency levels accepted and returned by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl From<TaskPriority> for domain::task::TaskPriority {
    fn from(value: TaskPriority) -> Self {
        match value {
            TaskPriority::Low => domain::task::TaskPriority::Low,
            TaskPriority::Medium => domain::task::TaskPriority::Medium,
            TaskPriority::High => domain::task::TaskPriority::High,
        }
    }
}

impl From<domain::task::TaskPriority> for TaskPriority {
    fn from(value: domain::task::TaskPriority) -> Self {
        match value {
            domain::task::TaskPriority::Low => TaskPriority::Low,
            domain::task::TaskPriority::Medium => TaskPriority::Medium,
            domain::task::TaskPriority::High => TaskPriority::High,
        }
    }
}

/// DTO for a task returned by the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Debug))]
pub struct Task {
    #[schema(example = 10)]
    pub id: i32,
    #[schema(example = "Write the quarterly report")]
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    #[schema(example = 4)]
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The owning user; present when the surface eagerly joins owners
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<super::user::User>,
}

impl From<domain::task::Task> for Task {
    fn from(value: domain::task::Task) -> Self {
        Task {
            id: value.id,
            title: value.title,
            description: value.description,
            status: value.status.into(),
            priority: value.priority.into(),
            due_date: value.due_date,
            user_id: value.user_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
            user: None,
        }
    }
}

impl From<domain::task::TaskWithOwner> for Task {
    fn from(value: domain::task::TaskWithOwner) -> Self {
        Task {
            user: Some(value.owner.into()),
            ..Task::from(value.task)
        }
    }
}

/// Selects the owner of a task being created, discriminated by
/// `user_assignment_type`. Choosing `new` registers the owner alongside the
/// task.
#[derive(Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize, PartialEq, Debug))]
#[serde(tag = "user_assignment_type", rename_all = "snake_case")]
pub enum UserAssignment {
    Existing {
        user_id: i32,
    },
    New {
        new_user_name: String,
        new_user_email: String,
    },
}

impl From<UserAssignment> for domain::task::UserAssignment {
    fn from(value: UserAssignment) -> Self {
        match value {
            UserAssignment::Existing { user_id } => {
                domain::task::UserAssignment::Existing { user_id }
            }
            UserAssignment::New {
                new_user_name,
                new_user_email,
            } => domain::task::UserAssignment::New {
                name: new_user_name.trim().to_owned(),
                email: new_user_email.trim().to_owned(),
            },
        }
    }
}

/// DTO for creating a new task via the API
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewTask {
    #[schema(example = "Write the quarterly report")]
    #[validate(
        custom(function = "crate::dto::non_blank", message = "The task title is required."),
        length(max = 255, message = "The task title cannot exceed 255 characters.")
    )]
    pub title: String,
    #[serde(default, deserialize_with = "crate::dto::empty_string_as_none")]
    #[validate(length(max = 1000, message = "The description cannot exceed 1000 characters."))]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Must not be earlier than today
    pub due_date: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub assignment: UserAssignment,
}

impl From<NewTask> for domain::task::NewTask {
    fn from(value: NewTask) -> Self {
        domain::task::NewTask {
            title: value.title.trim().to_owned(),
            description: value.description,
            status: value.status.into(),
            priority: value.priority.into(),
            due_date: value.due_date,
            assignment: value.assignment.into(),
        }
    }
}

/// DTO for replacing a task's fields via the API. Assignment fields are
/// absent here, so the owner stays fixed after creation.
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateTask {
    #[validate(
        custom(function = "crate::dto::non_blank", message = "The task title is required."),
        length(max = 255, message = "The task title cannot exceed 255 characters.")
    )]
    pub title: String,
    #[serde(default, deserialize_with = "crate::dto::empty_string_as_none")]
    #[validate(length(max = 1000, message = "The description cannot exceed 1000 characters."))]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

impl From<UpdateTask> for domain::task::UpdateTask {
    fn from(value: UpdateTask) -> Self {
        domain::task::UpdateTask {
            title: value.title.trim().to_owned(),
            description: value.description,
            status: value.status.into(),
            priority: value.priority.into(),
            due_date: value.due_date,
        }
    }
}

/// Query parameters accepted by the task listing endpoint
#[derive(Deserialize, IntoParams)]
#[cfg_attr(test, derive(Serialize))]
#[into_params(parameter_in = Query)]
pub struct TaskListParams {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Case-insensitive fragment matched against titles and descriptions
    #[serde(default, deserialize_with = "crate::dto::empty_string_as_none")]
    pub search: Option<String>,
    /// 1-based page number
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl TaskListParams {
    pub fn filter(&self) -> domain::task::TaskFilter {
        domain::task::TaskFilter {
            status: self.status.map(Into::into),
            priority: self.priority.map(Into::into),
            search: self.search.clone(),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_params(self.page, self.per_page, DEFAULT_TASK_PAGE_SIZE)
    }
}
