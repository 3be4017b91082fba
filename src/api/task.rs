use crate::domain::task::driving_ports::{
    CreateTaskError, DeleteTaskError, TaskPort, UpdateTaskError,
};
use crate::dto::Paginated;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    ApiErrorResponse, ApiResponse, GenericErrorResponse, Json, NotFoundErrorResponse,
    ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{delete, get, post, put};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use validator::Validate;

/// OpenAPI definitions for the task endpoints
#[derive(OpenApi)]
#[openapi(paths(list_tasks, get_task, create_task, update_task, delete_task))]
pub(super) struct TasksApi;

/// Builds a router for all the task routes
pub fn task_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/",
            get(
                |State(app_state): AppState, Query(params): Query<dto::TaskListParams>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};
                    let task_reader = persistence::db_task_driven_ports::DbTaskReader {};

                    list_tasks(params, &mut ext_cxn, &task_service, &task_reader).await
                },
            ),
        )
        .route(
            "/",
            post(
                |State(app_state): AppState, Json(new_task): Json<dto::NewTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};
                    let user_detect = persistence::db_user_driven_ports::DbDetectUser {};
                    let user_writer = persistence::db_user_driven_ports::DbWriteUsers {};
                    let task_writer = persistence::db_task_driven_ports::DbTaskWriter {};

                    create_task(
                        new_task,
                        &mut ext_cxn,
                        &task_service,
                        &user_detect,
                        &user_writer,
                        &task_writer,
                    )
                    .await
                },
            ),
        )
        .route(
            "/:task_id",
            get(
                |State(app_state): AppState, Path(task_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};
                    let task_reader = persistence::db_task_driven_ports::DbTaskReader {};

                    get_task(task_id, &mut ext_cxn, &task_service, &task_reader).await
                },
            ),
        )
        .route(
            "/:task_id",
            put(
                |State(app_state): AppState,
                 Path(task_id): Path<i32>,
                 Json(update): Json<dto::UpdateTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};
                    let task_writer = persistence::db_task_driven_ports::DbTaskWriter {};

                    update_task(task_id, update, &mut ext_cxn, &task_service, &task_writer).await
                },
            ),
        )
        .route(
            "/:task_id",
            delete(
                |State(app_state): AppState, Path(task_id): Path<i32>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let task_service = domain::task::TaskService {};
                    let task_writer = persistence::db_task_driven_ports::DbTaskWriter {};

                    delete_task(task_id, &mut ext_cxn, &task_service, &task_writer).await
                },
            ),
        )
}

/// Retrieves a page of tasks, filterable by status and priority and
/// searchable by title or description. Each task embeds its owning user.
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    params(dto::TaskListParams),
    responses(
        (status = 200, description = "Page of tasks retrieved"),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn list_tasks(
    params: dto::TaskListParams,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_read: &impl domain::task::driven_ports::TaskReader,
) -> Result<Json<ApiResponse<Paginated<dto::Task>>>, ErrorResponse> {
    info!("Requested a page of tasks");
    let page_req = params.page_request();
    let tasks_page = task_service
        .list_tasks(&params.filter(), &page_req, &mut *ext_cxn, task_read)
        .await
        .map_err(|list_err| {
            error!("Could not retrieve tasks: {list_err}");
            GenericErrorResponse::new("retrieving tasks", list_err)
        })?;

    Ok(Json(ApiResponse::success(
        "Tasks retrieved successfully",
        tasks_page.into(),
    )))
}

/// Retrieves a single task along with its owning user.
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = "tasks",
    params(("task_id" = i32, Path, description = "ID of the task to fetch")),
    responses(
        (status = 200, description = "Task retrieved", body = dto::Task),
        (status = 404, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn get_task(
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_read: &impl domain::task::driven_ports::TaskReader,
) -> Result<Json<ApiResponse<dto::Task>>, ErrorResponse> {
    info!("Requested task {task_id}");
    let fetch_result = task_service
        .task_by_id(task_id, &mut *ext_cxn, task_read)
        .await
        .map_err(|fetch_err| {
            error!("Could not retrieve task {task_id}: {fetch_err}");
            GenericErrorResponse::new("retrieving task", fetch_err)
        })?;

    let Some(task_with_owner) = fetch_result else {
        return Err(NotFoundErrorResponse("Task not found".to_owned()).into());
    };

    Ok(Json(ApiResponse::success(
        "Task retrieved successfully",
        task_with_owner.into(),
    )))
}

/// Creates a task. The owner is either an existing user or a brand new one
/// registered as part of the request, depending on `user_assignment_type`.
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    request_body = dto::NewTask,
    responses(
        (status = 201, description = "Task created", body = dto::Task),
        (status = 422, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn create_task(
    new_task: dto::NewTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    user_detect: &impl domain::user::driven_ports::DetectUser,
    user_write: &impl domain::user::driven_ports::UserWriter,
    task_write: &impl domain::task::driven_ports::TaskWriter,
) -> Result<(StatusCode, Json<ApiResponse<dto::Task>>), ErrorResponse> {
    info!("Attempt to create a task");
    new_task.validate().map_err(ValidationErrorResponse::from)?;

    let domain_create = domain::task::NewTask::from(new_task);
    let created_task = task_service
        .create_task(
            &domain_create,
            &mut *ext_cxn,
            user_detect,
            user_write,
            task_write,
        )
        .await
        .map_err(|create_err| match create_err {
            CreateTaskError::Invalid(problems) => {
                ErrorResponse::from(ValidationErrorResponse::from(problems))
            }
            CreateTaskError::PortError(cause) => {
                error!("Task create failure: {cause}");
                GenericErrorResponse::new("creating task", cause).into()
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Task created successfully",
            created_task.into(),
        )),
    ))
}

/// Replaces a task's editable fields. The owner cannot be changed here.
#[utoipa::path(
    put,
    path = "/tasks/{task_id}",
    tag = "tasks",
    params(("task_id" = i32, Path, description = "ID of the task to update")),
    request_body = dto::UpdateTask,
    responses(
        (status = 200, description = "Task updated", body = dto::Task),
        (status = 404, response = ApiErrorResponse),
        (status = 422, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn update_task(
    task_id: i32,
    update: dto::UpdateTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_write: &impl domain::task::driven_ports::TaskWriter,
) -> Result<Json<ApiResponse<dto::Task>>, ErrorResponse> {
    info!("Updating task {task_id}");
    update.validate().map_err(ValidationErrorResponse::from)?;

    let domain_update = domain::task::UpdateTask::from(update);
    let refreshed_task = task_service
        .update_task(task_id, &domain_update, &mut *ext_cxn, task_write)
        .await
        .map_err(|update_err| match update_err {
            UpdateTaskError::NotFound(_) => {
                ErrorResponse::from(NotFoundErrorResponse("Task not found".to_owned()))
            }
            UpdateTaskError::PortError(cause) => {
                error!("Task update failure: {cause}");
                GenericErrorResponse::new("updating task", cause).into()
            }
        })?;

    Ok(Json(ApiResponse::success(
        "Task updated successfully",
        refreshed_task.into(),
    )))
}

/// Deletes a task unconditionally.
#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = "tasks",
    params(("task_id" = i32, Path, description = "ID of the task to delete")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 404, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn delete_task(
    task_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
    task_write: &impl domain::task::driven_ports::TaskWriter,
) -> Result<Json<ApiResponse<()>>, ErrorResponse> {
    info!("Deleting task {task_id}");
    let delete_result = task_service
        .delete_task(task_id, &mut *ext_cxn, task_write)
        .await;

    match delete_result {
        Ok(()) => Ok(Json(ApiResponse::message_only("Task deleted successfully"))),
        Err(DeleteTaskError::NotFound(_)) => {
            Err(NotFoundErrorResponse("Task not found".to_owned()).into())
        }
        Err(DeleteTaskError::PortError(cause)) => {
            error!("Task delete failure: {cause}");
            Err(GenericErrorResponse::new("deleting task", cause).into())
        }
    }
}
