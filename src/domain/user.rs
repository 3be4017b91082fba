use crate::domain::paging::{Page, PageRequest};
use crate::domain::user::driving_ports::{CreateUserError, DeleteUserError, UpdateUserError};
use crate::domain::{FieldErrors, password};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::error;

/// A registered user who can own tasks
#[derive(PartialEq, Eq, Debug)]
#[cfg_attr(test, derive(Clone))]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to register a user. When [password] is absent a fixed
/// placeholder is hashed in its place.
#[cfg_attr(test, derive(Clone))]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

/// Full-replace update of a user's fields. An absent [password] means the
/// stored hash is left untouched.
#[cfg_attr(test, derive(Clone))]
pub struct UpdateUser {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

/// Criteria narrowing a user listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub search: Option<String>,
}

const EMAIL_TAKEN_MESSAGE: &str = "The email has already been taken.";

pub mod driven_ports {
    use super::*;
    use crate::domain::paging::PagedRecords;
    use crate::external_connections::ExternalConnectivity;

    /// Storage shape of a brand new user row
    pub struct UserRecord<'strings> {
        pub name: &'strings str,
        pub email: &'strings str,
        pub password_hash: &'strings str,
    }

    /// Replacement values for an existing user row. A [password_hash] of None
    /// keeps the stored hash.
    pub struct UserChanges<'strings> {
        pub name: &'strings str,
        pub email: &'strings str,
        pub password_hash: Option<&'strings str>,
    }

    pub trait UserReader: Sync {
        /// Fetches a page of users matching [filter], sorted by name
        async fn search(
            &self,
            filter: &UserFilter,
            page: &PageRequest,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<PagedRecords<User>, anyhow::Error>;

        async fn by_id(
            &self,
            id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<User>, anyhow::Error>;
    }

    pub trait UserWriter: Sync {
        async fn insert(
            &self,
            user: UserRecord<'_>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<User, anyhow::Error>;

        /// Applies [changes] to the user with the given ID, returning the
        /// refreshed row or None if no such user exists
        async fn update(
            &self,
            id: i32,
            changes: UserChanges<'_>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<User>, anyhow::Error>;

        /// Removes a user row, reporting whether anything was deleted
        async fn delete(
            &self,
            id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }

    pub trait DetectUser: Sync {
        async fn user_exists(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;

        /// Checks whether [email] is already registered, case-insensitively.
        /// [excluded_user] allows an update to keep its own email.
        async fn email_in_use(
            &self,
            email: &str,
            excluded_user: Option<i32>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }

    /// Visibility into the tasks a user owns, without depending on the task
    /// module. Backs the "no deleting users who still own tasks" guard.
    pub trait DetectOwnedTasks: Sync {
        async fn owned_task_count(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<i64, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use crate::domain::paging::PageRequest;
    use crate::external_connections::ExternalConnectivity;

    #[derive(Debug, Error)]
    pub enum CreateUserError {
        #[error("invalid user data")]
        Invalid(FieldErrors),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[derive(Debug, Error)]
    pub enum UpdateUserError {
        #[error("invalid user data")]
        Invalid(FieldErrors),
        #[error("user with ID {0} does not exist")]
        NotFound(i32),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[derive(Debug, Error)]
    pub enum DeleteUserError {
        #[error("user with ID {0} does not exist")]
        NotFound(i32),
        #[error("Cannot delete user. User has {task_count} associated tasks.")]
        HasTasks { task_count: i64 },
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }


    pub trait UserPort {
        async fn list_users(
            &self,
            filter: &UserFilter,
            page: &PageRequest,
            ext_cxn: &mut impl ExternalConnectivity,
            u_read: &impl driven_ports::UserReader,
        ) -> Result<Page<User>, anyhow::Error>;

        async fn user_with_task_count(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            u_read: &impl driven_ports::UserReader,
            owned_tasks: &impl driven_ports::DetectOwnedTasks,
        ) -> Result<Option<(User, i64)>, anyhow::Error>;

        async fn create_user(
            &self,
            new_user: &CreateUser,
            ext_cxn: &mut impl ExternalConnectivity,
            u_write: &impl driven_ports::UserWriter,
            u_detect: &impl driven_ports::DetectUser,
        ) -> Result<User, CreateUserError>;

        async fn update_user(
            &self,
            user_id: i32,
            update: &UpdateUser,
            ext_cxn: &mut impl ExternalConnectivity,
            u_write: &impl driven_ports::UserWriter,
            u_detect: &impl driven_ports::DetectUser,
        ) -> Result<User, UpdateUserError>;

        async fn delete_user(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            u_write: &impl driven_ports::UserWriter,
            u_detect: &impl driven_ports::DetectUser,
            owned_tasks: &impl driven_ports::DetectOwnedTasks,
        ) -> Result<(), DeleteUserError>;
    }
}

pub struct UserService {}

#[derive(Debug, Error)]
pub(super) enum UserExistsErr {
    #[error("user with ID {0} does not exist")]
    UserDoesNotExist(i32),

    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

pub(super) async fn verify_user_exists(
    id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    user_detect: &impl driven_ports::DetectUser,
) -> Result<(), UserExistsErr> {
    let does_user_exist = user_detect.user_exists(id, &mut *ext_cxn).await?;

    if does_user_exist {
        Ok(())
    } else {
        Err(UserExistsErr::UserDoesNotExist(id))
    }
}

impl driving_ports::UserPort for UserService {
    async fn list_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
        ext_cxn: &mut impl ExternalConnectivity,
        u_read: &impl driven_ports::UserReader,
    ) -> Result<Page<User>, anyhow::Error> {
        let search_result = u_read.search(filter, page, &mut *ext_cxn).await;
        if let Err(ref port_err) = search_result {
            error!("User search failure: {port_err}");
        }

        let records = search_result.context("Failed searching users")?;
        Ok(Page::assemble(records, page))
    }

    async fn user_with_task_count(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        u_read: &impl driven_ports::UserReader,
        owned_tasks: &impl driven_ports::DetectOwnedTasks,
    ) -> Result<Option<(User, i64)>, anyhow::Error> {
        let Some(user) = u_read
            .by_id(user_id, &mut *ext_cxn)
            .await
            .context("Fetching a user by ID")?
        else {
            return Ok(None);
        };

        let task_count = owned_tasks
            .owned_task_count(user_id, &mut *ext_cxn)
            .await
            .context("Counting tasks for a fetched user")?;

        Ok(Some((user, task_count)))
    }

    async fn create_user(
        &self,
        new_user: &CreateUser,
        ext_cxn: &mut impl ExternalConnectivity,
        u_write: &impl driven_ports::UserWriter,
        u_detect: &impl driven_ports::DetectUser,
    ) -> Result<User, CreateUserError> {
        let email_taken = u_detect
            .email_in_use(&new_user.email, None, &mut *ext_cxn)
            .await
            .context("Checking email uniqueness during user creation")?;
        if email_taken {
            let mut problems = FieldErrors::new();
            problems.add("email", EMAIL_TAKEN_MESSAGE);
            return Err(CreateUserError::Invalid(problems));
        }

        let raw_password = new_user
            .password
            .as_deref()
            .unwrap_or(password::PLACEHOLDER_PASSWORD);
        let password_hash =
            password::hash_password(raw_password).context("Hashing a new user's password")?;

        let created_user = u_write
            .insert(
                driven_ports::UserRecord {
                    name: &new_user.name,
                    email: &new_user.email,
                    password_hash: &password_hash,
                },
                &mut *ext_cxn,
            )
            .await
            .context("Trying to create user at service level")?;

        Ok(created_user)
    }

    async fn update_user(
        &self,
        user_id: i32,
        update: &UpdateUser,
        ext_cxn: &mut impl ExternalConnectivity,
        u_write: &impl driven_ports::UserWriter,
        u_detect: &impl driven_ports::DetectUser,
    ) -> Result<User, UpdateUserError> {
        verify_user_exists(user_id, &mut *ext_cxn, u_detect)
            .await
            .map_err(|exists_err| match exists_err {
                UserExistsErr::UserDoesNotExist(missing_id) => {
                    UpdateUserError::NotFound(missing_id)
                }
                UserExistsErr::PortError(port_err) => {
                    UpdateUserError::from(port_err.context("Looking up a user before update"))
                }
            })?;

        let email_taken = u_detect
            .email_in_use(&update.email, Some(user_id), &mut *ext_cxn)
            .await
            .context("Checking email uniqueness during user update")?;
        if email_taken {
            let mut problems = FieldErrors::new();
            problems.add("email", EMAIL_TAKEN_MESSAGE);
            return Err(UpdateUserError::Invalid(problems));
        }

        let new_hash = match update.password.as_deref() {
            Some(plaintext) => Some(
                password::hash_password(plaintext)
                    .context("Rehashing an updated user password")?,
            ),
            None => None,
        };

        let refreshed_user = u_write
            .update(
                user_id,
                driven_ports::UserChanges {
                    name: &update.name,
                    email: &update.email,
                    password_hash: new_hash.as_deref(),
                },
                &mut *ext_cxn,
            )
            .await
            .context("Trying to update user at service level")?;

        refreshed_user.ok_or(UpdateUserError::NotFound(user_id))
    }

    async fn delete_user(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        u_write: &impl driven_ports::UserWriter,
        u_detect: &impl driven_ports::DetectUser,
        owned_tasks: &impl driven_ports::DetectOwnedTasks,
    ) -> Result<(), DeleteUserError> {
        verify_user_exists(user_id, &mut *ext_cxn, u_detect)
            .await
            .map_err(|exists_err| match exists_err {
                UserExistsErr::UserDoesNotExist(missing_id) => {
                    DeleteUserError::NotFound(missing_id)
                }
                UserExistsErr::PortError(port_err) => {
                    DeleteUserError::from(port_err.context("Looking up a user before deletion"))
                }
            })?;

        let task_count = owned_tasks
            .owned_task_count(user_id, &mut *ext_cxn)
            .await
            .context("Counting a user's tasks before deletion")?;
        if task_count > 0 {
            return Err(DeleteUserError::HasTasks { task_count });
        }

        u_write
            .delete(user_id, &mut *ext_cxn)
            .await
            .context("Trying to delete user at service level")?;

        Ok(())
    }
}
