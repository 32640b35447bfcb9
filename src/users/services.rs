use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use super::dto::{UserCreateRequest, UserUpdateRequest};
use super::model::{Role, User};
use crate::auth::password::{hash_password, MIN_PASSWORD_LEN};
use crate::auth::roles;
use crate::config::AdminBootstrap;
use crate::common::auditor::Auditor;
use crate::common::entity::Record;
use crate::common::page::{Page, PageRequest};
use crate::common::repository::{Filter, Repository};
use crate::common::service::{
    Creatable, CrudService, EntityService, Readable, SoftDeletable, Updatable,
};
use crate::error::AppError;

/// Users and their roles. Deleted users stay deleted: there is no restore.
#[derive(Clone)]
pub struct UserService {
    users: EntityService<User>,
    roles: EntityService<Role>,
}

impl UserService {
    pub fn new(users: Arc<dyn Repository<User>>, roles: Arc<dyn Repository<Role>>) -> Self {
        Self {
            users: EntityService::new(users),
            roles: EntityService::new(roles),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Record<User>>, AppError> {
        let found = self
            .users
            .find_where(&Filter::new().eq("username", username))
            .await?;
        Ok(found.into_iter().next())
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Record<User>, AppError> {
        self.find_by_username(username).await?.ok_or_else(|| {
            AppError::NotFound(format!("User not found with username: {}", username))
        })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Record<User>>, AppError> {
        let found = self.users.find_where(&Filter::new().eq("email", email)).await?;
        Ok(found.into_iter().next())
    }

    pub async fn find_active_users(&self) -> Result<Vec<Record<User>>, AppError> {
        self.users.find_where(&Filter::new().eq("active", true)).await
    }

    /// `role` may be given with or without the `ROLE_` prefix.
    pub async fn find_by_role(&self, role: &str) -> Result<Vec<Record<User>>, AppError> {
        let role = roles::normalize(role);
        debug!(%role, "find users by role");
        self.users.find_where(&Filter::new().contains("roles", role)).await
    }

    #[instrument(skip(self, req, by), fields(username = %req.username, by = %by))]
    pub async fn create_user(
        &self,
        req: UserCreateRequest,
        by: &Auditor,
    ) -> Result<Record<User>, AppError> {
        if self.find_by_username(&req.username).await?.is_some() {
            warn!("username already taken");
            return Err(AppError::Conflict(format!(
                "Username already exists: {}",
                req.username
            )));
        }
        if self.find_by_email(&req.email).await?.is_some() {
            warn!(email = %req.email, "email already taken");
            return Err(AppError::Conflict(format!(
                "Email already exists: {}",
                req.email
            )));
        }

        let roles = self.resolve_roles(&req.role_names).await?;
        let user = User {
            username: req.username,
            password_hash: hash_password(&req.password)?,
            email: req.email,
            active: req.active,
            roles,
        };
        self.users.create(user, by).await
    }

    /// Applies the non-`None` fields of `req` to user `id` in one locked write.
    #[instrument(skip(self, req, by), fields(by = %by))]
    pub async fn update_user(
        &self,
        id: i64,
        req: UserUpdateRequest,
        by: &Auditor,
    ) -> Result<Record<User>, AppError> {
        let current = self.users.get(id).await?;

        let email = match req.email {
            Some(email) if email != current.data.email => {
                if self.find_by_email(&email).await?.is_some() {
                    return Err(AppError::Conflict(format!("Email already exists: {}", email)));
                }
                Some(email)
            }
            _ => None,
        };

        let password_hash = match req.password.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
                return Err(AppError::invalid(
                    "password",
                    "Password must be at least 8 characters",
                ));
            }
            Some(p) => Some(hash_password(p)?),
            None => None,
        };

        let roles = match req.role_names {
            Some(names) => Some(self.resolve_roles(&names).await?),
            None => None,
        };
        let active = req.active;

        self.users
            .modify(
                id,
                by,
                Box::new(move |user: &mut User| {
                    if let Some(email) = email {
                        user.email = email;
                    }
                    if let Some(hash) = password_hash {
                        user.password_hash = hash;
                    }
                    if let Some(active) = active {
                        user.active = active;
                    }
                    if let Some(roles) = roles {
                        user.roles = roles;
                    }
                    Ok(())
                }),
            )
            .await
    }

    /// Inserts whichever of the built-in roles is missing.
    pub async fn ensure_default_roles(&self) -> Result<(), AppError> {
        for name in [roles::ADMIN, roles::AGENT, roles::NORMAL] {
            let found = self.roles.find_where(&Filter::new().eq("name", name)).await?;
            if found.is_empty() {
                self.roles
                    .create(Role { name: name.to_string() }, &Auditor::system())
                    .await?;
            }
        }
        Ok(())
    }

    /// Creates the configured administrator unless that username exists.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> Result<(), AppError> {
        let req = UserCreateRequest {
            username: admin.username.clone(),
            password: admin.password.clone(),
            email: admin.email.clone(),
            active: true,
            role_names: vec![roles::ADMIN.to_string()],
        };
        req.validate().map_err(|e| {
            AppError::BadRequest(format!("Invalid ADMIN_* bootstrap settings: {}", e))
        })?;
        if self.find_by_username(&admin.username).await?.is_some() {
            debug!(username = %admin.username, "admin user already present");
            return Ok(());
        }
        let created = self.create_user(req, &Auditor::system()).await?;
        info!(id = created.id, username = %created.data.username, "admin user created");
        Ok(())
    }

    /// Normalizes and checks each name against the roles table, keeping
    /// first-seen order. An empty list means the default role.
    async fn resolve_roles(&self, names: &[String]) -> Result<Vec<String>, AppError> {
        let wanted: Vec<String> = if names.is_empty() {
            vec![roles::DEFAULT.to_string()]
        } else {
            names.iter().map(|n| roles::normalize(n)).collect()
        };

        let mut resolved: Vec<String> = Vec::with_capacity(wanted.len());
        for name in wanted {
            if resolved.contains(&name) {
                continue;
            }
            let found = self
                .roles
                .find_where(&Filter::new().eq("name", name.as_str()))
                .await?;
            if found.is_empty() {
                return Err(AppError::NotFound(format!("Role not found: {}", name)));
            }
            resolved.push(name);
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Creatable<User> for UserService {
    async fn create(&self, data: User, by: &Auditor) -> Result<Record<User>, AppError> {
        self.users.create(data, by).await
    }
}

#[async_trait]
impl Readable<User> for UserService {
    async fn find_by_id(&self, id: i64) -> Result<Option<Record<User>>, AppError> {
        self.users.find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<Record<User>>, AppError> {
        self.users.find_all().await
    }

    async fn find_page(&self, req: &PageRequest) -> Result<Page<Record<User>>, AppError> {
        self.users.find_page(req).await
    }
}

#[async_trait]
impl Updatable<User> for UserService {
    async fn update(&self, id: i64, data: User, by: &Auditor) -> Result<Record<User>, AppError> {
        self.users.update(id, data, by).await
    }
}

#[async_trait]
impl SoftDeletable for UserService {
    async fn delete(&self, id: i64, by: &Auditor) -> Result<(), AppError> {
        self.users.delete(id, by).await
    }
}

impl CrudService<User> for UserService {}
