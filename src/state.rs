use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use crate::accounts::{model::Account, AccountService};
use crate::appointments::{model::Appointment, AppointmentService};
use crate::categories::{model::Category, CategoryService};
use crate::clients::{model::Client, ClientService};
use crate::config::AppConfig;
use crate::common::entity::Entity;
use crate::common::repository::{PgRepository, Repository};
use crate::common::service::EntityService;
use crate::properties::{model::Property, PropertyImageService, PropertyService};
use crate::storage::{LocalStorage, StorageProvider, StorageService};
use crate::users::{
    model::{Role, User},
    UserService,
};

/// Where the services get their repositories from.
pub trait RepositorySource {
    fn repo<T: Entity>(&self) -> Arc<dyn Repository<T>>;
}

impl RepositorySource for PgPool {
    fn repo<T: Entity>(&self) -> Arc<dyn Repository<T>> {
        Arc::new(PgRepository::<T>::new(self.clone()))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<UserService>,
    pub accounts: Arc<AccountService>,
    pub categories: Arc<CategoryService>,
    pub properties: Arc<PropertyService>,
    pub property_images: Arc<PropertyImageService>,
    pub clients: Arc<ClientService>,
    pub appointments: Arc<AppointmentService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage: Arc<dyn StorageService> = match config.storage.provider {
            StorageProvider::Local => Arc::new(
                LocalStorage::init(
                    &config.storage.local_base_path,
                    &config.storage.local_base_url,
                )
                .await?,
            ),
            other => anyhow::bail!(
                "storage provider {:?} is not available; set STORAGE_PROVIDER=local",
                other
            ),
        };

        let repos = db.clone();
        Ok(Self::from_parts(db, config, storage, &repos))
    }

    /// Wires every service over repositories taken once each from `repos`,
    /// so services that share an entity share its repository.
    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageService>,
        repos: &impl RepositorySource,
    ) -> Self {
        let user_repo = repos.repo::<User>();
        let accounts = EntityService::new(repos.repo::<Account>());
        let categories = EntityService::new(repos.repo::<Category>());
        let properties = EntityService::new(repos.repo::<Property>());
        let clients = EntityService::new(repos.repo::<Client>());

        let appointment_service = AppointmentService::new(
            EntityService::new(repos.repo::<Appointment>()),
            EntityService::new(user_repo.clone()),
            clients.clone(),
            properties.clone(),
        );
        let property_service =
            PropertyService::new(properties.clone(), accounts.clone(), categories.clone());
        info!(provider = ?storage.provider(), "storage ready");
        let image_service = PropertyImageService::new(properties, storage);
        let client_service = ClientService::new(clients, accounts.clone());
        let user_service = UserService::new(user_repo, repos.repo::<Role>());

        Self {
            db,
            config,
            users: Arc::new(user_service),
            accounts: Arc::new(accounts),
            categories: Arc::new(categories),
            properties: Arc::new(property_service),
            property_images: Arc::new(image_service),
            clients: Arc::new(client_service),
            appointments: Arc::new(appointment_service),
        }
    }
}

#[cfg(test)]
mod memory {
    use super::*;
    use crate::common::repository::MemoryRepository;
    use crate::storage::MemoryStorage;

    struct MemoryRepositories;

    impl RepositorySource for MemoryRepositories {
        fn repo<T: Entity>(&self) -> Arc<dyn Repository<T>> {
            Arc::new(MemoryRepository::<T>::new())
        }
    }

    impl AppState {
        /// Full state over in-memory repositories and storage, with the
        /// built-in roles present. The pool is lazy and never connects.
        pub async fn in_memory(storage: Arc<MemoryStorage>) -> Self {
            let config = Arc::new(AppConfig::for_tests());
            let db = sqlx::postgres::PgPoolOptions::new()
                .connect_lazy(&config.database_url)
                .expect("lazy pool");
            let state = Self::from_parts(db, config, storage, &MemoryRepositories);
            state
                .users
                .ensure_default_roles()
                .await
                .expect("seed roles");
            state
        }
    }
}
