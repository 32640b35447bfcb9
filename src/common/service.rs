use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::common::auditor::Auditor;
use crate::common::entity::{Entity, Record};
use crate::common::page::{Page, PageRequest};
use crate::common::repository::{Filter, Modified, Mutation, Repository};
use crate::error::AppError;

#[async_trait]
pub trait Creatable<T: Entity>: Send + Sync {
    async fn create(&self, data: T, by: &Auditor) -> Result<Record<T>, AppError>;
}

#[async_trait]
pub trait Readable<T: Entity>: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Record<T>>, AppError>;

    async fn find_all(&self) -> Result<Vec<Record<T>>, AppError>;

    async fn find_page(&self, req: &PageRequest) -> Result<Page<Record<T>>, AppError>;

    async fn get(&self, id: i64) -> Result<Record<T>, AppError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(T::NAME, id))
    }
}

#[async_trait]
pub trait Updatable<T: Entity>: Send + Sync {
    async fn update(&self, id: i64, data: T, by: &Auditor) -> Result<Record<T>, AppError>;
}

#[async_trait]
pub trait SoftDeletable: Send + Sync {
    async fn delete(&self, id: i64, by: &Auditor) -> Result<(), AppError>;
}

#[async_trait]
pub trait Restorable: Send + Sync {
    async fn restore(&self, id: i64, by: &Auditor) -> Result<(), AppError>;
}

/// What the generic routes need. Restore support is declared here rather
/// than discovered: a service that can restore returns itself.
pub trait CrudService<T: Entity>: Creatable<T> + Readable<T> + Updatable<T> + SoftDeletable {
    fn as_restorable(&self) -> Option<&dyn Restorable> {
        None
    }
}

/// Generic service over one repository; supports every capability.
pub struct EntityService<T: Entity> {
    repo: Arc<dyn Repository<T>>,
}

impl<T: Entity> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<T: Entity> EntityService<T> {
    pub fn new(repo: Arc<dyn Repository<T>>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn Repository<T>> {
        &self.repo
    }

    pub async fn find_where(&self, filter: &Filter) -> Result<Vec<Record<T>>, AppError> {
        self.repo.find_where(filter).await
    }

    pub async fn find_all_including_deleted(&self) -> Result<Vec<Record<T>>, AppError> {
        self.repo.find_all(true).await
    }

    pub async fn modify(
        &self,
        id: i64,
        by: &Auditor,
        mutation: Mutation<T>,
    ) -> Result<Record<T>, AppError> {
        Ok(self.modify_tracked(id, by, mutation).await?.record)
    }

    /// Like [`modify`](Self::modify), also handing back the row as it was
    /// before the mutation.
    pub async fn modify_tracked(
        &self,
        id: i64,
        by: &Auditor,
        mutation: Mutation<T>,
    ) -> Result<Modified<T>, AppError> {
        let modified = self
            .repo
            .modify(id, by.name(), mutation)
            .await?
            .ok_or_else(|| AppError::not_found(T::NAME, id))?;
        info!(entity = T::NAME, id, by = %by, "entity modified");
        Ok(modified)
    }

    async fn ensure_exists(&self, id: i64) -> Result<(), AppError> {
        if self.repo.exists_any(id).await? {
            Ok(())
        } else {
            Err(AppError::not_found(T::NAME, id))
        }
    }
}

#[async_trait]
impl<T: Entity> Creatable<T> for EntityService<T> {
    async fn create(&self, data: T, by: &Auditor) -> Result<Record<T>, AppError> {
        let record = self.repo.insert(data, by.name()).await?;
        info!(entity = T::NAME, id = record.id, by = %by, "entity created");
        Ok(record)
    }
}

#[async_trait]
impl<T: Entity> Readable<T> for EntityService<T> {
    async fn find_by_id(&self, id: i64) -> Result<Option<Record<T>>, AppError> {
        debug!(entity = T::NAME, id, "find by id");
        self.repo.find_active(id).await
    }

    async fn find_all(&self) -> Result<Vec<Record<T>>, AppError> {
        self.repo.find_all(false).await
    }

    async fn find_page(&self, req: &PageRequest) -> Result<Page<Record<T>>, AppError> {
        debug!(entity = T::NAME, page = req.page, size = req.size, "find page");
        self.repo.find_page(req).await
    }
}

#[async_trait]
impl<T: Entity> Updatable<T> for EntityService<T> {
    async fn update(&self, id: i64, data: T, by: &Auditor) -> Result<Record<T>, AppError> {
        let record = self
            .repo
            .update(id, data, by.name())
            .await?
            .ok_or_else(|| AppError::not_found(T::NAME, id))?;
        info!(entity = T::NAME, id, by = %by, "entity updated");
        Ok(record)
    }
}

#[async_trait]
impl<T: Entity> SoftDeletable for EntityService<T> {
    async fn delete(&self, id: i64, by: &Auditor) -> Result<(), AppError> {
        self.ensure_exists(id).await?;
        self.repo.soft_delete(id, by.name()).await?;
        warn!(entity = T::NAME, id, by = %by, "entity soft-deleted");
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> Restorable for EntityService<T> {
    async fn restore(&self, id: i64, by: &Auditor) -> Result<(), AppError> {
        self.ensure_exists(id).await?;
        self.repo.restore(id, by.name()).await?;
        info!(entity = T::NAME, id, by = %by, "entity restored");
        Ok(())
    }
}

impl<T: Entity> CrudService<T> for EntityService<T> {
    fn as_restorable(&self) -> Option<&dyn Restorable> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::model::Category;
    use crate::common::repository::MemoryRepository;

    fn service() -> (EntityService<Category>, Arc<MemoryRepository<Category>>) {
        let repo = Arc::new(MemoryRepository::<Category>::new());
        (EntityService::<Category>::new(repo.clone()), repo)
    }

    fn category(name: &str) -> Category {
        Category {
            name: name.to_string(),
            description: Some("desc".into()),
        }
    }

    fn alice() -> Auditor {
        Auditor::resolve(Some("alice"))
    }

    #[tokio::test]
    async fn delete_hides_row_but_keeps_it_and_restore_brings_it_back() {
        let (svc, repo) = service();
        let created = svc.create(category("Villas"), &Auditor::system()).await.unwrap();

        svc.delete(created.id, &alice()).await.unwrap();
        assert!(svc.find_by_id(created.id).await.unwrap().is_none());
        let stored = repo.find_any(created.id).await.unwrap().unwrap();
        assert!(stored.deleted);

        svc.restore(created.id, &alice()).await.unwrap();
        let restored = svc.get(created.id).await.unwrap();
        assert_eq!(restored.data, created.data);
        assert_eq!(restored.audit.created_by, "system");
        assert_eq!(restored.audit.created_at, created.audit.created_at);
        assert_eq!(restored.audit.updated_by, "alice");
    }

    #[tokio::test]
    async fn update_keeps_creation_metadata() {
        let (svc, _) = service();
        let created = svc.create(category("Flats"), &Auditor::system()).await.unwrap();
        let updated = svc
            .update(created.id, category("Apartments"), &alice())
            .await
            .unwrap();
        assert_eq!(updated.data.name, "Apartments");
        assert_eq!(updated.audit.created_by, "system");
        assert_eq!(updated.audit.created_at, created.audit.created_at);
        assert_eq!(updated.audit.updated_by, "alice");
    }

    #[tokio::test]
    async fn modify_tracked_hands_back_the_previous_row() {
        let (svc, _) = service();
        let created = svc.create(category("Farms"), &Auditor::system()).await.unwrap();
        let modified = svc
            .modify_tracked(
                created.id,
                &alice(),
                Box::new(|c: &mut Category| {
                    c.name = "Estates".into();
                    Ok(())
                }),
            )
            .await
            .unwrap();
        assert_eq!(modified.before.name, "Farms");
        assert_eq!(modified.record.data.name, "Estates");
        assert_eq!(modified.record.audit.updated_by, "alice");
    }

    #[tokio::test]
    async fn update_of_deleted_row_is_not_found() {
        let (svc, _) = service();
        let created = svc.create(category("Land"), &alice()).await.unwrap();
        svc.delete(created.id, &alice()).await.unwrap();
        let err = svc
            .update(created.id, category("Plots"), &alice())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_and_restore_of_unknown_id_are_not_found() {
        let (svc, _) = service();
        assert!(matches!(
            svc.delete(99, &alice()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            svc.restore(99, &alice()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn pages_only_count_active_rows() {
        let (svc, _) = service();
        for i in 0..27 {
            svc.create(category(&format!("c{i}")), &alice()).await.unwrap();
        }
        svc.delete(1, &alice()).await.unwrap();
        svc.delete(2, &alice()).await.unwrap();

        let page = svc.find_page(&PageRequest::new(0, 10)).await.unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total_elements, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items[0].id, 3);

        let last = svc.find_page(&PageRequest::new(2, 10)).await.unwrap();
        assert_eq!(last.items.len(), 5);
        assert_eq!(svc.find_all().await.unwrap().len(), 25);
        assert_eq!(svc.find_all_including_deleted().await.unwrap().len(), 27);
    }

    #[tokio::test]
    async fn entity_service_declares_restore() {
        let (svc, _) = service();
        assert!(svc.as_restorable().is_some());
    }
}
