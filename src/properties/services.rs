use std::collections::HashMap;

use tracing::{debug, instrument};

use super::dto::{PriceRange, PropertyRequest, PropertyResponse};
use super::model::Property;
use crate::accounts::model::Account;
use crate::categories::model::Category;
use crate::common::auditor::Auditor;
use crate::common::entity::Record;
use crate::common::page::Direction;
use crate::common::repository::Filter;
use crate::common::service::{Creatable, EntityService, Readable};
use crate::error::AppError;

/// Property rules on top of the generic service: request mapping,
/// relation checks and the owner/category/price queries.
#[derive(Clone)]
pub struct PropertyService {
    properties: EntityService<Property>,
    accounts: EntityService<Account>,
    categories: EntityService<Category>,
}

impl PropertyService {
    pub fn new(
        properties: EntityService<Property>,
        accounts: EntityService<Account>,
        categories: EntityService<Category>,
    ) -> Self {
        Self {
            properties,
            accounts,
            categories,
        }
    }

    pub fn entities(&self) -> &EntityService<Property> {
        &self.properties
    }

    async fn check_relations(&self, req: &PropertyRequest) -> Result<(), AppError> {
        if let Some(owner_id) = req.owner_id {
            self.accounts.get(owner_id).await?;
        }
        if let Some(category_id) = req.category_id {
            self.categories.get(category_id).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, req, by), fields(title = %req.title, by = %by))]
    pub async fn create_property(
        &self,
        req: PropertyRequest,
        by: &Auditor,
    ) -> Result<Record<Property>, AppError> {
        self.check_relations(&req).await?;
        let property = req.into_property()?;
        self.properties.create(property, by).await
    }

    #[instrument(skip(self, req, by), fields(by = %by))]
    pub async fn update_property(
        &self,
        id: i64,
        req: PropertyRequest,
        by: &Auditor,
    ) -> Result<Record<Property>, AppError> {
        let price = req.check()?;
        self.properties.get(id).await?;
        self.check_relations(&req).await?;
        self.properties
            .modify(id, by, Box::new(move |p: &mut Property| req.apply(p, price)))
            .await
    }

    pub async fn find_by_owner(&self, owner_id: i64) -> Result<Vec<Record<Property>>, AppError> {
        self.properties
            .find_where(&Filter::new().eq("owner_id", owner_id))
            .await
    }

    pub async fn find_by_category(
        &self,
        category_id: i64,
    ) -> Result<Vec<Record<Property>>, AppError> {
        self.properties
            .find_where(&Filter::new().eq("category_id", category_id))
            .await
    }

    /// Inclusive on both ends, cheapest first.
    pub async fn find_by_price_range(
        &self,
        range: &PriceRange,
    ) -> Result<Vec<Record<Property>>, AppError> {
        if range.min > range.max {
            return Err(AppError::BadRequest(
                "min price must not be greater than max price".into(),
            ));
        }
        debug!(min = %range.min, max = %range.max, "find properties by price");
        self.properties
            .find_where(
                &Filter::new()
                    .between("price", range.min, range.max)
                    .order_by("price", Direction::Asc),
            )
            .await
    }

    pub async fn to_response(&self, rec: Record<Property>) -> Result<PropertyResponse, AppError> {
        let mut responses = self.to_responses(vec![rec]).await?;
        responses
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("response mapping lost a row")))
    }

    /// Looks each owner and category up once. Deleted relations show no name.
    pub async fn to_responses(
        &self,
        records: Vec<Record<Property>>,
    ) -> Result<Vec<PropertyResponse>, AppError> {
        let mut owners: HashMap<i64, Option<String>> = HashMap::new();
        let mut categories: HashMap<i64, Option<String>> = HashMap::new();
        let mut out = Vec::with_capacity(records.len());
        for rec in records {
            let owner_name = match rec.data.owner_id {
                Some(id) => {
                    if !owners.contains_key(&id) {
                        let name = self.accounts.find_by_id(id).await?.map(|a| a.data.name);
                        owners.insert(id, name);
                    }
                    owners.get(&id).cloned().flatten()
                }
                None => None,
            };
            let category_name = match rec.data.category_id {
                Some(id) => {
                    if !categories.contains_key(&id) {
                        let name = self.categories.find_by_id(id).await?.map(|c| c.data.name);
                        categories.insert(id, name);
                    }
                    categories.get(&id).cloned().flatten()
                }
                None => None,
            };
            out.push(PropertyResponse::new(rec, owner_name, category_name));
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::*;
    use crate::common::repository::MemoryRepository;
    use crate::common::service::SoftDeletable;

    pub(crate) fn service() -> PropertyService {
        PropertyService::new(
            EntityService::new(Arc::new(MemoryRepository::<Property>::new())),
            EntityService::new(Arc::new(MemoryRepository::<Account>::new())),
            EntityService::new(Arc::new(MemoryRepository::<Category>::new())),
        )
    }

    fn request(title: &str, price: i64) -> PropertyRequest {
        PropertyRequest {
            title: title.into(),
            price: Some(Decimal::new(price, 0)),
            ..Default::default()
        }
    }

    fn agent() -> Auditor {
        Auditor::resolve(Some("agent"))
    }

    #[tokio::test]
    async fn create_checks_owner_and_category_exist() {
        let svc = service();
        let mut req = request("T3 Porto", 300_000);
        req.owner_id = Some(7);
        let err = svc.create_property(req, &agent()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Account not found with id: 7"));

        let owner = svc
            .accounts
            .create(
                Account {
                    name: "Imobiliaria Norte".into(),
                    email: "norte@nextra.pt".into(),
                    phone: None,
                    role: None,
                },
                &agent(),
            )
            .await
            .unwrap();
        let category = svc
            .categories
            .create(
                Category {
                    name: "Urban".into(),
                    description: None,
                },
                &agent(),
            )
            .await
            .unwrap();

        let mut req = request("T3 Porto", 300_000);
        req.owner_id = Some(owner.id);
        req.category_id = Some(category.id);
        let created = svc.create_property(req, &agent()).await.unwrap();
        let response = svc.to_response(created).await.unwrap();
        assert_eq!(response.owner_name.as_deref(), Some("Imobiliaria Norte"));
        assert_eq!(response.category_name.as_deref(), Some("Urban"));
        assert_eq!(response.created_by, "agent");

        // a soft-deleted owner no longer resolves for new writes
        svc.accounts.delete(owner.id, &agent()).await.unwrap();
        let mut req = request("T1 Porto", 100_000);
        req.owner_id = Some(owner.id);
        assert!(matches!(
            svc.create_property(req, &agent()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn update_overwrites_fields_and_keeps_images() {
        let svc = service();
        let created = svc.create_property(request("Old", 10), &agent()).await.unwrap();
        svc.entities()
            .modify(
                created.id,
                &agent(),
                Box::new(|p: &mut Property| {
                    p.images = vec!["http://x/uploads/properties/a.jpg".into()];
                    Ok(())
                }),
            )
            .await
            .unwrap();

        let updated = svc
            .update_property(created.id, request("New", 20), &Auditor::resolve(Some("bob")))
            .await
            .unwrap();
        assert_eq!(updated.data.title, "New");
        assert_eq!(updated.data.price, Decimal::new(20, 0));
        assert_eq!(updated.data.images.len(), 1);
        assert_eq!(updated.audit.created_by, "agent");
        assert_eq!(updated.audit.updated_by, "bob");

        let err = svc
            .update_property(999, request("None", 20), &agent())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn price_only_update_keeps_main_image() {
        let svc = service();
        let image = "http://x/uploads/properties/a.jpg".to_string();
        let mut req = request("T2 Braga", 150_000);
        req.images = Some(vec![image.clone()]);
        req.main_image = Some(image.clone());
        let created = svc.create_property(req, &agent()).await.unwrap();

        let updated = svc
            .update_property(created.id, request("T2 Braga", 140_000), &agent())
            .await
            .unwrap();
        assert_eq!(updated.data.price, Decimal::new(140_000, 0));
        assert_eq!(updated.data.images, vec![image.clone()]);
        assert_eq!(updated.data.main_image, Some(image));
    }

    #[tokio::test]
    async fn price_range_is_inclusive_and_sorted() {
        let svc = service();
        for (title, price) in [("c", 300), ("a", 100), ("b", 200), ("d", 400)] {
            svc.create_property(request(title, price), &agent()).await.unwrap();
        }
        let found = svc
            .find_by_price_range(&PriceRange {
                min: Decimal::new(100, 0),
                max: Decimal::new(300, 0),
            })
            .await
            .unwrap();
        let titles: Vec<_> = found.iter().map(|r| r.data.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);

        let err = svc
            .find_by_price_range(&PriceRange {
                min: Decimal::new(5, 0),
                max: Decimal::new(1, 0),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn owner_and_category_queries_skip_deleted_rows() {
        let svc = service();
        let a = svc.create_property(request("x", 1), &agent()).await.unwrap();
        svc.entities()
            .modify(
                a.id,
                &agent(),
                Box::new(|p: &mut Property| {
                    p.owner_id = Some(3);
                    p.category_id = Some(4);
                    Ok(())
                }),
            )
            .await
            .unwrap();
        assert_eq!(svc.find_by_owner(3).await.unwrap().len(), 1);
        assert_eq!(svc.find_by_category(4).await.unwrap().len(), 1);
        svc.entities().delete(a.id, &agent()).await.unwrap();
        assert!(svc.find_by_owner(3).await.unwrap().is_empty());
    }
}
