use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::dto::{
    AppointmentCreateRequest, AppointmentDto, AppointmentUpdateRequest, RelatedNames, TimeRange,
};
use super::model::{Appointment, AppointmentStatus};
use crate::clients::model::Client;
use crate::common::auditor::Auditor;
use crate::common::entity::Record;
use crate::common::page::Direction;
use crate::common::repository::Filter;
use crate::common::service::{Creatable, EntityService, Readable, SoftDeletable};
use crate::error::AppError;
use crate::properties::model::Property;
use crate::users::model::User;

#[derive(Clone)]
pub struct AppointmentService {
    appointments: EntityService<Appointment>,
    users: EntityService<User>,
    clients: EntityService<Client>,
    properties: EntityService<Property>,
}

impl AppointmentService {
    pub fn new(
        appointments: EntityService<Appointment>,
        users: EntityService<User>,
        clients: EntityService<Client>,
        properties: EntityService<Property>,
    ) -> Self {
        Self {
            appointments,
            users,
            clients,
            properties,
        }
    }

    pub fn entities(&self) -> &EntityService<Appointment> {
        &self.appointments
    }

    async fn check_relations(
        &self,
        client_id: Option<i64>,
        property_id: Option<i64>,
    ) -> Result<(), AppError> {
        if let Some(id) = client_id {
            self.clients.get(id).await?;
        }
        if let Some(id) = property_id {
            self.properties.get(id).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, req, by), fields(by = %by))]
    pub async fn create_appointment(
        &self,
        req: AppointmentCreateRequest,
        by: &Auditor,
    ) -> Result<Record<Appointment>, AppError> {
        let appointment = req.into_appointment(OffsetDateTime::now_utc())?;
        self.users.get(appointment.user_id).await?;
        self.check_relations(appointment.client_id, appointment.property_id)
            .await?;
        let record = self.appointments.create(appointment, by).await?;
        info!(
            id = record.id,
            user_id = record.data.user_id,
            start = %record.data.start_time,
            "appointment booked"
        );
        Ok(record)
    }

    #[instrument(skip(self, req, by), fields(by = %by))]
    pub async fn update_appointment(
        &self,
        id: i64,
        req: AppointmentUpdateRequest,
        by: &Auditor,
    ) -> Result<Record<Appointment>, AppError> {
        self.check_relations(req.client_id, req.property_id).await?;
        if let Some(status) = req.status {
            debug!(id, %status, "appointment status change");
        }
        self.appointments
            .modify(id, by, Box::new(move |a: &mut Appointment| req.apply(a)))
            .await
    }

    /// Soft delete of an active appointment; 404 if it is already gone.
    pub async fn delete_appointment(&self, id: i64, by: &Auditor) -> Result<(), AppError> {
        self.appointments.get(id).await?;
        self.appointments.delete(id, by).await
    }

    pub async fn get(&self, id: i64) -> Result<Record<Appointment>, AppError> {
        self.appointments.get(id).await
    }

    fn by_start(filter: Filter) -> Filter {
        filter.order_by("start_time", Direction::Asc)
    }

    /// The user must exist; deleted users answer 404.
    pub async fn find_by_user(&self, user_id: i64) -> Result<Vec<Record<Appointment>>, AppError> {
        self.users.get(user_id).await?;
        self.appointments
            .find_where(&Self::by_start(Filter::new().eq("user_id", user_id)))
            .await
    }

    pub async fn find_by_client(
        &self,
        client_id: i64,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        self.appointments
            .find_where(&Self::by_start(Filter::new().eq("client_id", client_id)))
            .await
    }

    pub async fn find_by_property(
        &self,
        property_id: i64,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        self.appointments
            .find_where(&Self::by_start(Filter::new().eq("property_id", property_id)))
            .await
    }

    pub async fn find_by_status(
        &self,
        status: AppointmentStatus,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        self.appointments
            .find_where(&Self::by_start(Filter::new().eq("status", status)))
            .await
    }

    pub async fn find_by_user_and_status(
        &self,
        user_id: i64,
        status: AppointmentStatus,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        self.appointments
            .find_where(&Self::by_start(
                Filter::new().eq("user_id", user_id).eq("status", status),
            ))
            .await
    }

    /// Appointments starting within `[start, end]`.
    pub async fn find_by_date_range(
        &self,
        range: &TimeRange,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        check_range(range)?;
        self.appointments
            .find_where(&Self::by_start(
                Filter::new().between("start_time", range.start, range.end),
            ))
            .await
    }

    pub async fn find_by_user_and_date_range(
        &self,
        user_id: i64,
        range: &TimeRange,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        check_range(range)?;
        self.appointments
            .find_where(&Self::by_start(
                Filter::new()
                    .eq("user_id", user_id)
                    .between("start_time", range.start, range.end),
            ))
            .await
    }

    pub async fn find_upcoming_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        let found = self
            .appointments
            .find_where(&Self::by_start(
                Filter::new()
                    .eq("user_id", user_id)
                    .gt("start_time", OffsetDateTime::now_utc()),
            ))
            .await?;
        debug!(user_id, count = found.len(), "upcoming appointments");
        Ok(found)
    }

    /// Most recent first.
    pub async fn find_past_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Record<Appointment>>, AppError> {
        self.appointments
            .find_where(
                &Filter::new()
                    .eq("user_id", user_id)
                    .lt("start_time", OffsetDateTime::now_utc())
                    .order_by("start_time", Direction::Desc),
            )
            .await
    }

    pub async fn to_dto(&self, rec: Record<Appointment>) -> Result<AppointmentDto, AppError> {
        let mut names = Names::default();
        let related = names.resolve(self, &rec.data).await?;
        Ok(AppointmentDto::new(rec, related))
    }

    pub async fn to_dtos(
        &self,
        records: Vec<Record<Appointment>>,
    ) -> Result<Vec<AppointmentDto>, AppError> {
        let mut names = Names::default();
        let mut out = Vec::with_capacity(records.len());
        for rec in records {
            let related = names.resolve(self, &rec.data).await?;
            out.push(AppointmentDto::new(rec, related));
        }
        Ok(out)
    }
}

fn check_range(range: &TimeRange) -> Result<(), AppError> {
    if range.start > range.end {
        return Err(AppError::BadRequest(
            "start must not be after end".into(),
        ));
    }
    Ok(())
}

/// Lookup cache for one batch of DTOs.
#[derive(Default)]
struct Names {
    users: HashMap<i64, Option<String>>,
    clients: HashMap<i64, Option<String>>,
    properties: HashMap<i64, Option<String>>,
}

impl Names {
    async fn resolve(
        &mut self,
        svc: &AppointmentService,
        a: &Appointment,
    ) -> Result<RelatedNames, AppError> {
        let username = match self.users.get(&a.user_id) {
            Some(name) => name.clone(),
            None => {
                let name = svc.users.find_by_id(a.user_id).await?.map(|u| u.data.username);
                self.users.insert(a.user_id, name.clone());
                name
            }
        };
        let client_name = match a.client_id {
            Some(id) => match self.clients.get(&id) {
                Some(name) => name.clone(),
                None => {
                    let name = svc.clients.find_by_id(id).await?.map(|c| c.data.name);
                    self.clients.insert(id, name.clone());
                    name
                }
            },
            None => None,
        };
        let property_title = match a.property_id {
            Some(id) => match self.properties.get(&id) {
                Some(title) => title.clone(),
                None => {
                    let title = svc.properties.find_by_id(id).await?.map(|p| p.data.title);
                    self.properties.insert(id, title.clone());
                    title
                }
            },
            None => None,
        };
        Ok(RelatedNames {
            username,
            client_name,
            property_title,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;
    use crate::common::repository::MemoryRepository;
    use crate::properties::model::PropertyStatus;

    fn service() -> AppointmentService {
        AppointmentService::new(
            EntityService::new(Arc::new(MemoryRepository::<Appointment>::new())),
            EntityService::new(Arc::new(MemoryRepository::<User>::new())),
            EntityService::new(Arc::new(MemoryRepository::<Client>::new())),
            EntityService::new(Arc::new(MemoryRepository::<Property>::new())),
        )
    }

    fn by() -> Auditor {
        Auditor::resolve(Some("agent"))
    }

    async fn add_user(svc: &AppointmentService, name: &str) -> i64 {
        svc.users
            .create(
                User {
                    username: name.into(),
                    password_hash: String::new(),
                    email: format!("{}@nextra.pt", name),
                    active: true,
                    roles: vec!["ROLE_AGENT".into()],
                },
                &by(),
            )
            .await
            .unwrap()
            .id
    }

    fn booking(user_id: i64, hours_ahead: i64) -> AppointmentCreateRequest {
        let now = OffsetDateTime::now_utc();
        AppointmentCreateRequest {
            user_id: Some(user_id),
            start_time: Some(now + Duration::hours(hours_ahead)),
            end_time: Some(now + Duration::hours(hours_ahead + 1)),
            title: Some(format!("Visit in {}h", hours_ahead)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_requires_existing_relations() {
        let svc = service();
        let err = svc.create_appointment(booking(9, 1), &by()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "User not found with id: 9"));

        let user_id = add_user(&svc, "marta").await;
        let mut req = booking(user_id, 1);
        req.property_id = Some(4);
        let err = svc.create_appointment(req, &by()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Property not found with id: 4"));

        let property = svc
            .properties
            .create(
                Property {
                    title: "T2 Braga".into(),
                    location: None,
                    address: None,
                    price: rust_decimal::Decimal::new(180_000, 0),
                    size: None,
                    description: None,
                    property_type: None,
                    status: PropertyStatus::Available,
                    bedrooms: None,
                    bathrooms: None,
                    floors: None,
                    year_built: None,
                    features: None,
                    images: Vec::new(),
                    main_image: None,
                    owner_id: None,
                    category_id: None,
                },
                &by(),
            )
            .await
            .unwrap();
        let mut req = booking(user_id, 1);
        req.property_id = Some(property.id);
        let created = svc.create_appointment(req, &by()).await.unwrap();
        assert_eq!(created.data.status, AppointmentStatus::Scheduled);

        let dto = svc.to_dto(created).await.unwrap();
        assert_eq!(dto.username.as_deref(), Some("marta"));
        assert_eq!(dto.property_title.as_deref(), Some("T2 Braga"));
        assert_eq!(dto.client_name, None);
    }

    #[tokio::test]
    async fn user_queries_split_upcoming_and_past() {
        let svc = service();
        let user_id = add_user(&svc, "marta").await;
        let later = svc.create_appointment(booking(user_id, 48), &by()).await.unwrap();
        let sooner = svc.create_appointment(booking(user_id, 2), &by()).await.unwrap();

        // push one into the past without going through the request checks
        let past = svc.create_appointment(booking(user_id, 5), &by()).await.unwrap();
        let now = OffsetDateTime::now_utc();
        svc.appointments
            .modify(
                past.id,
                &by(),
                Box::new(move |a: &mut Appointment| {
                    a.start_time = now - Duration::days(2);
                    a.end_time = now - Duration::days(2) + Duration::hours(1);
                    Ok(())
                }),
            )
            .await
            .unwrap();

        let ids = |rows: Vec<Record<Appointment>>| rows.into_iter().map(|r| r.id).collect::<Vec<_>>();
        assert_eq!(
            ids(svc.find_by_user(user_id).await.unwrap()),
            vec![past.id, sooner.id, later.id]
        );
        assert_eq!(
            ids(svc.find_upcoming_by_user(user_id).await.unwrap()),
            vec![sooner.id, later.id]
        );
        assert_eq!(ids(svc.find_past_by_user(user_id).await.unwrap()), vec![past.id]);

        let range = TimeRange {
            start: now,
            end: now + Duration::hours(24),
        };
        assert_eq!(ids(svc.find_by_date_range(&range).await.unwrap()), vec![sooner.id]);
        let inverted = TimeRange {
            start: range.end,
            end: range.start,
        };
        assert!(matches!(
            svc.find_by_user_and_date_range(user_id, &inverted).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn update_is_partial_and_delete_hides_the_row() {
        let svc = service();
        let user_id = add_user(&svc, "marta").await;
        let created = svc.create_appointment(booking(user_id, 3), &by()).await.unwrap();

        let updated = svc
            .update_appointment(
                created.id,
                AppointmentUpdateRequest {
                    status: Some(AppointmentStatus::Cancelled),
                    ..Default::default()
                },
                &Auditor::resolve(Some("marta")),
            )
            .await
            .unwrap();
        assert_eq!(updated.data.status, AppointmentStatus::Cancelled);
        assert_eq!(updated.data.title, created.data.title);
        assert_eq!(updated.audit.updated_by, "marta");
        assert_eq!(updated.audit.created_by, "agent");

        let cancelled = svc
            .find_by_user_and_status(user_id, AppointmentStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);

        svc.delete_appointment(created.id, &by()).await.unwrap();
        assert!(matches!(svc.get(created.id).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            svc.delete_appointment(created.id, &by()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(svc.find_by_status(AppointmentStatus::Cancelled).await.unwrap().is_empty());
    }
}
