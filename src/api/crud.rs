use std::{marker::PhantomData, sync::Arc};

use axum::{
    http::StatusCode,
    routing::{delete, get, patch, post, put, MethodRouter},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::{
    extract::{IdPath, QueryParams, ValidJson},
    response::ApiResponse,
};
use crate::{
    auth::jwt::AuthUser,
    common::{
        entity::{Entity, Record},
        page::{Page, PageParams, PageRequest},
        service::{Creatable, CrudService, Readable, Restorable, SoftDeletable, Updatable},
    },
    error::AppError,
    state::AppState,
};

/// Who may call one generic verb.
#[derive(Debug, Clone, Copy)]
pub enum Access {
    Authenticated,
    AnyRole(&'static [&'static str]),
    /// Verb replaced by a DTO endpoint; the message points there.
    Disabled(&'static str),
}

impl Access {
    pub fn check(&self, user: &AuthUser) -> Result<(), AppError> {
        match self {
            Access::Authenticated => Ok(()),
            Access::AnyRole(roles) => user.require_any(roles),
            Access::Disabled(msg) => Err(AppError::UnsupportedOperation(msg.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    List,
    Get,
    Update,
    Delete,
    Restore,
}

#[derive(Debug, Clone, Copy)]
pub struct CrudPolicy {
    pub create: Access,
    pub list: Access,
    pub get: Access,
    pub update: Access,
    pub delete: Access,
    pub restore: Access,
    /// Verbs left unmounted for the resource router to serve itself.
    pub omit: &'static [Verb],
}

impl CrudPolicy {
    fn mounts(&self, verb: Verb) -> bool {
        !self.omit.contains(&verb)
    }
}

impl Default for CrudPolicy {
    fn default() -> Self {
        Self {
            create: Access::Authenticated,
            list: Access::Authenticated,
            get: Access::Authenticated,
            update: Access::Authenticated,
            delete: Access::Authenticated,
            restore: Access::Authenticated,
            omit: &[],
        }
    }
}

/// The six generic verbs over one `CrudService`, meant to be nested under
/// the resource path:
///
/// | verb | path | |
/// |---|---|---|
/// | POST | `/` | 201 + created row |
/// | GET | `/` | page of active rows |
/// | GET | `/:id` | row or 404 |
/// | PUT | `/:id` | update or 404 |
/// | DELETE | `/:id` | soft delete, `data: null` |
/// | PATCH | `/:id/restore` | restore, or 501 if the service cannot |
pub struct CrudRoutes<T, S> {
    service: Arc<S>,
    policy: CrudPolicy,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S> CrudRoutes<T, S>
where
    T: Entity + DeserializeOwned,
    S: CrudService<T> + 'static,
{
    pub fn new(service: Arc<S>, policy: CrudPolicy) -> Self {
        Self {
            service,
            policy,
            _entity: PhantomData,
        }
    }

    pub fn into_router(self) -> Router<AppState> {
        let CrudRoutes {
            service, policy, ..
        } = self;

        let create = {
            let service = service.clone();
            move |user: AuthUser, body: Result<ValidJson<T>, AppError>| {
                create_one::<T, S>(service.clone(), policy.create, user, body)
            }
        };
        let list = {
            let service = service.clone();
            move |user: AuthUser, QueryParams(params): QueryParams<PageParams>| {
                list_page::<T, S>(service.clone(), policy.list, user, params)
            }
        };
        let get_by_id = {
            let service = service.clone();
            move |user: AuthUser, IdPath(id): IdPath| {
                get_one::<T, S>(service.clone(), policy.get, user, id)
            }
        };
        let update = {
            let service = service.clone();
            move |user: AuthUser, IdPath(id): IdPath, body: Result<ValidJson<T>, AppError>| {
                update_one::<T, S>(service.clone(), policy.update, user, id, body)
            }
        };
        let delete_handler = {
            let service = service.clone();
            move |user: AuthUser, IdPath(id): IdPath| {
                delete_one::<T, S>(service.clone(), policy.delete, user, id)
            }
        };
        let restore = {
            let service = service.clone();
            move |user: AuthUser, IdPath(id): IdPath| {
                restore_one::<T, S>(service.clone(), policy.restore, user, id)
            }
        };

        let mut collection: MethodRouter<AppState> = MethodRouter::new();
        if policy.mounts(Verb::Create) {
            collection = collection.merge(post(create));
        }
        if policy.mounts(Verb::List) {
            collection = collection.merge(get(list));
        }

        let mut item: MethodRouter<AppState> = MethodRouter::new();
        if policy.mounts(Verb::Get) {
            item = item.merge(get(get_by_id));
        }
        if policy.mounts(Verb::Update) {
            item = item.merge(put(update));
        }
        if policy.mounts(Verb::Delete) {
            item = item.merge(delete(delete_handler));
        }

        let mut router = Router::new().route("/", collection).route("/:id", item);
        if policy.mounts(Verb::Restore) {
            router = router.route("/:id/restore", patch(restore));
        }
        router
    }
}

#[instrument(skip_all, fields(entity = T::NAME, user = %user.username))]
async fn create_one<T: Entity, S: CrudService<T>>(
    service: Arc<S>,
    access: Access,
    user: AuthUser,
    body: Result<ValidJson<T>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<Record<T>>>), AppError> {
    access.check(&user)?;
    let ValidJson(data) = body?;
    let record = service.create(data, &user.auditor()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record))))
}

#[instrument(skip_all, fields(entity = T::NAME))]
async fn list_page<T: Entity, S: CrudService<T>>(
    service: Arc<S>,
    access: Access,
    user: AuthUser,
    params: PageParams,
) -> Result<Json<ApiResponse<Page<Record<T>>>>, AppError> {
    access.check(&user)?;
    let req = PageRequest::parse::<T>(&params)?;
    let page = service.find_page(&req).await?;
    Ok(Json(ApiResponse::ok(page)))
}

#[instrument(skip_all, fields(entity = T::NAME, id = id))]
async fn get_one<T: Entity, S: CrudService<T>>(
    service: Arc<S>,
    access: Access,
    user: AuthUser,
    id: i64,
) -> Result<Json<ApiResponse<Record<T>>>, AppError> {
    access.check(&user)?;
    let record = service.get(id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

#[instrument(skip_all, fields(entity = T::NAME, id = id, user = %user.username))]
async fn update_one<T: Entity, S: CrudService<T>>(
    service: Arc<S>,
    access: Access,
    user: AuthUser,
    id: i64,
    body: Result<ValidJson<T>, AppError>,
) -> Result<Json<ApiResponse<Record<T>>>, AppError> {
    access.check(&user)?;
    let ValidJson(data) = body?;
    let record = service.update(id, data, &user.auditor()).await?;
    Ok(Json(ApiResponse::ok(record)))
}

#[instrument(skip_all, fields(entity = T::NAME, id = id, user = %user.username))]
async fn delete_one<T: Entity, S: CrudService<T>>(
    service: Arc<S>,
    access: Access,
    user: AuthUser,
    id: i64,
) -> Result<Json<ApiResponse<()>>, AppError> {
    access.check(&user)?;
    service.delete(id, &user.auditor()).await?;
    Ok(Json(ApiResponse::empty()))
}

#[instrument(skip_all, fields(entity = T::NAME, id = id, user = %user.username))]
async fn restore_one<T: Entity, S: CrudService<T>>(
    service: Arc<S>,
    access: Access,
    user: AuthUser,
    id: i64,
) -> Result<Json<ApiResponse<()>>, AppError> {
    access.check(&user)?;
    let Some(restorable) = service.as_restorable() else {
        return Err(AppError::NotImplemented(
            "Restore not supported for this entity".into(),
        ));
    };
    restorable.restore(id, &user.auditor()).await?;
    Ok(Json(ApiResponse::empty()))
}
