use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::common::entity::{Entity, Record, Value};
use crate::common::page::{Direction, Page, PageRequest};
use crate::error::AppError;

/// In-place edit applied to a locked row by [`Repository::modify`].
pub type Mutation<T> = Box<dyn FnOnce(&mut T) -> Result<(), AppError> + Send>;

/// Outcome of [`Repository::modify`]: the row as it was locked and as it
/// was written back.
#[derive(Debug, Clone)]
pub struct Modified<T> {
    pub before: T,
    pub record: Record<T>,
}

#[derive(Debug, Clone)]
pub enum Condition {
    Eq(&'static str, Value),
    Gt(&'static str, Value),
    Gte(&'static str, Value),
    Lt(&'static str, Value),
    Lte(&'static str, Value),
    /// Inclusive on both ends.
    Between(&'static str, Value, Value),
    /// Membership in a TEXT[] column.
    Contains(&'static str, String),
}

/// Conjunction of conditions over active rows.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<Condition>,
    pub order_by: Option<(&'static str, Direction)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(column, value.into()));
        self
    }

    pub fn gt(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Gt(column, value.into()));
        self
    }

    pub fn gte(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Gte(column, value.into()));
        self
    }

    pub fn lt(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Lt(column, value.into()));
        self
    }

    pub fn lte(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Lte(column, value.into()));
        self
    }

    pub fn between(
        mut self,
        column: &'static str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.conditions
            .push(Condition::Between(column, low.into(), high.into()));
        self
    }

    pub fn contains(mut self, column: &'static str, item: impl Into<String>) -> Self {
        self.conditions.push(Condition::Contains(column, item.into()));
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order_by = Some((column, direction));
        self
    }
}

/// Persistence contract shared by every entity.
///
/// Reads other than `find_any`, `exists_any` and `find_all(true)` only ever
/// see rows with `deleted = false`.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn insert(&self, data: T, actor: &str) -> Result<Record<T>, AppError>;

    /// Overwrites the entity columns of an active row. `None` if there is none.
    async fn update(&self, id: i64, data: T, actor: &str)
        -> Result<Option<Record<T>>, AppError>;

    async fn find_active(&self, id: i64) -> Result<Option<Record<T>>, AppError>;

    async fn find_any(&self, id: i64) -> Result<Option<Record<T>>, AppError>;

    async fn exists_any(&self, id: i64) -> Result<bool, AppError>;

    async fn soft_delete(&self, id: i64, actor: &str) -> Result<bool, AppError>;

    async fn restore(&self, id: i64, actor: &str) -> Result<bool, AppError>;

    async fn find_all(&self, include_deleted: bool) -> Result<Vec<Record<T>>, AppError>;

    async fn find_page(&self, req: &PageRequest) -> Result<Page<Record<T>>, AppError>;

    async fn find_where(&self, filter: &Filter) -> Result<Vec<Record<T>>, AppError>;

    /// Read-modify-write of one active row under a row lock. If `mutation`
    /// fails nothing is written.
    async fn modify(
        &self,
        id: i64,
        actor: &str,
        mutation: Mutation<T>,
    ) -> Result<Option<Modified<T>>, AppError>;
}

pub struct PgRepository<T> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn update_query(id: i64, data: T, actor: &str) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("UPDATE {} SET updated_by = ", T::TABLE));
        qb.push_bind(actor.to_string());
        qb.push(", updated_at = now()");
        for (column, value) in T::COLUMNS.iter().zip(data.values()) {
            qb.push(", ");
            qb.push(*column);
            qb.push(" = ");
            value.push_bind(&mut qb);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" AND deleted = false RETURNING ");
        qb.push(T::select_list());
        qb
    }

    async fn set_deleted(&self, id: i64, deleted: bool, actor: &str) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE {} SET deleted = $2, updated_by = $3, updated_at = now() WHERE id = $1",
            T::TABLE
        );
        let res = sqlx::query(&sql)
            .bind(id)
            .bind(deleted)
            .bind(actor)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    qb.push(" WHERE deleted = false");
    for condition in filter.conditions.iter().cloned() {
        qb.push(" AND ");
        match condition {
            Condition::Eq(col, v) => push_cmp(qb, col, " = ", v),
            Condition::Gt(col, v) => push_cmp(qb, col, " > ", v),
            Condition::Gte(col, v) => push_cmp(qb, col, " >= ", v),
            Condition::Lt(col, v) => push_cmp(qb, col, " < ", v),
            Condition::Lte(col, v) => push_cmp(qb, col, " <= ", v),
            Condition::Between(col, low, high) => {
                qb.push(col);
                qb.push(" BETWEEN ");
                low.push_bind(qb);
                qb.push(" AND ");
                high.push_bind(qb);
            }
            Condition::Contains(col, item) => {
                qb.push_bind(item);
                qb.push(" = ANY(");
                qb.push(col);
                qb.push(")");
            }
        }
    }
}

fn push_cmp(qb: &mut QueryBuilder<'_, Postgres>, column: &str, op: &str, value: Value) {
    qb.push(column);
    qb.push(op);
    value.push_bind(qb);
}

#[async_trait]
impl<T: Entity> Repository<T> for PgRepository<T> {
    async fn insert(&self, data: T, actor: &str) -> Result<Record<T>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} (created_by, updated_by, {}) VALUES (",
            T::TABLE,
            T::COLUMNS.join(", ")
        ));
        qb.push_bind(actor.to_string());
        qb.push(", ");
        qb.push_bind(actor.to_string());
        for value in data.values() {
            qb.push(", ");
            value.push_bind(&mut qb);
        }
        qb.push(") RETURNING ");
        qb.push(T::select_list());
        let record = qb
            .build_query_as::<Record<T>>()
            .fetch_one(&self.pool)
            .await?;
        debug!(table = T::TABLE, id = record.id, "row inserted");
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        data: T,
        actor: &str,
    ) -> Result<Option<Record<T>>, AppError> {
        let mut qb = Self::update_query(id, data, actor);
        let record = qb
            .build_query_as::<Record<T>>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_active(&self, id: i64) -> Result<Option<Record<T>>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND deleted = false",
            T::select_list(),
            T::TABLE
        );
        let record = sqlx::query_as::<_, Record<T>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_any(&self, id: i64) -> Result<Option<Record<T>>, AppError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", T::select_list(), T::TABLE);
        let record = sqlx::query_as::<_, Record<T>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn exists_any(&self, id: i64) -> Result<bool, AppError> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", T::TABLE);
        let exists = sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn soft_delete(&self, id: i64, actor: &str) -> Result<bool, AppError> {
        self.set_deleted(id, true, actor).await
    }

    async fn restore(&self, id: i64, actor: &str) -> Result<bool, AppError> {
        self.set_deleted(id, false, actor).await
    }

    async fn find_all(&self, include_deleted: bool) -> Result<Vec<Record<T>>, AppError> {
        let predicate = if include_deleted {
            ""
        } else {
            " WHERE deleted = false"
        };
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY id",
            T::select_list(),
            T::TABLE,
            predicate
        );
        let rows = sqlx::query_as::<_, Record<T>>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_page(&self, req: &PageRequest) -> Result<Page<Record<T>>, AppError> {
        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE deleted = false", T::TABLE);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .fetch_one(&self.pool)
            .await?;

        // req.sort is checked against the entity's columns by PageRequest::parse
        let sql = format!(
            "SELECT {} FROM {} WHERE deleted = false ORDER BY {} {}, id ASC LIMIT $1 OFFSET $2",
            T::select_list(),
            T::TABLE,
            req.sort,
            req.direction.as_sql()
        );
        let rows = sqlx::query_as::<_, Record<T>>(&sql)
            .bind(req.size)
            .bind(req.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(Page::new(rows, req, total))
    }

    async fn find_where(&self, filter: &Filter) -> Result<Vec<Record<T>>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            T::select_list(),
            T::TABLE
        ));
        push_conditions(&mut qb, filter);
        match filter.order_by {
            Some((column, direction)) => {
                qb.push(format!(" ORDER BY {} {}, id ASC", column, direction.as_sql()));
            }
            None => {
                qb.push(" ORDER BY id ASC");
            }
        }
        let rows = qb
            .build_query_as::<Record<T>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn modify(
        &self,
        id: i64,
        actor: &str,
        mutation: Mutation<T>,
    ) -> Result<Option<Modified<T>>, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND deleted = false FOR UPDATE",
            T::select_list(),
            T::TABLE
        );
        let current = sqlx::query_as::<_, Record<T>>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut current) = current else {
            return Ok(None);
        };

        let before = current.data.clone();
        // an error here drops tx, which rolls back and releases the lock
        mutation(&mut current.data)?;

        let mut qb = Self::update_query(id, current.data, actor);
        let updated = qb
            .build_query_as::<Record<T>>()
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(updated.map(|record| Modified { before, record }))
    }
}

#[cfg(test)]
pub use memory::MemoryRepository;

#[cfg(test)]
mod memory {
    use std::cmp::Ordering;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use time::OffsetDateTime;

    use super::*;
    use crate::common::entity::Audit;

    struct Rows<T> {
        rows: BTreeMap<i64, Record<T>>,
        next_id: i64,
    }

    /// Map-backed repository with the same visibility rules as the SQL one.
    pub struct MemoryRepository<T> {
        inner: Mutex<Rows<T>>,
    }

    impl<T> Default for MemoryRepository<T> {
        fn default() -> Self {
            Self {
                inner: Mutex::new(Rows {
                    rows: BTreeMap::new(),
                    next_id: 1,
                }),
            }
        }
    }

    impl<T: Entity> MemoryRepository<T> {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn column<T: Entity>(rec: &Record<T>, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::Int(Some(rec.id))),
            "deleted" => Some(Value::Bool(Some(rec.deleted))),
            "created_by" => Some(Value::Text(Some(rec.audit.created_by.clone()))),
            "updated_by" => Some(Value::Text(Some(rec.audit.updated_by.clone()))),
            "created_at" => Some(Value::Time(Some(rec.audit.created_at))),
            "updated_at" => Some(Value::Time(Some(rec.audit.updated_at))),
            other => rec.data.field(other),
        }
    }

    fn compare<T: Entity>(rec: &Record<T>, col: &str, value: &Value) -> Option<Ordering> {
        let field = column(rec, col)?;
        if field.is_null() || value.is_null() {
            return None;
        }
        field.partial_cmp(value)
    }

    fn matches<T: Entity>(rec: &Record<T>, condition: &Condition) -> bool {
        use Ordering::*;
        match condition {
            Condition::Eq(col, v) => compare(rec, col, v) == Some(Equal),
            Condition::Gt(col, v) => compare(rec, col, v) == Some(Greater),
            Condition::Gte(col, v) => matches!(compare(rec, col, v), Some(Greater | Equal)),
            Condition::Lt(col, v) => compare(rec, col, v) == Some(Less),
            Condition::Lte(col, v) => matches!(compare(rec, col, v), Some(Less | Equal)),
            Condition::Between(col, low, high) => {
                matches!(compare(rec, col, low), Some(Greater | Equal))
                    && matches!(compare(rec, col, high), Some(Less | Equal))
            }
            Condition::Contains(col, item) => match column(rec, col) {
                Some(Value::TextList(items)) => items.iter().any(|i| i == item),
                _ => false,
            },
        }
    }

    fn sort<T: Entity>(rows: &mut [Record<T>], col: &str, direction: Direction) {
        rows.sort_by(|a, b| {
            let ord = column(a, col)
                .partial_cmp(&column(b, col))
                .unwrap_or(Ordering::Equal);
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });
    }

    #[async_trait]
    impl<T: Entity> Repository<T> for MemoryRepository<T> {
        async fn insert(&self, data: T, actor: &str) -> Result<Record<T>, AppError> {
            let mut guard = self.inner.lock().unwrap();
            let id = guard.next_id;
            guard.next_id += 1;
            let now = OffsetDateTime::now_utc();
            let record = Record {
                id,
                deleted: false,
                audit: Audit {
                    created_by: actor.to_string(),
                    updated_by: actor.to_string(),
                    created_at: now,
                    updated_at: now,
                },
                data,
            };
            guard.rows.insert(id, record.clone());
            Ok(record)
        }

        async fn update(
            &self,
            id: i64,
            data: T,
            actor: &str,
        ) -> Result<Option<Record<T>>, AppError> {
            let mut guard = self.inner.lock().unwrap();
            match guard.rows.get_mut(&id) {
                Some(rec) if !rec.deleted => {
                    rec.data = data;
                    rec.audit.updated_by = actor.to_string();
                    rec.audit.updated_at = OffsetDateTime::now_utc();
                    Ok(Some(rec.clone()))
                }
                _ => Ok(None),
            }
        }

        async fn find_active(&self, id: i64) -> Result<Option<Record<T>>, AppError> {
            let guard = self.inner.lock().unwrap();
            Ok(guard.rows.get(&id).filter(|r| !r.deleted).cloned())
        }

        async fn find_any(&self, id: i64) -> Result<Option<Record<T>>, AppError> {
            Ok(self.inner.lock().unwrap().rows.get(&id).cloned())
        }

        async fn exists_any(&self, id: i64) -> Result<bool, AppError> {
            Ok(self.inner.lock().unwrap().rows.contains_key(&id))
        }

        async fn soft_delete(&self, id: i64, actor: &str) -> Result<bool, AppError> {
            let mut guard = self.inner.lock().unwrap();
            Ok(match guard.rows.get_mut(&id) {
                Some(rec) => {
                    rec.deleted = true;
                    rec.audit.updated_by = actor.to_string();
                    rec.audit.updated_at = OffsetDateTime::now_utc();
                    true
                }
                None => false,
            })
        }

        async fn restore(&self, id: i64, actor: &str) -> Result<bool, AppError> {
            let mut guard = self.inner.lock().unwrap();
            Ok(match guard.rows.get_mut(&id) {
                Some(rec) => {
                    rec.deleted = false;
                    rec.audit.updated_by = actor.to_string();
                    rec.audit.updated_at = OffsetDateTime::now_utc();
                    true
                }
                None => false,
            })
        }

        async fn find_all(&self, include_deleted: bool) -> Result<Vec<Record<T>>, AppError> {
            let guard = self.inner.lock().unwrap();
            Ok(guard
                .rows
                .values()
                .filter(|r| include_deleted || !r.deleted)
                .cloned()
                .collect())
        }

        async fn find_page(&self, req: &PageRequest) -> Result<Page<Record<T>>, AppError> {
            let mut rows = self.find_all(false).await?;
            sort(&mut rows, &req.sort, req.direction);
            let total = rows.len() as i64;
            let items = rows
                .into_iter()
                .skip(req.offset() as usize)
                .take(req.size as usize)
                .collect();
            Ok(Page::new(items, req, total))
        }

        async fn find_where(&self, filter: &Filter) -> Result<Vec<Record<T>>, AppError> {
            let mut rows: Vec<Record<T>> = self
                .find_all(false)
                .await?
                .into_iter()
                .filter(|r| filter.conditions.iter().all(|c| matches(r, c)))
                .collect();
            if let Some((col, direction)) = filter.order_by {
                sort(&mut rows, col, direction);
            }
            Ok(rows)
        }

        async fn modify(
            &self,
            id: i64,
            actor: &str,
            mutation: Mutation<T>,
        ) -> Result<Option<Modified<T>>, AppError> {
            let mut guard = self.inner.lock().unwrap();
            let Some(rec) = guard.rows.get_mut(&id).filter(|r| !r.deleted) else {
                return Ok(None);
            };
            let mut data = rec.data.clone();
            mutation(&mut data)?;
            let before = std::mem::replace(&mut rec.data, data);
            rec.audit.updated_by = actor.to_string();
            rec.audit.updated_at = OffsetDateTime::now_utc();
            Ok(Some(Modified {
                before,
                record: rec.clone(),
            }))
        }
    }
}
