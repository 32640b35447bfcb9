use serde::{Deserialize, Serialize};

use crate::common::entity::Entity;
use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page index whose offset still fits in an `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// `?page=0&size=10&sort=createdAt,desc`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    /// Always a whitelisted column name, safe to splice into SQL.
    pub sort: String,
    pub direction: Direction,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: "id".to_string(),
            direction: Direction::Asc,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: page.clamp(0, MAX_PAGE),
            size: size.clamp(1, MAX_PAGE_SIZE),
            ..Self::default()
        }
    }

    pub fn parse<T: Entity>(params: &PageParams) -> Result<Self, AppError> {
        let mut req = Self::new(
            params.page.unwrap_or(0),
            params.size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(sort) = params.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            let mut parts = sort.split(',').map(str::trim);
            let column = snake_case(parts.next().unwrap_or("id"));
            if !T::is_sortable(&column) {
                return Err(AppError::BadRequest(format!(
                    "Cannot sort {} by '{}'",
                    T::NAME,
                    column
                )));
            }
            req.direction = match parts.next().map(|d| d.to_ascii_lowercase()) {
                None => Direction::Asc,
                Some(d) if d == "asc" => Direction::Asc,
                Some(d) if d == "desc" => Direction::Desc,
                Some(d) => {
                    return Err(AppError::BadRequest(format!(
                        "Invalid sort direction '{}'",
                        d
                    )))
                }
            };
            req.sort = column;
        }
        Ok(req)
    }

    pub fn offset(&self) -> i64 {
        self.page * self.size
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, req: &PageRequest, total_elements: i64) -> Self {
        let total_pages = if total_elements == 0 {
            0
        } else {
            (total_elements + req.size - 1) / req.size
        };
        Self {
            items,
            page: req.page,
            size: req.size,
            total_elements,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

/// `createdAt` -> `created_at`
pub fn snake_case(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for c in camel.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
