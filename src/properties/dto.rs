use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::model::{Property, PropertyStatus, PropertyType, MAX_IMAGES};
use crate::common::entity::Record;
use crate::error::AppError;

/// Body of `POST /new` and `PUT /:id/update`. Relations travel as ids.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRequest {
    #[serde(default)]
    #[validate(length(max = 255, message = "Title cannot exceed 255 characters"))]
    pub title: String,
    pub location: Option<String>,
    pub address: Option<String>,
    pub price: Option<Decimal>,
    pub size: Option<f64>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
    pub property_type: Option<PropertyType>,
    /// `None` means AVAILABLE on create and "unchanged" on update.
    pub status: Option<PropertyStatus>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floors: Option<i32>,
    pub year_built: Option<i32>,
    pub features: Option<String>,
    /// `None` keeps the stored list; images are normally managed through
    /// the image endpoints.
    pub images: Option<Vec<String>>,
    /// `None` keeps the stored main image while it is still listed.
    pub main_image: Option<String>,
    pub owner_id: Option<i64>,
    pub category_id: Option<i64>,
}

impl PropertyRequest {
    /// Rules the derive cannot express. Returns the checked price.
    pub fn check(&self) -> Result<Decimal, AppError> {
        let mut errors = BTreeMap::new();
        if self.title.trim().is_empty() {
            errors.insert("title".to_string(), "Title is required".to_string());
        }
        match self.price {
            None => {
                errors.insert("price".to_string(), "Price cannot be null".to_string());
            }
            Some(p) if p <= Decimal::ZERO => {
                errors.insert(
                    "price".to_string(),
                    "Price must be greater than zero".to_string(),
                );
            }
            Some(_) => {}
        }
        if let Some(images) = &self.images {
            if images.len() > MAX_IMAGES {
                errors.insert(
                    "images".to_string(),
                    format!("A property can hold at most {} images", MAX_IMAGES),
                );
            }
        }
        if errors.is_empty() {
            Ok(self.price.unwrap_or_default())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Overwrites `target` with this request. `price` has passed `check`.
    pub fn apply(self, target: &mut Property, price: Decimal) -> Result<(), AppError> {
        target.title = self.title.trim().to_string();
        target.location = self.location;
        target.address = self.address;
        target.price = price;
        target.size = self.size;
        target.description = self.description;
        target.property_type = self.property_type;
        if let Some(status) = self.status {
            target.status = status;
        }
        target.bedrooms = self.bedrooms;
        target.bathrooms = self.bathrooms;
        target.floors = self.floors;
        target.year_built = self.year_built;
        target.features = self.features;
        if let Some(images) = self.images {
            target.images = images;
            if target
                .main_image
                .as_ref()
                .map_or(false, |main| !target.images.contains(main))
            {
                target.main_image = None;
            }
        }
        if self.main_image.is_some() {
            target.main_image = self.main_image;
        }
        if let Some(main) = &target.main_image {
            if !target.images.contains(main) {
                return Err(AppError::invalid(
                    "mainImage",
                    "Main image must be one of the property images",
                ));
            }
        }
        target.owner_id = self.owner_id;
        target.category_id = self.category_id;
        Ok(())
    }

    pub fn into_property(self) -> Result<Property, AppError> {
        let price = self.check()?;
        let mut property = Property {
            title: String::new(),
            location: None,
            address: None,
            price,
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
        };
        self.apply(&mut property, price)?;
        Ok(property)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResponse {
    pub id: i64,
    pub title: String,
    pub location: Option<String>,
    pub address: Option<String>,
    pub price: Decimal,
    pub size: Option<f64>,
    pub description: Option<String>,
    pub property_type: Option<PropertyType>,
    pub status: PropertyStatus,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floors: Option<i32>,
    pub year_built: Option<i32>,
    pub features: Option<String>,
    pub images: Vec<String>,
    pub main_image: Option<String>,
    pub owner_id: Option<i64>,
    pub owner_name: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub created_by: String,
    pub updated_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PropertyResponse {
    pub fn new(
        rec: Record<Property>,
        owner_name: Option<String>,
        category_name: Option<String>,
    ) -> Self {
        let p = rec.data;
        Self {
            id: rec.id,
            title: p.title,
            location: p.location,
            address: p.address,
            price: p.price,
            size: p.size,
            description: p.description,
            property_type: p.property_type,
            status: p.status,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            floors: p.floors,
            year_built: p.year_built,
            features: p.features,
            images: p.images,
            main_image: p.main_image,
            owner_id: p.owner_id,
            owner_name,
            category_id: p.category_id,
            category_name,
            created_by: rec.audit.created_by,
            updated_by: rec.audit.updated_by,
            created_at: rec.audit.created_at,
            updated_at: rec.audit.updated_at,
        }
    }
}

/// `?min=&max=`
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> PropertyRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn price_and_title_are_required() {
        let err = request(r#"{"title":"  "}"#).check().unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields["title"], "Title is required");
        assert_eq!(fields["price"], "Price cannot be null");

        let err = request(r#"{"title":"T2 Lisboa","price":0}"#).check().unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields["price"], "Price must be greater than zero");
    }

    #[test]
    fn new_property_defaults_to_available_without_images() {
        let property = request(
            r#"{"title":"Villa Sol","price":450000.50,"propertyType":"VILLA","bedrooms":4}"#,
        )
        .into_property()
        .unwrap();
        assert_eq!(property.status, PropertyStatus::Available);
        assert_eq!(property.property_type, Some(PropertyType::Villa));
        assert_eq!(property.price, Decimal::new(45000050, 2));
        assert!(property.images.is_empty());
    }

    #[test]
    fn unknown_enum_value_is_rejected_by_serde() {
        let parsed: Result<PropertyRequest, _> =
            serde_json::from_str(r#"{"title":"x","price":1,"propertyType":"CASTLE"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn main_image_must_be_listed() {
        let req = request(r#"{"title":"x","price":1,"images":["a"],"mainImage":"b"}"#);
        assert!(matches!(req.into_property().unwrap_err(), AppError::Validation(_)));
    }

    #[test]
    fn update_without_images_or_status_keeps_them() {
        let mut stored = request(r#"{"title":"x","price":1,"images":["a","b"],"mainImage":"b","status":"SOLD"}"#)
            .into_property()
            .unwrap();
        let update = request(r#"{"title":"y","price":2,"mainImage":"a"}"#);
        let price = update.check().unwrap();
        update.apply(&mut stored, price).unwrap();
        assert_eq!(stored.title, "y");
        assert_eq!(stored.images, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stored.main_image.as_deref(), Some("a"));
        assert_eq!(stored.status, PropertyStatus::Sold);
    }

    #[test]
    fn replacing_images_drops_a_main_image_no_longer_listed() {
        let mut stored = request(r#"{"title":"x","price":1,"images":["a","b"],"mainImage":"b"}"#)
            .into_property()
            .unwrap();
        let update = request(r#"{"title":"x","price":1,"images":["a"]}"#);
        let price = update.check().unwrap();
        update.apply(&mut stored, price).unwrap();
        assert_eq!(stored.images, vec!["a".to_string()]);
        assert_eq!(stored.main_image, None);
    }
}
