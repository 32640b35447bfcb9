use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::common::entity::{text_enum, Entity, Value};

text_enum!(PropertyType {
    Apartment => "APARTMENT",
    Villa => "VILLA",
    House => "HOUSE",
    Land => "LAND",
    Commercial => "COMMERCIAL",
});

text_enum!(PropertyStatus {
    Available => "AVAILABLE",
    Sold => "SOLD",
    Reserved => "RESERVED",
    Pending => "PENDING",
});

/// Upper bound on `images` for one property.
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    pub location: Option<String>,
    pub address: Option<String>,
    pub price: Decimal,
    pub size: Option<f64>,
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,
    pub property_type: Option<PropertyType>,
    pub status: PropertyStatus,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floors: Option<i32>,
    pub year_built: Option<i32>,
    pub features: Option<String>,
    /// Ordered public URLs; `main_image`, when set, is one of them.
    #[validate(length(max = 10, message = "A property can hold at most 10 images"))]
    pub images: Vec<String>,
    pub main_image: Option<String>,
    pub owner_id: Option<i64>,
    pub category_id: Option<i64>,
}

impl Entity for Property {
    const TABLE: &'static str = "properties";
    const NAME: &'static str = "Property";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "location",
        "address",
        "price",
        "size",
        "description",
        "property_type",
        "status",
        "bedrooms",
        "bathrooms",
        "floors",
        "year_built",
        "features",
        "images",
        "main_image",
        "owner_id",
        "category_id",
    ];

    fn values(&self) -> Vec<Value> {
        vec![
            self.title.clone().into(),
            self.location.clone().into(),
            self.address.clone().into(),
            self.price.into(),
            self.size.into(),
            self.description.clone().into(),
            self.property_type.into(),
            self.status.into(),
            self.bedrooms.into(),
            self.bathrooms.into(),
            self.floors.into(),
            self.year_built.into(),
            self.features.clone().into(),
            self.images.clone().into(),
            self.main_image.clone().into(),
            self.owner_id.into(),
            self.category_id.into(),
        ]
    }
}
