//! Catalog, user and order entities as the storefront backend serves them.
//!
//! Optional columns default instead of failing, and fields that are not
//! modelled are kept in an opaque `extra` map, so a backend that grows new
//! columns never breaks decoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::params::ResourceId;

/// Catalog product. Prices are decimal strings on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ResourceId,
    pub title: String,
    #[serde(deserialize_with = "decimal_text")]
    pub price: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Numeric price, `None` when the backend sent something unparseable.
    pub fn price_value(&self) -> Option<f64> {
        self.price.trim().parse().ok()
    }
}

/// Icon family used to render a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconType {
    Material,
    Fontawesome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<IconType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: ResourceId,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ResourceId,
    pub title: String,
    #[serde(deserialize_with = "decimal_text")]
    pub price: String,
    pub quantity: u32,
    #[serde(deserialize_with = "decimal_text")]
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: ResourceId,
    pub order_number: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(deserialize_with = "decimal_text")]
    pub total_amount: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub shipping_address: String,
    pub user_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for `POST /products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductDto {
    pub title: String,
    pub price: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub manufacturer: String,
    pub expiry: String,
    pub in_stock: bool,
}

/// Body for `POST /categories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryDto {
    pub name: String,
    pub icon: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<IconType>,
}

/// Accepts `"12.50"` and `12.5` alike and keeps the textual form.
fn decimal_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(serde_json::Number),
        Text(String),
    }

    Ok(match Decimal::deserialize(deserializer)? {
        Decimal::Number(value) => value.to_string(),
        Decimal::Text(text) => text,
    })
}
