//! # Domain Types
//!
//! Wire-level types shared by the resource services and the bindings.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ApiResponse`] | Payload plus envelope status metadata |
//! | [`PaginatedResponse`] | One page of entities with [`PageMeta`] |
//! | [`QueryParams`] | Ordered, hashable query-string parameters |
//! | [`ResourceId`] | Numeric or string entity id |
//! | [`Product`], [`Category`] | Catalog entities |
//! | [`User`], [`Order`], [`OrderItem`] | Account and order entities |

mod models;
mod params;
mod response;

pub use models::{
    Category, CreateCategoryDto, CreateProductDto, IconType, Order, OrderItem, OrderStatus,
    Product, User, UserRole,
};
pub use params::{ParamValue, QueryParams, ResourceId, SortOrder};
pub use response::{ApiResponse, PageMeta, PaginatedResponse, QueryOutput};

pub(crate) use response::decode;
