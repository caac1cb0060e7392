use std::ops::Deref;
use std::sync::Arc;

use crate::api_client::ApiClient;
use crate::domain::{ApiResponse, CreateProductDto, Product, QueryParams, ResourceId};
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::services::ResourceService;

pub type ProductResource = ResourceService<Product, CreateProductDto>;

/// `/products` plus the catalog listings that sit beside the CRUD routes.
#[derive(Debug, Clone)]
pub struct ProductsService {
    resource: ProductResource,
}

impl ProductsService {
    pub const ENDPOINT: &'static str = "/products";

    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            resource: ResourceService::new(client, Self::ENDPOINT),
        }
    }

    pub fn with_retry(self, retry: RetryPolicy) -> Self {
        Self {
            resource: self.resource.with_retry(retry),
        }
    }

    pub fn resource(&self) -> &ProductResource {
        &self.resource
    }

    pub async fn by_category(
        &self,
        category_id: impl Into<ResourceId>,
    ) -> Result<ApiResponse<Vec<Product>>, ApiError> {
        let subpath = format!("category/{}", category_id.into());
        self.resource.custom_get(&subpath, None).await
    }

    pub async fn hot(&self) -> Result<ApiResponse<Vec<Product>>, ApiError> {
        self.resource.custom_get("hot", None).await
    }

    pub async fn newest(&self) -> Result<ApiResponse<Vec<Product>>, ApiError> {
        self.resource.custom_get("new", None).await
    }

    pub async fn search(&self, keyword: &str) -> Result<ApiResponse<Vec<Product>>, ApiError> {
        let params = QueryParams::new().with("keyword", keyword);
        self.resource.custom_get("search", Some(params)).await
    }
}

impl Deref for ProductsService {
    type Target = ProductResource;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}
