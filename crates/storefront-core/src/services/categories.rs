use std::ops::Deref;
use std::sync::Arc;

use crate::api_client::ApiClient;
use crate::domain::{ApiResponse, Category, CreateCategoryDto};
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::services::ResourceService;

pub type CategoryResource = ResourceService<Category, CreateCategoryDto>;

#[derive(Debug, Clone)]
pub struct CategoriesService {
    resource: CategoryResource,
}

impl CategoriesService {
    pub const ENDPOINT: &'static str = "/categories";

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

    pub fn resource(&self) -> &CategoryResource {
        &self.resource
    }

    /// Categories annotated with `productCount`.
    pub async fn with_product_count(&self) -> Result<ApiResponse<Vec<Category>>, ApiError> {
        self.resource.custom_get("with-product-count", None).await
    }

    pub async fn popular(&self) -> Result<ApiResponse<Vec<Category>>, ApiError> {
        self.resource.custom_get("popular", None).await
    }
}

impl Deref for CategoriesService {
    type Target = CategoryResource;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}
