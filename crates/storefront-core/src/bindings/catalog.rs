use std::future::Future;
use std::sync::Arc;

use crate::api_client::ApiClient;
use crate::bindings::{QueryClient, QueryObserver, QueryOptions, ResourceQueries};
use crate::cache::QueryKey;
use crate::domain::{ApiResponse, Category, CreateCategoryDto, CreateProductDto, Product, ResourceId};
use crate::error::ApiError;
use crate::services::{CategoriesService, ProductsService};

/// Cache keys for product queries. Every listing sits under
/// [`product_keys::lists`], so a product write refreshes hot and new too.
pub mod product_keys {
    use crate::cache::QueryKey;
    use crate::domain::{QueryParams, ResourceId};
    use crate::query_key;

    pub const NAME: &str = "products";

    pub fn all() -> QueryKey {
        query_key![NAME]
    }

    pub fn lists() -> QueryKey {
        query_key![NAME, "list"]
    }

    pub fn list(params: &QueryParams) -> QueryKey {
        lists().child(params)
    }

    pub fn details() -> QueryKey {
        query_key![NAME, "detail"]
    }

    pub fn detail(id: &ResourceId) -> QueryKey {
        details().child(id)
    }

    pub fn hot() -> QueryKey {
        lists().child("hot")
    }

    pub fn newest() -> QueryKey {
        lists().child("new")
    }

    pub fn by_category(category_id: &ResourceId) -> QueryKey {
        query_key![NAME, "category", category_id]
    }

    pub fn search(keyword: &str) -> QueryKey {
        query_key![NAME, "search", keyword]
    }
}

pub mod category_keys {
    use crate::cache::QueryKey;
    use crate::domain::{QueryParams, ResourceId};
    use crate::query_key;

    pub const NAME: &str = "categories";

    pub fn all() -> QueryKey {
        query_key![NAME]
    }

    pub fn lists() -> QueryKey {
        query_key![NAME, "list"]
    }

    pub fn list(params: &QueryParams) -> QueryKey {
        lists().child(params)
    }

    pub fn details() -> QueryKey {
        query_key![NAME, "detail"]
    }

    pub fn detail(id: &ResourceId) -> QueryKey {
        details().child(id)
    }

    pub fn with_product_count() -> QueryKey {
        query_key![NAME, "with-product-count"]
    }

    pub fn popular() -> QueryKey {
        query_key![NAME, "popular"]
    }
}

/// Storefront catalog bindings: product and category CRUD plus the
/// listings the home and search screens read.
#[derive(Debug, Clone)]
pub struct CatalogQueries {
    client: QueryClient,
    products: ProductsService,
    categories: CategoriesService,
}

impl CatalogQueries {
    pub fn new(api: Arc<ApiClient>, client: QueryClient) -> Self {
        Self::from_services(
            ProductsService::new(Arc::clone(&api)),
            CategoriesService::new(api),
            client,
        )
    }

    pub fn from_services(
        products: ProductsService,
        categories: CategoriesService,
        client: QueryClient,
    ) -> Self {
        Self {
            client,
            products,
            categories,
        }
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn products(&self) -> ResourceQueries<Product, CreateProductDto> {
        ResourceQueries::new(product_keys::NAME, self.products.resource().clone(), self.client.clone())
    }

    pub fn categories(&self) -> ResourceQueries<Category, CreateCategoryDto> {
        ResourceQueries::new(
            category_keys::NAME,
            self.categories.resource().clone(),
            self.client.clone(),
        )
    }

    pub fn hot_products(&self, options: QueryOptions) -> QueryObserver<Vec<Product>> {
        self.observe_products(product_keys::hot(), options, |service| async move { service.hot().await })
    }

    pub fn new_products(&self, options: QueryOptions) -> QueryObserver<Vec<Product>> {
        self.observe_products(product_keys::newest(), options, |service| async move {
            service.newest().await
        })
    }

    /// Disabled until a non-blank category id is known.
    pub fn products_by_category(
        &self,
        category_id: Option<ResourceId>,
        options: QueryOptions,
    ) -> QueryObserver<Vec<Product>> {
        let id = category_id.filter(|id| !id.is_blank());
        let enabled = options.enabled && id.is_some();
        // disabled observers still need a key to read from
        let key = product_keys::by_category(&id.clone().unwrap_or(ResourceId::Int(0)));
        self.observe_products(key, options.enabled(enabled), move |service| {
            let id = id.clone();
            async move {
                match id {
                    Some(id) => service.by_category(id).await,
                    None => Err(ApiError::unknown("category id is required")),
                }
            }
        })
    }

    /// Enabled once the keyword has at least two characters.
    pub fn search_products(&self, keyword: &str, options: QueryOptions) -> QueryObserver<Vec<Product>> {
        let enabled = options.enabled && search_enabled(keyword);
        let keyword = keyword.to_owned();
        self.observe_products(product_keys::search(&keyword), options.enabled(enabled), move |service| {
            let keyword = keyword.clone();
            async move { service.search(&keyword).await }
        })
    }

    pub fn categories_with_product_count(&self, options: QueryOptions) -> QueryObserver<Vec<Category>> {
        self.observe_categories(category_keys::with_product_count(), options, |service| async move {
            service.with_product_count().await
        })
    }

    pub fn popular_categories(&self, options: QueryOptions) -> QueryObserver<Vec<Category>> {
        self.observe_categories(category_keys::popular(), options, |service| async move {
            service.popular().await
        })
    }

    pub async fn suspense_hot_products(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        self.suspend_products(product_keys::hot(), |service| async move { service.hot().await })
            .await
    }

    pub async fn suspense_new_products(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        self.suspend_products(product_keys::newest(), |service| async move { service.newest().await })
            .await
    }

    pub async fn suspense_products_by_category(
        &self,
        category_id: ResourceId,
    ) -> Result<Arc<Vec<Product>>, ApiError> {
        if category_id.is_blank() {
            return Err(ApiError::unknown("category id is required"));
        }
        let key = product_keys::by_category(&category_id);
        self.suspend_products(key, move |service| {
            let id = category_id.clone();
            async move { service.by_category(id).await }
        })
        .await
    }

    /// Short keywords resolve to an empty list without a request.
    pub async fn suspense_search_products(&self, keyword: &str) -> Result<Arc<Vec<Product>>, ApiError> {
        if !search_enabled(keyword) {
            return Ok(Arc::new(Vec::new()));
        }
        let keyword = keyword.to_owned();
        self.suspend_products(product_keys::search(&keyword), move |service| {
            let keyword = keyword.clone();
            async move { service.search(&keyword).await }
        })
        .await
    }

    pub async fn suspense_categories_with_product_count(&self) -> Result<Arc<Vec<Category>>, ApiError> {
        self.suspend_categories(category_keys::with_product_count(), |service| async move {
            service.with_product_count().await
        })
        .await
    }

    pub async fn suspense_popular_categories(&self) -> Result<Arc<Vec<Category>>, ApiError> {
        self.suspend_categories(category_keys::popular(), |service| async move {
            service.popular().await
        })
        .await
    }

    fn observe_products<F, Fut>(&self, key: QueryKey, options: QueryOptions, fetch: F) -> QueryObserver<Vec<Product>>
    where
        F: Fn(ProductsService) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse<Vec<Product>>, ApiError>> + Send + 'static,
    {
        let service = self.products.clone();
        self.client.observe(key, options, move || fetch(service.clone()))
    }

    fn observe_categories<F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetch: F,
    ) -> QueryObserver<Vec<Category>>
    where
        F: Fn(CategoriesService) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse<Vec<Category>>, ApiError>> + Send + 'static,
    {
        let service = self.categories.clone();
        self.client.observe(key, options, move || fetch(service.clone()))
    }

    async fn suspend_products<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<Vec<Product>>, ApiError>
    where
        F: Fn(ProductsService) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse<Vec<Product>>, ApiError>> + Send + 'static,
    {
        let service = self.products.clone();
        self.client.suspend(&key, move || fetch(service.clone())).await
    }

    async fn suspend_categories<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<Vec<Category>>, ApiError>
    where
        F: Fn(CategoriesService) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse<Vec<Category>>, ApiError>> + Send + 'static,
    {
        let service = self.categories.clone();
        self.client.suspend(&key, move || fetch(service.clone())).await
    }
}

fn search_enabled(keyword: &str) -> bool {
    keyword.chars().count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::config::ClientConfig;
    use crate::domain::QueryParams;
    use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
    use crate::query_key;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct RecordingHttpClient {
        body: &'static str,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn returning(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                body,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let body = self.body;
            Box::pin(async move { Ok(HttpResponse::ok_json(body)) })
        }
    }

    fn catalog(transport: Arc<RecordingHttpClient>) -> CatalogQueries {
        let api = Arc::new(ApiClient::new(
            transport,
            &ClientConfig::default().with_base_url("https://shop.example.test"),
        ));
        CatalogQueries::new(api, QueryClient::new(QueryCache::default()))
    }

    #[test]
    fn product_keys_match_the_resource_factory() {
        let catalog = catalog(RecordingHttpClient::returning("[]"));
        let products = catalog.products();
        let params = QueryParams::new().page(2);

        assert_eq!(products.lists_key(), product_keys::lists());
        assert_eq!(products.list_key(&params), product_keys::list(&params));
        assert_eq!(products.detail_key(&ResourceId::Int(5)), product_keys::detail(&ResourceId::Int(5)));
        assert!(product_keys::hot().starts_with(&product_keys::lists()));
        assert_eq!(product_keys::by_category(&ResourceId::Int(4)), query_key!["products", "category", 4]);
        assert_eq!(category_keys::popular(), query_key!["categories", "popular"]);
    }

    #[tokio::test(start_paused = true)]
    async fn short_search_keyword_stays_disabled() {
        let transport = RecordingHttpClient::returning("[]");
        let catalog = catalog(Arc::clone(&transport));

        let observer = catalog.search_products("t", QueryOptions::default());
        assert!(!observer.is_enabled());
        let results = catalog.suspense_search_products("t").await.expect("empty");

        assert!(results.is_empty());
        assert!(transport.recorded_urls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn category_listing_waits_for_an_id() {
        let transport = RecordingHttpClient::returning("[]");
        let catalog = catalog(Arc::clone(&transport));

        assert!(!catalog.products_by_category(None, QueryOptions::default()).is_enabled());
        assert!(!catalog
            .products_by_category(Some(ResourceId::from("")), QueryOptions::default())
            .is_enabled());

        let mut observer = catalog.products_by_category(Some(ResourceId::Int(9)), QueryOptions::default());
        let state = observer.settled().await;

        assert!(state.is_success());
        assert_eq!(
            transport.recorded_urls(),
            vec![String::from("https://shop.example.test/products/category/9")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn suspending_reads_share_the_cache() {
        let transport = RecordingHttpClient::returning(
            r#"{"data":[{"id":1,"name":"Tea","icon":"leaf","type":"material","productCount":3}],"status":200}"#,
        );
        let catalog = catalog(Arc::clone(&transport));

        let first = catalog.suspense_categories_with_product_count().await.expect("categories");
        let second = catalog.suspense_categories_with_product_count().await.expect("categories");

        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            transport.recorded_urls(),
            vec![String::from("https://shop.example.test/categories/with-product-count")]
        );
    }
}
