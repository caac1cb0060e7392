//! # Storefront Core
//!
//! Client-side data access for the storefront app: typed REST resources
//! behind a retrying HTTP client, a keyed query cache with request
//! deduplication, and bindings that adapt the cache to observable and
//! suspending UI reads.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api_client`] | Configured entry point: base URL, headers, timeout, interceptors |
//! | [`bindings`] | Observable and suspending reads, mutations, catalog keys |
//! | [`cache`] | Query cache keyed by [`QueryKey`] |
//! | [`config`] | [`ClientConfig`] and environment resolution |
//! | [`domain`] | Wire envelopes, query params and catalog models |
//! | [`error`] | [`ApiError`] taxonomy and the error normalizer |
//! | [`http_client`] | Transport trait and the reqwest implementation |
//! | [`retry`] | Backoff and the retrying executor for reads |
//! | [`services`] | CRUD resource services and the catalog services |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_core::{
//!     ApiClient, CatalogQueries, ClientConfig, QueryCache, QueryCacheConfig, QueryClient,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let api = Arc::new(ApiClient::from_config(&config));
//!     let cache = QueryCache::new(QueryCacheConfig::from_client_config(&config));
//!     let catalog = CatalogQueries::new(api, QueryClient::new(cache));
//!
//!     let hot = catalog.suspense_hot_products().await?;
//!     for product in hot.iter() {
//!         println!("{} {}", product.title, product.price);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  UI / CLI            │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │  Bindings            │────▶│  Query Cache     │
//! │  (observe / suspend) │     │  (dedup, stale,  │
//! └──────────┬───────────┘     │   invalidate, gc)│
//!            │                 └──────────────────┘
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │  Resource Services   │────▶│  Retry Executor  │
//! └──────────┬───────────┘     └──────────────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │  ApiClient           │────▶│  HttpClient      │
//! │  (interceptors)      │     │  (reqwest)       │
//! └──────────┬───────────┘     └──────────────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  Error Normalizer    │
//! └──────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Every failure that leaves a service is an [`ApiError`]:
//!
//! ```rust
//! use storefront_core::{ApiError, ApiErrorKind};
//!
//! fn describe(error: &ApiError) -> &str {
//!     match error.kind {
//!         ApiErrorKind::Timeout | ApiErrorKind::NetworkUnreachable => "retry later",
//!         ApiErrorKind::ClientError => error.friendly_message(),
//!         ApiErrorKind::ServerError | ApiErrorKind::Unknown => "something went wrong",
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod api_client;
pub mod bindings;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod services;

// Entry point
pub use api_client::{
    ApiClient, AuthInterceptor, RawResponse, RequestInterceptor, RequestOptions, TokenSource,
};

// Bindings
pub use bindings::{
    category_keys, product_keys, CatalogQueries, Mutation, MutationOptions, MutationStatus,
    Notifier, QueryClient, QueryObserver, QueryOptions, QueryState, ResourceQueries, Suspense,
    TracingNotifier,
};

// Caching
pub use cache::{CacheSnapshot, KeyPart, QueryCache, QueryCacheConfig, QueryKey, QueryStatus, Subscription};

// Configuration
pub use config::{ClientConfig, Environment};

// Domain models
pub use domain::{
    ApiResponse, Category, CreateCategoryDto, CreateProductDto, IconType, Order, OrderItem,
    OrderStatus, PageMeta, PaginatedResponse, ParamValue, Product, QueryOutput, QueryParams,
    ResourceId, SortOrder, User, UserRole,
};

// Errors
pub use error::{friendly_message, normalize, ApiError, ApiErrorKind, ConfigError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Services
pub use services::{CategoriesService, CategoryResource, ProductResource, ProductsService, ResourceService};
