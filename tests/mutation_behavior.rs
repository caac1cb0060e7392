//! Behavior tests for mutations: what becomes stale after a write and what
//! the user is told.

mod support;

use std::sync::{Arc, Mutex};

use storefront_core::{
    ApiError, CatalogQueries, CreateProductDto, HttpMethod, MutationStatus, Notifier,
    QueryCache, QueryClient, QueryOptions, QueryParams, QueryStatus, ResourceId,
};
use support::{api, json, ScriptedHttpClient};

const ONE_PRODUCT: &str = r#"[{"id":1,"title":"Oolong","price":"12"}]"#;
const TWO_PRODUCTS: &str =
    r#"[{"id":1,"title":"Oolong","price":"12"},{"id":2,"title":"Sencha","price":"18"}]"#;
const CREATED: &str = r#"{"id":2,"title":"Sencha","price":"18"}"#;

#[derive(Debug, Default, Clone)]
struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("notifier store should not be poisoned")
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.messages
            .lock()
            .expect("notifier store should not be poisoned")
            .push(format!("success: {message}"));
    }

    fn error(&self, error: &ApiError) {
        self.messages
            .lock()
            .expect("notifier store should not be poisoned")
            .push(format!("error: {}", error.friendly_message()));
    }
}

fn catalog(transport: Arc<ScriptedHttpClient>, notifier: &RecordingNotifier) -> (CatalogQueries, QueryCache) {
    let cache = QueryCache::default();
    let client = QueryClient::new(cache.clone()).with_notifier(notifier.clone());
    (CatalogQueries::new(api(transport), client), cache)
}

fn dto(title: &str, price: &str) -> CreateProductDto {
    CreateProductDto {
        title: title.to_owned(),
        price: price.to_owned(),
        image: String::from("https://cdn.example.test/tea.png"),
        description: None,
        category: None,
        tags: Vec::new(),
        manufacturer: String::from("Hangzhou Tea Co."),
        expiry: String::from("2027-01-01"),
        in_stock: true,
    }
}

fn sencha() -> CreateProductDto {
    dto("Sencha", "18")
}

#[tokio::test(start_paused = true)]
async fn when_a_product_is_created_cached_lists_are_refetched() {
    // Given: a cached product list
    let transport = ScriptedHttpClient::new([
        json(200, ONE_PRODUCT),
        json(201, CREATED),
        json(200, TWO_PRODUCTS),
    ]);
    let notifier = RecordingNotifier::default();
    let (catalog, cache) = catalog(transport.clone(), &notifier);
    let products = catalog.products();
    let params = QueryParams::new();
    assert_eq!(products.suspense_list(params.clone()).await.expect("list").len(), 1);

    // When: a product is created
    let create = products.create();
    let created = create.mutate(sencha()).await.expect("create");

    // Then: the list key is no longer fresh and the next read hits the backend
    assert_eq!(created.id, ResourceId::Int(2));
    assert_eq!(create.status(), MutationStatus::Success);
    assert!(cache.read::<Vec<storefront_core::Product>>(&products.list_key(&params)).data.is_none());
    assert_eq!(products.suspense_list(params).await.expect("list").len(), 2);
    assert_eq!(transport.count(HttpMethod::Get), 2);
    assert_eq!(transport.count(HttpMethod::Post), 1);
    assert_eq!(notifier.messages(), vec![String::from("success: created successfully")]);
}

#[tokio::test(start_paused = true)]
async fn when_a_product_is_created_active_observers_refresh_themselves() {
    // Given: a screen observing the first page
    let transport = ScriptedHttpClient::new([
        json(200, ONE_PRODUCT),
        json(201, CREATED),
        json(200, TWO_PRODUCTS),
    ]);
    let notifier = RecordingNotifier::default();
    let (catalog, _cache) = catalog(transport.clone(), &notifier);
    let products = catalog.products();
    let mut observer = products.list(QueryParams::new(), QueryOptions::default());
    assert_eq!(observer.settled().await.data.map(|list| list.len()), Some(1));

    // When: a product is created elsewhere
    products.create().mutate(sencha()).await.expect("create");

    // Then: the observer sees the new list without asking
    let state = observer.settled().await;
    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(state.data.map(|list| list.len()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn when_a_create_fails_the_cached_list_survives() {
    // Given: a cached list and a backend that rejects the write
    let transport = ScriptedHttpClient::new([
        json(200, ONE_PRODUCT),
        json(422, r#"{"message":"title is required"}"#),
    ]);
    let notifier = RecordingNotifier::default();
    let (catalog, cache) = catalog(transport.clone(), &notifier);
    let products = catalog.products();
    let params = QueryParams::new();
    products.suspense_list(params.clone()).await.expect("list");

    // When: the create is rejected
    let create = products.create();
    let error = create.mutate(sencha()).await.expect_err("422");

    // Then: the user sees the validation message and nothing was invalidated
    assert_eq!(error.status, 422);
    assert_eq!(create.status(), MutationStatus::Error);
    let snapshot = cache.read::<Vec<storefront_core::Product>>(&products.list_key(&params));
    assert_eq!(snapshot.data.map(|list| list.len()), Some(1));
    assert!(!snapshot.is_stale);
    assert_eq!(
        notifier.messages(),
        vec![String::from("error: the submitted data is invalid")]
    );
}

#[tokio::test(start_paused = true)]
async fn when_a_product_is_updated_its_detail_is_refetched() {
    // Given: a cached product detail
    let transport = ScriptedHttpClient::new([
        json(200, r#"{"id":1,"title":"Oolong","price":"12"}"#),
        json(200, r#"{"id":1,"title":"Oolong","price":"10"}"#),
        json(200, r#"{"id":1,"title":"Oolong","price":"10"}"#),
    ]);
    let notifier = RecordingNotifier::default();
    let (catalog, _cache) = catalog(transport.clone(), &notifier);
    let products = catalog.products();
    assert_eq!(products.suspense_detail(1).await.expect("detail").price, "12");

    // When: the price is updated
    products
        .update()
        .mutate((ResourceId::Int(1), dto("Oolong", "10")))
        .await
        .expect("update");

    // Then: the next detail read reflects the change
    assert_eq!(products.suspense_detail(1).await.expect("detail").price, "10");
    assert_eq!(transport.count(HttpMethod::Put), 1);
    assert_eq!(notifier.messages(), vec![String::from("success: updated successfully")]);
}
