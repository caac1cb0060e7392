mod categories;
mod products;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use storefront_core::{
    ApiClient, CatalogQueries, CategoriesService, ClientConfig, ProductsService, QueryCache,
    QueryCacheConfig, QueryClient, QueryParams, RetryPolicy,
};

use crate::cli::{Command, ListArgs};
use crate::error::CliError;

/// JSON document printed for every successful command.
#[derive(Debug, Serialize)]
pub struct CommandOutput {
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: Value,
}

impl CommandOutput {
    pub fn new<T: Serialize + ?Sized>(command: &'static str, data: &T) -> Result<Self, CliError> {
        let data = serde_json::to_value(data)?;
        let count = data.as_array().map(Vec::len);
        Ok(Self {
            command,
            count,
            data,
        })
    }
}

pub async fn run(command: &Command, config: &ClientConfig) -> Result<CommandOutput, CliError> {
    let catalog = build_catalog(config);
    match command {
        Command::Products(command) => products::run(command, &catalog).await,
        Command::Categories(command) => categories::run(command, &catalog).await,
    }
}

/// One API client, one cache and the catalog services, built once per
/// process from configuration.
fn build_catalog(config: &ClientConfig) -> CatalogQueries {
    let api = Arc::new(ApiClient::from_config(config));
    let retry = RetryPolicy::reads(config);
    let cache = QueryCache::new(QueryCacheConfig::from_client_config(config));
    CatalogQueries::from_services(
        ProductsService::new(Arc::clone(&api)).with_retry(retry.clone()),
        CategoriesService::new(api).with_retry(retry),
        QueryClient::new(cache),
    )
}

fn list_params(args: &ListArgs) -> QueryParams {
    let mut params = QueryParams::new();
    if let Some(page) = args.page {
        params = params.page(page);
    }
    if let Some(per_page) = args.per_page {
        params = params.per_page(per_page);
    }
    if let Some(search) = &args.search {
        params = params.search(search.as_str());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_only_carry_given_flags() {
        let params = list_params(&ListArgs {
            page: Some(3),
            per_page: None,
            search: Some(String::from("green tea")),
        });

        assert_eq!(params.to_query_string(), "page=3&search=green%20tea");
    }

    #[test]
    fn output_counts_array_payloads() {
        let output = CommandOutput::new("products hot", &vec![1, 2, 3]).expect("serializable");
        assert_eq!(output.count, Some(3));

        let output = CommandOutput::new("products get", &serde_json::json!({"id": 1})).expect("serializable");
        assert_eq!(output.count, None);
    }
}
