use storefront_core::{CatalogQueries, ResourceId};

use crate::cli::ProductsCommand;
use crate::error::CliError;

use super::{list_params, CommandOutput};

pub async fn run(command: &ProductsCommand, catalog: &CatalogQueries) -> Result<CommandOutput, CliError> {
    match command {
        ProductsCommand::List(args) => {
            let products = catalog.products().suspense_list(list_params(args)).await?;
            CommandOutput::new("products list", products.as_slice())
        }
        ProductsCommand::Get(args) => {
            let product = catalog.products().suspense_detail(parse_id(&args.id)).await?;
            CommandOutput::new("products get", &*product)
        }
        ProductsCommand::Hot => {
            let products = catalog.suspense_hot_products().await?;
            CommandOutput::new("products hot", products.as_slice())
        }
        ProductsCommand::New => {
            let products = catalog.suspense_new_products().await?;
            CommandOutput::new("products new", products.as_slice())
        }
        ProductsCommand::Search(args) => {
            let products = catalog.suspense_search_products(&args.keyword).await?;
            CommandOutput::new("products search", products.as_slice())
        }
        ProductsCommand::ByCategory(args) => {
            let products = catalog
                .suspense_products_by_category(parse_id(&args.id))
                .await?;
            CommandOutput::new("products by-category", products.as_slice())
        }
    }
}

/// Digits become numeric ids; anything else is sent as given.
pub(crate) fn parse_id(raw: &str) -> ResourceId {
    raw.trim()
        .parse::<i64>()
        .map(ResourceId::Int)
        .unwrap_or_else(|_| ResourceId::Str(raw.trim().to_owned()))
}
