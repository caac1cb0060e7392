use storefront_core::CatalogQueries;

use crate::cli::CategoriesCommand;
use crate::error::CliError;

use super::{list_params, CommandOutput};

pub async fn run(command: &CategoriesCommand, catalog: &CatalogQueries) -> Result<CommandOutput, CliError> {
    let (name, categories) = match command {
        CategoriesCommand::List(args) => (
            "categories list",
            catalog.categories().suspense_list(list_params(args)).await?,
        ),
        CategoriesCommand::Popular => ("categories popular", catalog.suspense_popular_categories().await?),
        CategoriesCommand::WithCount => (
            "categories with-count",
            catalog.suspense_categories_with_product_count().await?,
        ),
    };
    CommandOutput::new(name, categories.as_slice())
}
