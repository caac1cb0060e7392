//! CLI argument definitions for the storefront client.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `products list` | List products, optionally paged or filtered |
//! | `products get` | Fetch one product by id |
//! | `products hot` | Hot products |
//! | `products new` | Newest products |
//! | `products search` | Search products by keyword |
//! | `products by-category` | Products in one category |
//! | `categories list` | All categories |
//! | `categories popular` | Popular categories |
//! | `categories with-count` | Categories with their product counts |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `-v` | warn | Log verbosity (`-v` info, `-vv` debug) |
//! | `--base-url` | by environment | API base URL |
//! | `--timeout-ms` | `10000` | Request timeout in ms |
//! | `--max-retries` | `3` | Retries for failed reads |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! storefront products hot --pretty
//! storefront products list --page 2 --per-page 20
//! storefront -v categories with-count
//! ```

use clap::{Args, Parser, Subcommand};

/// Storefront catalog client.
///
/// Reads products and categories through the same cached, retrying data
/// layer the app uses and prints the JSON payload.
#[derive(Debug, Parser)]
#[command(name = "storefront", author, version, about = "Storefront catalog client")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). Logs go to stderr.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// API base URL. Overrides STOREFRONT_BASE_URL.
    #[arg(long, global = true, env = "STOREFRONT_BASE_URL")]
    pub base_url: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Retries for failed reads. Writes are never retried.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Product listings and lookups.
    #[command(subcommand)]
    Products(ProductsCommand),

    /// Category listings.
    #[command(subcommand)]
    Categories(CategoriesCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProductsCommand {
    /// List products.
    ///
    /// # Examples
    ///
    ///   storefront products list
    ///   storefront products list --page 2 --per-page 20 --search tea
    List(ListArgs),

    /// Fetch one product by id.
    Get(GetArgs),

    /// Hot products.
    Hot,

    /// Newest products.
    New,

    /// Search products. Keywords shorter than two characters return nothing.
    Search(SearchArgs),

    /// Products in one category.
    ByCategory(GetArgs),
}

#[derive(Debug, Subcommand)]
pub enum CategoriesCommand {
    /// All categories.
    List(ListArgs),

    /// Popular categories.
    Popular,

    /// Categories with their product counts.
    WithCount,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Page number (1-based).
    #[arg(long)]
    pub page: Option<u32>,

    /// Page size.
    #[arg(long)]
    pub per_page: Option<u32>,

    /// Free-text filter.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Numeric or string id.
    pub id: String,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub keyword: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "storefront",
            "products",
            "list",
            "--page",
            "2",
            "-vv",
            "--pretty",
            "--max-retries",
            "0",
        ])
        .expect("valid arguments");

        assert_eq!(cli.verbose, 2);
        assert!(cli.pretty);
        assert_eq!(cli.max_retries, Some(0));
        match cli.command {
            Command::Products(ProductsCommand::List(args)) => assert_eq!(args.page, Some(2)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn by_category_requires_an_id() {
        assert!(Cli::try_parse_from(["storefront", "products", "by-category"]).is_err());
    }
}
