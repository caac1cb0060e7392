//! Resource services: typed, stateless facades over REST resources.

mod categories;
mod products;
mod resource;

pub use categories::{CategoriesService, CategoryResource};
pub use products::{ProductResource, ProductsService};
pub use resource::ResourceService;
