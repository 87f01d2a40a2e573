pub use super::catalog_records::Entity as CatalogRecords;
pub use super::categories::Entity as Categories;
pub use super::category_bindings::Entity as CategoryBindings;
pub use super::collect_runs::Entity as CollectRuns;
pub use super::collect_sources::Entity as CollectSources;
