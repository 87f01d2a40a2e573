pub mod prelude;

pub mod catalog_records;
pub mod categories;
pub mod category_bindings;
pub mod collect_runs;
pub mod collect_sources;
