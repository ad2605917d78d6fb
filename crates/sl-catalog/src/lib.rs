mod catalog;
mod schema;
mod template;

pub use catalog::{Catalog, Database, Schema, System, Table};
pub use schema::{Field, FieldType, FieldUsage};
pub use template::write_csv_templates;
