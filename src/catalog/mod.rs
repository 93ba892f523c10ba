pub mod catalog;
pub mod schema;
pub mod value;

pub use catalog::{Catalog, CatalogError, IndexInfo, TableInfo};
pub use schema::{Column, DataType, Schema, SchemaRef};
pub use value::Value;
