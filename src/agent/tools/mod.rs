pub mod csv_to_json;
pub mod export_result;
pub mod postgres_query;
pub mod schema_alias;
pub mod sql_generator;

pub use csv_to_json::CsvToJsonAgent;
pub use export_result::ExportResultAgent;
pub use postgres_query::PostgresQueryAgent;
pub use schema_alias::SchemaAliasContextAgent;
pub use sql_generator::SqlGeneratorAgent;
