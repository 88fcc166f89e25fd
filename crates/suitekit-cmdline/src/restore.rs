//! `mongorestore` and `mongoimport` invocations
//!
//! Counterparts of dump/export used by the round-trip scenarios: a dumped
//! `.bson` file is restored into a (possibly different) database, an exported
//! `.json` file is imported into a collection.

use crate::dump::DEFAULT_PARALLEL_COLLECTIONS;
use crate::{CommandLine, Connection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub drop: bool,
    pub gzip: bool,
    pub num_parallel_collections: u32,
    pub input_path: Option<String>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            drop: false,
            gzip: false,
            num_parallel_collections: DEFAULT_PARALLEL_COLLECTIONS,
            input_path: None,
        }
    }
}

/// `mongorestore --host --port --db [--collection] [--drop] [--gzip] --numParallelCollections [--dir]`
#[must_use]
pub fn restore_command(
    connection: &Connection,
    database: &str,
    collection: Option<&str>,
    options: &RestoreOptions,
) -> String {
    CommandLine::new("mongorestore")
        .connection(connection)
        .value("--db", database)
        .value_opt("--collection", collection)
        .flag_if("--drop", options.drop)
        .flag_if("--gzip", options.gzip)
        .value(
            "--numParallelCollections",
            &options.num_parallel_collections.to_string(),
        )
        .value_opt("--dir", options.input_path.as_deref())
        .finish()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub drop: bool,
    pub import_type: Option<String>,
    pub json_array: bool,
    pub header_line: bool,
    pub input_path: Option<String>,
}

/// `mongoimport --host --port --db --collection [--drop] [--type] [--jsonArray] [--headerline] [--file]`
#[must_use]
pub fn import_command(
    connection: &Connection,
    database: &str,
    collection: &str,
    options: &ImportOptions,
) -> String {
    CommandLine::new("mongoimport")
        .connection(connection)
        .value("--db", database)
        .value("--collection", collection)
        .flag_if("--drop", options.drop)
        .value_opt("--type", options.import_type.as_deref())
        .flag_if("--jsonArray", options.json_array)
        .flag_if("--headerline", options.header_line)
        .value_opt("--file", options.input_path.as_deref())
        .finish()
}
