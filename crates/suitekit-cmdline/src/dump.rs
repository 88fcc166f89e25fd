//! `mongodump` invocations
//!
//! Fixed flag order:
//! `--host --port [--db] [--collection] [--gzip] [--repair] [--dumpDbUsersAndRoles]
//! [--viewsAsCollections] --numParallelCollections [-q] [--readPreference]
//! [--forceTableScan] [-o]`

use suitekit_core::{HarnessError, Result};

use crate::{CommandLine, Connection};

pub const DEFAULT_PARALLEL_COLLECTIONS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpOptions {
    pub gzip: bool,
    pub repair: bool,
    pub dump_db_users_and_roles: bool,
    pub views_as_collections: bool,
    pub num_parallel_collections: u32,
    pub query: Option<String>,
    pub read_preference: Option<String>,
    pub force_table_scan: bool,
    pub output_path: Option<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            gzip: false,
            repair: false,
            dump_db_users_and_roles: false,
            views_as_collections: false,
            num_parallel_collections: DEFAULT_PARALLEL_COLLECTIONS,
            query: None,
            read_preference: None,
            force_table_scan: false,
            output_path: None,
        }
    }
}

/// What a dump covers; multi-target variants expand to one command per entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    /// Every database on the server
    Server,
    Database(String),
    /// A dump started from one collection; scoped to its database, so no `--collection`
    Collection {
        database: String,
        collection: String,
    },
    Databases(Vec<String>),
    Collections {
        database: String,
        collections: Vec<String>,
    },
}

/// Render the dump commands for `target`, preserving selection order
///
/// # Errors
///
/// Returns `HarnessError::InvalidArgument` for an empty database or collection selection
pub fn dump_commands(
    connection: &Connection,
    target: &DumpTarget,
    options: &DumpOptions,
) -> Result<Vec<String>> {
    match target {
        DumpTarget::Server => Ok(vec![render(connection, None, None, options)]),
        DumpTarget::Database(database) => {
            Ok(vec![render(connection, Some(database.as_str()), None, options)])
        }
        DumpTarget::Collection { database, .. } => {
            Ok(vec![render(connection, Some(database.as_str()), None, options)])
        }
        DumpTarget::Databases(databases) => {
            if databases.is_empty() {
                return Err(HarnessError::InvalidArgument(
                    "dump needs at least one selected database".to_string(),
                ));
            }
            Ok(databases
                .iter()
                .map(|database| render(connection, Some(database.as_str()), None, options))
                .collect())
        }
        DumpTarget::Collections {
            database,
            collections,
        } => {
            if collections.is_empty() {
                return Err(HarnessError::InvalidArgument(format!(
                    "dump of {database} needs at least one selected collection"
                )));
            }
            Ok(collections
                .iter()
                .map(|collection| {
                    render(connection, Some(database.as_str()), Some(collection.as_str()), options)
                })
                .collect())
        }
    }
}

fn render(
    connection: &Connection,
    database: Option<&str>,
    collection: Option<&str>,
    options: &DumpOptions,
) -> String {
    CommandLine::new("mongodump")
        .connection(connection)
        .value_opt("--db", database)
        .value_opt("--collection", collection)
        .flag_if("--gzip", options.gzip)
        .flag_if("--repair", options.repair)
        .flag_if("--dumpDbUsersAndRoles", options.dump_db_users_and_roles)
        .flag_if("--viewsAsCollections", options.views_as_collections)
        .value(
            "--numParallelCollections",
            &options.num_parallel_collections.to_string(),
        )
        .value_opt("-q", options.query.as_deref())
        .value_opt("--readPreference", options.read_preference.as_deref())
        .flag_if("--forceTableScan", options.force_table_scan)
        .value_opt("-o", options.output_path.as_deref())
        .finish()
}
