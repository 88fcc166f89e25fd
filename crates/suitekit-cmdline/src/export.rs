//! `mongoexport` invocations
//!
//! Exports always address one collection at a time; exporting a database or a
//! multi-collection selection renders one command per collection, with the
//! output file named `<dir><sep><collection>.json` using the host separator.

use suitekit_core::{HarnessError, Platform, Result};

use crate::{CommandLine, Connection};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub pretty: bool,
    pub json_array: bool,
    pub no_header_line: bool,
    /// `json` or `csv`
    pub export_type: Option<String>,
    pub fields: Option<String>,
    pub query: Option<String>,
    pub read_preference: Option<String>,
    pub force_table_scan: bool,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<String>,
    pub assert_exists: bool,
    pub output_dir: Option<String>,
}

/// Render one export command per collection, preserving selection order
///
/// # Errors
///
/// Returns `HarnessError::InvalidArgument` if no collection is selected
pub fn export_commands<S: AsRef<str>>(
    connection: &Connection,
    database: &str,
    collections: &[S],
    options: &ExportOptions,
    platform: Platform,
) -> Result<Vec<String>> {
    if collections.is_empty() {
        return Err(HarnessError::InvalidArgument(format!(
            "export of {database} needs at least one selected collection"
        )));
    }
    Ok(collections
        .iter()
        .map(|collection| render(connection, database, collection.as_ref(), options, platform))
        .collect())
}

/// Output file for one collection
#[must_use]
pub fn output_file(dir: &str, collection: &str, platform: Platform) -> String {
    format!("{dir}{}{collection}.json", platform.separator())
}

fn render(
    connection: &Connection,
    database: &str,
    collection: &str,
    options: &ExportOptions,
    platform: Platform,
) -> String {
    let output = options
        .output_dir
        .as_deref()
        .filter(|dir| !dir.is_empty())
        .map(|dir| output_file(dir, collection, platform));

    CommandLine::new("mongoexport")
        .connection(connection)
        .value("--db", database)
        .value("--collection", collection)
        .flag_if("--pretty", options.pretty)
        .flag_if("--jsonArray", options.json_array)
        .flag_if("--noHeaderLine", options.no_header_line)
        .value_opt("--type", options.export_type.as_deref())
        .value_opt("--fields", options.fields.as_deref())
        .value_opt("-q", options.query.as_deref())
        .value_opt("--readPreference", options.read_preference.as_deref())
        .flag_if("--forceTableScan", options.force_table_scan)
        .number_opt("--skip", options.skip)
        .number_opt("--limit", options.limit)
        .value_opt("--sort", options.sort.as_deref())
        .flag_if("--assertExists", options.assert_exists)
        .value_opt("-o", output.as_deref())
        .finish()
}
