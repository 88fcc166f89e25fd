//! suitekit CLI
//!
//! Renders dump/export command lines and drives fixture instances from a shell.

mod commands;
mod logging;

use clap::{Arg, ArgAction, Command, value_parser};
use std::process;

const DEFAULT_LOG_LEVEL: &str = "warn";

fn connection_args() -> [Arg; 3] {
    [
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .help("Server port")
            .required(true)
            .value_parser(value_parser!(u16)),
        Arg::new("host")
            .long("host")
            .value_name("HOST")
            .help("Server host")
            .default_value("localhost")
            .conflicts_with("remote"),
        Arg::new("remote")
            .long("remote")
            .help("Use the cluster host from EC2_SHARD_CLUSTER_HOSTNAME")
            .action(ArgAction::SetTrue),
    ]
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

fn option(name: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).value_name(value_name).help(help)
}

pub(crate) fn build_cli() -> Command {
    Command::new("suitekit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fixture lifecycle tooling for database GUI end-to-end suites")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log filter used when RUST_LOG is unset")
                .default_value(DEFAULT_LOG_LEVEL)
                .global(true),
        )
        .arg(option("launcher", "PATH", "Topology launcher (overrides SUITEKIT_LAUNCHER)").global(true))
        .arg(option("shell", "PATH", "Database shell (overrides SUITEKIT_SHELL)").global(true))
        .subcommand(
            Command::new("dump")
                .about("Print mongodump command lines, one per selected target")
                .args(connection_args())
                .arg(option("db", "DB", "Database to dump; repeat for several").action(ArgAction::Append))
                .arg(
                    option("collection", "COLLECTION", "Collection of the single --db; repeatable")
                        .action(ArgAction::Append)
                        .requires("db"),
                )
                .arg(flag("gzip", "Compress output"))
                .arg(flag("repair", "Attempt to recover documents from damaged data files"))
                .arg(flag("users-and-roles", "Include user and role definitions"))
                .arg(flag("views-as-collections", "Dump views as collections"))
                .arg(
                    option("parallel", "N", "Collections dumped in parallel")
                        .value_parser(value_parser!(u32)),
                )
                .arg(option("query", "JSON", "Query filter"))
                .arg(option("read-preference", "PREF", "Read preference"))
                .arg(flag("force-table-scan", "Force a table scan"))
                .arg(option("out", "PATH", "Output directory")),
        )
        .subcommand(
            Command::new("export")
                .about("Print mongoexport command lines, one per collection")
                .args(connection_args())
                .arg(option("db", "DB", "Database to export from").required(true))
                .arg(
                    option("collection", "COLLECTION", "Collection to export; repeatable")
                        .required(true)
                        .action(ArgAction::Append),
                )
                .arg(flag("pretty", "Pretty-print JSON"))
                .arg(flag("json-array", "Write a single JSON array"))
                .arg(flag("no-header-line", "Omit the CSV header line"))
                .arg(option("type", "TYPE", "json or csv"))
                .arg(option("fields", "FIELDS", "Comma separated field list"))
                .arg(option("query", "JSON", "Query filter"))
                .arg(option("read-preference", "PREF", "Read preference"))
                .arg(flag("force-table-scan", "Force a table scan"))
                .arg(option("skip", "N", "Documents to skip").value_parser(value_parser!(u64)))
                .arg(option("limit", "N", "Maximum documents").value_parser(value_parser!(u64)))
                .arg(option("sort", "JSON", "Sort order"))
                .arg(flag("assert-exists", "Fail when the collection does not exist"))
                .arg(option("out", "DIR", "Output directory")),
        )
        .subcommand(
            Command::new("up")
                .about("Start a fixture instance and keep it until Ctrl-C")
                .arg(
                    option("port", "PORT", "Port to bind; allocated when omitted")
                        .value_parser(value_parser!(u16)),
                )
                .arg(option("cluster", "ARGS", "Launcher arguments for a cluster topology")),
        )
        .subcommand(
            Command::new("seed")
                .about("Insert synthetic documents into a collection")
                .arg(
                    option("port", "PORT", "Instance port")
                        .required(true)
                        .value_parser(value_parser!(u16)),
                )
                .arg(option("db", "DB", "Target database").required(true))
                .arg(option("collection", "COLLECTION", "Target collection").required(true))
                .arg(
                    option("count", "N", "Number of documents; 0 only creates the collection")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("port").about("Print a currently free local port"))
}

fn main() {
    let matches = build_cli().get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map_or(DEFAULT_LOG_LEVEL, String::as_str);
    logging::init(log_level);

    match commands::execute(&matches) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(e) => {
            eprintln!("suitekit: {e:#}");
            process::exit(1);
        }
    }
}
