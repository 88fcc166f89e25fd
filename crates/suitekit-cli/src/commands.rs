use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use suitekit_cmdline::{Connection, DumpOptions, DumpTarget, ExportOptions, dump_commands, export_commands};
use suitekit_core::{HarnessConfig, Platform, Port, Topology};
use suitekit_fixture::Provisioner;
use suitekit_runner::{InterruptGuard, Teardown};

/// Run the selected subcommand and return the lines it prints
pub fn execute(matches: &ArgMatches) -> Result<Vec<String>> {
    let config = load_config(matches)?;
    match matches.subcommand() {
        Some(("dump", sub)) => dump(sub, &config),
        Some(("export", sub)) => export(sub, &config),
        Some(("up", sub)) => up(sub, config),
        Some(("seed", sub)) => seed(sub, config),
        Some(("port", _)) => Ok(vec![Port::allocate()?.to_string()]),
        Some((other, _)) => bail!("unknown subcommand {other}"),
        None => bail!("no subcommand given"),
    }
}

fn load_config(matches: &ArgMatches) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::from_env().context("reading configuration from environment")?;
    if let Some(launcher) = matches.get_one::<String>("launcher") {
        config.launcher = PathBuf::from(launcher);
    }
    if let Some(shell) = matches.get_one::<String>("shell") {
        config.shell = PathBuf::from(shell);
    }
    Ok(config)
}

fn connection(matches: &ArgMatches, config: &HarnessConfig) -> Result<Connection> {
    let port = Port::new(*matches.get_one::<u16>("port").context("--port is required")?);
    if matches.get_flag("remote") {
        let host = config
            .cluster_host
            .clone()
            .context("--remote needs EC2_SHARD_CLUSTER_HOSTNAME to be set")?;
        return Ok(Connection::new(host, port));
    }
    let host = matches.get_one::<String>("host").map_or("localhost", String::as_str);
    Ok(Connection::new(host, port))
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn dump_target(databases: Vec<String>, collections: Vec<String>) -> Result<DumpTarget> {
    Ok(match (databases.len(), collections.is_empty()) {
        (0, _) => DumpTarget::Server,
        (1, true) => DumpTarget::Database(databases.into_iter().next().unwrap_or_default()),
        (1, false) => DumpTarget::Collections {
            database: databases.into_iter().next().unwrap_or_default(),
            collections,
        },
        (_, true) => DumpTarget::Databases(databases),
        (_, false) => bail!("--collection can only be combined with a single --db"),
    })
}

fn dump(matches: &ArgMatches, config: &HarnessConfig) -> Result<Vec<String>> {
    let connection = connection(matches, config)?;
    let target = dump_target(strings(matches, "db"), strings(matches, "collection"))?;
    let mut options = DumpOptions {
        gzip: matches.get_flag("gzip"),
        repair: matches.get_flag("repair"),
        dump_db_users_and_roles: matches.get_flag("users-and-roles"),
        views_as_collections: matches.get_flag("views-as-collections"),
        query: matches.get_one::<String>("query").cloned(),
        read_preference: matches.get_one::<String>("read-preference").cloned(),
        force_table_scan: matches.get_flag("force-table-scan"),
        output_path: matches.get_one::<String>("out").cloned(),
        ..DumpOptions::default()
    };
    if let Some(parallel) = matches.get_one::<u32>("parallel") {
        options.num_parallel_collections = *parallel;
    }
    Ok(dump_commands(&connection, &target, &options)?)
}

fn export(matches: &ArgMatches, config: &HarnessConfig) -> Result<Vec<String>> {
    let connection = connection(matches, config)?;
    let database = matches.get_one::<String>("db").context("--db is required")?;
    let collections = strings(matches, "collection");
    let options = ExportOptions {
        pretty: matches.get_flag("pretty"),
        json_array: matches.get_flag("json-array"),
        no_header_line: matches.get_flag("no-header-line"),
        export_type: matches.get_one::<String>("type").cloned(),
        fields: matches.get_one::<String>("fields").cloned(),
        query: matches.get_one::<String>("query").cloned(),
        read_preference: matches.get_one::<String>("read-preference").cloned(),
        force_table_scan: matches.get_flag("force-table-scan"),
        skip: matches.get_one::<u64>("skip").copied(),
        limit: matches.get_one::<u64>("limit").copied(),
        sort: matches.get_one::<String>("sort").cloned(),
        assert_exists: matches.get_flag("assert-exists"),
        output_dir: matches.get_one::<String>("out").cloned(),
    };
    Ok(export_commands(&connection, database, &collections, &options, Platform::host())?)
}

fn up(matches: &ArgMatches, config: HarnessConfig) -> Result<Vec<String>> {
    let provisioner = Arc::new(Provisioner::new(config));
    let port = match matches.get_one::<u16>("port") {
        Some(port) => Port::new(*port),
        None => provisioner.allocate_port()?,
    };
    let topology = matches
        .get_one::<String>("cluster")
        .map_or(Topology::Single, |args| Topology::cluster(args.as_str()));

    let teardown = Teardown::new();
    let _guard = InterruptGuard::install(&teardown)?;
    {
        let provisioner = Arc::clone(&provisioner);
        teardown.push(format!("stop instance {port}"), move || {
            provisioner.stop(port);
            Ok(())
        });
    }

    let started = provisioner
        .start(port, topology)
        .and_then(|()| provisioner.wait_ready(port));
    if let Err(e) = started {
        teardown.run();
        return Err(e).with_context(|| format!("starting fixture instance on port {port}"));
    }

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{port}")?;
    stdout.flush()?;
    tracing::info!(%port, "fixture instance ready, press Ctrl-C to stop");
    // The interrupt hook tears down and exits the process.
    loop {
        thread::park();
    }
}

fn seed(matches: &ArgMatches, config: HarnessConfig) -> Result<Vec<String>> {
    let port = Port::new(*matches.get_one::<u16>("port").context("--port is required")?);
    let database = matches.get_one::<String>("db").context("--db is required")?;
    let collection = matches.get_one::<String>("collection").context("--collection is required")?;
    let count = matches.get_one::<usize>("count").copied();

    Provisioner::new(config).seed(port, database, collection, count)?;
    Ok(Vec::new())
}
