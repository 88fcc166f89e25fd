//! Integration tests for the provisioner against launcher and shell processes

use std::sync::Arc;
use std::time::Duration;

use suitekit_core::{HarnessError, Topology};
use suitekit_fixture::{Provisioner, SystemRunner};
use suitekit_runner::Teardown;

use crate::common::{FakeTools, init_tracing, listening_port};

fn provisioner(tools: &FakeTools) -> Provisioner {
    Provisioner::with_runner(tools.config(), SystemRunner)
}

#[test]
fn test_start_seed_stop_lifecycle() {
    init_tracing();
    let tools = FakeTools::new();
    let provisioner = provisioner(&tools);
    let (_server, port) = listening_port();

    provisioner.start(port, Topology::Single).unwrap();
    let data_dir = provisioner.data_dir(port).unwrap();
    assert!(data_dir.is_dir());
    assert!(data_dir.starts_with(&tools.config().data_root));

    assert_eq!(provisioner.wait_ready(port).unwrap(), 1);
    provisioner.seed(port, "test", "users", None).unwrap();
    assert!(provisioner.stop(port));
    assert!(!data_dir.exists());

    assert_eq!(
        tools.calls(),
        vec![
            format!("launcher init --single --port {port} --dir {}", data_dir.display()),
            format!("shell --host localhost --port {port} --quiet"),
            format!("launcher kill --dir {}", data_dir.display()),
        ]
    );
    assert!(tools.eval_scripts().contains(r#"db.getSiblingDB("test")"#));
}

#[test]
fn test_cluster_start_passes_topology_arguments() {
    let tools = FakeTools::new();
    let provisioner = provisioner(&tools);
    let (_server, port) = listening_port();

    provisioner
        .start(port, Topology::cluster("--replicaset --mongos 3 --sharded 3 --hostname localhost"))
        .unwrap();
    provisioner.wait_ready(port).unwrap();

    let calls = tools.calls();
    assert!(
        calls[0].starts_with(&format!(
            "launcher init --replicaset --mongos 3 --sharded 3 --hostname localhost --port {port} --dir "
        )),
        "{calls:?}"
    );
    assert_eq!(provisioner.stop_all(), 1);
}

#[test]
fn test_unready_cluster_times_out() {
    let tools = FakeTools::new();
    let mut config = tools.config();
    config.cluster_ready_timeout = Duration::from_millis(200);
    let provisioner = Provisioner::with_runner(config, SystemRunner);
    let port = provisioner.allocate_port().unwrap();

    provisioner.start(port, Topology::cluster("--replicaset")).unwrap();
    match provisioner.wait_ready(port) {
        Err(HarnessError::Timeout { waited, .. }) => assert!(waited >= Duration::from_millis(200)),
        other => panic!("Expected Timeout error, got {other:?}"),
    }
    assert_eq!(provisioner.running_ports(), vec![port]);
    assert!(provisioner.stop(port));
}

#[test]
fn test_failed_launch_is_released_by_teardown() {
    let tools = FakeTools::new();
    tools.fail("init");
    let provisioner = Arc::new(provisioner(&tools));
    let port = provisioner.allocate_port().unwrap();
    let teardown = Teardown::new();
    {
        let provisioner = Arc::clone(&provisioner);
        teardown.push(format!("kill instance {port}"), move || {
            provisioner.stop(port);
            Ok(())
        });
    }

    match provisioner.start(port, Topology::Single) {
        Err(HarnessError::CommandFailed { code, stderr, .. }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "launcher init failed");
        }
        other => panic!("Expected CommandFailed error, got {other:?}"),
    }

    assert!(teardown.run().is_empty());
    assert!(provisioner.running_ports().is_empty());
    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].starts_with("launcher kill --dir "));
}

#[test]
fn test_teardown_continues_past_failing_kill() {
    let tools = FakeTools::new();
    let provisioner = Arc::new(provisioner(&tools));
    let (_a, first) = listening_port();
    let (_b, second) = listening_port();
    let teardown = Teardown::new();

    for port in [first, second] {
        provisioner.start(port, Topology::Single).unwrap();
        let provisioner = Arc::clone(&provisioner);
        teardown.push(format!("kill instance {port}"), move || {
            provisioner.stop(port);
            Ok(())
        });
    }
    tools.fail("kill");

    assert!(teardown.run().is_empty());
    assert!(provisioner.running_ports().is_empty());
    let kills = tools
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("launcher kill"))
        .count();
    assert_eq!(kills, 2);
}

#[test]
fn test_placeholder_seed_creates_without_inserting() {
    let tools = FakeTools::new();
    let provisioner = provisioner(&tools);
    let (_server, port) = listening_port();

    provisioner.seed(port, "restore-db", "placeholder", Some(0)).unwrap();
    provisioner.seed(port, "restore-db", "data", Some(3)).unwrap();

    let scripts = tools.eval_scripts();
    assert!(scripts.contains(r#"target.createCollection("placeholder")"#));
    assert_eq!(scripts.matches("insertMany").count(), 1);
    assert!(scripts.contains(r#""seq":2"#));
}

#[test]
fn test_missing_launcher_is_spawn_error() {
    let tools = FakeTools::new();
    let mut config = tools.config();
    config.launcher = tools.dir.path().join("no-such-launcher");
    let provisioner = Provisioner::with_runner(config, SystemRunner);
    let port = provisioner.allocate_port().unwrap();

    assert!(matches!(
        provisioner.start(port, Topology::Single),
        Err(HarnessError::Spawn { .. })
    ));
    // The half-started instance is still tracked and stopping it is harmless.
    assert!(provisioner.stop(port));
}
