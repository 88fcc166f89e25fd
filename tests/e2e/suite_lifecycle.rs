//! E2E tests for complete suite lifecycles
//! Fixture instance, application under test, scenarios and teardown together

use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, ensure};
use suitekit_app::{AppHandle, AppOptions};
use suitekit_core::{HarnessConfig, Port, Topology};
use suitekit_fixture::Provisioner;
use suitekit_runner::{Outcome, Suite, SuiteConfig, SuiteMode, Teardown};

use crate::common::{FakeTools, init_tracing, listening_port};

struct Session {
    provisioner: Arc<Provisioner>,
    port: Port,
    app: Arc<AppHandle>,
    _server: TcpListener,
}

type Observed = Arc<Mutex<Option<Arc<AppHandle>>>>;

/// Provision a seeded instance and launch the application, registering both
/// releases so the application stops before its instance is killed.
fn open_session(config: HarnessConfig, teardown: &Teardown, observed: &Observed) -> anyhow::Result<Session> {
    let provisioner = Arc::new(Provisioner::new(config));
    let (server, port) = listening_port();
    {
        let provisioner = Arc::clone(&provisioner);
        teardown.push(format!("kill instance {port}"), move || {
            provisioner.stop(port);
            Ok(())
        });
    }
    provisioner.start(port, Topology::Single)?;
    provisioner.wait_ready(port)?;
    provisioner.seed(port, "restore-db", "placeholder", Some(0))?;
    provisioner.seed(port, "test", "users", Some(10))?;

    let app = Arc::new(
        AppHandle::launch(
            AppOptions::new("sh")
                .arg("-c")
                .arg("sleep 60")
                .stop_grace(Duration::from_millis(500)),
        )
        .context("launching application")?,
    );
    {
        let app = Arc::clone(&app);
        teardown.push("stop application", move || Ok(app.stop()?));
    }
    *observed.lock().unwrap() = Some(Arc::clone(&app));

    Ok(Session {
        provisioner,
        port,
        app,
        _server: server,
    })
}

fn quiet(name: &str, mode: SuiteMode) -> SuiteConfig {
    SuiteConfig::new(name, mode).handle_interrupt(false)
}

#[test]
fn test_independent_suite_full_lifecycle() {
    init_tracing();
    let tools = FakeTools::new();
    let config = tools.config();
    let observed = Observed::default();
    let captured = Arc::clone(&observed);

    let report = Suite::new(quiet("smoke", SuiteMode::Independent))
        .setup(move |teardown| open_session(config, teardown, &captured))
        .test("application is running", |s: &mut Session| {
            ensure!(s.app.is_running(), "application exited early");
            Ok(())
        })
        .test("fixture is tracked", |s: &mut Session| {
            ensure!(s.provisioner.running_ports() == vec![s.port]);
            Ok(())
        })
        .test("broken scenario", |_| anyhow::bail!("tree node not found"))
        .test("scenario after failure", |s: &mut Session| {
            ensure!(s.provisioner.data_dir(s.port).is_some());
            Ok(())
        })
        .after_each(|s: &mut Session| {
            ensure!(s.app.is_running(), "application died during scenario");
            Ok(())
        })
        .run();

    assert_eq!(report.passed(), 3);
    assert_eq!(
        report.outcome("broken scenario"),
        Some(&Outcome::Failed("tree node not found".to_string()))
    );
    assert!(report.teardown_failures.is_empty());

    let app = observed.lock().unwrap().clone().unwrap();
    assert!(!app.is_running());
    let calls = tools.calls();
    assert!(calls.first().unwrap().starts_with("launcher init --single"));
    assert!(calls.last().unwrap().starts_with("launcher kill --dir"));
    assert_eq!(calls.iter().filter(|c| c.starts_with("shell ")).count(), 2);
    assert!(tools.eval_scripts().contains(r#"target.createCollection("placeholder")"#));
}

#[test]
fn test_fail_fast_suite_skips_and_still_tears_down() {
    let tools = FakeTools::new();
    let config = tools.config();
    let observed = Observed::default();
    let captured = Arc::clone(&observed);

    let report = Suite::new(quiet("backup-restore", SuiteMode::FailFast))
        .setup(move |teardown| open_session(config, teardown, &captured))
        .test("open backup view", |_| Ok(()))
        .test("select database", |_| anyhow::bail!("database tree not populated"))
        .test("execute dump", |_| Ok(()))
        .test("verify restore", |_| Ok(()))
        .run();

    let outcomes: Vec<&Outcome> = report.outcomes.iter().map(|(_, o)| o).collect();
    assert_eq!(
        outcomes,
        vec![
            &Outcome::Passed,
            &Outcome::Failed("database tree not populated".to_string()),
            &Outcome::Skipped,
            &Outcome::Skipped,
        ]
    );
    assert!(!report.is_success());
    assert!(!observed.lock().unwrap().clone().unwrap().is_running());
    assert!(tools.calls().last().unwrap().starts_with("launcher kill"));
}

#[test]
fn test_setup_failure_releases_partial_fixtures() {
    let tools = FakeTools::new();
    tools.fail("init");
    let config = tools.config();
    let observed = Observed::default();
    let captured = Arc::clone(&observed);

    let report = Suite::new(quiet("connection profiles", SuiteMode::Independent))
        .setup(move |teardown| open_session(config, teardown, &captured))
        .test("create profile", |_| Ok(()))
        .test("edit profile", |_| Ok(()))
        .run();

    match report.outcome("create profile") {
        Some(Outcome::Failed(reason)) => assert!(reason.starts_with("setup failed:"), "{reason}"),
        other => panic!("Expected Failed outcome, got {other:?}"),
    }
    assert_eq!(report.outcome("edit profile"), Some(&Outcome::Skipped));
    assert!(report.setup_failure.is_some());
    assert!(observed.lock().unwrap().is_none());

    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].starts_with("launcher kill --dir"));
}

#[test]
fn test_teardown_failure_is_reported_but_not_escalated() {
    let tools = FakeTools::new();
    let config = tools.config();
    let observed = Observed::default();
    let captured = Arc::clone(&observed);

    let report = Suite::new(quiet("aggregate builder", SuiteMode::FailFast))
        .setup(move |teardown| {
            let session = open_session(config, teardown, &captured)?;
            teardown.push("close editor tabs", || anyhow::bail!("tab already closed"));
            Ok(session)
        })
        .test("build pipeline", |_| Ok(()))
        .run();

    assert!(report.is_success());
    assert_eq!(report.teardown_failures.len(), 1);
    assert_eq!(report.teardown_failures[0].label, "close editor tabs");
    assert!(!observed.lock().unwrap().clone().unwrap().is_running());
    assert!(tools.calls().last().unwrap().starts_with("launcher kill"));
}
