//! Integration tests for the application harness under a suite teardown

use std::sync::Arc;
use std::time::Duration;

use suitekit_app::{AppHandle, AppOptions};
use suitekit_core::Readiness;
use suitekit_runner::Teardown;

use crate::common::{init_tracing, listening_port};

fn fake_app(script: &str) -> AppOptions {
    AppOptions::new("sh")
        .arg("-c")
        .arg(script)
        .stop_grace(Duration::from_millis(300))
}

#[test]
fn test_teardown_stops_application() {
    init_tracing();
    let app = Arc::new(AppHandle::launch(fake_app("sleep 30")).unwrap());
    let teardown = Teardown::new();
    {
        let app = Arc::clone(&app);
        teardown.push("stop application", move || Ok(app.stop()?));
    }

    assert!(app.is_running());
    assert!(teardown.run().is_empty());
    assert!(!app.is_running());
    // A second stop, as an interrupt racing suite end would issue, is harmless.
    app.stop().unwrap();
}

#[test]
fn test_application_ready_on_remote_port() {
    let (_listener, port) = listening_port();
    let app = AppHandle::launch(fake_app("sleep 30").remote_port(port)).unwrap();
    let attempts = app
        .wait_ready(Readiness::new(Duration::from_secs(5), Duration::from_millis(10)))
        .unwrap();
    assert_eq!(attempts, 1);
    app.stop().unwrap();
}

#[test]
fn test_application_stopped_before_fixture_release() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let app = Arc::new(AppHandle::launch(fake_app("trap '' TERM; sleep 30")).unwrap());
    let teardown = Teardown::new();

    {
        let order = Arc::clone(&order);
        teardown.push("kill instance", move || {
            order.lock().unwrap().push("kill instance");
            Ok(())
        });
    }
    {
        let order = Arc::clone(&order);
        let app = Arc::clone(&app);
        teardown.push("stop application", move || {
            app.stop()?;
            order.lock().unwrap().push("stop application");
            Ok(())
        });
    }

    assert!(teardown.run().is_empty());
    assert_eq!(*order.lock().unwrap(), vec!["stop application", "kill instance"]);
    assert!(!app.is_running());
}
