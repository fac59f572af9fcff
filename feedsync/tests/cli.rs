use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_sync_subcommand() {
    let mut cmd = Command::cargo_bin("feedsync").expect("Binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn sync_with_missing_config_fails_before_any_network_work() {
    let mut cmd = Command::cargo_bin("feedsync").expect("Binary exists");
    cmd.arg("sync")
        .arg("--config")
        .arg("definitely-not-here.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use feedsync::cli::{run, Cli, Commands};

    // A dummy config path: run must fail fast, but only after tracing is up.
    let cli = Cli {
        command: Commands::Sync {
            config: std::path::PathBuf::from("dummy.yaml"),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
