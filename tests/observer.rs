use std::sync::{Arc, Mutex};

use specframe::{Engine, Event, Observer, RunError, RunEvent, RunSummary, Suite};

/// Records a short label of every received event.
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Observer for Recorder {
    fn handle_event(&mut self, event: &Event<RunEvent<'_>>) -> anyhow::Result<()> {
        let label = match **event {
            RunEvent::Started { specs, .. } => format!("started {specs}"),
            RunEvent::SpecFinished(r) => format!("spec {} {}", r.full_name(), r.status),
            RunEvent::ContextFinished { path, .. } => format!("context {}", path.join(" ")),
            RunEvent::Finished(results) => {
                format!("finished: {}", RunSummary::from_results(results))
            }
        };
        self.0.lock().unwrap().push(label);
        Ok(())
    }
}

/// Fails on the first finished spec.
struct Broken;

impl Observer for Broken {
    fn handle_event(&mut self, event: &Event<RunEvent<'_>>) -> anyhow::Result<()> {
        if let RunEvent::SpecFinished(_) = **event {
            anyhow::bail!("disk is full");
        }
        Ok(())
    }
}

fn suite() -> Suite {
    Suite::describe("root", |ctx| {
        ctx.it("a", || async {});
        ctx.describe("nested", |ctx| {
            ctx.it("b", || async { Err::<(), _>(anyhow::anyhow!("nope")) });
        });
        ctx.pending("c");
    })
    .unwrap()
}

#[tokio::test]
async fn receives_events_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::builder()
        .max_concurrency(1)
        .observer(Recorder(Arc::clone(&log)))
        .build()
        .unwrap();

    _ = engine.run(suite()).await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        [
            "started 3",
            "spec root a passed",
            "spec root nested b failed",
            "context root nested",
            "spec root c pending",
            "context root",
            "finished: 3 specs: 1 passed, 1 failed, 1 pending, 0 skipped",
        ],
    );
}

#[tokio::test]
async fn observer_error_aborts_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::builder()
        .max_concurrency(1)
        .observer(Broken)
        .observer(Recorder(Arc::clone(&log)))
        .build()
        .unwrap();

    let err = engine.run(suite()).await.unwrap_err();

    assert!(matches!(err, RunError::Observer(_)), "unexpected error: {err}");
    assert_eq!(err.to_string(), "observer failed, aborting the run: disk is full");
    assert_eq!(
        *log.lock().unwrap(),
        ["started 3"],
        "later observers don't see the failed event",
    );
}

#[tokio::test]
async fn engine_is_reusable() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::builder()
        .observer(Recorder(Arc::clone(&log)))
        .build()
        .unwrap();

    let first = engine.run(suite()).await.unwrap();
    let second = engine.run(suite()).await.unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(
        log.lock().unwrap().iter().filter(|l| l.starts_with("finished")).count(),
        2,
    );
}
