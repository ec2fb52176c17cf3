use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use specframe::{Engine, RunEvent, SkipReason, Status, Suite};

fn counting(
    calls: &Arc<AtomicUsize>,
) -> impl Fn() -> futures::future::Ready<()> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
        _ = calls.fetch_add(1, Ordering::SeqCst);
        futures::future::ready(())
    }
}

#[tokio::test]
async fn focus_skips_everything_else() {
    let focused = Arc::new(AtomicUsize::new(0));
    let others = Arc::new(AtomicUsize::new(0));
    let suite = Suite::describe("root", |ctx| {
        ctx.it("plain", counting(&others));
        ctx.fit("focused", counting(&focused));
        ctx.pending("pending");
        ctx.describe("nested", |ctx| {
            ctx.it("also plain", counting(&others));
        });
        ctx.fdescribe("focused group", |ctx| {
            ctx.it("inherits focus", counting(&focused));
        });
    })
    .unwrap();

    let results = Engine::default().run(suite).await.unwrap();

    let statuses = results.iter().map(|r| r.status).collect::<Vec<_>>();
    assert_eq!(
        statuses,
        [
            Status::Skipped,
            Status::Passed,
            Status::Pending,
            Status::Skipped,
            Status::Passed,
        ],
    );
    assert_eq!(results[0].skip_reason, Some(SkipReason::Unfocused));
    assert_eq!(results[0].attempts, 0);
    assert_eq!(focused.load(Ordering::SeqCst), 2);
    assert_eq!(others.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn skipped_focus_doesnt_enable_focus_mode() {
    let calls = Arc::new(AtomicUsize::new(0));
    let suite = Suite::describe("root", |ctx| {
        ctx.fit("focused but skipped", counting(&calls)).skip();
        ctx.it("plain", counting(&calls));
    })
    .unwrap();

    let results = Engine::default().run(suite).await.unwrap();

    assert_eq!(results[0].status, Status::Skipped);
    assert_eq!(results[0].skip_reason, Some(SkipReason::Explicit));
    assert_eq!(results[1].status, Status::Passed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn skipped_contexts_skip_their_specs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let suite = Suite::describe("root", |ctx| {
        ctx.xdescribe("disabled", |ctx| {
            ctx.it("first", counting(&calls));
            ctx.describe("deeper", |ctx| {
                ctx.fit("focus loses to skip", counting(&calls));
            });
        });
        ctx.xit("disabled spec", counting(&calls));
    })
    .unwrap();

    let results = Engine::default().run(suite).await.unwrap();

    assert!(
        results
            .iter()
            .all(|r| r.skip_reason == Some(SkipReason::Explicit)),
        "all specs must be explicitly skipped",
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn started_event_reports_focus_mode() {
    struct FocusSpy(Arc<AtomicUsize>);

    impl specframe::Observer for FocusSpy {
        fn handle_event(
            &mut self,
            event: &specframe::Event<RunEvent<'_>>,
        ) -> anyhow::Result<()> {
            if let RunEvent::Started { focus_mode: true, .. } = **event {
                _ = self.0.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    let seen = Arc::new(AtomicUsize::new(0));
    let suite = Suite::describe("root", |ctx| {
        ctx.fit("focused", || async {});
    })
    .unwrap();
    let engine = Engine::builder()
        .observer(FocusSpy(Arc::clone(&seen)))
        .build()
        .unwrap();

    _ = engine.run(suite).await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
