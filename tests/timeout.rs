use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use clap::Parser;
use specframe::{Cli, Engine, Failure, Status, Suite};

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    cli: Cli,
}

#[tokio::test]
async fn times_out_slow_specs() {
    let after_each = Arc::new(AtomicBool::new(false));
    let suite = Suite::describe("root", |ctx| {
        let flag = Arc::clone(&after_each);
        ctx.after_each(move || {
            flag.store(true, Ordering::SeqCst);
            async {}
        });
        ctx.it("hangs", || async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        ctx.it("is quick", || async {});
    })
    .unwrap();
    let args = Args::parse_from(["runner", "--timeout", "50ms"]);
    let engine = Engine::builder().with_cli(args.cli).build().unwrap();

    let started = Instant::now();
    let results = engine.run(suite).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5), "run must not hang");
    assert_eq!(results[0].status, Status::Failed);
    assert!(
        matches!(
            results[0].error,
            Some(Failure::Timeout { limit }) if limit == Duration::from_millis(50),
        ),
        "unexpected failure: {:?}",
        results[0].error,
    );
    assert_eq!(results[0].error.as_ref().unwrap().to_string(), "timed out after 50ms");
    assert_eq!(results[1].status, Status::Passed);
    assert!(after_each.load(Ordering::SeqCst), "quick spec runs its after-each");
}
