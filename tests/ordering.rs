use std::{collections::HashMap, time::Duration};

use specframe::{Engine, ExecutionResult, Status, Suite};

/// Suite with interleaved specs and contexts, finishing in reverse
/// declaration order when run concurrently.
fn suite() -> Suite {
    Suite::describe("shop", |ctx| {
        for (i, name) in ["lists items", "sorts items"].into_iter().enumerate() {
            ctx.it(name, move || async move {
                tokio::time::sleep(Duration::from_millis(40 - 10 * i as u64)).await;
            });
        }
        ctx.describe("cart", |ctx| {
            ctx.it("adds item", || async {
                tokio::time::sleep(Duration::from_millis(15)).await;
            });
            ctx.it("fails on purpose", || async {
                Err::<(), _>(anyhow::anyhow!("out of stock"))
            });
            ctx.describe("checkout", |ctx| {
                ctx.pending("applies coupons");
                ctx.xit("charges twice", || async {});
            });
        });
        ctx.it("closes", || async {});
    })
    .unwrap()
}

fn names(results: &[ExecutionResult]) -> Vec<String> {
    results.iter().map(ExecutionResult::full_name).collect()
}

fn statuses(results: &[ExecutionResult]) -> HashMap<String, Status> {
    results.iter().map(|r| (r.full_name(), r.status)).collect()
}

#[tokio::test]
async fn results_follow_declaration_order() {
    let engine = Engine::builder().max_concurrency(8).build().unwrap();

    let results = engine.run(suite()).await.unwrap();

    assert_eq!(
        names(&results),
        [
            "shop lists items",
            "shop sorts items",
            "shop cart adds item",
            "shop cart fails on purpose",
            "shop cart checkout applies coupons",
            "shop cart checkout charges twice",
            "shop closes",
        ],
    );
    assert_eq!(results[4].context_path, ["shop", "cart", "checkout"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn statuses_dont_depend_on_concurrency() {
    let sequential = Engine::builder().max_concurrency(1).build().unwrap();
    let concurrent = Engine::builder().max_concurrency(16).build().unwrap();

    let one = sequential.run(suite()).await.unwrap();
    let many = concurrent.run(suite()).await.unwrap();

    assert_eq!(names(&one), names(&many));
    assert_eq!(statuses(&one), statuses(&many));
    assert_eq!(
        one.iter().map(|r| r.status).collect::<Vec<_>>(),
        [
            Status::Passed,
            Status::Passed,
            Status::Passed,
            Status::Failed,
            Status::Pending,
            Status::Skipped,
            Status::Passed,
        ],
    );
}

#[tokio::test]
async fn empty_suite_runs() {
    let suite = Suite::describe("nothing", |_| {}).unwrap();

    let results = Engine::default().run(suite).await.unwrap();

    assert!(results.is_empty(), "no specs declared");
}

#[test]
fn empty_context_description_is_rejected() {
    let err = Suite::describe("root", |ctx| {
        ctx.describe("  ", |ctx| {
            ctx.it("spec", || async {});
        });
    })
    .unwrap_err();

    assert_eq!(
        err.to_string(),
        "context declared under `root` has an empty description",
    );
}
