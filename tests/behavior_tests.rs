mod common;

use common::fixtures::{fail, mark, observe, recover, run, trace, App};
use common::tracing_util::TestTracing;
use middlewary::{Mount, Request, Router};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// hello
///   ├─ 0-0
///   ├─ (router) 1-0, 1-1, 1-2
///   ├─ 2-0
///   ├─ 3-0
///   └─ world → (router) 4-0, 4-1
fn hello_world() -> App {
    let mut zero = App::at("hello").unwrap();
    zero.add([mark("0-0")]).unwrap();

    let mut lvl1 = App::new();
    lvl1.add([mark("1-0"), mark("1-1"), mark("1-2")]).unwrap();
    zero.use_router(lvl1).unwrap();

    zero.add([mark("2-0")]).unwrap();
    zero.add([mark("3-0")]).unwrap();

    let mut lvl4 = App::new();
    lvl4.add(vec![Mount::Group(vec![mark("4-0").into(), mark("4-1").into()])])
        .unwrap();
    zero.add(vec![Mount::from("world"), lvl4.into()]).unwrap();
    zero
}

#[test]
fn test_routers_can_be_added_and_respond() {
    let zero = hello_world();
    assert_eq!(
        trace(&zero, "hello"),
        strings(&["0-0", "1-0", "1-1", "1-2", "2-0", "3-0"])
    );
    assert_eq!(trace(&zero, "hello.world"), strings(&["4-0", "4-1"]));
    assert!(trace(&zero, "*").is_empty());
}

#[test]
fn test_default_root_reaches_nested_segments() {
    let mut zero = App::new();
    zero.add([mark("0-0")]).unwrap();

    let mut lvl1 = App::at("home").unwrap();
    lvl1.add([mark("1-0"), mark("1-1")]).unwrap();
    lvl1.route("sweet", [mark("1-2")]).unwrap();
    zero.use_router(lvl1).unwrap();

    zero.add([mark("0-1")]).unwrap();

    assert_eq!(trace(&zero, "home.sweet"), strings(&["0-0", "1-2", "0-1"]));
    assert_eq!(trace(&zero, "home"), strings(&["0-0", "1-0", "1-1", "0-1"]));
}

#[test]
fn test_thrown_error_reaches_catcher() {
    let mut app = App::new();
    app.add([mark("a"), fail("b"), mark("skipped"), recover("catch"), mark("c")])
        .unwrap();

    let (_, res, result) = run(&app, "anything");
    assert!(result.is_ok());
    assert_eq!(res, strings(&["a", "b", "catch", "c"]));
}

#[test]
fn test_error_travels_out_of_nested_router() {
    let mut app = App::new();
    app.route("jobs", [mark("j"), fail("boom"), recover("inner-catch")])
        .unwrap();
    // The nested stack recovers on its own, so the outer handler never fires.
    app.add([observe("outer")]).unwrap();
    assert_eq!(
        trace(&app, "jobs"),
        strings(&["j", "boom", "inner-catch"])
    );

    let mut bare = App::new();
    bare.route("jobs", [fail("boom")]).unwrap();
    bare.add([mark("normal"), observe("outer")]).unwrap();
    let (_, res, result) = run(&bare, "jobs");
    assert_eq!(res, strings(&["boom", "outer"]));
    assert_eq!(result.unwrap_err().to_string(), "boom failed");
}

#[test]
fn test_registration_and_traversal_are_logged() {
    let tracing = TestTracing::init();
    let mut app: Router<Request, Vec<String>> = Router::new();
    app.route("user", [mark("u")]).unwrap();
    trace(&app, "user");

    assert!(tracing.contains("Router creates a new router for route"));
    assert!(tracing.contains("Router adds a layer"));
    assert!(tracing.contains("layer 1 of 1 handles request"));
    assert!(tracing.contains("Router's stack is done"));
}
