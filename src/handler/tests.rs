use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;

use super::{display_name, Handler, Layer, ANONYMOUS};
use crate::dispatcher::Next;
use crate::error::{DispatchError, HandlerResult};
use crate::request::Request;
use crate::router::Router;

type Log = Rc<RefCell<Vec<String>>>;

fn named_request_handler(
    _req: &mut Request,
    _res: &mut Vec<String>,
    next: Next<Request, Vec<String>>,
) -> HandlerResult {
    next.proceed();
    Ok(())
}

fn recorder(log: &Log, tag: &'static str) -> Layer<Request, Vec<String>> {
    let log = Rc::clone(log);
    Layer::request(move |_req: &mut Request, _res: &mut Vec<String>, next| {
        log.borrow_mut().push(tag.to_string());
        next.proceed();
        Ok(())
    })
}

fn run(app: &Router<Request, Vec<String>>, key: &str) -> Result<(), DispatchError> {
    let (_, _, result) = app
        .dispatch(Request::new(key), Vec::new())
        .into_parts()
        .unwrap();
    result
}

#[test]
fn test_arity_classification() {
    let req = Layer::<Request, Vec<String>>::request(|_req, _res, next| {
        next.proceed();
        Ok(())
    });
    assert_eq!(req.handler().arity(), 3);
    assert!(!req.handler().is_error_handler());

    let err = Layer::<Request, Vec<String>>::error(|e, _req, _res, next| {
        next.fail(e);
        Ok(())
    });
    assert_eq!(err.handler().arity(), 4);
    assert!(err.handler().is_error_handler());
}

#[test]
fn test_display_names() {
    let closure = |_: u8| ();
    assert_eq!(display_name_of(&closure), ANONYMOUS);

    let layer = Layer::request(named_request_handler);
    assert_eq!(layer.name(), "named_request_handler");
    assert_eq!(layer.named("audit").name(), "audit");
}

fn display_name_of<F>(_: &F) -> String {
    display_name::<F>()
}

#[test]
fn test_assign_replaces_callback() {
    let log: Log = Rc::default();
    let mut layer = recorder(&log, "before");
    let sink = Rc::clone(&log);
    let replacement = move |_req: &mut Request,
                            _res: &mut Vec<String>,
                            next: Next<Request, Vec<String>>|
          -> HandlerResult {
        sink.borrow_mut().push("after".to_string());
        next.proceed();
        Ok(())
    };
    layer.assign("after", Handler::Request(Rc::new(replacement)));
    assert_eq!(layer.name(), "after");

    let mut app: Router<Request, Vec<String>> = Router::new();
    app.add([layer]).unwrap();
    run(&app, "k").unwrap();
    assert_eq!(*log.borrow(), vec!["after"]);
}

#[test]
fn test_error_handler_steps_aside_in_normal_mode() {
    let log: Log = Rc::default();
    let seen = Rc::clone(&log);
    let mut app: Router<Request, Vec<String>> = Router::new();
    app.use_error_fn(move |e, _req, _res, next| {
        seen.borrow_mut().push("error".to_string());
        next.fail(e);
        Ok(())
    })
    .unwrap();
    app.add([recorder(&log, "request")]).unwrap();

    run(&app, "k").unwrap();
    assert_eq!(*log.borrow(), vec!["request"]);
}

#[test]
fn test_request_handler_forwards_error_unchanged() {
    let log: Log = Rc::default();
    let mut app: Router<Request, Vec<String>> = Router::new();
    app.use_fn(|_req, _res, _next| Err(anyhow!("boom"))).unwrap();
    app.add([recorder(&log, "skipped")]).unwrap();

    let err = run(&app, "k").unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert!(log.borrow().is_empty());
}

#[test]
fn test_panic_is_converted_to_dispatch_error() {
    let mut app: Router<Request, Vec<String>> = Router::new();
    app.add([Layer::request(|_req: &mut Request, _res: &mut Vec<String>, _next| {
        panic!("kaboom")
    })
    .named("explosive")])
    .unwrap();

    let err = run(&app, "k").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("explosive"), "{message}");
    assert!(message.contains("kaboom"), "{message}");
}

#[test]
fn test_error_after_resume_is_dropped() {
    let log: Log = Rc::default();
    let mut app: Router<Request, Vec<String>> = Router::new();
    app.use_fn(|_req, _res, next| {
        next.proceed();
        Err(anyhow!("too late"))
    })
    .unwrap();
    app.add([recorder(&log, "after")]).unwrap();

    run(&app, "k").unwrap();
    assert_eq!(*log.borrow(), vec!["after"]);
}

#[test]
fn test_layer_exact_matches_router_path() {
    let log: Log = Rc::default();
    let mut app: Router<Request, Vec<String>> = Router::new();
    app.route("user", [recorder(&log, "user")]).unwrap();

    run(&app, "user.created").unwrap();
    assert!(log.borrow().is_empty());
    run(&app, "user").unwrap();
    assert_eq!(*log.borrow(), vec!["user"]);
}
