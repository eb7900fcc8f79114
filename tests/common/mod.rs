#![allow(dead_code)]

pub mod fixtures {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::anyhow;
    use middlewary::{DispatchError, Layer, Next, Request, Router};

    pub type Res = Vec<String>;
    pub type App = Router<Request, Res>;
    pub type Parked = Rc<RefCell<Option<Next<Request, Res>>>>;

    /// Appends `tag` to the response and moves on.
    pub fn mark(tag: &str) -> Layer<Request, Res> {
        let name = format!("mark-{}", tag);
        let tag = tag.to_string();
        Layer::request(move |_req: &mut Request, res: &mut Res, next| {
            res.push(tag.clone());
            next.proceed();
            Ok(())
        })
        .named(name)
    }

    /// Appends `tag` and fails with an error carrying the tag.
    pub fn fail(tag: &str) -> Layer<Request, Res> {
        let tag = tag.to_string();
        Layer::request(move |_req: &mut Request, res: &mut Res, _next| {
            res.push(tag.clone());
            Err(anyhow!("{} failed", tag))
        })
    }

    /// Error handler: appends `tag` and clears the error.
    pub fn recover(tag: &str) -> Layer<Request, Res> {
        let tag = tag.to_string();
        Layer::error(move |_err, _req: &mut Request, res: &mut Res, next| {
            res.push(tag.clone());
            next.handled();
            Ok(())
        })
    }

    /// Error handler: appends `tag` and forwards the error.
    pub fn observe(tag: &str) -> Layer<Request, Res> {
        let tag = tag.to_string();
        Layer::error(move |err, _req: &mut Request, res: &mut Res, next| {
            res.push(tag.clone());
            next.fail(err);
            Ok(())
        })
    }

    /// Appends `tag` and exits the whole dispatch.
    pub fn exit(tag: &str) -> Layer<Request, Res> {
        let tag = tag.to_string();
        Layer::request(move |_req: &mut Request, res: &mut Res, next| {
            res.push(tag.clone());
            next.exit();
            Ok(())
        })
    }

    /// Appends `tag` and parks its continuation in `slot` without resuming.
    pub fn park(tag: &str, slot: &Parked) -> Layer<Request, Res> {
        let tag = tag.to_string();
        let slot = Rc::clone(slot);
        Layer::request(move |_req: &mut Request, res: &mut Res, next| {
            res.push(tag.clone());
            *slot.borrow_mut() = Some(next);
            Ok(())
        })
    }

    /// Records each `key=value` the request carries for `names`.
    pub fn params(names: &'static [&'static str]) -> Layer<Request, Res> {
        use middlewary::Routable;
        Layer::request(move |req: &mut Request, res: &mut Res, next| {
            for name in names {
                if let Some(v) = req.param(name) {
                    res.push(format!("{}={}", name, v));
                }
            }
            next.proceed();
            Ok(())
        })
    }

    /// Dispatch synchronously, panicking if the chain suspended.
    pub fn run(app: &App, key: &str) -> (Request, Res, Result<(), DispatchError>) {
        app.dispatch(Request::new(key), Vec::new())
            .into_parts()
            .expect("dispatch suspended")
    }

    /// Dispatch synchronously and return the collected markers.
    pub fn trace(app: &App, key: &str) -> Vec<String> {
        let (_, res, result) = run(app, key);
        assert!(result.is_ok(), "unexpected error: {:?}", result);
        res
    }
}

pub mod temp_files {
    use std::io::Write;

    use tempfile::NamedTempFile;

    /// Write `content` to a fresh `.toml` file that is removed on drop.
    pub fn create_temp_toml(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("middlewary_test_")
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }
}

pub mod tracing_util {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    /// Captures formatted log output for the current thread while alive.
    pub struct TestTracing {
        buffer: Arc<Mutex<Vec<u8>>>,
        _guard: tracing::subscriber::DefaultGuard,
    }

    #[derive(Clone)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl TestTracing {
        pub fn init() -> Self {
            let buffer = Arc::new(Mutex::new(Vec::new()));
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .with_ansi(false)
                .with_writer(Capture(Arc::clone(&buffer)))
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            Self {
                buffer,
                _guard: guard,
            }
        }

        pub fn output(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
        }

        pub fn contains(&self, needle: &str) -> bool {
            self.output().contains(needle)
        }
    }
}
