use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};
use std::env;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` picks the filter (default
/// `info`); `LOG_FORMAT=json` switches to JSON lines.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if installed.is_err() {
        eprintln!("a global tracing subscriber is already installed");
    }
}

/// Logs one line per handled request.
pub struct RequestTrace;

#[rocket::async_trait]
impl Fairing for RequestTrace {
    fn info(&self) -> Info {
        Info {
            name: "Request Trace",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        info!(
            method = %req.method(),
            uri = %req.uri(),
            status = res.status().code,
            "handled request"
        );
    }
}
