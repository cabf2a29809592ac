use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing logging one line per request with status and latency.
///
/// Health checks are logged at debug so they don't drown out imports.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed_ms = request.local_cache(Instant::now).elapsed().as_secs_f64() * 1000.0;
        let status = response.status();

        let level = if request.uri().path().as_str().ends_with("/health") {
            log::Level::Debug
        } else if status.code >= 500 {
            log::Level::Error
        } else if status.code >= 400 {
            log::Level::Warn
        } else {
            log::Level::Info
        };

        log::log!(
            level,
            "{} {} -> {} ({:.2}ms)",
            request.method(),
            request.uri(),
            status.code,
            elapsed_ms
        );
    }
}
