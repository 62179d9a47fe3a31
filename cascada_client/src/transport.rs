//! Transport to the coordinator and the lock that serializes its use.

use ::cascada_common::{
    error::{CascadaError, Result},
    serde_json::Value,
    tracing::{debug, trace},
};
use ::parking_lot::Mutex;

/// One request/response exchange with the coordinator.
///
/// `exchange` takes `&mut self`: a transport may keep per-request settings
/// on itself, so it must never run two exchanges at once.
pub trait Transport: Send {
    /// POST `body` as JSON to `url` and return the raw response body.
    fn exchange(&mut self, url: &str, body: &Value) -> Result<String>;
}

/// HTTP transport backed by a blocking [reqwest] client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(CascadaError::transport)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn exchange(&mut self, url: &str, body: &Value) -> Result<String> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(CascadaError::transport)?;
        trace!("{} answered with HTTP {}", url, response.status());
        response.text().map_err(CascadaError::transport)
    }
}

/// Sole owner of the session's transport.
/// Every exchange holds the lock from request setup until the response is read,
/// so concurrent node workers never interleave on the wire.
pub struct TransportGuard {
    transport: Mutex<Box<dyn Transport>>,
}

impl TransportGuard {
    pub fn new<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            transport: Mutex::new(Box::new(transport)),
        }
    }

    pub fn exchange(&self, url: &str, body: &Value) -> Result<String> {
        let mut transport = self.transport.lock();
        debug!("POST {}", url);
        transport.exchange(url, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::cascada_common::serde_json::json;
    use ::std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    /// Counts how many exchanges run at the same time.
    struct Overlap {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Transport for Overlap {
        fn exchange(&mut self, _url: &str, body: &Value) -> Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(body.to_string())
        }
    }

    #[test]
    fn exchanges_never_overlap() {
        let peak = Arc::new(AtomicUsize::new(0));
        let guard = TransportGuard::new(Overlap {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        });
        thread::scope(|scope| {
            for i in 0..8 {
                let guard = &guard;
                scope.spawn(move || {
                    for _ in 0..5 {
                        let body = json!({ "worker": i });
                        let echoed = guard.exchange("http://coordinator/echo", &body).unwrap();
                        assert_eq!(echoed, body.to_string());
                    }
                });
            }
        });
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unreachable_coordinator_is_a_transport_error() {
        let guard = TransportGuard::new(HttpTransport::new().unwrap());
        // port 9 (discard) is not expected to have an HTTP server
        let err = guard
            .exchange("http://127.0.0.1:9/api/v1/register-master", &json!({}))
            .unwrap_err();
        assert_eq!(
            err.get_error_type(),
            ::cascada_common::error::CascadaErrorType::Transport
        );
    }
}
