//! Many node workers sharing one session.

use ::cascada_client::{Session, Transport};
use ::cascada_common::{
    anyhow::anyhow,
    error::{CascadaError, Result},
    serde_json::{json, Value},
    variable::Slot,
};
use ::std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

const NODES: usize = 8;
const ROUNDS: usize = 20;

/// Coordinator stand-in that pauses in the middle of every exchange and
/// fails the test if two exchanges ever run at the same time.
struct SlowCoordinator {
    active: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
    submitted: Arc<AtomicUsize>,
}

impl SlowCoordinator {
    fn answer(&self, url: &str, body: &Value) -> Result<Value> {
        let node = body["nodeid"].as_str().unwrap_or_default();
        let index: f64 = node.trim_start_matches('n').parse().unwrap_or(-1.0);
        let reply = if url.ends_with("/register-master") {
            json!({
                "code": 0,
                "master_token": "tok",
                "name": "worker",
                "project": {
                    "name": "sphere",
                    "algo": "distance",
                    "scheme_in": { "X": 3 },
                    "scheme_out": { "mE": 4 }
                }
            })
        } else if url.ends_with("/register-nodes") {
            let names: Vec<_> = (0..NODES).map(|i| format!("n{}", i)).collect();
            json!({ "code": 0, "nodenames": names })
        } else if url.ends_with("/fetch-work-for-node") {
            json!({ "code": 0, "task-payload": { "X": index } })
        } else if url.ends_with("/submit-results") {
            // every node submits the value it was handed
            let payload = &body["payload"];
            if payload["X"].as_f64() != Some(index) || payload["mE"].as_f64() != Some(-index) {
                return Err(CascadaError::missing_info(anyhow!(
                    "node {} submitted someone else's work: {}",
                    node,
                    payload
                )));
            }
            self.submitted.fetch_add(1, Ordering::SeqCst);
            json!({ "code": 0 })
        } else {
            json!({ "code": 0 })
        };
        Ok(reply)
    }
}

impl Transport for SlowCoordinator {
    fn exchange(&mut self, url: &str, body: &Value) -> Result<String> {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_micros(200));
        let reply = self.answer(url, body);
        self.active.fetch_sub(1, Ordering::SeqCst);
        reply.map(|reply| reply.to_string())
    }
}

#[test]
fn node_workers_share_one_session() {
    let overlaps = Arc::new(AtomicUsize::new(0));
    let submitted = Arc::new(AtomicUsize::new(0));
    let transport = SlowCoordinator {
        active: Arc::new(AtomicUsize::new(0)),
        overlaps: Arc::clone(&overlaps),
        submitted: Arc::clone(&submitted),
    };
    let mut session = Session::with_transport("coordinator:8088", "s3cret", transport);
    session.register("host").unwrap();
    session.allocate_nodes(NODES).unwrap();

    thread::scope(|scope| {
        let session = &session;
        for node in session.nodes() {
            scope.spawn(move || {
                let x = Slot::new(0.0f64);
                let energy = Slot::new(0.0f64);
                node.bind("X", &x);
                node.bind("mE", &energy);
                for _ in 0..ROUNDS {
                    session.fetch_work(node).unwrap();
                    energy.set(-x.get());
                    session.submit_results(node).unwrap();
                }
            });
        }
    });

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(submitted.load(Ordering::SeqCst), NODES * ROUNDS);
}
