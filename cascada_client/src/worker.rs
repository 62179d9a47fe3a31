//! Reference node worker: binds the sphere-distance fields and runs the fetch/compute/submit loop.

use ::cascada_common::{
    anyhow::anyhow,
    error::{CascadaError, CascadaErrorType, Result},
    serde::Deserialize,
    tracing::{debug, info},
    variable::Slot,
};

use crate::{node::Node, session::Session};

/// Configuration of the `cascada-worker` binary.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(crate = "cascada_common::serde")]
pub struct WorkerConfig {
    /// Base URL of the coordinator. `http://` is assumed when no scheme is given.
    pub server_url: String,
    /// Secret shared with the coordinator, sent on registration.
    pub secret: String,
    /// Number of nodes to ask for. Each one runs on its own thread.
    pub node_count: usize,
    /// Name suggested on registration.
    /// Falls back to the `HOSTNAME` environment variable.
    #[serde(default)]
    pub node_name: Option<String>,
    /// Coordinator code meaning there is no work left for a node.
    #[serde(default = "default_no_work_code")]
    pub no_work_code: i64,
}

fn default_no_work_code() -> i64 {
    7
}

/// Storage of one node's work unit.
struct SphereTask {
    x: Slot<f32>,
    y: Slot<f32>,
    z: Slot<f32>,
    energy: Slot<f32>,
}

impl SphereTask {
    fn bind_to(node: &Node) -> Result<Self> {
        let task = Self {
            x: Slot::default(),
            y: Slot::default(),
            z: Slot::default(),
            energy: Slot::default(),
        };
        for (name, slot) in [
            ("X", &task.x),
            ("Y", &task.y),
            ("Z", &task.z),
            ("mE", &task.energy),
        ] {
            if !node.bind(name, slot) {
                return Err(CascadaError::invalid_state(anyhow!(
                    "variable `{}` of node {} is already bound",
                    name,
                    node.id()
                )));
            }
        }
        Ok(task)
    }

    fn compute(&self) {
        let (x, y, z) = (self.x.get(), self.y.get(), self.z.get());
        self.energy.set(-((x * x + y * y + z * z).sqrt() + 1.0));
    }
}

/// Process work units on `node` until the coordinator answers `no_work_code`.
/// Returns the number of results submitted.
pub fn run_node(session: &Session, node: &Node, no_work_code: i64) -> Result<usize> {
    let task = SphereTask::bind_to(node)?;
    let mut submitted = 0;
    loop {
        match session.fetch_work(node) {
            Ok(_) => {}
            Err(e) if e.get_error_type() == CascadaErrorType::Coordinator(no_work_code) => {
                info!("Node {}: no more work after {} results", node.id(), submitted);
                return Ok(submitted);
            }
            Err(e) => return Err(e),
        }
        task.compute();
        debug!("Node {}: mE = {}", node.id(), task.energy.get());
        session.submit_results(node)?;
        submitted += 1;
    }
}
