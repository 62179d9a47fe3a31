//! A logical connection to the Cascada coordinator and the protocol calls made through it.

use ::cascada_common::{
    anyhow::anyhow,
    error::{CascadaError, Result},
    serde::Serialize,
    serde_json,
    tracing::{debug, info, warn},
    variable::VariableStore,
};

use crate::{
    node::{Node, NodeRegistry},
    protocol::{
        apply_task_payload, build_result_payload, decode_node_names, submission_outcome,
        AllocateNodesRequest, FetchWorkRequest, Outcome, RegisterRequest, Registration, Response,
        SubmitResultsRequest, UnregisterRequest, FETCH_WORK_FOR_NODE, REGISTER_MASTER,
        REGISTER_NODES, SUBMIT_RESULTS, UNREGISTER_MASTER,
    },
    transport::{HttpTransport, Transport, TransportGuard},
};

/// Lifecycle of a [Session].
/// - `Unregistered` -> `Registered` -> `Allocated` -> `Closed`
/// - `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered,
    /// At least one allocation call succeeded.
    Allocated,
    Closed,
}

/// Session with the coordinator.
///
/// `register`, `allocate_nodes` and `unregister` need `&mut self`; once nodes are
/// allocated, `fetch_work` and `submit_results` can be called from one thread per
/// node through a shared reference. Their network exchanges go one at a time
/// through the session's [TransportGuard].
pub struct Session {
    server_base_url: String,
    shared_secret: String,
    auth_token: Option<String>,
    assigned_name: Option<String>,
    project_name: Option<String>,
    algorithm_name: Option<String>,
    input_schema: VariableStore,
    output_schema: VariableStore,
    nodes: NodeRegistry,
    state: SessionState,
    transport: TransportGuard,
}

impl Session {
    /// Create a session talking HTTP to the coordinator at `url`.
    /// A URL without a scheme is taken as plain `http://`.
    pub fn new(url: &str, secret: &str) -> Result<Self> {
        Ok(Self::with_transport(url, secret, HttpTransport::new()?))
    }

    /// Create a session exchanging its requests through `transport`.
    pub fn with_transport<T>(url: &str, secret: &str, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        let url = url.trim_end_matches('/');
        let server_base_url = if url.contains("://") {
            url.to_owned()
        } else {
            format!("http://{}", url)
        };
        Self {
            server_base_url,
            shared_secret: secret.to_owned(),
            auth_token: None,
            assigned_name: None,
            project_name: None,
            algorithm_name: None,
            input_schema: VariableStore::new(),
            output_schema: VariableStore::new(),
            nodes: NodeRegistry::default(),
            state: SessionState::Unregistered,
            transport: TransportGuard::new(transport),
        }
    }

    pub fn server_base_url(&self) -> &str {
        &self.server_base_url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Name the coordinator gave this client.
    pub fn assigned_name(&self) -> Option<&str> {
        self.assigned_name.as_deref()
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    pub fn algorithm_name(&self) -> Option<&str> {
        self.algorithm_name.as_deref()
    }

    /// Types of the work unit fields sent to nodes.
    pub fn input_schema(&self) -> &VariableStore {
        &self.input_schema
    }

    /// Types of the fields nodes have to compute.
    pub fn output_schema(&self) -> &VariableStore {
        &self.output_schema
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn find_node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.find(id)
    }

    /// Authenticate with the coordinator and learn the project schemes.
    ///
    /// `suggested_name` may or may not be followed by the coordinator, see
    /// [Session::assigned_name]. A response without project or algorithm name
    /// still registers the session and returns [Outcome::Incomplete].
    pub fn register(&mut self, suggested_name: &str) -> Result<Outcome> {
        if self.state != SessionState::Unregistered {
            return Err(CascadaError::invalid_state(anyhow!(
                "cannot register a session in state {:?}",
                self.state
            )));
        }
        let request = RegisterRequest {
            key: &self.shared_secret,
            name: suggested_name,
        };
        let text = self.exchange(REGISTER_MASTER, &request)?;
        let Registration {
            master_token,
            name,
            project_name,
            algorithm_name,
            input_schema,
            output_schema,
            outcome,
        } = Registration::try_from(text.as_str())?;

        info!(
            "Registered as {} on project {:?} ({:?}), {} input and {} output fields",
            name,
            project_name,
            algorithm_name,
            input_schema.len(),
            output_schema.len()
        );
        self.auth_token = Some(master_token);
        self.assigned_name = Some(name);
        self.project_name = project_name;
        self.algorithm_name = algorithm_name;
        self.input_schema = input_schema;
        self.output_schema = output_schema;
        self.state = SessionState::Registered;
        Ok(outcome)
    }

    /// Leave the coordinator. The session is closed once the coordinator agrees.
    pub fn unregister(&mut self) -> Result<Outcome> {
        let token = self.token()?;
        let response = self.post(
            UNREGISTER_MASTER,
            &UnregisterRequest { mastertoken: token },
        )?;
        response.into_success()?;
        info!("Unregistered {:?}", self.assigned_name);
        self.state = SessionState::Closed;
        Ok(Outcome::Complete)
    }

    /// Ask for up to `count` nodes. The coordinator may grant fewer.
    ///
    /// Nodes are appended in the order the coordinator lists them. When the list
    /// cannot be decoded, no node at all is added.
    pub fn allocate_nodes(&mut self, count: usize) -> Result<Outcome> {
        let token = self.token()?;
        let response = self.post(
            REGISTER_NODES,
            &AllocateNodesRequest {
                mastertoken: token,
                nodenumber: count,
            },
        )?;
        let names = decode_node_names(response)?;
        let added = self.nodes.extend_all(names).map_err(|clashes| {
            CascadaError::missing_info(anyhow!("node ids {:?} are already allocated", clashes))
        })?;
        if added < count {
            warn!("Asked for {} nodes, coordinator granted {}", count, added);
        }
        info!("Allocated {} nodes", added);
        self.state = SessionState::Allocated;
        Ok(Outcome::Complete)
    }

    /// Fetch the next work unit of `node` and write its values into the node's variables.
    ///
    /// Every name in the task payload must be bound on the node. When a bound
    /// name has no storage the rest of the payload is still applied and the
    /// call then fails with an invalid type error.
    pub fn fetch_work(&self, node: &Node) -> Result<Outcome> {
        let token = self.node_token(node)?;
        let response = self.post(
            FETCH_WORK_FOR_NODE,
            &FetchWorkRequest {
                mastertoken: token,
                nodeid: node.id(),
            },
        )?;
        apply_task_payload(response, &node.locals())?;
        Ok(Outcome::Complete)
    }

    /// Send the current values of `node` for every input and output field.
    ///
    /// A response without a readable `code` is not fatal: the results were
    /// delivered, and the call returns [Outcome::Incomplete].
    pub fn submit_results(&self, node: &Node) -> Result<Outcome> {
        let token = self.node_token(node)?;
        let payload =
            build_result_payload(&self.input_schema, &self.output_schema, &node.locals())?;
        let text = self.exchange(
            SUBMIT_RESULTS,
            &SubmitResultsRequest {
                mastertoken: token,
                nodeid: node.id(),
                payload: &payload,
            },
        )?;
        submission_outcome(&text)
    }

    fn token(&self) -> Result<&str> {
        match (self.state, self.auth_token.as_deref()) {
            (SessionState::Registered | SessionState::Allocated, Some(token)) => Ok(token),
            (state, _) => Err(CascadaError::invalid_state(anyhow!(
                "session is not registered (state {:?})",
                state
            ))),
        }
    }

    /// Token for a node call; the node must have been allocated by this session.
    fn node_token(&self, node: &Node) -> Result<&str> {
        if self.state != SessionState::Allocated {
            return Err(CascadaError::invalid_state(anyhow!(
                "no node allocated (state {:?})",
                self.state
            )));
        }
        if !self.nodes.contains(node) {
            return Err(CascadaError::invalid_state(anyhow!(
                "node {} does not belong to this session",
                node.id()
            )));
        }
        self.token()
    }

    fn post<B: Serialize>(&self, path: &str, request: &B) -> Result<Response> {
        let text = self.exchange(path, request)?;
        Response::parse(&text)
    }

    /// Serialize `request`, run one guarded exchange and return the raw response.
    fn exchange<B: Serialize>(&self, path: &str, request: &B) -> Result<String> {
        let body = serde_json::to_value(request).map_err(CascadaError::json_internal)?;
        let url = self.build_url(path);
        let text = self.transport.exchange(&url, &body)?;
        debug!("{} -> {} bytes", path, text.len());
        Ok(text)
    }

    /// Build a full URL from a path.
    fn build_url(&self, path: &str) -> String {
        self.server_base_url.to_owned() + path
    }
}
