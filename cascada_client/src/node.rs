//! Compute nodes allocated by the coordinator.

use ::cascada_common::variable::{Location, ProjectStatus, ScalarType, VariableStore};
use ::parking_lot::{Mutex, MutexGuard};

/// One coordinator-allocated compute slot.
///
/// The node's local variables bind work unit field names to storage owned by
/// the worker running the node. They sit behind their own lock so the worker
/// and the protocol calls can both reach them through a shared reference.
#[derive(Debug)]
pub struct Node {
    id: String,
    locals: Mutex<VariableStore>,
}

impl Node {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            locals: Mutex::new(VariableStore::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Bind a work unit field to worker storage.
    /// Returns `false`, keeping the old binding, if the name is already bound.
    pub fn bind(&self, name: &str, location: impl Into<Location>) -> bool {
        self.locals.lock().bind(name, location)
    }

    /// Declare a work unit field without storage.
    pub fn declare(&self, name: &str, scalar_type: ScalarType) -> bool {
        self.locals.lock().declare(name, scalar_type)
    }

    /// Current value of a local variable widened to a double.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.locals.lock().lookup(name).map(|variable| variable.to_double())
    }

    pub fn variable_count(&self) -> usize {
        self.locals.lock().len()
    }

    /// Alias every local variable to the same-named entry of `source`.
    pub fn project_from(&self, source: &VariableStore) -> ProjectStatus {
        self.locals.lock().project(source)
    }

    /// Exclusive access to the local variables.
    /// The lock is not reentrant: never call into the session while holding it.
    pub(crate) fn locals(&self) -> MutexGuard<'_, VariableStore> {
        self.locals.lock()
    }
}

/// Nodes of a session, in allocation order.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl NodeRegistry {
    pub fn find(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Whether `node` is one of this registry's nodes, not just one with the same id.
    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.iter().any(|known| std::ptr::eq(known, node))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append one node per id, all or nothing.
    /// Returns the ids that clash with existing nodes, in which case nothing is added.
    pub(crate) fn extend_all(&mut self, ids: Vec<String>) -> Result<usize, Vec<String>> {
        let clashes: Vec<String> = ids
            .iter()
            .filter(|id| self.find(id).is_some())
            .cloned()
            .collect();
        if !clashes.is_empty() {
            return Err(clashes);
        }
        let added = ids.len();
        self.nodes.extend(ids.into_iter().map(Node::new));
        Ok(added)
    }
}

impl<'a> IntoIterator for &'a NodeRegistry {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::cascada_common::variable::{ScalarType, Slot};

    fn registry(ids: &[&str]) -> NodeRegistry {
        let mut registry = NodeRegistry::default();
        registry
            .extend_all(ids.iter().map(|id| id.to_string()).collect())
            .unwrap();
        registry
    }

    #[test]
    fn nodes_keep_allocation_order() {
        let registry = registry(&["n0", "n1", "n2"]);
        let ids: Vec<_> = registry.iter().map(Node::id).collect();
        assert_eq!(ids, ["n0", "n1", "n2"]);
        assert!(registry.iter().all(|node| node.variable_count() == 0));
    }

    #[test]
    fn find_node_by_id() {
        let registry = registry(&["n0", "n1"]);
        assert_eq!(registry.find("n1").map(Node::id), Some("n1"));
        assert!(registry.find("n7").is_none());
    }

    #[test]
    fn contains_checks_identity() {
        let registry = registry(&["n0"]);
        let stranger = Node::new("n0".to_owned());
        assert!(registry.contains(registry.find("n0").unwrap()));
        assert!(!registry.contains(&stranger));
    }

    #[test]
    fn clashing_ids_add_nothing() {
        let mut registry = registry(&["n0"]);
        let clashes = registry
            .extend_all(vec!["n1".to_owned(), "n0".to_owned()])
            .unwrap_err();
        assert_eq!(clashes, ["n0"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn node_binds_once_per_name() {
        let node = Node::new("n0".to_owned());
        let x = Slot::new(1.0f32);
        assert!(node.bind("X", &x));
        assert!(!node.bind("X", Slot::new(3.0f32)));
        assert_eq!(node.value("X"), Some(1.0));
    }

    #[test]
    fn node_projects_from_worker_store() {
        let node = Node::new("n0".to_owned());
        assert!(node.declare("X", ScalarType::Float));
        assert_eq!(node.value("X"), Some(0.0));
        let x = Slot::new(4.5f32);
        let mut worker = VariableStore::new();
        worker.bind("X", &x);
        assert!(node.project_from(&worker).is_ok());
        x.set(8.0);
        assert_eq!(node.value("X"), Some(8.0));
        assert_eq!(node.value("Y"), None);
        assert_eq!(node.variable_count(), 1);
    }
}
