//! Worker-node client of the Cascada coordinator.

pub mod node;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod worker;

pub use node::{Node, NodeRegistry};
pub use protocol::{status_code, Outcome};
pub use session::{Session, SessionState};
pub use transport::{HttpTransport, Transport};
