//! Typed variable store: binds names described by the coordinator to
//! scalar storage owned by worker code.

mod binding;
mod location;
mod scalar_type;
mod store;

pub use binding::{Binding, Variable};
pub use location::{Location, Slot};
pub use scalar_type::ScalarType;
pub use store::{ProjectStatus, VariableStore};
