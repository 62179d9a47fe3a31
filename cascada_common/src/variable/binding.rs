use ::core::fmt::Display;

use super::{Location, ScalarType};

/// What a variable name refers to.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Schema entry: a declared type without storage.
    Unbound(ScalarType),
    /// Concrete storage owned by worker code.
    Bound(Location),
}

/// A named scalar field of a work unit.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    binding: Binding,
}

impl Variable {
    pub fn new(name: impl Into<String>, binding: Binding) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn scalar_type(&self) -> ScalarType {
        match &self.binding {
            Binding::Unbound(scalar_type) => *scalar_type,
            Binding::Bound(location) => location.scalar_type(),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match &self.binding {
            Binding::Unbound(_) => None,
            Binding::Bound(location) => Some(location),
        }
    }

    /// Current value widened to a double, `0.0` when the variable has no storage.
    /// A `0.0` result does not tell whether the variable was bound.
    pub fn to_double(&self) -> f64 {
        self.location().map_or(0.0, Location::to_f64)
    }

    pub(super) fn rebind(&mut self, location: Location) {
        self.binding = Binding::Bound(location);
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.binding {
            Binding::Unbound(_) => write!(f, "{}: None", self.name),
            Binding::Bound(location) => write!(f, "{}: {}", self.name, location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Slot;

    #[test]
    fn display_variable() {
        let bound = Variable::new("count", Binding::Bound(Slot::new(12u32).into()));
        assert_eq!(bound.to_string(), "count: 12");
        let float = Variable::new("X", Binding::Bound(Slot::new(2.0f32).into()));
        assert_eq!(float.to_string(), "X: 2.000000");
        let unbound = Variable::new("Y", Binding::Unbound(ScalarType::Double));
        assert_eq!(unbound.to_string(), "Y: None");
    }

    #[test]
    fn unbound_variable_widens_to_zero() {
        let unbound = Variable::new("Y", Binding::Unbound(ScalarType::I64));
        assert_eq!(unbound.to_double(), 0.0);
        assert_eq!(unbound.scalar_type(), ScalarType::I64);
        assert!(unbound.location().is_none());
    }

    #[test]
    fn double_round_trips_exactly() {
        let slot = Slot::new(0.1f64);
        let variable = Variable::new("d", Binding::Bound(slot.clone().into()));
        assert_eq!(variable.to_double(), 0.1);
        slot.set(-1.5e300);
        assert_eq!(variable.to_double(), -1.5e300);
    }
}
