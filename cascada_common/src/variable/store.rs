use ::core::fmt::Display;
use ::std::ops::{BitOr, BitOrAssign};

use ::indexmap::IndexMap;

use super::{Binding, Location, ScalarType, Variable};

/// Status bits returned by [VariableStore::project].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStatus(u8);

impl ProjectStatus {
    pub const OK: Self = Self(0);
    /// A same-named source entry has a different scalar type.
    pub const TYPE_INCOMPATIBLE: Self = Self(1);
    /// No same-named entry in the source.
    pub const NOT_FOUND: Self = Self(2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProjectStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProjectStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Ordered collection of variables with unique names.
///
/// Entries keep their insertion order and are never removed one by one.
/// Bound entries hold clones of worker-owned [Location]s; dropping the store
/// never touches the values behind them.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: IndexMap<String, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable unless one with the same name exists.
    /// An existing entry is never overwritten, whatever its type or binding.
    /// # Return
    /// - `true` if the variable was added.
    /// - `false` if the name was already taken.
    pub fn insert_if_absent(&mut self, name: &str, binding: Binding) -> bool {
        if self.variables.contains_key(name) {
            return false;
        }
        self.variables
            .insert(name.to_owned(), Variable::new(name, binding));
        true
    }

    /// Declare a schema entry: a name and a type without storage.
    pub fn declare(&mut self, name: &str, scalar_type: ScalarType) -> bool {
        self.insert_if_absent(name, Binding::Unbound(scalar_type))
    }

    /// Bind a name to worker-owned storage.
    pub fn bind(&mut self, name: &str, location: impl Into<Location>) -> bool {
        self.insert_if_absent(name, Binding::Bound(location.into()))
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.variables.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Rebind every entry of `self` to the storage of the same-named entry in `source`.
    ///
    /// Entries are aliased, not copied. The pass never stops early: every entry is
    /// visited and the returned status is the union of all problems found.
    /// A source entry of the right type but without storage leaves the target as it is.
    pub fn project(&mut self, source: &VariableStore) -> ProjectStatus {
        let mut status = ProjectStatus::OK;
        for target in self.variables.values_mut() {
            match source.lookup(target.name()) {
                None => status |= ProjectStatus::NOT_FOUND,
                Some(found) if found.scalar_type() != target.scalar_type() => {
                    status |= ProjectStatus::TYPE_INCOMPATIBLE
                }
                Some(found) => {
                    if let Some(location) = found.location() {
                        target.rebind(location.clone());
                    }
                }
            }
        }
        status
    }
}

impl<'a> IntoIterator for &'a VariableStore {
    type Item = &'a Variable;
    type IntoIter = indexmap::map::Values<'a, String, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.values()
    }
}

/// One variable per line.
impl Display for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for variable in self.iter() {
            writeln!(f, "{}", variable)?;
        }
        Ok(())
    }
}
