use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

use super::scanner::Module;

/// Outcome of asking for a type's direct base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseType<T> {
    /// The type has no base class (interfaces, or a base that is an interface).
    None,
    /// The base is the universal root type (`object`, `ValueType`).
    Root,
    Type(T),
}

impl<T> BaseType<T> {
    pub fn into_type(self) -> Option<T> {
        match self {
            BaseType::Type(ty) => Some(ty),
            BaseType::None | BaseType::Root => None,
        }
    }
}

/// The set of modules whose declarations count as in-solution types.
///
/// Membership is by exact module name; source paths are never compared by prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleScope {
    modules: BTreeSet<String>,
}

impl ModuleScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_modules(modules: &[Module]) -> Self {
        modules.iter().map(|module| module.name.clone()).collect()
    }

    pub fn insert(&mut self, module: impl Into<String>) {
        self.modules.insert(module.into());
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ModuleScope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Language-aware symbol facility consumed by the graph builder.
///
/// Errors are reserved for environment failures (a unit that cannot be read or
/// parsed). Resolution gaps are expressed as empty results or `BaseType::None`.
pub trait SymbolResolver {
    type Type: Clone;

    /// All named types declared in a source unit, in declaration order.
    fn declared_types(&self, unit: &Path) -> Result<Vec<Self::Type>>;

    fn fully_qualified_name(&self, ty: &Self::Type) -> String;

    fn simple_name(&self, ty: &Self::Type) -> String;

    /// Minimally-qualified display form, used for generic arguments.
    fn display_name(&self, ty: &Self::Type) -> String;

    fn is_generic(&self, ty: &Self::Type) -> bool;

    fn type_arguments(&self, ty: &Self::Type) -> Vec<Self::Type>;

    /// Named types mentioned in the body of `ty` whose declaring module is in `scope`.
    fn referenced_types(&self, ty: &Self::Type, scope: &ModuleScope) -> Result<Vec<Self::Type>>;

    fn direct_base_type(&self, ty: &Self::Type) -> BaseType<Self::Type>;

    fn owning_module(&self, ty: &Self::Type) -> String;

    fn declaring_source_location(&self, ty: &Self::Type) -> String;
}
