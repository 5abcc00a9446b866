use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{DeclaredType, FileSymbols, TypeKind, TypeMention};
use crate::core::resolver::{BaseType, ModuleScope, SymbolResolver};

/// Names of the root type when they do not resolve to a declaration in the solution.
const ROOT_TYPE_NAMES: &[&str] = &["Object", "System.Object"];

/// Handle to a type known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CsType {
    /// A type declared in one of the indexed modules.
    Declared(usize),
    /// A generic type parameter such as `T`.
    Parameter(String),
    /// A mention that could not be resolved to an indexed declaration.
    External(String),
}

/// Extracted symbols of one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleSymbols {
    pub module: String,
    pub files: Vec<FileSymbols>,
}

#[derive(Debug, Clone)]
struct TypeEntry {
    decl: DeclaredType,
    full_name: String,
    module: String,
    file: PathBuf,
}

/// Solution-wide index of C# declarations, answering resolver queries by scope rules.
#[derive(Debug, Default)]
pub struct TypeIndex {
    entries: Vec<TypeEntry>,
    by_file: HashMap<PathBuf, Vec<usize>>,
    by_path: HashMap<(String, usize), Vec<usize>>,
    by_full_name: HashMap<String, Vec<usize>>,
    module_usings: HashMap<String, Vec<String>>,
    kinds: BTreeSet<TypeKind>,
}

impl TypeIndex {
    /// Indexes every declaration; `kinds` selects which ones are reported as declared types.
    pub fn from_modules(modules: Vec<ModuleSymbols>, kinds: &[TypeKind]) -> Self {
        let mut index = Self {
            kinds: kinds.iter().copied().collect(),
            ..Self::default()
        };
        for module in modules {
            index.add_module(module);
        }
        index
    }

    fn add_module(&mut self, module: ModuleSymbols) {
        let ModuleSymbols { module, files } = module;
        let usings = self.module_usings.entry(module.clone()).or_default();
        for file in &files {
            for using in &file.global_usings {
                if !usings.contains(using) {
                    usings.push(using.clone());
                }
            }
        }

        for file in files {
            let positions = self.by_file.entry(file.path.clone()).or_default();
            for decl in file.types {
                let idx = self.entries.len();
                let full_name = decl.full_name();
                self.by_path
                    .entry((decl.lookup_path(), decl.arity()))
                    .or_default()
                    .push(idx);
                self.by_full_name
                    .entry(full_name.clone())
                    .or_default()
                    .push(idx);
                positions.push(idx);
                self.entries.push(TypeEntry {
                    decl,
                    full_name,
                    module: module.clone(),
                    file: file.path.clone(),
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kind_of(&self, ty: &CsType) -> Option<TypeKind> {
        match ty {
            CsType::Declared(idx) => self.entries.get(*idx).map(|entry| entry.decl.kind),
            _ => None,
        }
    }

    /// Resolves a mention as seen from inside the declaration at `from`.
    pub fn resolve(&self, from: usize, mention: &TypeMention) -> Option<usize> {
        let entry = self.entries.get(from)?;
        if mention.is_qualified() {
            self.resolve_qualified(entry, mention)
        } else {
            self.resolve_simple(entry, &mention.segments[0], mention.arity)
        }
    }

    fn lookup(&self, path: &str, arity: usize) -> Option<usize> {
        self.by_path
            .get(&(path.to_string(), arity))
            .and_then(|candidates| candidates.first().copied())
    }

    fn resolve_simple(&self, entry: &TypeEntry, name: &str, arity: usize) -> Option<usize> {
        let decl = &entry.decl;

        // Nested types of the declaration and of its enclosing types, innermost first.
        for scope in enclosing_type_paths(decl) {
            if let Some(idx) = self.lookup(&join(&scope, name), arity) {
                return Some(idx);
            }
        }
        for namespace in namespace_chain(&decl.namespace) {
            if let Some(idx) = self.lookup(&join(&namespace, name), arity) {
                return Some(idx);
            }
        }

        // An alias settles clashes between imported namespaces.
        if let Some(alias) = decl.aliases.iter().find(|alias| alias.alias == name) {
            if arity == 0 {
                if let Some(idx) = self.lookup(&alias.target.dotted(), alias.target.arity) {
                    return Some(idx);
                }
            }
        }

        self.usings_for(entry)
            .find_map(|using| self.lookup(&join(using, name), arity))
    }

    fn resolve_qualified(&self, entry: &TypeEntry, mention: &TypeMention) -> Option<usize> {
        let decl = &entry.decl;
        let dotted = mention.dotted();
        let arity = mention.arity;

        if let Some(idx) = self.lookup(&dotted, arity) {
            return Some(idx);
        }

        let (first, rest) = mention.segments.split_first()?;
        if let Some(alias) = decl.aliases.iter().find(|alias| &alias.alias == first) {
            let expanded = join(&alias.target.dotted(), &rest.join("."));
            if let Some(idx) = self.lookup(&expanded, arity) {
                return Some(idx);
            }
        }

        for scope in enclosing_type_paths(decl)
            .into_iter()
            .chain(namespace_chain(&decl.namespace))
        {
            if let Some(idx) = self.lookup(&join(&scope, &dotted), arity) {
                return Some(idx);
            }
        }

        self.usings_for(entry)
            .find_map(|using| self.lookup(&join(using, &dotted), arity))
    }

    fn usings_for<'a>(&'a self, entry: &'a TypeEntry) -> impl Iterator<Item = &'a String> + 'a {
        let global = self
            .module_usings
            .get(&entry.module)
            .map(|usings| usings.as_slice())
            .unwrap_or(&[]);
        entry.decl.usings.iter().chain(global.iter())
    }

    /// Member names visible unqualified inside the declaration at `from`: its own,
    /// across partial parts, and those of its enclosing types.
    fn visible_members(&self, from: usize) -> HashSet<&str> {
        let mut members = HashSet::new();
        let Some(entry) = self.entries.get(from) else {
            return members;
        };

        let mut owners = vec![from];
        let mut path = entry.decl.namespace.clone();
        for container in &entry.decl.containers {
            path = join(&path, &container.name);
            if let Some(idx) = self.lookup(&path, container.type_parameters.len()) {
                owners.push(idx);
            }
        }

        for owner in owners {
            let full_name = &self.entries[owner].full_name;
            for &part in self.by_full_name.get(full_name).into_iter().flatten() {
                members.extend(self.entries[part].decl.members.iter().map(String::as_str));
            }
        }
        members
    }

    /// First base-list entry declared on any part of a (possibly partial) type,
    /// with the part that declares it.
    fn first_base(&self, idx: usize) -> Option<(usize, &TypeMention)> {
        let entry = self.entries.get(idx)?;
        if let Some(first) = entry.decl.bases.first() {
            return Some((idx, first));
        }
        self.by_full_name
            .get(&entry.full_name)?
            .iter()
            .find_map(|&part| {
                self.entries
                    .get(part)
                    .and_then(|other| other.decl.bases.first())
                    .map(|first| (part, first))
            })
    }
}

impl SymbolResolver for TypeIndex {
    type Type = CsType;

    fn declared_types(&self, unit: &Path) -> Result<Vec<CsType>> {
        let Some(positions) = self.by_file.get(unit) else {
            bail!("Source unit was not loaded: {}", unit.display());
        };
        Ok(positions
            .iter()
            .copied()
            .filter(|&idx| self.kinds.contains(&self.entries[idx].decl.kind))
            .map(CsType::Declared)
            .collect())
    }

    fn fully_qualified_name(&self, ty: &CsType) -> String {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| entry.full_name.clone())
                .unwrap_or_default(),
            CsType::Parameter(name) | CsType::External(name) => name.clone(),
        }
    }

    fn simple_name(&self, ty: &CsType) -> String {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| entry.decl.name.clone())
                .unwrap_or_default(),
            CsType::Parameter(name) => name.clone(),
            CsType::External(name) => name.rsplit('.').next().unwrap_or(name).to_string(),
        }
    }

    fn display_name(&self, ty: &CsType) -> String {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| entry.decl.segment().display())
                .unwrap_or_default(),
            other => self.simple_name(other),
        }
    }

    fn is_generic(&self, ty: &CsType) -> bool {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| entry.decl.arity() > 0)
                .unwrap_or(false),
            _ => false,
        }
    }

    fn type_arguments(&self, ty: &CsType) -> Vec<CsType> {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| {
                    entry
                        .decl
                        .type_parameters
                        .iter()
                        .cloned()
                        .map(CsType::Parameter)
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn referenced_types(&self, ty: &CsType, scope: &ModuleScope) -> Result<Vec<CsType>> {
        let CsType::Declared(from) = ty else {
            return Ok(Vec::new());
        };
        let Some(entry) = self.entries.get(*from) else {
            return Ok(Vec::new());
        };

        let members = self.visible_members(*from);
        let mut seen = HashSet::new();
        let mut referenced = Vec::new();
        for mention in &entry.decl.mentions {
            // A bare member name such as `Manager = 3;` is not a type mention.
            if !mention.is_qualified()
                && mention.arity == 0
                && members.contains(mention.segments[0].as_str())
            {
                continue;
            }
            let Some(target) = self.resolve(*from, mention) else {
                continue;
            };
            let target_entry = &self.entries[target];
            if target_entry.full_name == entry.full_name || !scope.contains(&target_entry.module) {
                continue;
            }
            if seen.insert(target) {
                referenced.push(CsType::Declared(target));
            }
        }
        Ok(referenced)
    }

    fn direct_base_type(&self, ty: &CsType) -> BaseType<CsType> {
        let CsType::Declared(idx) = ty else {
            return BaseType::None;
        };
        let Some(entry) = self.entries.get(*idx) else {
            return BaseType::None;
        };

        match entry.decl.kind {
            TypeKind::Interface => return BaseType::None,
            TypeKind::Struct => return BaseType::Root,
            TypeKind::Class | TypeKind::Record => {}
        }

        let Some((from, first)) = self.first_base(*idx) else {
            return BaseType::Root;
        };
        if first.dotted() == "object" {
            return BaseType::Root;
        }

        match self.resolve(from, first) {
            Some(target) => match self.entries[target].decl.kind {
                TypeKind::Class | TypeKind::Record => BaseType::Type(CsType::Declared(target)),
                TypeKind::Interface | TypeKind::Struct => BaseType::None,
            },
            None if ROOT_TYPE_NAMES.contains(&first.dotted().as_str()) => BaseType::Root,
            None if looks_like_interface(first) => BaseType::None,
            None => BaseType::Type(CsType::External(first.dotted())),
        }
    }

    fn owning_module(&self, ty: &CsType) -> String {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| entry.module.clone())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn declaring_source_location(&self, ty: &CsType) -> String {
        match ty {
            CsType::Declared(idx) => self
                .entries
                .get(*idx)
                .map(|entry| entry.file.to_string_lossy().into_owned())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// `IFoo` naming convention for interfaces declared outside the solution.
fn looks_like_interface(mention: &TypeMention) -> bool {
    let name = mention.segments.last().map(String::as_str).unwrap_or("");
    let mut chars = name.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('I'), Some(second)) if second.is_uppercase()
    )
}

/// Lookup paths of the declaration and its enclosing types, innermost first.
fn enclosing_type_paths(decl: &DeclaredType) -> Vec<String> {
    let mut paths = Vec::with_capacity(decl.containers.len() + 1);
    let mut path = decl.namespace.clone();
    for container in &decl.containers {
        path = join(&path, &container.name);
        paths.push(path.clone());
    }
    paths.push(join(&path, &decl.name));
    paths.reverse();
    paths
}

/// `A.B.C` -> `A.B.C`, `A.B`, `A`, `` (global).
fn namespace_chain(namespace: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = namespace.to_string();
    while !current.is_empty() {
        chain.push(current.clone());
        current = match current.rfind('.') {
            Some(pos) => current[..pos].to_string(),
            None => String::new(),
        };
    }
    chain.push(String::new());
    chain
}

fn join(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}.{name}"),
    }
}
