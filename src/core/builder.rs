use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::graph::{LinkType, TypeGraph, TypeId};
use super::resolver::{BaseType, ModuleScope, SymbolResolver};
use super::scanner::Module;

/// Which edge kinds link discovery produces.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ScanMode {
    Reference,
    Inheritance,
    Full,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Reference => "reference",
            ScanMode::Inheritance => "inheritance",
            ScanMode::Full => "full",
        }
    }

    pub fn scans_references(self) -> bool {
        matches!(self, ScanMode::Reference | ScanMode::Full)
    }

    pub fn scans_inheritance(self) -> bool {
        matches!(self, ScanMode::Inheritance | ScanMode::Full)
    }
}

/// Counters reported at the end of a build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub modules_scanned: usize,
    pub modules_skipped: usize,
    pub types_registered: usize,
    pub types_linked: usize,
    pub reference_links: usize,
    pub inheritance_links: usize,
    pub dropped_references: usize,
    pub dropped_bases: usize,
}

/// Declared types collected for one module during registration.
#[derive(Debug, Clone)]
pub struct RegisteredModule<T> {
    pub name: String,
    pub types: Vec<T>,
}

/// Short display name: `Name` or `Name<Arg1,Arg2>` for generic types.
pub fn short_name<R: SymbolResolver>(resolver: &R, ty: &R::Type) -> String {
    let simple = resolver.simple_name(ty);
    let simple = if simple.trim().is_empty() {
        resolver.fully_qualified_name(ty)
    } else {
        simple
    };

    if !resolver.is_generic(ty) {
        return simple;
    }

    let args: Vec<String> = resolver
        .type_arguments(ty)
        .iter()
        .map(|arg| resolver.display_name(arg))
        .collect();
    format!("{}<{}>", simple, args.join(","))
}

/// Two-phase orchestrator: registration of every declared type, then link discovery.
pub struct GraphBuilder<'r, R: SymbolResolver> {
    resolver: &'r R,
    mode: ScanMode,
    scope: Option<ModuleScope>,
}

impl<'r, R: SymbolResolver> GraphBuilder<'r, R> {
    pub fn new(resolver: &'r R, mode: ScanMode) -> Self {
        Self {
            resolver,
            mode,
            scope: None,
        }
    }

    /// Overrides the scope used to filter references; defaults to the built modules.
    /// An empty scope keeps every reference out.
    pub fn with_scope(mut self, scope: ModuleScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Registers every module, then discovers links for every module.
    pub fn build(&self, modules: &[Module], graph: &mut TypeGraph) -> Result<BuildStats> {
        let scope = self
            .scope
            .clone()
            .unwrap_or_else(|| ModuleScope::from_modules(modules));

        let mut stats = BuildStats::default();
        let mut registered = Vec::with_capacity(modules.len());

        for module in modules {
            let entry = self.register_module(module, graph, &mut stats)?;
            if entry.types.is_empty() {
                info!(module = %module.name, "no declared types, skipping module");
                stats.modules_skipped += 1;
                continue;
            }
            registered.push(entry);
        }

        for entry in &registered {
            self.link_in_scope(entry, &scope, graph, &mut stats)?;
            stats.modules_scanned += 1;
        }

        Ok(stats)
    }

    /// Phase 1: registers the declared types of every unit in `module`.
    pub fn register_module(
        &self,
        module: &Module,
        graph: &mut TypeGraph,
        stats: &mut BuildStats,
    ) -> Result<RegisteredModule<R::Type>> {
        let mut types = Vec::new();

        for unit in &module.units {
            for ty in self.resolver.declared_types(unit)? {
                let full_name = self.resolver.fully_qualified_name(&ty);
                if full_name.trim().is_empty() {
                    debug!(unit = %unit.display(), "skipping type without a qualified name");
                    continue;
                }

                let before = graph.node_count();
                graph.register(
                    &full_name,
                    &short_name(self.resolver, &ty),
                    &self.resolver.owning_module(&ty),
                    &self.resolver.declaring_source_location(&ty),
                );
                if graph.node_count() > before {
                    stats.types_registered += 1;
                }
                types.push(ty);
            }
        }

        info!(
            module = %module.name,
            units = module.units.len(),
            types = types.len(),
            "registered module types"
        );

        Ok(RegisteredModule {
            name: module.name.clone(),
            types,
        })
    }

    /// Phase 2: records reference and/or inheritance edges for a registered module.
    /// Without an explicit scope only the module itself is in scope.
    pub fn link_module(
        &self,
        module: &RegisteredModule<R::Type>,
        graph: &mut TypeGraph,
        stats: &mut BuildStats,
    ) -> Result<()> {
        match &self.scope {
            Some(scope) => self.link_in_scope(module, scope, graph, stats),
            None => {
                let scope = ModuleScope::from_iter([module.name.as_str()]);
                self.link_in_scope(module, &scope, graph, stats)
            }
        }
    }

    fn link_in_scope(
        &self,
        module: &RegisteredModule<R::Type>,
        scope: &ModuleScope,
        graph: &mut TypeGraph,
        stats: &mut BuildStats,
    ) -> Result<()> {
        for ty in &module.types {
            let full_name = self.resolver.fully_qualified_name(ty);
            let Some(source) = graph.id_of(&full_name) else {
                debug!(type_name = %full_name, "type was never registered, skipping links");
                continue;
            };
            stats.types_linked += 1;

            if self.mode.scans_references() {
                self.scan_references(ty, source, &full_name, scope, graph, stats)?;
            }
            if self.mode.scans_inheritance() {
                self.scan_inheritance(ty, source, graph, stats);
            }
        }

        info!(module = %module.name, mode = self.mode.as_str(), "linked module types");
        Ok(())
    }

    fn scan_references(
        &self,
        ty: &R::Type,
        source: TypeId,
        full_name: &str,
        scope: &ModuleScope,
        graph: &mut TypeGraph,
        stats: &mut BuildStats,
    ) -> Result<()> {
        for referenced in self.resolver.referenced_types(ty, scope)? {
            let target_name = self.resolver.fully_qualified_name(&referenced);
            if target_name == full_name {
                continue;
            }
            match graph.id_of(&target_name) {
                Some(target) => {
                    if graph.link(source, target, LinkType::Reference) {
                        stats.reference_links += 1;
                    }
                }
                None => {
                    stats.dropped_references += 1;
                    debug!(from = %full_name, to = %target_name, "reference target is not a node");
                }
            }
        }
        Ok(())
    }

    // Only the direct base is linked; ancestors get their own edge when they are scanned.
    fn scan_inheritance(
        &self,
        ty: &R::Type,
        source: TypeId,
        graph: &mut TypeGraph,
        stats: &mut BuildStats,
    ) {
        let base = match self.resolver.direct_base_type(ty) {
            BaseType::Type(base) => base,
            BaseType::None | BaseType::Root => return,
        };

        let base_name = self.resolver.fully_qualified_name(&base);
        match graph.id_of(&base_name) {
            Some(target) => {
                if graph.link(source, target, LinkType::Inheritance) {
                    stats.inheritance_links += 1;
                }
            }
            None => {
                stats.dropped_bases += 1;
                debug!(base = %base_name, "base type is not a node");
            }
        }
    }
}
