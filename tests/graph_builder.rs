use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use typegraph::core::{
    BaseType, GraphBuilder, LinkType, Module, ModuleScope, ScanMode, SymbolResolver, TypeGraph,
};

#[derive(Debug, Clone, Default)]
struct FakeDecl {
    simple: String,
    module: String,
    file: String,
    args: Vec<String>,
    refs: Vec<String>,
    base: Option<BaseType<String>>,
}

/// In-memory resolver keyed by fully-qualified name.
#[derive(Default)]
struct FakeResolver {
    decls: HashMap<String, FakeDecl>,
    units: HashMap<PathBuf, Vec<String>>,
}

impl FakeResolver {
    fn declare(&mut self, module: &str, unit: &str, full_name: &str) -> &mut FakeDecl {
        self.units
            .entry(PathBuf::from(unit))
            .or_default()
            .push(full_name.to_string());
        self.decls.entry(full_name.to_string()).or_insert_with(|| FakeDecl {
            simple: full_name.rsplit('.').next().unwrap_or(full_name).to_string(),
            module: module.to_string(),
            file: unit.to_string(),
            ..FakeDecl::default()
        })
    }
}

impl SymbolResolver for FakeResolver {
    type Type = String;

    fn declared_types(&self, unit: &Path) -> Result<Vec<String>> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| anyhow!("unknown unit {}", unit.display()))
    }

    fn fully_qualified_name(&self, ty: &String) -> String {
        ty.clone()
    }

    fn simple_name(&self, ty: &String) -> String {
        self.decls
            .get(ty)
            .map(|decl| decl.simple.clone())
            .unwrap_or_else(|| ty.clone())
    }

    fn display_name(&self, ty: &String) -> String {
        self.simple_name(ty)
    }

    fn is_generic(&self, ty: &String) -> bool {
        self.decls.get(ty).map(|d| !d.args.is_empty()).unwrap_or(false)
    }

    fn type_arguments(&self, ty: &String) -> Vec<String> {
        self.decls.get(ty).map(|d| d.args.clone()).unwrap_or_default()
    }

    fn referenced_types(&self, ty: &String, scope: &ModuleScope) -> Result<Vec<String>> {
        let refs = self.decls.get(ty).map(|d| d.refs.clone()).unwrap_or_default();
        Ok(refs
            .into_iter()
            .filter(|target| match self.decls.get(target) {
                Some(decl) => scope.contains(&decl.module),
                None => true,
            })
            .collect())
    }

    fn direct_base_type(&self, ty: &String) -> BaseType<String> {
        self.decls
            .get(ty)
            .and_then(|d| d.base.clone())
            .unwrap_or(BaseType::Root)
    }

    fn owning_module(&self, ty: &String) -> String {
        self.decls.get(ty).map(|d| d.module.clone()).unwrap_or_default()
    }

    fn declaring_source_location(&self, ty: &String) -> String {
        self.decls.get(ty).map(|d| d.file.clone()).unwrap_or_default()
    }
}

fn module(name: &str, units: &[&str]) -> Module {
    Module::new(name, format!("/src/{name}"))
        .with_units(units.iter().map(PathBuf::from).collect())
}

fn build(resolver: &FakeResolver, modules: &[Module], mode: ScanMode) -> TypeGraph {
    let mut graph = TypeGraph::new();
    GraphBuilder::new(resolver, mode)
        .build(modules, &mut graph)
        .unwrap();
    graph
}

fn edges(graph: &TypeGraph) -> Vec<(String, String, LinkType)> {
    let mut edges: Vec<_> = graph
        .links()
        .iter()
        .map(|edge| {
            (
                graph.node(edge.source).unwrap().name.clone(),
                graph.node(edge.target).unwrap().name.clone(),
                edge.link_type,
            )
        })
        .collect();
    edges.sort_by(|a, b| (&a.0, &a.1, a.2.as_str()).cmp(&(&b.0, &b.1, b.2.as_str())));
    edges
}

#[test]
fn field_reference_yields_single_reference_edge() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.A").refs = vec!["P.B".into()];
    resolver.declare("P", "b.cs", "P.B");

    let graph = build(&resolver, &[module("P", &["a.cs", "b.cs"])], ScanMode::Reference);

    assert_eq!(graph.node_count(), 2);
    assert_eq!(
        edges(&graph),
        vec![("P.A".into(), "P.B".into(), LinkType::Reference)]
    );
}

#[test]
fn inheritance_records_direct_base_only() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "base.cs", "P.Base").base = Some(BaseType::Root);
    resolver.declare("P", "derived.cs", "P.Derived").base = Some(BaseType::Type("P.Base".into()));

    let graph = build(
        &resolver,
        &[module("P", &["base.cs", "derived.cs"])],
        ScanMode::Inheritance,
    );

    assert_eq!(
        edges(&graph),
        vec![("P.Derived".into(), "P.Base".into(), LinkType::Inheritance)]
    );
}

#[test]
fn three_level_chain_has_no_transitive_edge() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "x.cs", "P.A");
    resolver.declare("P", "x.cs", "P.B").base = Some(BaseType::Type("P.A".into()));
    resolver.declare("P", "x.cs", "P.C").base = Some(BaseType::Type("P.B".into()));

    let graph = build(&resolver, &[module("P", &["x.cs"])], ScanMode::Inheritance);

    assert_eq!(graph.count_of(LinkType::Inheritance), 2);
    let c = graph.id_of("P.C").unwrap();
    let a = graph.id_of("P.A").unwrap();
    assert!(!graph.has_link(c, a, LinkType::Inheritance));
}

#[test]
fn external_reference_produces_no_node_or_edge() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.A").refs = vec!["System.Collections.Generic.List<T>".into()];

    let mut graph = TypeGraph::new();
    let stats = GraphBuilder::new(&resolver, ScanMode::Reference)
        .build(&[module("P", &["a.cs"])], &mut graph)
        .unwrap();

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(stats.dropped_references, 1);
}

#[test]
fn self_reference_is_suppressed_in_full_mode() {
    let mut resolver = FakeResolver::default();
    let decl = resolver.declare("P", "a.cs", "P.A");
    decl.refs = vec!["P.A".into()];
    decl.base = Some(BaseType::Type("P.A".into()));

    let graph = build(&resolver, &[module("P", &["a.cs"])], ScanMode::Full);

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn rebuilding_the_same_input_is_identical() {
    let mut resolver = FakeResolver::default();
    resolver.declare("Core", "core/a.cs", "Core.A").refs = vec!["App.B".into()];
    resolver.declare("App", "app/b.cs", "App.B").base = Some(BaseType::Type("Core.A".into()));
    let modules = [module("Core", &["core/a.cs"]), module("App", &["app/b.cs"])];

    let first = build(&resolver, &modules, ScanMode::Full);
    let second = build(&resolver, &modules, ScanMode::Full);

    assert_eq!(first.nodes(), second.nodes());
    assert_eq!(edges(&first), edges(&second));
}

#[test]
fn rerunning_into_the_same_graph_adds_nothing() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.A").refs = vec!["P.B".into()];
    resolver.declare("P", "b.cs", "P.B");
    let modules = [module("P", &["a.cs", "b.cs"])];

    let mut graph = TypeGraph::new();
    GraphBuilder::new(&resolver, ScanMode::Full)
        .build(&modules, &mut graph)
        .unwrap();
    let stats = GraphBuilder::new(&resolver, ScanMode::Full)
        .build(&modules, &mut graph)
        .unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(stats.types_registered, 0);
    assert_eq!(stats.reference_links, 0);
}

#[test]
fn forward_reference_across_modules_resolves() {
    let mut resolver = FakeResolver::default();
    resolver.declare("App", "app/a.cs", "App.Controller").refs = vec!["Data.Repository".into()];
    resolver.declare("Data", "data/r.cs", "Data.Repository");

    let graph = build(
        &resolver,
        &[module("App", &["app/a.cs"]), module("Data", &["data/r.cs"])],
        ScanMode::Reference,
    );

    assert_eq!(
        edges(&graph),
        vec![("App.Controller".into(), "Data.Repository".into(), LinkType::Reference)]
    );
}

#[test]
fn references_outside_scope_are_filtered() {
    let mut resolver = FakeResolver::default();
    resolver.declare("App", "app/a.cs", "App.A").refs = vec!["Data.B".into()];
    resolver.declare("Data", "data/b.cs", "Data.B");

    let mut graph = TypeGraph::new();
    GraphBuilder::new(&resolver, ScanMode::Reference)
        .with_scope(ModuleScope::from_iter(["App"]))
        .build(
            &[module("App", &["app/a.cs"]), module("Data", &["data/b.cs"])],
            &mut graph,
        )
        .unwrap();

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn first_registration_wins_for_partial_types() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "order.cs", "P.Order");
    resolver.declare("P", "order.generated.cs", "P.Order");

    let graph = build(
        &resolver,
        &[module("P", &["order.cs", "order.generated.cs"])],
        ScanMode::Full,
    );

    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.nodes()[0].file_path, "order.cs");
}

#[test]
fn generic_types_get_argument_short_names() {
    let mut resolver = FakeResolver::default();
    let decl = resolver.declare("P", "repo.cs", "P.Repository<TKey, TValue>");
    decl.simple = "Repository".into();
    decl.args = vec!["TKey".into(), "TValue".into()];

    let graph = build(&resolver, &[module("P", &["repo.cs"])], ScanMode::Full);

    let node = &graph.nodes()[0];
    assert_eq!(node.name, "P.Repository<TKey, TValue>");
    assert_eq!(node.short_name, "Repository<TKey,TValue>");
    assert_eq!(node.project, "P");
}

#[test]
fn base_without_distinguishable_class_yields_no_edge() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.Service").base = Some(BaseType::None);
    resolver.declare("P", "a.cs", "P.Other");

    let graph = build(&resolver, &[module("P", &["a.cs"])], ScanMode::Inheritance);

    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn unregistered_base_is_dropped() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.Controller").base =
        Some(BaseType::Type("Microsoft.AspNetCore.Mvc.ControllerBase".into()));

    let mut graph = TypeGraph::new();
    let stats = GraphBuilder::new(&resolver, ScanMode::Inheritance)
        .build(&[module("P", &["a.cs"])], &mut graph)
        .unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(stats.dropped_bases, 1);
}

#[test]
fn modules_without_types_are_skipped() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.A");
    resolver.units.insert(PathBuf::from("empty/readme.cs"), Vec::new());

    let mut graph = TypeGraph::new();
    let stats = GraphBuilder::new(&resolver, ScanMode::Full)
        .build(
            &[module("P", &["a.cs"]), module("Empty", &["empty/readme.cs"])],
            &mut graph,
        )
        .unwrap();

    assert_eq!(stats.modules_scanned, 1);
    assert_eq!(stats.modules_skipped, 1);
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn resolver_failure_aborts_the_build() {
    let resolver = FakeResolver::default();
    let mut graph = TypeGraph::new();
    let result = GraphBuilder::new(&resolver, ScanMode::Full)
        .build(&[module("P", &["missing.cs"])], &mut graph);
    assert!(result.is_err());
}

#[test]
fn every_edge_endpoint_is_a_node() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.A").refs = vec!["P.B".into(), "P.C".into(), "Ext.D".into()];
    resolver.declare("P", "b.cs", "P.B").base = Some(BaseType::Type("P.A".into()));
    resolver.declare("P", "c.cs", "P.C").base = Some(BaseType::Type("Ext.E".into()));

    let graph = build(&resolver, &[module("P", &["a.cs", "b.cs", "c.cs"])], ScanMode::Full);

    for edge in graph.links() {
        assert!(graph.node(edge.source).is_some());
        assert!(graph.node(edge.target).is_some());
        assert_ne!(edge.source, edge.target);
    }
    assert_eq!(graph.count_of(LinkType::Reference), 2);
    assert_eq!(graph.count_of(LinkType::Inheritance), 1);
}

#[test]
fn empty_explicit_scope_keeps_every_reference_out() {
    let mut resolver = FakeResolver::default();
    resolver.declare("P", "a.cs", "P.A").refs = vec!["P.B".into()];
    resolver.declare("P", "b.cs", "P.B").base = Some(BaseType::Type("P.A".into()));

    let mut graph = TypeGraph::new();
    GraphBuilder::new(&resolver, ScanMode::Full)
        .with_scope(ModuleScope::new())
        .build(&[module("P", &["a.cs", "b.cs"])], &mut graph)
        .unwrap();

    assert_eq!(graph.count_of(LinkType::Reference), 0);
    assert_eq!(graph.count_of(LinkType::Inheritance), 1);
}
