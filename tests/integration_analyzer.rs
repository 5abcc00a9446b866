use std::fs;
use std::path::Path;
use typegraph::core::{AnalyzerOptions, LinkType, ScanMode, SolutionAnalyzer, TypeGraph};
use typegraph::formatters::{artifact_path, JsonGraphFormatter};
use typegraph::parsers::TypeKind;

fn write<P: AsRef<Path>>(path: P, contents: &str) {
    let path = path.as_ref();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Shop.Web", "Web\Shop.Web.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Shop.Core", "Core\Shop.Core.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
"#;

fn shop_solution(root: &Path) {
    write(root.join("Shop.sln"), SOLUTION);
    write(root.join("Core/Shop.Core.csproj"), "<Project Sdk=\"Microsoft.NET.Sdk\" />");
    write(
        root.join("Core/Entity.cs"),
        r#"
namespace Shop.Core
{
    public abstract class Entity
    {
        public int Id;
    }
}
"#,
    );
    write(
        root.join("Core/Customer.cs"),
        r#"
using System.Collections.Generic;

namespace Shop.Core
{
    public class Customer : Entity, IAggregate
    {
        private List<Customer> _referrals;
    }

    public interface IAggregate
    {
    }
}
"#,
    );
    write(
        root.join("Web/Shop.Web.csproj"),
        "<Project Sdk=\"Microsoft.NET.Sdk.Web\" />",
    );
    write(
        root.join("Web/OrderController.cs"),
        r#"
using Shop.Core;

namespace Shop.Web
{
    public class OrderController : ControllerBase
    {
        private Customer _customer;
        private string _name;
    }
}
"#,
    );
}

fn analyze(root: &Path, mode: ScanMode) -> TypeGraph {
    let options = AnalyzerOptions::new().with_mode(mode).with_cache(false);
    SolutionAnalyzer::new(options)
        .unwrap()
        .analyze(&root.join("Shop.sln"))
        .unwrap()
        .graph
}

fn has(graph: &TypeGraph, from: &str, to: &str, link_type: LinkType) -> bool {
    match (graph.id_of(from), graph.id_of(to)) {
        (Some(source), Some(target)) => graph.has_link(source, target, link_type),
        _ => false,
    }
}

#[test]
fn full_mode_links_across_projects() {
    let dir = tempfile::TempDir::new().unwrap();
    shop_solution(dir.path());

    let graph = analyze(dir.path(), ScanMode::Full);

    let mut names: Vec<&str> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["Shop.Core.Customer", "Shop.Core.Entity", "Shop.Web.OrderController"]
    );

    assert!(has(&graph, "Shop.Web.OrderController", "Shop.Core.Customer", LinkType::Reference));
    assert!(has(&graph, "Shop.Core.Customer", "Shop.Core.Entity", LinkType::Inheritance));
    assert_eq!(graph.count_of(LinkType::Inheritance), 1);

    let controller = graph.id_of("Shop.Web.OrderController").unwrap();
    let node = graph.node(controller).unwrap();
    assert_eq!(node.project, "Shop.Web");
    assert_eq!(node.short_name, "OrderController");
    assert!(node.file_path.ends_with("OrderController.cs"));
}

#[test]
fn reference_and_inheritance_modes_select_link_kinds() {
    let dir = tempfile::TempDir::new().unwrap();
    shop_solution(dir.path());

    let references = analyze(dir.path(), ScanMode::Reference);
    assert_eq!(references.count_of(LinkType::Inheritance), 0);
    assert!(references.count_of(LinkType::Reference) > 0);

    let inheritance = analyze(dir.path(), ScanMode::Inheritance);
    assert_eq!(inheritance.count_of(LinkType::Reference), 0);
    assert_eq!(inheritance.count_of(LinkType::Inheritance), 1);
    assert_eq!(references.node_count(), inheritance.node_count());
}

#[test]
fn repeated_runs_produce_identical_artifacts() {
    let dir = tempfile::TempDir::new().unwrap();
    shop_solution(dir.path());
    let formatter = JsonGraphFormatter::new();

    let first = formatter.format_graph(&analyze(dir.path(), ScanMode::Full)).unwrap();
    let second = formatter.format_graph(&analyze(dir.path(), ScanMode::Full)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cached_runs_match_uncached_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    shop_solution(dir.path());
    let options = AnalyzerOptions::new().with_cache_dir(dir.path().join(".cache"));

    let analyzer = SolutionAnalyzer::new(options).unwrap();
    let cold = analyzer.analyze(&dir.path().join("Shop.sln")).unwrap();
    let warm = analyzer.analyze(&dir.path().join("Shop.sln")).unwrap();
    let uncached = analyze(dir.path(), ScanMode::Full);

    assert_eq!(cold.graph.nodes(), uncached.nodes());
    assert_eq!(warm.graph.nodes(), uncached.nodes());
    assert_eq!(warm.graph.edge_count(), uncached.edge_count());
}

#[test]
fn interfaces_become_nodes_when_selected() {
    let dir = tempfile::TempDir::new().unwrap();
    shop_solution(dir.path());
    let options = AnalyzerOptions::new()
        .with_kinds(vec![TypeKind::Class, TypeKind::Interface])
        .with_cache(false);

    let graph = SolutionAnalyzer::new(options)
        .unwrap()
        .analyze(&dir.path().join("Shop.sln"))
        .unwrap()
        .graph;

    assert!(graph.id_of("Shop.Core.IAggregate").is_some());
    assert!(has(&graph, "Shop.Core.Customer", "Shop.Core.IAggregate", LinkType::Reference));
    assert!(!has(&graph, "Shop.Core.Customer", "Shop.Core.IAggregate", LinkType::Inheritance));
}

#[test]
fn artifact_is_written_next_to_the_solution() {
    let dir = tempfile::TempDir::new().unwrap();
    shop_solution(dir.path());
    let graph = analyze(dir.path(), ScanMode::Full);

    let output = artifact_path(&dir.path().join("Shop.sln"), ScanMode::Full, dir.path());
    JsonGraphFormatter::new().format_to_file(&graph, &output).unwrap();

    assert!(dir.path().join("Shop.sln.full.dependency-graph.json").exists());
}

#[test]
fn missing_input_fails_without_output() {
    let dir = tempfile::TempDir::new().unwrap();
    let analyzer = SolutionAnalyzer::new(AnalyzerOptions::new().with_cache(false)).unwrap();
    assert!(analyzer.analyze(&dir.path().join("Missing.sln")).is_err());
}

#[test]
fn sources_without_types_fail() {
    let dir = tempfile::TempDir::new().unwrap();
    write(dir.path().join("src/Empty.cs"), "// nothing here\n");
    let analyzer = SolutionAnalyzer::new(AnalyzerOptions::new().with_cache(false)).unwrap();
    assert!(analyzer.analyze(&dir.path().join("src")).is_err());
}
