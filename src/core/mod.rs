pub mod analyzer;
pub mod builder;
pub mod graph;
pub mod resolver;
pub mod scanner;

pub use analyzer::{Analysis, AnalyzerOptions, SolutionAnalyzer};
pub use builder::{BuildStats, GraphBuilder, ScanMode};
pub use graph::{
    Edge, EdgeSet, IdentityRegistry, LinkType, Node, NodeTable, TypeDependencyGraph, TypeGraph,
    TypeId,
};
pub use resolver::{BaseType, ModuleScope, SymbolResolver};
pub use scanner::{Module, WorkspaceScanner};
