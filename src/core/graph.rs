use petgraph::{graph::NodeIndex, Directed, Graph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Dense, zero-based identity of a fully-qualified type name within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LinkType {
    Reference,
    Inheritance,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Reference => "Reference",
            LinkType::Inheritance => "Inheritance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: TypeId,
    pub name: String,
    pub short_name: String,
    pub project: String,
    pub file_path: String,
}

impl Node {
    /// Build a node record, normalising `file_path` to an absolute path when it
    /// points at an existing file. Synthesized nodes keep an empty path.
    pub fn create(
        id: TypeId,
        name: impl Into<String>,
        short_name: impl Into<String>,
        project: impl Into<String>,
        file_path: &str,
    ) -> Self {
        let file_path = if file_path.trim().is_empty() {
            String::new()
        } else {
            Path::new(file_path)
                .canonicalize()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| file_path.to_string())
        };

        Self {
            id,
            name: name.into(),
            short_name: short_name.into(),
            project: project.into(),
            file_path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: TypeId,
    pub target: TypeId,
    pub link_type: LinkType,
}

impl Edge {
    pub fn new(link_type: LinkType, source: TypeId, target: TypeId) -> Self {
        Self {
            source,
            target,
            link_type,
        }
    }
}

/// Maps fully-qualified names to identities, allocating in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    ids: HashMap<String, TypeId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&mut self, full_name: &str) -> TypeId {
        if let Some(id) = self.ids.get(full_name) {
            return *id;
        }
        let id = TypeId(self.ids.len());
        self.ids.insert(full_name.to_string(), id);
        id
    }

    pub fn lookup(&self, full_name: &str) -> Option<TypeId> {
        self.ids.get(full_name).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Insertion-ordered node records. The first record stored for an id wins.
#[derive(Debug, Default, Clone)]
pub struct NodeTable {
    nodes: Vec<Node>,
    positions: HashMap<TypeId, usize>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> bool {
        if self.positions.contains_key(&node.id) {
            return false;
        }
        self.positions.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn get(&self, id: TypeId) -> Option<&Node> {
        self.positions.get(&id).map(|&pos| &self.nodes[pos])
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn values(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Insertion-ordered, kind-tagged edges, deduplicated by a triple index.
#[derive(Debug, Default, Clone)]
pub struct EdgeSet {
    edges: Vec<Edge>,
    seen: HashSet<Edge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the edge unless it is a self edge or already present.
    pub fn add(&mut self, source: TypeId, target: TypeId, link_type: LinkType) -> bool {
        if source == target {
            return false;
        }
        let edge = Edge::new(link_type, source, target);
        if !self.seen.insert(edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, source: TypeId, target: TypeId, link_type: LinkType) -> bool {
        self.seen.contains(&Edge::new(link_type, source, target))
    }

    pub fn values(&self) -> &[Edge] {
        &self.edges
    }

    pub fn count_of(&self, link_type: LinkType) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.link_type == link_type)
            .count()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Per-run accumulator owning the registry, node table and edge set.
#[derive(Debug, Default, Clone)]
pub struct TypeGraph {
    registry: IdentityRegistry,
    nodes: NodeTable,
    links: EdgeSet,
}

/// Graph view handed to downstream consumers that want petgraph algorithms.
pub type TypeDependencyGraph = Graph<Node, LinkType, Directed>;

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures an identity for `full_name` and stores its node on first sight.
    /// Blank names are never registered.
    pub fn register(
        &mut self,
        full_name: &str,
        short_name: &str,
        project: &str,
        file_path: &str,
    ) -> Option<TypeId> {
        if full_name.trim().is_empty() {
            return None;
        }
        let id = self.registry.ensure(full_name);
        if !self.nodes.contains(id) {
            self.nodes
                .insert(Node::create(id, full_name, short_name, project, file_path));
        }
        Some(id)
    }

    pub fn id_of(&self, full_name: &str) -> Option<TypeId> {
        self.registry.lookup(full_name)
    }

    /// Records an edge only when both endpoints are known nodes.
    pub fn link(&mut self, source: TypeId, target: TypeId, link_type: LinkType) -> bool {
        if !self.nodes.contains(source) || !self.nodes.contains(target) {
            return false;
        }
        self.links.add(source, target, link_type)
    }

    pub fn node(&self, id: TypeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        self.nodes.values()
    }

    pub fn links(&self) -> &[Edge] {
        self.links.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.links.len()
    }

    pub fn count_of(&self, link_type: LinkType) -> usize {
        self.links.count_of(link_type)
    }

    pub fn has_link(&self, source: TypeId, target: TypeId, link_type: LinkType) -> bool {
        self.links.contains(source, target, link_type)
    }

    pub fn to_petgraph(&self) -> TypeDependencyGraph {
        let mut graph = Graph::with_capacity(self.node_count(), self.edge_count());
        let mut index: HashMap<TypeId, NodeIndex> = HashMap::with_capacity(self.node_count());

        for node in self.nodes() {
            index.insert(node.id, graph.add_node(node.clone()));
        }
        for edge in self.links() {
            if let (Some(&source), Some(&target)) =
                (index.get(&edge.source), index.get(&edge.target))
            {
                graph.add_edge(source, target, edge.link_type);
            }
        }

        graph
    }
}

#[derive(Serialize)]
struct Artifact<'a> {
    nodes: &'a [Node],
    links: &'a [Edge],
}

impl Serialize for TypeGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Artifact {
            nodes: self.nodes(),
            links: self.links(),
        }
        .serialize(serializer)
    }
}
