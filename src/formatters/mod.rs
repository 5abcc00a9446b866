pub mod json_graph;

pub use json_graph::{artifact_path, JsonGraphFormatter};
