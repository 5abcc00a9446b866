use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::builder::ScanMode;
use crate::core::graph::TypeGraph;

const ARTIFACT_SUFFIX: &str = "dependency-graph.json";

/// Writes the `{nodes, links}` artifact consumed by graph viewers.
pub struct JsonGraphFormatter {
    pretty: bool,
}

impl Default for JsonGraphFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonGraphFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.pretty = !compact;
        self
    }

    pub fn format_to_file(&self, graph: &TypeGraph, output_path: &Path) -> Result<()> {
        let json_content = self.format_graph(graph)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(output_path, json_content)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }

    pub fn format_graph(&self, graph: &TypeGraph) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(graph)?
        } else {
            serde_json::to_string(graph)?
        };
        Ok(json)
    }
}

/// `<input file name>.<mode>.dependency-graph.json` inside `out_dir`.
pub fn artifact_path(input: &Path, mode: ScanMode, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string());
    out_dir.join(format!("{stem}.{}.{ARTIFACT_SUFFIX}", mode.as_str()))
}
