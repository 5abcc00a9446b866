use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use super::builder::{BuildStats, GraphBuilder, ScanMode};
use super::graph::TypeGraph;
use super::scanner::{Module, WorkspaceScanner};
use crate::parsers::cache::SymbolCache;
use crate::parsers::csharp::CSharpExtractor;
use crate::parsers::index::{ModuleSymbols, TypeIndex};
use crate::parsers::{FileSymbols, SymbolExtractor, TypeKind};

/// Knobs for a single analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub mode: ScanMode,
    pub kinds: Vec<TypeKind>,
    pub use_cache: bool,
    pub cache_dir: Option<PathBuf>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            kinds: vec![TypeKind::Class, TypeKind::Record],
            use_cache: true,
            cache_dir: None,
        }
    }
}

impl AnalyzerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<TypeKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = Some(cache_dir);
        self
    }
}

/// Result of one run: the graph plus what it took to build it.
#[derive(Debug)]
pub struct Analysis {
    pub graph: TypeGraph,
    pub stats: BuildStats,
    pub modules: Vec<Module>,
}

pub struct SolutionAnalyzer {
    scanner: WorkspaceScanner,
    extractor: CSharpExtractor,
    cache: Option<SymbolCache>,
    options: AnalyzerOptions,
}

impl SolutionAnalyzer {
    pub fn new(options: AnalyzerOptions) -> Result<Self> {
        let cache = if options.use_cache {
            Some(SymbolCache::new(options.cache_dir.clone()).unwrap_or_else(|err| {
                warn!("failed to initialize symbol cache: {err}");
                SymbolCache::in_memory_only()
            }))
        } else {
            None
        };

        Ok(Self {
            scanner: WorkspaceScanner::new()?,
            extractor: CSharpExtractor::new()?,
            cache,
            options,
        })
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn analyze(&self, input: &Path) -> Result<Analysis> {
        info!(input = %input.display(), "scanning workspace");
        let modules = self.scanner.scan(input)?;
        if modules.is_empty() {
            bail!("No projects found in {}", input.display());
        }
        let unit_count: usize = modules.iter().map(|m| m.units.len()).sum();
        info!(modules = modules.len(), units = unit_count, "workspace scanned");

        let symbols = self.extract_modules(&modules)?;
        let index = TypeIndex::from_modules(symbols, &self.options.kinds);
        info!(declarations = index.len(), "type index built");

        let mut graph = TypeGraph::new();
        let stats = GraphBuilder::new(&index, self.options.mode).build(&modules, &mut graph)?;
        if graph.node_count() == 0 {
            bail!(
                "No declared types of the selected kinds found in {}",
                input.display()
            );
        }

        info!(
            nodes = graph.node_count(),
            links = graph.edge_count(),
            dropped_references = stats.dropped_references,
            dropped_bases = stats.dropped_bases,
            "type graph built"
        );

        Ok(Analysis {
            graph,
            stats,
            modules,
        })
    }

    fn extract_modules(&self, modules: &[Module]) -> Result<Vec<ModuleSymbols>> {
        let cache_hits = AtomicUsize::new(0);

        let symbols = modules
            .iter()
            .map(|module| {
                let files = module
                    .units
                    .par_iter()
                    .map(|unit| {
                        let cached = self.cache.as_ref().and_then(|cache| cache.get(unit));
                        if let Some(cached) = cached {
                            cache_hits.fetch_add(1, Ordering::Relaxed);
                            return Ok(cached);
                        }
                        self.extract_unit(unit)
                    })
                    .collect::<Result<Vec<FileSymbols>>>()
                    .with_context(|| format!("Failed to load module {}", module.name))?;
                Ok(ModuleSymbols {
                    module: module.name.clone(),
                    files,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total: usize = modules.iter().map(|m| m.units.len()).sum();
        let hits = cache_hits.load(Ordering::Relaxed);
        info!(
            language = self.extractor.language_name(),
            cache_hits = hits,
            parsed = total - hits,
            "source units loaded"
        );

        Ok(symbols)
    }

    fn extract_unit(&self, unit: &Path) -> Result<FileSymbols> {
        let symbols = self
            .extractor
            .extract_file(unit)
            .with_context(|| format!("Failed to parse {}", unit.display()))?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.store(unit, &symbols) {
                warn!(unit = %unit.display(), "failed to cache symbols: {err}");
            }
        }
        Ok(symbols)
    }
}
