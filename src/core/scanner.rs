use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const SOURCE_EXTENSION: &str = "cs";
const PROJECT_EXTENSION: &str = "csproj";
const SKIPPED_DIRS: &[&str] = &["bin", "obj", ".git", ".vs", "node_modules"];

/// A compilable unit: a project and the source files analyzed together with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub root: PathBuf,
    pub project_file: Option<PathBuf>,
    pub units: Vec<PathBuf>,
}

impl Module {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            project_file: None,
            units: Vec::new(),
        }
    }

    pub fn with_units(mut self, units: Vec<PathBuf>) -> Self {
        self.units = units;
        self
    }
}

/// A project entry read from a solution file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    pub name: String,
    pub relative_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Solution,
    Project,
    Directory,
}

impl InputKind {
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(InputKind::Directory);
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("sln") => Ok(InputKind::Solution),
            Some(ext) if ext.eq_ignore_ascii_case(PROJECT_EXTENSION) => Ok(InputKind::Project),
            _ => bail!(
                "Unsupported input {}: expected a .sln, a .csproj or a directory",
                path.display()
            ),
        }
    }
}

pub struct WorkspaceScanner {
    project_line: Regex,
}

impl WorkspaceScanner {
    pub fn new() -> Result<Self> {
        let project_line =
            Regex::new(r#"(?m)^\s*Project\("\{[^}]*\}"\)\s*=\s*"([^"]+)"\s*,\s*"([^"]+)""#)?;
        Ok(Self { project_line })
    }

    /// Resolves an input path into the modules it describes, in a deterministic order.
    pub fn scan(&self, input: &Path) -> Result<Vec<Module>> {
        if !input.exists() {
            bail!("Input not found: {}", input.display());
        }
        let input = fs::canonicalize(input)
            .with_context(|| format!("Failed to resolve {}", input.display()))?;

        let modules = match InputKind::detect(&input)? {
            InputKind::Solution => self.scan_solution(&input)?,
            InputKind::Project => vec![self.project_module(&input)],
            InputKind::Directory => self.scan_directory(&input)?,
        };

        self.populate_units(modules)
    }

    /// Extracts C# project entries from solution file contents.
    pub fn parse_solution(&self, contents: &str) -> Vec<SolutionProject> {
        self.project_line
            .captures_iter(contents)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str().trim().to_string();
                let raw_path = caps.get(2)?.as_str().trim().replace('\\', "/");
                let relative_path = PathBuf::from(raw_path);
                let is_project = relative_path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION))
                    .unwrap_or(false);
                is_project.then_some(SolutionProject {
                    name,
                    relative_path,
                })
            })
            .collect()
    }

    fn scan_solution(&self, solution: &Path) -> Result<Vec<Module>> {
        let contents = fs::read_to_string(solution)
            .with_context(|| format!("Failed to read solution {}", solution.display()))?;
        let base = solution.parent().unwrap_or_else(|| Path::new("."));

        let mut modules = Vec::new();
        for project in self.parse_solution(&contents) {
            let project_path = base.join(&project.relative_path);
            match fs::canonicalize(&project_path) {
                Ok(project_path) => {
                    let mut module = self.project_module(&project_path);
                    module.name = project.name;
                    modules.push(module);
                }
                Err(err) => {
                    tracing::warn!(
                        project = %project.name,
                        path = %project_path.display(),
                        "skipping missing project: {err}"
                    );
                }
            }
        }
        Ok(modules)
    }

    fn project_module(&self, project_file: &Path) -> Module {
        let name = project_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root = project_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Module {
            name,
            root,
            project_file: Some(project_file.to_path_buf()),
            units: Vec::new(),
        }
    }

    fn scan_directory(&self, dir: &Path) -> Result<Vec<Module>> {
        let mut projects: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(|e| e.ok())
            .filter(|entry| {
                entry.file_type().is_file() && has_extension(entry.path(), PROJECT_EXTENSION)
            })
            .map(|entry| entry.into_path())
            .collect();
        projects.sort();

        if projects.is_empty() {
            let name = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "root".to_string());
            return Ok(vec![Module::new(name, dir)]);
        }

        Ok(projects
            .iter()
            .map(|project| self.project_module(project))
            .collect())
    }

    fn populate_units(&self, mut modules: Vec<Module>) -> Result<Vec<Module>> {
        let roots: Vec<PathBuf> = modules.iter().map(|m| m.root.clone()).collect();

        for module in &mut modules {
            // Sources under a nested project's directory belong to that project.
            let nested: Vec<&PathBuf> = roots
                .iter()
                .filter(|root| *root != &module.root && root.starts_with(&module.root))
                .collect();
            module.units = self.collect_units(&module.root, &nested)?;
        }

        Ok(modules)
    }

    /// Lists the `.cs` files under `root`, sorted, skipping build output folders.
    pub fn collect_units(&self, root: &Path, excluded: &[&PathBuf]) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            bail!("Module root is not a directory: {}", root.display());
        }

        let entries: Vec<_> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry))
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .collect();

        let mut units: Vec<PathBuf> = entries
            .par_iter()
            .map(DirEntry::path)
            .filter(|path| has_extension(path, SOURCE_EXTENSION))
            .filter(|path| !excluded.iter().any(|dir| path.starts_with(dir)))
            .map(Path::to_path_buf)
            .collect();
        units.sort();

        Ok(units)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.iter().any(|skip| name.eq_ignore_ascii_case(skip)))
            .unwrap_or(false)
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}
