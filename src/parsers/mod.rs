pub mod cache;
pub mod common;
pub mod csharp;
pub mod index;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of a declared named type.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum,
)]
#[value(rename_all = "kebab-case")]
pub enum TypeKind {
    Class,
    Record,
    Struct,
    Interface,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Record => "record",
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
        }
    }
}

/// A syntactic type mention such as `Foo`, `List<Foo>` or `Acme.Models.Foo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TypeMention {
    /// Dotted path segments with type arguments stripped.
    pub segments: Vec<String>,
    /// Number of type arguments on the last segment.
    pub arity: usize,
}

impl TypeMention {
    pub fn simple(name: impl Into<String>, arity: usize) -> Self {
        Self {
            segments: vec![name.into()],
            arity,
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

/// A name segment with its type parameters, e.g. `Outer<T>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeSegment {
    pub name: String,
    pub type_parameters: Vec<String>,
}

impl TypeSegment {
    pub fn display(&self) -> String {
        if self.type_parameters.is_empty() {
            self.name.clone()
        } else {
            format!("{}<{}>", self.name, self.type_parameters.join(", "))
        }
    }
}

/// A `using Alias = Target;` directive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeAlias {
    pub alias: String,
    pub target: TypeMention,
}

/// Everything the resolver needs to know about one type declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredType {
    pub kind: TypeKind,
    pub name: String,
    pub type_parameters: Vec<String>,
    /// Dotted namespace, empty for the global namespace.
    pub namespace: String,
    /// Enclosing types, outermost first.
    pub containers: Vec<TypeSegment>,
    /// Namespaces imported with `using` directives in scope.
    pub usings: Vec<String>,
    /// `using Alias = Target;` directives in scope.
    pub aliases: Vec<TypeAlias>,
    pub bases: Vec<TypeMention>,
    pub mentions: Vec<TypeMention>,
    /// Names of fields, properties, methods and events declared in the body.
    #[serde(default)]
    pub members: Vec<String>,
    pub line: usize,
}

impl DeclaredType {
    /// Display form used as the dedup key, e.g. `Acme.Outer.Repo<T>`.
    pub fn full_name(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.containers.len() + 2);
        if !self.namespace.is_empty() {
            parts.push(self.namespace.clone());
        }
        parts.extend(self.containers.iter().map(TypeSegment::display));
        parts.push(self.segment().display());
        parts.join(".")
    }

    /// Dotted path without type parameters, used for name lookup.
    pub fn lookup_path(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.containers.len() + 2);
        if !self.namespace.is_empty() {
            parts.push(&self.namespace);
        }
        parts.extend(self.containers.iter().map(|c| c.name.as_str()));
        parts.push(&self.name);
        parts.join(".")
    }

    pub fn arity(&self) -> usize {
        self.type_parameters.len()
    }

    pub fn segment(&self) -> TypeSegment {
        TypeSegment {
            name: self.name.clone(),
            type_parameters: self.type_parameters.clone(),
        }
    }
}

/// Declarations extracted from one source unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSymbols {
    pub path: PathBuf,
    pub types: Vec<DeclaredType>,
    /// `global using` namespaces, which apply to every file of the module.
    pub global_usings: Vec<String>,
}

pub trait SymbolExtractor {
    fn extract_file(&self, file_path: &Path) -> Result<FileSymbols>;
    fn language_name(&self) -> &str;
}
