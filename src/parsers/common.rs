use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tree_sitter::{Language, Node as TSNode, Parser, Tree};

pub struct TreeSitterParser {
    parser: Parser,
}

impl TreeSitterParser {
    pub fn new(language: Language) -> Result<Self> {
        let mut parser = Parser::new();
        parser.set_language(language)?;
        Ok(Self { parser })
    }

    pub fn parse_source(&mut self, source: &str, file_path: &Path) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse file: {}", file_path.display()))
    }

    /// Buffered read sized to the file.
    pub fn read_source(&self, file_path: &Path) -> Result<String> {
        let file = File::open(file_path)?;
        let file_size = file.metadata()?.len() as usize;

        let mut reader = BufReader::with_capacity(file_size.clamp(1, 8192), file);
        let mut content = String::with_capacity(file_size);
        reader.read_to_string(&mut content)?;

        // Visual Studio writes a BOM by default.
        if content.starts_with('\u{feff}') {
            content.replace_range(..'\u{feff}'.len_utf8(), "");
        }
        Ok(content)
    }
}

pub fn extract_text<'a>(node: &TSNode, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.byte_range()]).unwrap_or("")
}

pub fn find_child_by_kind<'a>(node: &TSNode<'a>, kind: &str) -> Option<TSNode<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// The `name` field of a declaration, falling back to its first identifier child.
pub fn declared_name<'s>(node: &TSNode<'_>, source: &'s [u8]) -> Option<&'s str> {
    node.child_by_field_name("name")
        .or_else(|| find_child_by_kind(node, "identifier"))
        .map(|name| extract_text(&name, source))
        .filter(|name| !name.is_empty())
}
