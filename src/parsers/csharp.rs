use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tree_sitter::Node as TSNode;

use super::common::{declared_name, extract_text, find_child_by_kind, TreeSitterParser};
use super::{
    DeclaredType, FileSymbols, SymbolExtractor, TypeAlias, TypeKind, TypeMention, TypeSegment,
};

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "interface_declaration",
    "record_declaration",
    "record_struct_declaration",
    "enum_declaration",
    "delegate_declaration",
];

/// Subtrees that never contain type mentions worth resolving.
const SKIPPED_KINDS: &[&str] = &[
    "comment",
    "predefined_type",
    "name_colon",
    "name_equals",
    "string_literal",
    "verbatim_string_literal",
    "character_literal",
];

#[derive(Debug, Clone, Default)]
struct Scope {
    namespace: String,
    usings: Vec<String>,
    aliases: Vec<TypeAlias>,
    containers: Vec<TypeSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UsingDirective {
    Namespace { path: String, global: bool },
    Alias { alias: String, target: TypeMention },
}

#[derive(Default)]
struct MentionSink {
    seen: HashSet<TypeMention>,
    items: Vec<TypeMention>,
}

impl MentionSink {
    fn push(&mut self, mention: TypeMention) {
        if self.seen.insert(mention.clone()) {
            self.items.push(mention);
        }
    }
}

/// Syntax-level C# declaration extractor built on tree-sitter.
pub struct CSharpExtractor;

impl CSharpExtractor {
    pub fn new() -> Result<Self> {
        // Fail early if the grammar cannot be loaded.
        TreeSitterParser::new(tree_sitter_c_sharp::language())?;
        Ok(Self)
    }

    pub fn extract_source(&self, file_path: &Path, source: &str) -> Result<FileSymbols> {
        let mut parser = TreeSitterParser::new(tree_sitter_c_sharp::language())?;
        let tree = parser.parse_source(source, file_path)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut types = Vec::new();
        self.visit_scope(&root, bytes, Scope::default(), &mut types);

        let global_usings = self
            .using_directives(&root, bytes)
            .into_iter()
            .filter_map(|directive| match directive {
                UsingDirective::Namespace { path, global: true } => Some(path),
                _ => None,
            })
            .collect();

        Ok(FileSymbols {
            path: file_path.to_path_buf(),
            types,
            global_usings,
        })
    }

    fn visit_scope(
        &self,
        container: &TSNode,
        source: &[u8],
        scope: Scope,
        out: &mut Vec<DeclaredType>,
    ) {
        let mut scope = scope;
        for directive in self.using_directives(container, source) {
            match directive {
                UsingDirective::Namespace { path, .. } => scope.usings.push(path),
                UsingDirective::Alias { alias, target } => {
                    scope.aliases.push(TypeAlias { alias, target })
                }
            }
        }

        let mut cursor = container.walk();
        let children: Vec<TSNode> = container.named_children(&mut cursor).collect();

        for child in children {
            match child.kind() {
                "namespace_declaration" => {
                    let Some(name) = namespace_name(&child, source) else {
                        continue;
                    };
                    let mut inner = scope.clone();
                    inner.namespace = join_dotted(&scope.namespace, &name);
                    let body = child
                        .child_by_field_name("body")
                        .or_else(|| find_child_by_kind(&child, "declaration_list"));
                    if let Some(body) = body {
                        self.visit_scope(&body, source, inner, out);
                    }
                }
                "file_scoped_namespace_declaration" => {
                    if let Some(name) = namespace_name(&child, source) {
                        scope.namespace = join_dotted(&scope.namespace, &name);
                    }
                    // Some grammar versions nest the members under the declaration node.
                    self.visit_scope(&child, source, scope.clone(), out);
                }
                kind if TYPE_DECLARATIONS.contains(&kind) => {
                    self.process_type(&child, source, &scope, out);
                }
                _ => {}
            }
        }
    }

    fn using_directives(&self, container: &TSNode, source: &[u8]) -> Vec<UsingDirective> {
        let mut cursor = container.walk();
        let directives = container
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "using_directive")
            .filter_map(|child| parse_using(extract_text(&child, source)))
            .collect();
        directives
    }

    fn process_type(
        &self,
        node: &TSNode,
        source: &[u8],
        scope: &Scope,
        out: &mut Vec<DeclaredType>,
    ) {
        let Some(kind) = type_kind(node) else {
            return;
        };
        let Some(name) = declared_name(node, source) else {
            return;
        };
        let name_node = node.child_by_field_name("name");
        let type_parameters = type_parameters(node, source);

        let bases = node
            .child_by_field_name("bases")
            .or_else(|| find_child_by_kind(node, "base_list"))
            .map(|list| base_mentions(&list, source))
            .unwrap_or_default();

        let mut sink = MentionSink::default();
        let mut nested = Vec::new();
        let mut cursor = node.walk();
        let children: Vec<TSNode> = node.children(&mut cursor).collect();
        for child in children {
            if Some(child) == name_node || child.kind() == "type_parameter_list" {
                continue;
            }
            collect_mentions(child, source, false, &mut sink, &mut nested);
        }

        let declared = DeclaredType {
            kind,
            name: name.to_string(),
            type_parameters: type_parameters.clone(),
            namespace: scope.namespace.clone(),
            containers: scope.containers.clone(),
            usings: scope.usings.clone(),
            aliases: scope.aliases.clone(),
            bases,
            mentions: sink.items,
            members: member_names(node, source),
            line: node.start_position().row + 1,
        };
        out.push(declared);

        let mut inner = scope.clone();
        inner.containers.push(TypeSegment {
            name: name.to_string(),
            type_parameters,
        });
        for child in nested {
            self.process_type(&child, source, &inner, out);
        }
    }
}

impl SymbolExtractor for CSharpExtractor {
    fn extract_file(&self, file_path: &Path) -> Result<FileSymbols> {
        let parser = TreeSitterParser::new(tree_sitter_c_sharp::language())?;
        let source = parser
            .read_source(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        self.extract_source(file_path, &source)
    }

    fn language_name(&self) -> &str {
        "csharp"
    }
}

fn type_kind(node: &TSNode) -> Option<TypeKind> {
    match node.kind() {
        "class_declaration" => Some(TypeKind::Class),
        "struct_declaration" | "record_struct_declaration" => Some(TypeKind::Struct),
        "interface_declaration" => Some(TypeKind::Interface),
        "record_declaration" => {
            if find_child_by_kind(node, "struct").is_some() {
                Some(TypeKind::Struct)
            } else {
                Some(TypeKind::Record)
            }
        }
        _ => None,
    }
}

fn type_parameters(node: &TSNode, source: &[u8]) -> Vec<String> {
    let Some(list) = node
        .child_by_field_name("type_parameters")
        .or_else(|| find_child_by_kind(node, "type_parameter_list"))
    else {
        return Vec::new();
    };

    let mut cursor = list.walk();
    let params = list
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "type_parameter")
        .filter_map(|param| {
            declared_name(&param, source)
                .map(str::to_string)
                .or_else(|| {
                    extract_text(&param, source)
                        .split_whitespace()
                        .last()
                        .map(str::to_string)
                })
        })
        .collect();
    params
}

fn namespace_name(node: &TSNode, source: &[u8]) -> Option<String> {
    let name = node
        .child_by_field_name("name")
        .or_else(|| find_child_by_kind(node, "qualified_name"))
        .or_else(|| find_child_by_kind(node, "identifier"))?;
    let text: String = extract_text(&name, source)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    (!text.is_empty()).then_some(text)
}

fn member_names(node: &TSNode, source: &[u8]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    // Positional record parameters become properties.
    if let Some(params) = find_child_by_kind(node, "parameter_list") {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if param.kind() == "parameter" {
                push_unique(&mut names, declared_name(&param, source));
            }
        }
    }

    let Some(body) = node
        .child_by_field_name("body")
        .or_else(|| find_child_by_kind(node, "declaration_list"))
    else {
        return names;
    };
    let mut cursor = body.walk();
    let members: Vec<TSNode> = body.named_children(&mut cursor).collect();
    for member in members {
        match member.kind() {
            "field_declaration" | "event_field_declaration" => {
                let Some(declaration) = find_child_by_kind(&member, "variable_declaration") else {
                    continue;
                };
                let mut inner = declaration.walk();
                let declarators: Vec<TSNode> = declaration
                    .named_children(&mut inner)
                    .filter(|child| child.kind() == "variable_declarator")
                    .collect();
                for declarator in declarators {
                    push_unique(&mut names, declared_name(&declarator, source));
                }
            }
            "property_declaration" | "method_declaration" | "event_declaration" => {
                let name = member.child_by_field_name("name");
                push_unique(&mut names, name.map(|name| extract_text(&name, source)));
            }
            _ => {}
        }
    }
    names
}

fn push_unique(names: &mut Vec<String>, name: Option<&str>) {
    let Some(name) = name.map(|name| name.trim_start_matches('@')) else {
        return;
    };
    if !name.is_empty() && !names.iter().any(|known| known == name) {
        names.push(name.to_string());
    }
}

fn base_mentions(list: &TSNode, source: &[u8]) -> Vec<TypeMention> {
    let mut cursor = list.walk();
    let mentions = list
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "argument_list")
        .filter_map(|child| {
            // Record primary constructor bases carry arguments: `Base(x)`.
            let text = extract_text(&child, source);
            let text = text.split('(').next().unwrap_or(text);
            parse_type_text(text)
        })
        .collect();
    mentions
}

fn collect_mentions<'t>(
    node: TSNode<'t>,
    source: &[u8],
    qualified: bool,
    sink: &mut MentionSink,
    nested: &mut Vec<TSNode<'t>>,
) {
    let kind = node.kind();
    if TYPE_DECLARATIONS.contains(&kind) {
        nested.push(node);
        return;
    }
    if SKIPPED_KINDS.contains(&kind) {
        return;
    }

    match kind {
        "qualified_name" | "alias_qualified_name" if !qualified => {
            if let Some(mention) = parse_type_text(extract_text(&node, source)) {
                sink.push(mention);
            }
            walk_children(node, source, true, sink, nested);
        }
        "generic_name" => {
            if !qualified {
                if let Some(name) = find_child_by_kind(&node, "identifier") {
                    let arity = find_child_by_kind(&node, "type_argument_list")
                        .map(|args| args.named_child_count())
                        .unwrap_or(0);
                    sink.push(TypeMention::simple(extract_text(&name, source), arity));
                }
            }
            if let Some(args) = find_child_by_kind(&node, "type_argument_list") {
                walk_children(args, source, false, sink, nested);
            }
        }
        "type_argument_list" => walk_children(node, source, false, sink, nested),
        "identifier" => {
            if !qualified && !is_declaration_name(&node) {
                let text = extract_text(&node, source).trim_start_matches('@');
                if !text.is_empty() {
                    sink.push(TypeMention::simple(text, 0));
                }
            }
        }
        _ => walk_children(node, source, qualified, sink, nested),
    }
}

fn walk_children<'t>(
    node: TSNode<'t>,
    source: &[u8],
    qualified: bool,
    sink: &mut MentionSink,
    nested: &mut Vec<TSNode<'t>>,
) {
    let mut cursor = node.walk();
    let children: Vec<TSNode<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        collect_mentions(child, source, qualified, sink, nested);
    }
}

/// Names introduced by declarations (members, parameters, locals) are not mentions.
fn is_declaration_name(node: &TSNode) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    if parent.child_by_field_name("name") == Some(*node) {
        return true;
    }
    matches!(
        parent.kind(),
        "variable_declarator" | "type_parameter" | "enum_member_declaration" | "tuple_element"
    ) && parent.named_child(0) == Some(*node)
}

fn parse_using(text: &str) -> Option<UsingDirective> {
    let text = text.trim().trim_end_matches(';').trim();
    let (global, rest) = match text.strip_prefix("global") {
        Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim_start()),
        _ => (false, text),
    };
    let rest = rest.strip_prefix("using")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let rest = match rest.strip_prefix("static") {
        Some(after) if after.starts_with(char::is_whitespace) => after.trim_start(),
        _ => rest,
    };

    if let Some((alias, target)) = rest.split_once('=') {
        let alias = alias.trim().to_string();
        let target = parse_type_text(target)?;
        return (!alias.is_empty()).then_some(UsingDirective::Alias { alias, target });
    }

    let path: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    (!path.is_empty()).then_some(UsingDirective::Namespace { path, global })
}

/// Parses type text such as `global::Acme.Repo<Foo, Bar>?` into a mention.
pub fn parse_type_text(text: &str) -> Option<TypeMention> {
    let mut compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    loop {
        if compact.ends_with('?') || compact.ends_with('*') {
            compact.pop();
        } else if compact.ends_with("[]") {
            compact.truncate(compact.len() - 2);
        } else {
            break;
        }
    }
    let compact = match compact.find("::") {
        Some(pos) => compact[pos + 2..].to_string(),
        None => compact,
    };

    let mut segments = Vec::new();
    let mut last_arity = 0;
    for raw in split_top_level(&compact, '.') {
        let (name, arity) = match raw.find('<') {
            Some(open) => {
                let inner = raw[open + 1..].trim_end_matches('>');
                (&raw[..open], split_top_level(inner, ',').len())
            }
            None => (raw, 0),
        };
        let name = name.trim_start_matches('@');
        if !is_identifier(name) {
            return None;
        }
        segments.push(name.to_string());
        last_arity = arity;
    }

    (!segments.is_empty()).then_some(TypeMention {
        segments,
        arity: last_arity,
    })
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(&text[start..pos]);
                start = pos + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn join_dotted(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
