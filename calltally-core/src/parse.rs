//! Ruby parsing via tree-sitter, lowered into [`crate::syntax::Node`].
//!
//! tree-sitter-ruby does not tell a local-variable read apart from a
//! receiverless call without arguments: both are `identifier`. The lowering
//! keeps a lexical table of assigned names to decide. Method, class, module
//! and singleton-class bodies start a fresh table; blocks and lambdas see
//! the enclosing one.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;
use tree_sitter::{Node as TsNode, Parser};

use crate::error::{CalltallyError, CalltallyResult};
use crate::syntax::{Node, ScopeKind};

/// Maximum file size to parse (10 MB).
pub const MAX_FILE_SIZE: usize = 10_000_000;

/// Maximum syntax tree depth. Lowering and traversal recurse once per
/// level, so deeper files are rejected before either runs.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Binary operators that Ruby dispatches as method calls.
const BINARY_OPERATOR_METHODS: &[&str] = &[
    "+", "-", "*", "/", "%", "**", "==", "!=", "<", ">", "<=", ">=", "<=>", "===", "=~", "!~",
    "<<", ">>", "&", "|", "^",
];

const NUMERIC_KINDS: &[&str] = &["integer", "float", "rational", "complex"];

/// Implicit parameters of a block or lambda without a parameter list.
const IMPLICIT_BLOCK_PARAMS: &[&str] = &["_1", "_2", "_3", "_4", "_5", "_6", "_7", "_8", "_9", "it"];

/// Parses Ruby source and lowers it into the generic tree.
///
/// Syntax errors do not fail the parse: tree-sitter recovers and the
/// surviving structure is still lowered.
pub fn parse_ruby(path: &Path, source: &str) -> CalltallyResult<Node> {
    if source.len() > MAX_FILE_SIZE {
        return Err(CalltallyError::parse(
            path,
            format!("File too large ({} bytes, max {})", source.len(), MAX_FILE_SIZE),
        ));
    }

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_ruby::LANGUAGE.into())
        .map_err(|e| CalltallyError::parse(path, format!("Failed to load Ruby grammar: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CalltallyError::parse(path, "Parser produced no tree"))?;

    let root = tree.root_node();
    if let Some(deep) = node_beyond_depth(root, MAX_NESTING_DEPTH) {
        let pos = deep.start_position();
        return Err(CalltallyError::parse_at(
            path,
            format!("Nesting deeper than {} levels", MAX_NESTING_DEPTH),
            pos.row + 1,
            pos.column + 1,
        ));
    }
    if root.has_error() {
        let pos = first_error(root).map(|n| n.start_position());
        debug!(
            path = %path.display(),
            line = pos.map(|p| p.row + 1),
            column = pos.map(|p| p.column + 1),
            "syntax errors recovered"
        );
    }

    let mut lowering = Lowering::new(source.as_bytes());
    lowering.push_scope(true);
    let children = lowering.lower_children(root, &[]);
    Ok(Node::Other(children))
}

fn first_error(root: TsNode<'_>) -> Option<TsNode<'_>> {
    let mut node = root;
    loop {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        node = named_children(node).into_iter().find(|c| c.has_error())?;
    }
}

/// First node (in document order) sitting more than `max` levels below
/// `root`. Walks with a cursor so the check itself never recurses.
fn node_beyond_depth(root: TsNode<'_>, max: usize) -> Option<TsNode<'_>> {
    let mut cursor = root.walk();
    let mut depth = 0;
    loop {
        if depth > max {
            return Some(cursor.node());
        }
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
            depth -= 1;
        }
    }
}

fn named_children(node: TsNode<'_>) -> Vec<TsNode<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Names assigned in one lexical scope. A barrier scope hides the
/// scopes below it.
#[derive(Debug, Default)]
struct LocalScope {
    names: HashSet<String>,
    barrier: bool,
}

struct Lowering<'s> {
    source: &'s [u8],
    scopes: Vec<LocalScope>,
}

impl<'s> Lowering<'s> {
    fn new(source: &'s [u8]) -> Self {
        Self {
            source,
            scopes: Vec::new(),
        }
    }

    fn text(&self, node: TsNode<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn push_scope(&mut self, barrier: bool) {
        self.scopes.push(LocalScope {
            names: HashSet::new(),
            barrier,
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, node: TsNode<'_>) {
        let name = self.text(node);
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains(name) {
                return true;
            }
            if scope.barrier {
                return false;
            }
        }
        false
    }

    /// Lowers every named child except those whose ids are in `skip`.
    fn lower_children(&mut self, node: TsNode<'_>, skip: &[usize]) -> Vec<Node> {
        named_children(node)
            .into_iter()
            .filter(|c| !skip.contains(&c.id()))
            .filter_map(|c| self.lower(c))
            .collect()
    }

    fn lower_field(&mut self, node: TsNode<'_>, field: &str) -> Option<Node> {
        node.child_by_field_name(field).and_then(|c| self.lower(c))
    }

    fn lower(&mut self, node: TsNode<'_>) -> Option<Node> {
        match node.kind() {
            "class" | "module" => Some(self.lower_scope(node)),
            "singleton_class" => {
                self.push_scope(true);
                let body = self.lower_children(node, &[]);
                self.pop_scope();
                wrap(body)
            }
            "method" | "singleton_method" => self.lower_method(node),
            "block" | "do_block" | "lambda" => self.lower_block(node),
            "call" => Some(self.lower_call(node)),
            "element_reference" => Some(self.lower_element_reference(node, None)),
            "assignment" => self.lower_assignment(node),
            "operator_assignment" => self.lower_operator_assignment(node),
            "binary" => self.lower_binary(node),
            "unary" => self.lower_unary(node),
            "block_argument" => {
                let inner = node.named_child(0).and_then(|c| self.lower(c));
                Some(Node::BlockArgument(inner.map(Box::new)))
            }
            "argument_list" => wrap(self.lower_children(node, &[])),
            "pair" if node.child_by_field_name("value").is_none() => {
                self.lower_shorthand_pair(node)
            }
            "identifier" => {
                let name = self.text(node);
                if self.is_local(name) {
                    Some(Node::LocalVariable(name.to_string()))
                } else {
                    Some(Node::call(name))
                }
            }
            "constant" => Some(Node::Constant(self.text(node).to_string())),
            "scope_resolution" => self.lower_scope_resolution(node),
            "instance_variable" => Some(Node::InstanceVariable(self.text(node).to_string())),
            "class_variable" => Some(Node::ClassVariable(self.text(node).to_string())),
            "global_variable" => Some(Node::GlobalVariable(self.text(node).to_string())),
            "self" => Some(Node::SelfRef),
            "simple_symbol" => Some(Node::Symbol(
                self.text(node).trim_start_matches(':').to_string(),
            )),
            "delimited_symbol" => self.lower_delimited_symbol(node),
            "exception_variable" => {
                for child in named_children(node) {
                    if child.kind() == "identifier" {
                        self.declare(child);
                    }
                }
                None
            }
            "for" => {
                let mut out = Vec::new();
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    self.lower_target(pattern, &mut out);
                }
                out.extend(self.lower_field(node, "value"));
                out.extend(self.lower_field(node, "body"));
                wrap(out)
            }
            "in_clause" => {
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    self.declare_pattern(pattern);
                }
                let skip: Vec<usize> = node
                    .child_by_field_name("pattern")
                    .map(|p| p.id())
                    .into_iter()
                    .collect();
                wrap(self.lower_children(node, &skip))
            }
            "alias" | "undef" | "comment" => None,
            _ => wrap(self.lower_children(node, &[])),
        }
    }

    fn lower_scope(&mut self, node: TsNode<'_>) -> Node {
        let kind = if node.kind() == "module" {
            ScopeKind::Module
        } else {
            ScopeKind::Class
        };
        let name_node = node.child_by_field_name("name");
        let name = name_node.and_then(|n| self.constant_path(n));
        let skip: Vec<usize> = name_node.map(|n| n.id()).into_iter().collect();

        self.push_scope(true);
        let body = self.lower_children(node, &skip);
        self.pop_scope();

        Node::Scope { kind, name, body }
    }

    fn lower_method(&mut self, node: TsNode<'_>) -> Option<Node> {
        let mut skip = Vec::new();
        for field in ["name", "parameters", "object"] {
            if let Some(child) = node.child_by_field_name(field) {
                skip.push(child.id());
            }
        }

        self.push_scope(true);
        let mut body = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            self.declare_parameters(params, &mut body);
        }
        body.extend(self.lower_children(node, &skip));
        self.pop_scope();

        wrap(body)
    }

    fn lower_block(&mut self, node: TsNode<'_>) -> Option<Node> {
        let params = node.child_by_field_name("parameters");
        let skip: Vec<usize> = params.map(|p| p.id()).into_iter().collect();

        self.push_scope(false);
        let mut body = Vec::new();
        // `->(x) { ... }` keeps its parameters on the lambda node
        let lambda_has_params = node.parent().is_some_and(|p| {
            p.kind() == "lambda" && p.child_by_field_name("parameters").is_some()
        });
        match params {
            Some(params) => self.declare_parameters(params, &mut body),
            None if lambda_has_params => {}
            None => {
                if let Some(scope) = self.scopes.last_mut() {
                    scope
                        .names
                        .extend(IMPLICIT_BLOCK_PARAMS.iter().map(|p| p.to_string()));
                }
            }
        }
        body.extend(self.lower_children(node, &skip));
        self.pop_scope();

        wrap(body)
    }

    /// Declares parameter names and lowers default values into `out`.
    fn declare_parameters(&mut self, params: TsNode<'_>, out: &mut Vec<Node>) {
        for child in named_children(params) {
            match child.kind() {
                "identifier" => self.declare(child),
                "destructured_parameter" => self.declare_parameters(child, out),
                _ => {
                    if let Some(name) = child.child_by_field_name("name") {
                        self.declare(name);
                    }
                    out.extend(self.lower_field(child, "value"));
                }
            }
        }
    }

    /// Declares identifiers bound by a `case/in` pattern.
    fn declare_pattern(&mut self, pattern: TsNode<'_>) {
        match pattern.kind() {
            "identifier" => self.declare(pattern),
            "variable_reference_pattern" | "expression_reference_pattern" => {}
            "keyword_pattern" if pattern.child_by_field_name("value").is_none() => {
                if let Some(key) = pattern.child_by_field_name("key") {
                    let name = self.text(key).trim_end_matches(':').to_string();
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.names.insert(name);
                    }
                }
            }
            _ => {
                for child in named_children(pattern) {
                    self.declare_pattern(child);
                }
            }
        }
    }

    /// Handles the left side of an assignment: declares locals, lowers the
    /// receiver and index parts of call targets.
    fn lower_target(&mut self, target: TsNode<'_>, out: &mut Vec<Node>) {
        match target.kind() {
            "identifier" => self.declare(target),
            "left_assignment_list" | "destructured_left_assignment" | "rest_assignment" => {
                for child in named_children(target) {
                    self.lower_target(child, out);
                }
            }
            "call" => out.extend(self.lower_field(target, "receiver")),
            "element_reference" => {
                let skip: Vec<usize> = target
                    .child_by_field_name("block")
                    .map(|b| b.id())
                    .into_iter()
                    .collect();
                out.extend(self.lower_children(target, &skip));
            }
            _ => {}
        }
    }

    fn lower_call(&mut self, node: TsNode<'_>) -> Node {
        let receiver_node = node.child_by_field_name("receiver");
        let method_node = node.child_by_field_name("method");

        let receiver = receiver_node.and_then(|r| self.lower(r));
        let mut arguments = Vec::new();
        if let Some(args) = node.child_by_field_name("arguments") {
            arguments.extend(self.lower_children(args, &[]));
        }
        arguments.extend(self.lower_field(node, "block"));

        let method = match method_node {
            Some(m) if m.kind() == "super" => {
                let mut children: Vec<Node> = receiver.into_iter().collect();
                children.extend(arguments);
                return Node::Other(children);
            }
            Some(m) => Some(self.text(m).to_string()),
            // recv.() is sugar for recv.call()
            None if receiver_node.is_some() => Some("call".to_string()),
            None => None,
        };

        Node::Call {
            receiver: receiver.map(Box::new),
            method,
            arguments,
        }
    }

    /// `recv[i]`, or `recv[i] = value` when `assigned` is given.
    fn lower_element_reference(&mut self, node: TsNode<'_>, assigned: Option<TsNode<'_>>) -> Node {
        let object = node.child_by_field_name("object");
        let block = node.child_by_field_name("block");
        let skip: Vec<usize> = object.iter().chain(block.iter()).map(|n| n.id()).collect();

        let receiver = object.and_then(|o| self.lower(o));
        let mut arguments = self.lower_children(node, &skip);
        arguments.extend(block.and_then(|b| self.lower(b)));

        let method = match assigned {
            Some(value) => {
                arguments.extend(self.lower(value));
                "[]="
            }
            None => "[]",
        };

        Node::Call {
            receiver: receiver.map(Box::new),
            method: Some(method.to_string()),
            arguments,
        }
    }

    fn lower_assignment(&mut self, node: TsNode<'_>) -> Option<Node> {
        let left = node.child_by_field_name("left");
        let right = node.child_by_field_name("right");

        match left {
            Some(l) if l.kind() == "call" => {
                let receiver = self.lower_field(l, "receiver");
                let name = l
                    .child_by_field_name("method")
                    .map(|m| format!("{}=", self.text(m)));
                let arguments: Vec<Node> = right.and_then(|r| self.lower(r)).into_iter().collect();
                Some(Node::Call {
                    receiver: receiver.map(Box::new),
                    method: name,
                    arguments,
                })
            }
            Some(l) if l.kind() == "element_reference" => {
                Some(self.lower_element_reference(l, right))
            }
            _ => {
                let mut out = Vec::new();
                if let Some(l) = left {
                    self.lower_target(l, &mut out);
                }
                out.extend(right.and_then(|r| self.lower(r)));
                wrap(out)
            }
        }
    }

    fn lower_operator_assignment(&mut self, node: TsNode<'_>) -> Option<Node> {
        let mut out = Vec::new();
        if let Some(left) = node.child_by_field_name("left") {
            match left.kind() {
                "identifier" => {
                    self.declare(left);
                    out.extend(self.lower(left));
                }
                "call" | "element_reference" => self.lower_target(left, &mut out),
                _ => out.extend(self.lower(left)),
            }
        }
        out.extend(self.lower_field(node, "right"));
        wrap(out)
    }

    fn lower_binary(&mut self, node: TsNode<'_>) -> Option<Node> {
        let operator = node.child_by_field_name("operator").map(|o| o.kind());
        let left = self.lower_field(node, "left");
        let right = self.lower_field(node, "right");

        match operator {
            Some(op) if BINARY_OPERATOR_METHODS.contains(&op) => Some(Node::Call {
                receiver: left.map(Box::new),
                method: Some(op.to_string()),
                arguments: right.into_iter().collect(),
            }),
            _ => wrap(left.into_iter().chain(right).collect()),
        }
    }

    fn lower_unary(&mut self, node: TsNode<'_>) -> Option<Node> {
        let operator = node.child_by_field_name("operator").map(|o| o.kind());
        let operand = node.child_by_field_name("operand");
        let numeric = operand.is_some_and(|o| NUMERIC_KINDS.contains(&o.kind()));

        let method = match operator {
            Some("!") | Some("not") => Some("!"),
            Some("~") => Some("~"),
            Some("-") if !numeric => Some("-@"),
            Some("+") if !numeric => Some("+@"),
            _ => None,
        };
        let receiver = operand.and_then(|o| self.lower(o));

        match method {
            Some(method) => Some(Node::Call {
                receiver: receiver.map(Box::new),
                method: Some(method.to_string()),
                arguments: Vec::new(),
            }),
            None => wrap(receiver.into_iter().collect()),
        }
    }

    fn lower_scope_resolution(&mut self, node: TsNode<'_>) -> Option<Node> {
        if let Some(path) = self.constant_path(node) {
            return Some(Node::Constant(path));
        }
        let name = node.child_by_field_name("name");
        match name {
            // Foo::bar is a method call on Foo
            Some(n) if n.kind() == "identifier" => Some(Node::Call {
                receiver: self.lower_field(node, "scope").map(Box::new),
                method: Some(self.text(n).to_string()),
                arguments: Vec::new(),
            }),
            _ => wrap(self.lower_field(node, "scope").into_iter().collect()),
        }
    }

    /// `{name:}` / `call(name:)` reads `name` as a local or calls it.
    fn lower_shorthand_pair(&mut self, node: TsNode<'_>) -> Option<Node> {
        let key = node.child_by_field_name("key")?;
        let name = self.text(key).trim_end_matches(':');
        if name.is_empty() {
            return None;
        }
        if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            Some(Node::Constant(name.to_string()))
        } else if self.is_local(name) {
            Some(Node::LocalVariable(name.to_string()))
        } else {
            Some(Node::call(name))
        }
    }

    fn lower_delimited_symbol(&mut self, node: TsNode<'_>) -> Option<Node> {
        let children = named_children(node);
        if children.iter().all(|c| c.kind() == "string_content") {
            let value: String = children.iter().map(|c| self.text(*c)).collect();
            return Some(Node::Symbol(value));
        }
        wrap(self.lower_children(node, &[]))
    }

    /// Static `::`-joined constant path without leading `::`, or `None`
    /// when any segment is not a literal constant.
    fn constant_path(&self, node: TsNode<'_>) -> Option<String> {
        match node.kind() {
            "constant" => Some(self.text(node).to_string()),
            "scope_resolution" => {
                let name = node.child_by_field_name("name")?;
                if name.kind() != "constant" {
                    return None;
                }
                let name = self.text(name);
                match node.child_by_field_name("scope") {
                    None => Some(name.to_string()),
                    Some(scope) => Some(format!("{}::{}", self.constant_path(scope)?, name)),
                }
            }
            _ => None,
        }
    }
}

fn wrap(children: Vec<Node>) -> Option<Node> {
    if children.is_empty() {
        None
    } else {
        Some(Node::Other(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(src: &str) -> Node {
        parse_ruby(&PathBuf::from("test.rb"), src).expect("parse")
    }

    /// Flattens calls into `(receiver kind, method)` pairs in pre-order.
    fn calls(node: &Node) -> Vec<(String, String)> {
        let mut out = Vec::new();
        collect_calls(node, &mut out);
        out
    }

    fn collect_calls(node: &Node, out: &mut Vec<(String, String)>) {
        if let Node::Call {
            receiver, method, ..
        } = node
        {
            let recv = match receiver.as_deref() {
                None => "-".to_string(),
                Some(Node::Constant(c)) => c.clone(),
                Some(Node::LocalVariable(v)) => format!("lvar:{}", v),
                Some(Node::InstanceVariable(v)) => format!("ivar:{}", v),
                Some(Node::ClassVariable(v)) => format!("cvar:{}", v),
                Some(Node::GlobalVariable(v)) => format!("gvar:{}", v),
                Some(Node::SelfRef) => "self".to_string(),
                Some(Node::Call { .. }) => "call".to_string(),
                Some(_) => "other".to_string(),
            };
            out.push((recv, method.clone().unwrap_or_default()));
        }
        for child in node.children() {
            collect_calls(child, out);
        }
    }

    fn has(calls: &[(String, String)], recv: &str, method: &str) -> bool {
        calls.iter().any(|(r, m)| r == recv && m == method)
    }

    #[test]
    fn test_constant_receivers() {
        let c = calls(&parse("User.find(1)\nAdmin::User.where(active: true)\n::Post.all\n"));
        assert!(has(&c, "User", "find"));
        assert!(has(&c, "Admin::User", "where"));
        assert!(has(&c, "Post", "all"));
    }

    #[test]
    fn test_local_variable_tracking() {
        let c = calls(&parse("user = User.new\nuser.name\nusers.each { |u| u.active? }\n"));
        assert!(has(&c, "lvar:user", "name"));
        assert!(has(&c, "lvar:u", "active?"));
        // `users` was never assigned, so it is a receiverless call
        assert!(has(&c, "-", "users"));
        assert!(has(&c, "call", "each"));
    }

    #[test]
    fn test_method_body_starts_fresh_scope() {
        let src = "user = 1\ndef show\n  user.name\nend\n";
        let c = calls(&parse(src));
        assert!(has(&c, "call", "name"));
        assert!(!has(&c, "lvar:user", "name"));
    }

    #[test]
    fn test_parameters_are_locals() {
        let src = "def log(message, level = :info, *rest, key:, **opts, &blk)\n  message.strip\n  opts.size\n  blk.call\nend\n";
        let c = calls(&parse(src));
        assert!(has(&c, "lvar:message", "strip"));
        assert!(has(&c, "lvar:opts", "size"));
        assert!(has(&c, "lvar:blk", "call"));
    }

    #[test]
    fn test_block_sees_enclosing_locals() {
        let c = calls(&parse("list = []\n[1].each do |n|\n  list.push(n)\nend\n"));
        assert!(has(&c, "lvar:list", "push"));
    }

    #[test]
    fn test_block_locals_do_not_leak() {
        let c = calls(&parse("[1].each { |n| tmp = n }\ntmp.foo\n"));
        assert!(has(&c, "call", "foo"));
    }

    #[test]
    fn test_variable_kinds() {
        let c = calls(&parse("@post.title\n@@count.zero?\n$debug.tap\nself.save\n"));
        assert!(has(&c, "ivar:@post", "title"));
        assert!(has(&c, "cvar:@@count", "zero?"));
        assert!(has(&c, "gvar:$debug", "tap"));
        assert!(has(&c, "self", "save"));
    }

    #[test]
    fn test_attribute_and_index_assignment() {
        let c = calls(&parse("self.status = \"x\"\nh = {}\nh[:a] = 1\nh[:a]\n"));
        assert!(has(&c, "self", "status="));
        assert!(has(&c, "lvar:h", "[]="));
        assert!(has(&c, "lvar:h", "[]"));
    }

    #[test]
    fn test_operators_lowered_to_calls() {
        let c = calls(&parse("a = 1\na + 2\na == 3\nb = !a\nc = -a\na && a\n"));
        assert!(has(&c, "lvar:a", "+"));
        assert!(has(&c, "lvar:a", "=="));
        assert!(has(&c, "lvar:a", "!"));
        assert!(has(&c, "lvar:a", "-@"));
        assert!(!c.iter().any(|(_, m)| m == "&&"));
    }

    #[test]
    fn test_operator_assignment_is_not_a_call() {
        let c = calls(&parse("@@total += 1\nx ||= 0\nx.succ\n"));
        assert!(!c.iter().any(|(_, m)| m == "+"));
        assert!(has(&c, "lvar:x", "succ"));
    }

    #[test]
    fn test_class_and_module_scopes() {
        let tree = parse("module Admin\n  class UsersController < ApplicationController\n    before_action :auth\n  end\nend\n");
        let Node::Other(top) = &tree else {
            panic!("Expected Other root");
        };
        let Node::Scope { kind, name, body } = &top[0] else {
            panic!("Expected Scope");
        };
        assert_eq!(*kind, ScopeKind::Module);
        assert_eq!(name.as_deref(), Some("Admin"));
        assert!(body.iter().any(|child| has_scope(child, "UsersController")));
    }

    fn has_scope(node: &Node, wanted: &str) -> bool {
        match node {
            Node::Scope { name: Some(n), .. } if n == wanted => true,
            _ => node.children().any(|child| has_scope(child, wanted)),
        }
    }

    #[test]
    fn test_qualified_class_name() {
        let tree = parse("class Billing::Invoice\n  total\nend\n");
        let Node::Other(top) = &tree else {
            panic!("Expected Other root");
        };
        assert!(matches!(
            &top[0],
            Node::Scope { name: Some(n), .. } if n == "Billing::Invoice"
        ));
    }

    #[test]
    fn test_symbol_block_argument() {
        let tree = parse("names = users.map(&:name)\nusers.select(&:\"active?\")\n");
        let mut found = Vec::new();
        fn walk(node: &Node, found: &mut Vec<String>) {
            if let Node::BlockArgument(Some(inner)) = node {
                if let Node::Symbol(s) = inner.as_ref() {
                    found.push(s.clone());
                }
            }
            for child in node.children() {
                walk(child, found);
            }
        }
        walk(&tree, &mut found);
        assert_eq!(found, vec!["name", "active?"]);
    }

    #[test]
    fn test_super_and_alias_are_not_calls() {
        let c = calls(&parse("def save\n  super(validate: false)\nend\nalias persist save\n"));
        assert!(!c.iter().any(|(_, m)| m == "super" || m == "persist" || m == "save"));
    }

    #[test]
    fn test_rescue_variable_is_local() {
        let c = calls(&parse("begin\n  run\nrescue StandardError => e\n  e.message\nend\n"));
        assert!(has(&c, "lvar:e", "message"));
    }

    #[test]
    fn test_syntax_error_still_lowered() {
        let c = calls(&parse("User.find(1)\ndef broken(\n"));
        assert!(has(&c, "User", "find"));
    }

    #[test]
    fn test_numbered_block_parameters_are_locals() {
        let c = calls(&parse("[1].map { _1.to_s }\n[2].each { it.succ }\n-> { _2.abs }\n"));
        assert!(has(&c, "lvar:_1", "to_s"));
        assert!(has(&c, "lvar:it", "succ"));
        assert!(has(&c, "lvar:_2", "abs"));
        assert!(!c.iter().any(|(_, m)| m == "_1" || m == "it" || m == "_2"));
    }

    #[test]
    fn test_it_outside_parameterless_block_is_a_call() {
        let c = calls(&parse("it.succ\n[1].each { |n| it.run }\n"));
        assert!(has(&c, "-", "it"));
        assert!(!c.iter().any(|(r, _)| r == "lvar:it"));

        let c = calls(&parse("->(x) { it.run }\n"));
        assert!(has(&c, "-", "it"));
    }

    #[test]
    fn test_hash_shorthand_reads_name() {
        let c = calls(&parse("h = {status:}\ncount = 1\nrender(count:)\n"));
        assert!(has(&c, "-", "status"));
        assert!(has(&c, "-", "render"));
        assert!(!has(&c, "-", "count"));
    }

    #[test]
    fn test_deep_nesting_rejected_with_position() {
        let src = format!("a{}\n", ".b".repeat(MAX_NESTING_DEPTH * 4));
        let err = parse_ruby(&PathBuf::from("deep.rb"), &src).unwrap_err();
        assert!(matches!(err, CalltallyError::Parse { line: Some(1), .. }));
        assert!(err.is_recoverable());
        assert!(err.message().contains("Nesting deeper"));
    }

    #[test]
    fn test_moderate_nesting_accepted() {
        let src = format!("User{}\n", ".b".repeat(MAX_NESTING_DEPTH / 4));
        let c = calls(&parse(&src));
        assert!(has(&c, "User", "b"));
        assert_eq!(c.len(), MAX_NESTING_DEPTH / 4);
    }

    #[test]
    fn test_oversized_source_rejected() {
        let big = "a".repeat(MAX_FILE_SIZE + 1);
        let err = parse_ruby(&PathBuf::from("big.rb"), &big).unwrap_err();
        assert!(matches!(err, CalltallyError::Parse { .. }));
        assert!(err.is_recoverable());
    }
}
