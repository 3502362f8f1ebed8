//! Depth-first traversal of one syntax tree.

use std::ops::{Deref, DerefMut};

use crate::config::ScanConfig;
use crate::syntax::Node;

use super::aggregate::Tally;
use super::classify::{classify, Receiver};
use super::context::ContextStack;
use super::filter::FilterPipeline;

/// Walks a tree and records every admitted call site into an injected tally.
pub struct CallVisitor<'a> {
    config: &'a ScanConfig,
    pipeline: FilterPipeline<'a>,
    context: ContextStack,
    tally: &'a mut Tally,
}

impl<'a> CallVisitor<'a> {
    pub fn new(config: &'a ScanConfig, tally: &'a mut Tally) -> Self {
        Self {
            config,
            pipeline: FilterPipeline::new(config),
            context: ContextStack::new(),
            tally,
        }
    }

    pub fn visit(&mut self, node: &Node) {
        match node {
            Node::Scope { name, body, .. } => {
                let mut scope = self.enter_scope(name.clone());
                for child in body {
                    scope.visit(child);
                }
            }
            Node::Call {
                receiver, method, ..
            } => {
                let classified = classify(receiver.as_deref(), self.config.split_variables);
                for child in node.children() {
                    self.visit(child);
                }
                self.record(&classified, method.as_deref());
            }
            Node::BlockArgument(Some(expr)) => match expr.as_ref() {
                Node::Symbol(name) => self.record(&Receiver::none(), Some(name)),
                other => self.visit(other),
            },
            _ => {
                for child in node.children() {
                    self.visit(child);
                }
            }
        }
    }

    /// Current lexical context depth; zero once a walk completes.
    pub fn context_depth(&self) -> usize {
        self.context.depth()
    }

    fn record(&mut self, receiver: &Receiver, method: Option<&str>) {
        if let Ok(admitted) = self.pipeline.admit(receiver, method, &self.context) {
            self.tally
                .record(admitted.identity.as_deref(), &admitted.method, self.config.mode);
        }
    }

    fn enter_scope(&mut self, name: Option<String>) -> ScopeGuard<'_, 'a> {
        self.context.push(name);
        ScopeGuard { visitor: self }
    }
}

/// Holds the visitor while a class/module scope is open and pops the
/// context frame when dropped.
struct ScopeGuard<'v, 'a> {
    visitor: &'v mut CallVisitor<'a>,
}

impl<'a> Deref for ScopeGuard<'_, 'a> {
    type Target = CallVisitor<'a>;

    fn deref(&self) -> &Self::Target {
        self.visitor
    }
}

impl DerefMut for ScopeGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.visitor
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.visitor.context.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, ReceiverType};

    fn walk(tree: &Node, config: &ScanConfig) -> Tally {
        let mut tally = Tally::new();
        let mut visitor = CallVisitor::new(config, &mut tally);
        visitor.visit(tree);
        assert_eq!(visitor.context_depth(), 0);
        tally
    }

    fn user_chain() -> Node {
        // User.active.where(role: "x").limit(10)
        let active = Node::call_on(Node::Constant("User".into()), "active");
        let where_ = Node::call_on(active, "where").with_arguments([Node::Other(vec![])]);
        Node::call_on(where_, "limit").with_arguments([Node::Other(vec![])])
    }

    #[test]
    fn test_chain_yields_one_site_per_call() {
        let tally = walk(&user_chain(), &ScanConfig::default());
        assert_eq!(tally.pair_count("User", "active"), 1);
        assert_eq!(tally.pair_count("(result)", "where"), 1);
        assert_eq!(tally.pair_count("(result)", "limit"), 1);
        assert_eq!(tally.pairs.len(), 3);
    }

    #[test]
    fn test_post_order_insertion() {
        let tally = walk(&user_chain(), &ScanConfig::default());
        let methods: Vec<_> = tally.pairs.keys().map(|(_, m)| m.as_str()).collect();
        assert_eq!(methods, vec!["active", "where", "limit"]);
    }

    #[test]
    fn test_receiverless_call_in_class_scope() {
        let tree = Node::Other(vec![Node::class(
            "Book",
            vec![Node::call("validate").with_arguments([Node::Symbol("title".into())])],
        )]);

        let with_nil = ScanConfig {
            include_nil_receiver: true,
            ..Default::default()
        };
        let tally = walk(&tree, &with_nil);
        assert_eq!(tally.pair_count("Book#", "validate"), 1);

        let tally = walk(&tree, &ScanConfig::default());
        assert!(tally.pairs.is_empty());
        assert_eq!(tally.method_count("validate"), 1);
    }

    #[test]
    fn test_nested_scopes_pop_on_exit() {
        let tree = Node::Other(vec![
            Node::module(
                "Admin",
                vec![Node::class("UsersController", vec![Node::call("before_action")])],
            ),
            Node::call("helper_method"),
        ]);
        let cfg = ScanConfig {
            include_nil_receiver: true,
            ..Default::default()
        };
        let tally = walk(&tree, &cfg);
        assert_eq!(tally.pair_count("Admin::UsersController#", "before_action"), 1);
        assert_eq!(tally.pair_count("#", "helper_method"), 1);
    }

    #[test]
    fn test_unnamed_scope_keeps_stack_balanced() {
        let tree = Node::Other(vec![
            Node::Scope {
                kind: crate::syntax::ScopeKind::Class,
                name: None,
                body: vec![Node::call("inside")],
            },
            Node::call("outside"),
        ]);
        let cfg = ScanConfig {
            include_nil_receiver: true,
            ..Default::default()
        };
        let tally = walk(&tree, &cfg);
        assert_eq!(tally.pair_count("#", "inside"), 1);
        assert_eq!(tally.pair_count("#", "outside"), 1);
    }

    #[test]
    fn test_symbol_block_argument_counts_as_call() {
        // users.map(&:name)
        let tree = Node::call_on(Node::LocalVariable("users".into()), "map")
            .with_arguments([Node::symbol_block_argument("name")]);
        let tally = walk(&tree, &ScanConfig::default());
        assert_eq!(tally.pair_count("(var)", "map"), 1);
        assert_eq!(tally.method_count("name"), 1);
    }

    #[test]
    fn test_non_symbol_block_argument_is_walked() {
        // each(&method(:puts))
        let tree = Node::call("each").with_arguments([Node::BlockArgument(Some(Box::new(
            Node::call("method").with_arguments([Node::Symbol("puts".into())]),
        )))]);
        let tally = walk(&tree, &ScanConfig::default());
        assert_eq!(tally.method_count("each"), 1);
        assert_eq!(tally.method_count("method"), 1);
        assert_eq!(tally.method_count("puts"), 0);
    }

    #[test]
    fn test_receiver_types_exclude_receiverless_calls() {
        let tree = Node::Other(vec![Node::class(
            "Book",
            vec![
                Node::call("validate"),
                Node::call_on(Node::LocalVariable("book".into()), "save"),
            ],
        )]);
        let cfg = ScanConfig {
            include_nil_receiver: true,
            receiver_types: Some([ReceiverType::Locals].into_iter().collect()),
            ..Default::default()
        };
        let tally = walk(&tree, &cfg);
        assert_eq!(tally.pair_count("(var)", "save"), 1);
        assert_eq!(tally.pair_count("Book#", "validate"), 0);
        assert_eq!(tally.method_count("validate"), 0);
    }

    #[test]
    fn test_malformed_call_skipped_but_children_walked() {
        let tree = Node::Call {
            receiver: Some(Box::new(Node::call_on(Node::Constant("User".into()), "first"))),
            method: None,
            arguments: vec![],
        };
        let tally = walk(&tree, &ScanConfig::default());
        assert_eq!(tally.pair_count("User", "first"), 1);
        assert_eq!(tally.pairs.len(), 1);
    }

    #[test]
    fn test_receivers_mode() {
        let cfg = ScanConfig {
            mode: Mode::Receivers,
            ..Default::default()
        };
        let tally = walk(&user_chain(), &cfg);
        assert_eq!(tally.receiver_count("User"), 1);
        assert_eq!(tally.receiver_count("(result)"), 2);
        assert!(tally.pairs.is_empty());
    }
}
