//! Generic syntax tree consumed by the tally engine.
//!
//! The parser lowers concrete grammar nodes into this closed set of shapes.
//! Anything the engine does not care about becomes [`Node::Other`], which
//! only carries its children so nested calls are still reached.

/// Kind of lexical scope that contributes to the context label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Class,
    Module,
}

/// A node of the lowered syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `class`/`module` body. `name` is `None` when the name is not a
    /// literal constant path.
    Scope {
        kind: ScopeKind,
        name: Option<String>,
        body: Vec<Node>,
    },
    /// A method invocation. `method` is `None` only for malformed nodes.
    Call {
        receiver: Option<Box<Node>>,
        method: Option<String>,
        arguments: Vec<Node>,
    },
    /// `&expr` in an argument list.
    BlockArgument(Option<Box<Node>>),
    /// Static symbol literal, without the leading colon.
    Symbol(String),
    /// Constant or static constant path, `::`-joined, no leading `::`.
    Constant(String),
    LocalVariable(String),
    InstanceVariable(String),
    ClassVariable(String),
    GlobalVariable(String),
    SelfRef,
    /// Any other construct.
    Other(Vec<Node>),
}

impl Node {
    /// Receiverless call with no arguments.
    pub fn call(method: impl Into<String>) -> Self {
        Node::Call {
            receiver: None,
            method: Some(method.into()),
            arguments: Vec::new(),
        }
    }

    /// Call on an explicit receiver with no arguments.
    pub fn call_on(receiver: Node, method: impl Into<String>) -> Self {
        Node::Call {
            receiver: Some(Box::new(receiver)),
            method: Some(method.into()),
            arguments: Vec::new(),
        }
    }

    /// Appends arguments to a call node; other nodes are returned unchanged.
    pub fn with_arguments(self, args: impl IntoIterator<Item = Node>) -> Self {
        match self {
            Node::Call {
                receiver,
                method,
                mut arguments,
            } => {
                arguments.extend(args);
                Node::Call {
                    receiver,
                    method,
                    arguments,
                }
            }
            other => other,
        }
    }

    pub fn class(name: impl Into<String>, body: Vec<Node>) -> Self {
        Node::Scope {
            kind: ScopeKind::Class,
            name: Some(name.into()),
            body,
        }
    }

    pub fn module(name: impl Into<String>, body: Vec<Node>) -> Self {
        Node::Scope {
            kind: ScopeKind::Module,
            name: Some(name.into()),
            body,
        }
    }

    /// `&:name`
    pub fn symbol_block_argument(name: impl Into<String>) -> Self {
        Node::BlockArgument(Some(Box::new(Node::Symbol(name.into()))))
    }

    /// Direct children in source order.
    pub fn children(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        match self {
            Node::Scope { body, .. } => Box::new(body.iter()),
            Node::Call {
                receiver,
                arguments,
                ..
            } => Box::new(receiver.as_deref().into_iter().chain(arguments.iter())),
            Node::BlockArgument(expr) => Box::new(expr.as_deref().into_iter()),
            Node::Other(children) => Box::new(children.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}
