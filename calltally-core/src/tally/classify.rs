//! Receiver classification.
//!
//! Maps the receiver sub-node of a call to a semantic category and the
//! identity string used as its aggregation key.

use crate::config::ReceiverType;
use crate::syntax::Node;

/// Semantic kind of a call receiver. Variable categories keep the variable
/// name; it only reaches the identity when variables are split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverCategory {
    Constant(String),
    LocalVariable(Option<String>),
    InstanceVariable(Option<String>),
    ClassVariable(Option<String>),
    GlobalVariable(Option<String>),
    SelfReference,
    ResultOfCall,
    /// No explicit receiver, or a receiver expression we do not classify.
    NoReceiver,
}

impl ReceiverCategory {
    /// Label matched against the receiver-type allow-list. `NoReceiver` has none.
    pub fn type_label(&self) -> Option<ReceiverType> {
        match self {
            Self::Constant(_) => Some(ReceiverType::Constants),
            Self::LocalVariable(_) => Some(ReceiverType::Locals),
            Self::InstanceVariable(_) => Some(ReceiverType::Ivars),
            Self::ClassVariable(_) => Some(ReceiverType::Cvars),
            Self::GlobalVariable(_) => Some(ReceiverType::Gvars),
            Self::SelfReference => Some(ReceiverType::SelfRef),
            Self::ResultOfCall => Some(ReceiverType::Results),
            Self::NoReceiver => None,
        }
    }

    /// Aggregation key for this receiver, or `None` for `NoReceiver`.
    pub fn identity(&self, split_variables: bool) -> Option<String> {
        match self {
            Self::Constant(name) => Some(name.clone()),
            Self::LocalVariable(name) => Some(variable_identity("var", name, split_variables)),
            Self::InstanceVariable(name) => Some(variable_identity("ivar", name, split_variables)),
            Self::ClassVariable(name) => Some(variable_identity("cvar", name, split_variables)),
            Self::GlobalVariable(name) => Some(variable_identity("gvar", name, split_variables)),
            Self::SelfReference => Some("(self)".to_string()),
            Self::ResultOfCall => Some("(result)".to_string()),
            Self::NoReceiver => None,
        }
    }
}

fn variable_identity(group: &str, name: &Option<String>, split_variables: bool) -> String {
    match name {
        Some(name) if split_variables => format!("({}:{})", group, name),
        _ => format!("({})", group),
    }
}

/// Classified receiver: raw category plus its identity under the current
/// split setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub category: ReceiverCategory,
    pub identity: Option<String>,
}

impl Receiver {
    pub fn none() -> Self {
        Self {
            category: ReceiverCategory::NoReceiver,
            identity: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.category == ReceiverCategory::NoReceiver
    }
}

/// Classifies a call's receiver node.
pub fn classify(node: Option<&Node>, split_variables: bool) -> Receiver {
    let category = match node {
        None => ReceiverCategory::NoReceiver,
        Some(Node::Constant(name)) => ReceiverCategory::Constant(name.clone()),
        Some(Node::LocalVariable(name)) => ReceiverCategory::LocalVariable(Some(name.clone())),
        Some(Node::InstanceVariable(name)) => ReceiverCategory::InstanceVariable(Some(name.clone())),
        Some(Node::ClassVariable(name)) => ReceiverCategory::ClassVariable(Some(name.clone())),
        Some(Node::GlobalVariable(name)) => ReceiverCategory::GlobalVariable(Some(name.clone())),
        Some(Node::SelfRef) => ReceiverCategory::SelfReference,
        Some(Node::Call { .. }) => ReceiverCategory::ResultOfCall,
        Some(
            Node::Scope { .. } | Node::BlockArgument(_) | Node::Symbol(_) | Node::Other(_),
        ) => ReceiverCategory::NoReceiver,
    };
    let identity = category.identity(split_variables);
    Receiver { category, identity }
}
