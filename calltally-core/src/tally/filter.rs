//! Per-call-site filter pipeline.
//!
//! Stages run in a fixed order: missing method, operator skip, method
//! allow-list, receiver-type allow-list (on the raw category), identity
//! synthesis for receiverless calls, receiver allow-list.

use crate::config::{Mode, ScanConfig};

use super::classify::Receiver;
use super::context::ContextStack;

/// Operator method names dropped when `skip_operators` is on.
pub const OPERATOR_METHODS: &[&str] = &[
    "[]", "[]=", "!", "~", "**", "===", "==", "!=", "<=", ">=", "<<", ">>", "<", ">", "+", "-",
    "*", "/", "%", "^", "&", "|",
];

pub fn is_operator(method: &str) -> bool {
    OPERATOR_METHODS.contains(&method)
}

/// Why a call site was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingMethod,
    Operator,
    MethodNotAllowed,
    ReceiverTypeNotAllowed,
    ReceiverNotAllowed,
}

/// A call site that passed every stage, ready for the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    /// Raw identity, or the synthesized context label for receiverless calls.
    pub identity: Option<String>,
    pub method: String,
}

/// Stateless predicate chain over a resolved configuration.
#[derive(Debug, Clone, Copy)]
pub struct FilterPipeline<'a> {
    config: &'a ScanConfig,
}

impl<'a> FilterPipeline<'a> {
    pub fn new(config: &'a ScanConfig) -> Self {
        Self { config }
    }

    pub fn admit(
        &self,
        receiver: &Receiver,
        method: Option<&str>,
        context: &ContextStack,
    ) -> Result<Admitted, Rejection> {
        let method = method.ok_or(Rejection::MissingMethod)?;

        if self.config.skip_operators && is_operator(method) {
            return Err(Rejection::Operator);
        }

        if let Some(allowed) = &self.config.methods {
            if !allowed.contains(method) {
                return Err(Rejection::MethodNotAllowed);
            }
        }

        if let Some(types) = self.config.receiver_types.as_ref().filter(|t| !t.is_empty()) {
            let label_allowed = receiver
                .category
                .type_label()
                .is_some_and(|label| types.contains(&label));
            if !label_allowed {
                return Err(Rejection::ReceiverTypeNotAllowed);
            }
        }

        let identity = if receiver.is_none() && self.config.include_nil_receiver {
            Some(context.current_context_label())
        } else {
            receiver.identity.clone()
        };

        if let (Some(allowed), Some(id)) = (&self.config.receivers, identity.as_deref()) {
            if self.config.mode != Mode::Methods && !allowed.contains(id) {
                return Err(Rejection::ReceiverNotAllowed);
            }
        }

        Ok(Admitted {
            identity,
            method: method.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiverType;
    use crate::syntax::Node;
    use crate::tally::classify::classify;

    fn set<T: std::hash::Hash + Eq>(items: impl IntoIterator<Item = T>) -> Option<std::collections::HashSet<T>> {
        Some(items.into_iter().collect())
    }

    fn local() -> Receiver {
        classify(Some(&Node::LocalVariable("user".into())), false)
    }

    #[test]
    fn test_missing_method_rejected() {
        let cfg = ScanConfig::default();
        let pipeline = FilterPipeline::new(&cfg);
        assert_eq!(
            pipeline.admit(&local(), None, &ContextStack::new()),
            Err(Rejection::MissingMethod)
        );
    }

    #[test]
    fn test_operators_skipped_by_default() {
        let cfg = ScanConfig::default();
        let pipeline = FilterPipeline::new(&cfg);
        for op in ["[]", "==", "<<", "[]="] {
            assert_eq!(
                pipeline.admit(&local(), Some(op), &ContextStack::new()),
                Err(Rejection::Operator)
            );
        }
        // Unary minus is spelled -@ and is not in the set.
        assert!(pipeline.admit(&local(), Some("-@"), &ContextStack::new()).is_ok());
    }

    #[test]
    fn test_operators_kept_when_disabled() {
        let cfg = ScanConfig {
            skip_operators: false,
            ..Default::default()
        };
        let admitted = FilterPipeline::new(&cfg)
            .admit(&local(), Some("<<"), &ContextStack::new())
            .unwrap();
        assert_eq!(admitted.method, "<<");
    }

    #[test]
    fn test_method_allow_list() {
        let cfg = ScanConfig {
            methods: set(["find".to_string()]),
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(&cfg);
        assert!(pipeline.admit(&local(), Some("find"), &ContextStack::new()).is_ok());
        assert_eq!(
            pipeline.admit(&local(), Some("save"), &ContextStack::new()),
            Err(Rejection::MethodNotAllowed)
        );
    }

    #[test]
    fn test_nil_receiver_synthesizes_context_label() {
        let cfg = ScanConfig {
            include_nil_receiver: true,
            ..Default::default()
        };
        let mut ctx = ContextStack::new();
        ctx.push(Some("Book".into()));
        let admitted = FilterPipeline::new(&cfg)
            .admit(&Receiver::none(), Some("validate"), &ctx)
            .unwrap();
        assert_eq!(admitted.identity.as_deref(), Some("Book#"));
    }

    #[test]
    fn test_nil_receiver_without_flag_keeps_null_identity() {
        let cfg = ScanConfig::default();
        let admitted = FilterPipeline::new(&cfg)
            .admit(&Receiver::none(), Some("validate"), &ContextStack::new())
            .unwrap();
        assert_eq!(admitted.identity, None);
    }

    #[test]
    fn test_receiver_types_use_raw_category() {
        let cfg = ScanConfig {
            include_nil_receiver: true,
            receiver_types: set([ReceiverType::Locals, ReceiverType::Implicit]),
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(&cfg);
        assert!(pipeline.admit(&local(), Some("save"), &ContextStack::new()).is_ok());
        assert_eq!(
            pipeline.admit(&Receiver::none(), Some("validate"), &ContextStack::new()),
            Err(Rejection::ReceiverTypeNotAllowed)
        );
        let ivar = classify(Some(&Node::InstanceVariable("@post".into())), false);
        assert_eq!(
            pipeline.admit(&ivar, Some("title"), &ContextStack::new()),
            Err(Rejection::ReceiverTypeNotAllowed)
        );
    }

    #[test]
    fn test_empty_receiver_types_is_unfiltered() {
        let cfg = ScanConfig {
            receiver_types: set(Vec::<ReceiverType>::new()),
            ..Default::default()
        };
        assert!(FilterPipeline::new(&cfg)
            .admit(&Receiver::none(), Some("puts"), &ContextStack::new())
            .is_ok());
    }

    #[test]
    fn test_receiver_allow_list_matches_identity() {
        let cfg = ScanConfig {
            receivers: set(["User".to_string(), "Book#".to_string()]),
            include_nil_receiver: true,
            ..Default::default()
        };
        let pipeline = FilterPipeline::new(&cfg);
        let user = classify(Some(&Node::Constant("User".into())), false);
        let post = classify(Some(&Node::Constant("Post".into())), false);
        assert!(pipeline.admit(&user, Some("find"), &ContextStack::new()).is_ok());
        assert_eq!(
            pipeline.admit(&post, Some("find"), &ContextStack::new()),
            Err(Rejection::ReceiverNotAllowed)
        );

        let mut ctx = ContextStack::new();
        ctx.push(Some("Book".into()));
        assert!(pipeline.admit(&Receiver::none(), Some("validate"), &ctx).is_ok());
    }

    #[test]
    fn test_receiver_allow_list_ignores_null_identity() {
        let cfg = ScanConfig {
            receivers: set(["User".to_string()]),
            ..Default::default()
        };
        assert!(FilterPipeline::new(&cfg)
            .admit(&Receiver::none(), Some("puts"), &ContextStack::new())
            .is_ok());
    }

    #[test]
    fn test_receiver_allow_list_ignored_in_methods_mode() {
        let cfg = ScanConfig {
            mode: Mode::Methods,
            receivers: set(["User".to_string()]),
            ..Default::default()
        };
        let post = classify(Some(&Node::Constant("Post".into())), false);
        assert!(FilterPipeline::new(&cfg)
            .admit(&post, Some("find"), &ContextStack::new())
            .is_ok());
    }
}
