//! Call-site classification and aggregation engine.
//!
//! - `classify`: receiver node to category and identity
//! - `context`: enclosing class/module names
//! - `filter`: per-call-site admission pipeline
//! - `aggregate`: pair/method/receiver counters
//! - `visitor`: depth-first walk driving the above
//! - `rank`: mode projection and top-N

pub mod aggregate;
pub mod classify;
pub mod context;
pub mod filter;
pub mod rank;
pub mod visitor;

pub use aggregate::Tally;
pub use classify::{classify, Receiver, ReceiverCategory};
pub use context::ContextStack;
pub use filter::{Admitted, FilterPipeline, Rejection, OPERATOR_METHODS};
pub use rank::rank;
pub use visitor::CallVisitor;

use crate::config::ScanConfig;
use crate::syntax::Node;

/// Walks one tree into a fresh tally.
pub fn tally_tree(tree: &Node, config: &ScanConfig) -> Tally {
    let mut tally = Tally::new();
    CallVisitor::new(config, &mut tally).visit(tree);
    tally
}
