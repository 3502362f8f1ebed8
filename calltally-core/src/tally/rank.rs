//! Mode projection and top-N ranking.

use crate::config::Mode;
use crate::report::{NameRow, PairRow, Report, Rows};

use super::aggregate::Tally;

/// Projects the view for `mode`, sorts by count descending and keeps the
/// first `top` entries. Ties keep first-insertion order.
pub fn rank(tally: &Tally, mode: Mode, top: usize) -> Report {
    let rows = match mode {
        Mode::Pairs => {
            let mut entries: Vec<_> = tally.pairs.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1));
            Rows::Pairs(
                entries
                    .into_iter()
                    .take(top)
                    .map(|((receiver, method), count)| PairRow {
                        receiver: receiver.clone(),
                        method: method.clone(),
                        count: *count,
                    })
                    .collect(),
            )
        }
        Mode::Methods => Rows::Names(rank_names(tally.methods.iter(), top)),
        Mode::Receivers => Rows::Names(rank_names(tally.receivers.iter(), top)),
    };
    Report { mode, rows }
}

fn rank_names<'a>(entries: impl Iterator<Item = (&'a String, &'a u64)>, top: usize) -> Vec<NameRow> {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| b.1.cmp(a.1));
    entries
        .into_iter()
        .take(top)
        .map(|(name, count)| NameRow {
            name: name.clone(),
            count: *count,
        })
        .collect()
}
