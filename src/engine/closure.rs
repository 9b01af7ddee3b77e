//! Closure strategies: ways of finding subsets of a bucket that net to
//! zero.
//!
//! Every strategy works on `open`, the positions of a bucket's still-open
//! members in input order, and proposes candidate member lists in input
//! order. Candidates are disjoint. They are only proposals: the engine
//! still validates each one through `ClearingGroup::new`.

use crate::core::amount::Amount;
use crate::core::item::OpenItem;
use crate::rules::rule::ClosureStrategy;
use std::collections::{HashMap, VecDeque};

/// Candidate groups proposed by `strategy`.
pub fn propose(
    strategy: ClosureStrategy,
    open: &[usize],
    items: &[&OpenItem],
    tolerance: u64,
) -> Vec<Vec<usize>> {
    match strategy {
        ClosureStrategy::Pair => offset_pairs(open, items),
        ClosureStrategy::FullBucket => full_bucket(open, items, tolerance).into_iter().collect(),
        ClosureStrategy::RunningBalance => {
            running_balance(open, items, tolerance).into_iter().collect()
        }
    }
}

/// Exact two-item offsets.
///
/// Each item looks up a waiting item of the negated amount; the earliest
/// waiting one is taken. Unpaired items wait for a later complement.
pub fn offset_pairs(open: &[usize], items: &[&OpenItem]) -> Vec<Vec<usize>> {
    let mut waiting: HashMap<Amount, VecDeque<usize>> = HashMap::new();
    let mut pairs = Vec::new();

    for &pos in open {
        let amount = items[pos].amount();
        let partner = waiting
            .get_mut(&-amount)
            .and_then(|queue| queue.pop_front());
        match partner {
            Some(earlier) => pairs.push(vec![earlier, pos]),
            None => waiting.entry(amount).or_default().push_back(pos),
        }
    }

    pairs
}

/// The whole open remainder, if it nets to zero within tolerance.
pub fn full_bucket(open: &[usize], items: &[&OpenItem], tolerance: u64) -> Option<Vec<usize>> {
    if open.len() < 2 {
        return None;
    }
    let net = Amount::checked_sum(open.iter().map(|&pos| items[pos].amount()))?;
    net.within(tolerance).then(|| open.to_vec())
}

/// The longest prefix (by posting date) of at least two items whose
/// running sum is within tolerance. The scan stops where the running sum
/// leaves the amount range.
pub fn running_balance(
    open: &[usize],
    items: &[&OpenItem],
    tolerance: u64,
) -> Option<Vec<usize>> {
    let mut chronological = open.to_vec();
    // stable: equal dates keep input order
    chronological.sort_by_key(|&pos| items[pos].posting_date());

    let mut balance = Amount::ZERO;
    let mut closing_len = None;
    for (n, &pos) in chronological.iter().enumerate() {
        balance = match balance.checked_add(items[pos].amount()) {
            Some(next) => next,
            None => break,
        };
        if n >= 1 && balance.within(tolerance) {
            closing_len = Some(n + 1);
        }
    }

    closing_len.map(|len| {
        let mut prefix = chronological[..len].to_vec();
        prefix.sort_unstable();
        prefix
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemId;
    use chrono::NaiveDate;

    fn items(amounts: &[(i64, u32)]) -> Vec<OpenItem> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &(minor, day))| {
                OpenItem::new(
                    ItemId(i),
                    i.to_string(),
                    "1000",
                    "DE",
                    "24182000",
                    Amount::from_minor(minor),
                    NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
                )
            })
            .collect()
    }

    fn all(items: &[OpenItem]) -> (Vec<&OpenItem>, Vec<usize>) {
        (items.iter().collect(), (0..items.len()).collect())
    }

    #[test]
    fn test_pairs_take_earliest_complement() {
        let owned = items(&[(100, 3), (100, 3), (-100, 4), (-100, 5), (-100, 6)]);
        let (refs, open) = all(&owned);
        assert_eq!(offset_pairs(&open, &refs), vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_pairs_ignore_near_misses() {
        let owned = items(&[(100, 3), (-99, 3)]);
        let (refs, open) = all(&owned);
        assert!(offset_pairs(&open, &refs).is_empty());
    }

    #[test]
    fn test_pair_credit_first() {
        let owned = items(&[(-250, 3), (40, 3), (250, 4)]);
        let (refs, open) = all(&owned);
        assert_eq!(offset_pairs(&open, &refs), vec![vec![0, 2]]);
    }

    #[test]
    fn test_overflowing_sums_never_close() {
        let owned = items(&[(i64::MAX, 3), (1, 4), (-i64::MAX, 5)]);
        let (refs, open) = all(&owned);
        assert_eq!(full_bucket(&open, &refs, 0), None);
        assert_eq!(running_balance(&open, &refs, 0), None);
    }

    #[test]
    fn test_full_bucket() {
        let owned = items(&[(500, 3), (500, 3), (-1000, 4)]);
        let (refs, open) = all(&owned);
        assert!(offset_pairs(&open, &refs).is_empty());
        assert_eq!(full_bucket(&open, &refs, 0), Some(vec![0, 1, 2]));
        assert_eq!(full_bucket(&open[..2], &refs, 0), None);
        assert_eq!(full_bucket(&open[..1], &refs, 1000), None);
    }

    #[test]
    fn test_running_balance_longest_prefix() {
        // chronological: 2 (day 1), 0 (day 2), 1 (day 3), 3 (day 9)
        let owned = items(&[(-300, 2), (200, 3), (300, 1), (700, 9)]);
        let (refs, open) = all(&owned);
        assert_eq!(running_balance(&open, &refs, 0), Some(vec![0, 2]));
        assert_eq!(running_balance(&open, &refs, 200), Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_running_balance_no_prefix() {
        let owned = items(&[(300, 1), (300, 2)]);
        let (refs, open) = all(&owned);
        assert_eq!(running_balance(&open, &refs, 0), None);
    }

    #[test]
    fn test_propose_dispatch() {
        let owned = items(&[(500, 3), (500, 3), (-1000, 4)]);
        let (refs, open) = all(&owned);
        assert!(propose(ClosureStrategy::Pair, &open, &refs, 0).is_empty());
        assert_eq!(
            propose(ClosureStrategy::FullBucket, &open, &refs, 0),
            vec![vec![0, 1, 2]]
        );
    }
}
