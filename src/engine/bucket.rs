use crate::core::item::OpenItem;
use crate::rules::rule::ClearingRule;
use std::collections::HashMap;

/// Identity of a bucket: items sharing account, currency and every
/// match key value of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub account: String,
    pub currency: String,
    pub parts: Vec<String>,
}

impl BucketKey {
    /// Key of `item` under `rule`, or `None` if a match key field is blank.
    pub fn for_item(rule: &ClearingRule, item: &OpenItem) -> Option<Self> {
        Some(Self {
            account: item.account().to_string(),
            currency: item.currency().to_string(),
            parts: rule.key_parts(item)?,
        })
    }
}

/// Members of one bucket, as positions into the scope's item slice in
/// ascending (input) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: BucketKey,
    pub members: Vec<usize>,
}

/// Buckets in first-seen order with a hash index over their keys.
#[derive(Debug, Clone, Default)]
pub struct BucketArena {
    index: HashMap<BucketKey, usize>,
    buckets: Vec<Bucket>,
}

impl BucketArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket the items at `positions` under `rule`.
    ///
    /// Returns the arena and the positions skipped for a blank key field.
    pub fn build(
        rule: &ClearingRule,
        items: &[&OpenItem],
        positions: impl IntoIterator<Item = usize>,
    ) -> (Self, Vec<usize>) {
        let mut arena = Self::new();
        let mut skipped = Vec::new();
        for pos in positions {
            match BucketKey::for_item(rule, items[pos]) {
                Some(key) => arena.insert(key, pos),
                None => skipped.push(pos),
            }
        }
        (arena, skipped)
    }

    pub fn insert(&mut self, key: BucketKey, position: usize) {
        match self.index.get(&key) {
            Some(&slot) => self.buckets[slot].members.push(position),
            None => {
                self.index.insert(key.clone(), self.buckets.len());
                self.buckets.push(Bucket {
                    key,
                    members: vec![position],
                });
            }
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn get(&self, key: &BucketKey) -> Option<&Bucket> {
        self.index.get(key).map(|&slot| &self.buckets[slot])
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::amount::Amount;
    use crate::core::item::ItemId;
    use crate::rules::rule::{MatchKey, RuleScope};
    use chrono::NaiveDate;

    fn item(id: usize, account: &str, reference: &str) -> OpenItem {
        OpenItem::new(
            ItemId(id),
            id.to_string(),
            "1000",
            "DE",
            account,
            Amount::from_minor(100),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        )
        .with_currency("EUR")
        .with_reference(reference)
    }

    #[test]
    fn test_first_seen_order() {
        let rule =
            ClearingRule::new("r", RuleScope::wildcard()).with_match_keys([MatchKey::Reference]);
        let items = [
            item(0, "A", "R2"),
            item(1, "A", "R1"),
            item(2, "A", "R2"),
            item(3, "B", "R2"),
            item(4, "A", ""),
        ];
        let refs: Vec<&OpenItem> = items.iter().collect();
        let (arena, skipped) = BucketArena::build(&rule, &refs, 0..refs.len());

        assert_eq!(skipped, vec![4]);
        assert_eq!(arena.len(), 3);
        let members: Vec<Vec<usize>> = arena.buckets().iter().map(|b| b.members.clone()).collect();
        assert_eq!(members, vec![vec![0, 2], vec![1], vec![3]]);
        assert_eq!(arena.buckets()[2].key.account, "B");
    }

    #[test]
    fn test_lookup_by_key() {
        let rule = ClearingRule::new("r", RuleScope::wildcard());
        let items = [item(0, "A", ""), item(1, "A", "")];
        let refs: Vec<&OpenItem> = items.iter().collect();
        let (arena, skipped) = BucketArena::build(&rule, &refs, [0, 1]);
        assert!(skipped.is_empty());

        let key = BucketKey::for_item(&rule, &items[0]).unwrap();
        assert_eq!(arena.get(&key).unwrap().members, vec![0, 1]);
    }
}
