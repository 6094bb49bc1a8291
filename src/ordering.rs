//! Deterministic ordering and capping of store search results
//!
//! Store-side ordering is treated as untrusted. For DATE the UIDs themselves
//! are the sort key: UIDs grow with arrival, so numeric order is date order
//! for any mailbox not rebuilt out of sequence.

use crate::query::{SortField, SortSpec};

/// Hard cap on identifiers handed to summarization
pub const MAX_RESULTS: usize = 20;

/// Order `uids` by `sort` and keep at most `limit` (itself capped at [`MAX_RESULTS`])
///
/// - DATE: re-sorted numerically, whatever order the store used.
/// - SUBJECT/FROM: the store's order is kept, except that an ascending
///   sequence is reversed when descending was requested. This is a best-effort
///   heuristic: a store that already sorted by subject will not look ascending
///   by UID and is left alone, but a store that ignored the sort and returned
///   UID order is flipped to newest first. It does not guarantee subject or
///   sender order.
///
/// Truncation happens only after ordering.
pub fn order_results(mut uids: Vec<u32>, sort: SortSpec, limit: usize) -> Vec<u32> {
    match sort.field {
        SortField::Date if sort.descending => uids.sort_unstable_by(|a, b| b.cmp(a)),
        SortField::Date => uids.sort_unstable(),
        _ if sort.descending && uids.len() > 1 && uids.is_sorted() => uids.reverse(),
        _ => {}
    }
    uids.truncate(limit.min(MAX_RESULTS));
    uids
}

#[cfg(test)]
mod tests {
    use super::{MAX_RESULTS, order_results};
    use crate::query::{SortField, SortSpec};

    fn desc(field: SortField) -> SortSpec {
        SortSpec {
            field,
            descending: true,
        }
    }

    #[test]
    fn date_sort_ignores_store_order() {
        assert_eq!(order_results(vec![3, 1, 2], desc(SortField::Date), 20), vec![3, 2, 1]);
        assert_eq!(
            order_results(vec![1, 2, 3, 4], desc(SortField::Date), 20),
            vec![4, 3, 2, 1]
        );
        assert_eq!(
            order_results(vec![9, 7, 5], desc(SortField::Date), 20),
            vec![9, 7, 5]
        );
    }

    #[test]
    fn date_sort_is_strictly_descending_for_scrambled_input() {
        let scrambled: Vec<u32> = (0..500).map(|i| (i * 7919) % 500).collect();
        let out = order_results(scrambled, desc(SortField::Date), 20);
        assert_eq!(out.len(), 20);
        assert!(out.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(out[0], 499);
    }

    #[test]
    fn never_exceeds_cap() {
        let many: Vec<u32> = (1..=10_000).collect();
        for field in [SortField::Date, SortField::Subject, SortField::From] {
            let out = order_results(many.clone(), desc(field), usize::MAX);
            assert_eq!(out.len(), MAX_RESULTS);
        }
        assert_eq!(order_results(many, desc(SortField::Date), 5).len(), 5);
    }

    #[test]
    fn truncates_after_sorting() {
        let mut input: Vec<u32> = (1..=100).collect();
        input.swap(0, 99);
        let out = order_results(input, desc(SortField::Date), 20);
        assert_eq!(out.first(), Some(&100));
        assert_eq!(out.last(), Some(&81));
    }

    #[test]
    fn non_date_ascending_store_order_is_reversed() {
        let out = order_results(vec![10, 20, 30], desc(SortField::Subject), 20);
        assert_eq!(out, vec![30, 20, 10]);
    }

    #[test]
    fn non_date_store_order_is_otherwise_kept() {
        let out = order_results(vec![20, 10, 30], desc(SortField::From), 20);
        assert_eq!(out, vec![20, 10, 30]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(order_results(Vec::new(), desc(SortField::Date), 20).is_empty());
        assert!(order_results(Vec::new(), desc(SortField::From), 20).is_empty());
    }
}
