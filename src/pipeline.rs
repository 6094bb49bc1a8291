//! Consolidation pipeline
//!
//! plan -> search -> order and cap -> fetch and summarize each message. The
//! store is injected; messages are processed one at a time so the resulting
//! list keeps exactly the order chosen by [`order_results`].
//!
//! Search hits are treated as a set and put in ascending UID order before
//! ordering, so the selection never depends on how the store enumerated
//! them. SUBJECT and FROM therefore select the newest matches, then order
//! those by key.

use std::cmp::Reverse;

use crate::errors::{AppError, AppResult};
use crate::mime::MimeMessage;
use crate::models::ConsolidatedRecord;
use crate::ordering::order_results;
use crate::query::{FilterCriteria, SortField, plan_query};
use crate::store::{MessageStore, RawMessage};
use crate::summarize::summarize;

/// Per-request pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Result cap, clamped to `ordering::MAX_RESULTS`
    pub max_results: usize,
    /// `strftime` pattern for resolved dates
    pub date_format: String,
}

/// Output of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consolidation {
    /// Messages the store matched, before capping
    pub total_matched: usize,
    pub records: Vec<ConsolidatedRecord>,
}

/// Run the full pipeline against `mailbox`
///
/// A message that vanishes between search and fetch is skipped. Any other
/// store failure aborts the run.
pub async fn consolidate<S: MessageStore + ?Sized>(
    store: &mut S,
    mailbox: &str,
    criteria: &FilterCriteria,
    options: &PipelineOptions,
) -> AppResult<Consolidation> {
    let query = plan_query(criteria);
    tracing::debug!(
        mailbox,
        predicate = %query.predicate,
        sort = %query.sort,
        unfiltered = query.matches_all(),
        "searching"
    );

    let mut uids = store.search(mailbox, &query).await?;
    uids.sort_unstable();
    uids.dedup();
    let total_matched = uids.len();
    let selected = order_results(uids, query.sort, options.max_results);
    tracing::debug!(total_matched, selected = selected.len(), "search complete");

    let mut records = Vec::with_capacity(selected.len());
    for uid in selected {
        let raw = match store.fetch_message(mailbox, uid).await {
            Ok(raw) => raw,
            Err(AppError::NotFound(msg)) => {
                tracing::warn!(uid, error = %msg, "message vanished before fetch; skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        if let Some(record) = summarize_raw(&raw, &options.date_format) {
            records.push(record);
        }
    }

    sort_records(&mut records, query.sort.field);
    Ok(Consolidation {
        total_matched,
        records,
    })
}

/// Parse and summarize one message; `None` if the source is not parseable
fn summarize_raw(raw: &RawMessage, date_format: &str) -> Option<ConsolidatedRecord> {
    let mail = match mailparse::parse_mail(&raw.source) {
        Ok(mail) => mail,
        Err(e) => {
            tracing::warn!(uid = raw.uid, error = %e, "unparseable message; skipping");
            return None;
        }
    };
    let message = MimeMessage::new(&mail, raw.internal_date.as_deref());
    Some(summarize(&message, date_format))
}

/// Stable descending re-sort by the case-folded key for SUBJECT and FROM
fn sort_records(records: &mut [ConsolidatedRecord], field: SortField) {
    match field {
        SortField::Date => {}
        SortField::Subject => records.sort_by_cached_key(|r| Reverse(r.subject.to_lowercase())),
        SortField::From => records.sort_by_cached_key(|r| Reverse(r.from.to_lowercase())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;

    use super::{PipelineOptions, consolidate};
    use crate::errors::{AppError, AppResult};
    use crate::query::{FilterCriteria, SearchQuery, SortField};
    use crate::store::{MessageStore, RawMessage};

    #[derive(Default)]
    struct FakeStore {
        search_result: Vec<u32>,
        messages: HashMap<u32, Vec<u8>>,
        broken_uid: Option<u32>,
        predicates: Vec<String>,
        fetched: Vec<u32>,
    }

    impl FakeStore {
        fn with_messages(search_result: Vec<u32>, messages: &[(u32, &str, &str)]) -> Self {
            Self {
                search_result,
                messages: messages
                    .iter()
                    .map(|(uid, subject, from)| (*uid, message(subject, from)))
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl MessageStore for FakeStore {
        async fn search(&mut self, _mailbox: &str, query: &SearchQuery) -> AppResult<Vec<u32>> {
            self.predicates.push(query.predicate.clone());
            Ok(self.search_result.clone())
        }

        async fn fetch_message(&mut self, _mailbox: &str, uid: u32) -> AppResult<RawMessage> {
            self.fetched.push(uid);
            if self.broken_uid == Some(uid) {
                return Err(AppError::store("connection reset"));
            }
            let source = self
                .messages
                .get(&uid)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("message uid {uid} not found")))?;
            Ok(RawMessage {
                uid,
                source,
                internal_date: None,
            })
        }
    }

    fn message(subject: &str, from: &str) -> Vec<u8> {
        format!(
            "From: {from}\r\nSubject: {subject}\r\nDate: Wed, 1 Jan 2025 09:00:00 +0000\r\n\r\nbody of {subject}"
        )
        .into_bytes()
    }

    fn options(max_results: usize) -> PipelineOptions {
        PipelineOptions {
            max_results,
            date_format: "%Y-%m-%d %H:%M".to_owned(),
        }
    }

    fn subjects(records: &[crate::models::ConsolidatedRecord]) -> Vec<&str> {
        records.iter().map(|r| r.subject.as_str()).collect()
    }

    #[tokio::test]
    async fn date_sort_returns_newest_first_whatever_store_order() {
        let mut store = FakeStore::with_messages(
            vec![1, 5, 3, 2, 4],
            &[(1, "m1", "a"), (2, "m2", "a"), (3, "m3", "a"), (4, "m4", "a"), (5, "m5", "a")],
        );
        let out = consolidate(&mut store, "INBOX", &FilterCriteria::default(), &options(20))
            .await
            .expect("pipeline runs");

        assert_eq!(out.total_matched, 5);
        assert_eq!(subjects(&out.records), vec!["m5", "m4", "m3", "m2", "m1"]);
        assert_eq!(store.predicates, vec!["ALL".to_owned()]);
    }

    #[tokio::test]
    async fn caps_before_fetching() {
        let uids: Vec<u32> = (1..=30).collect();
        let fixtures: Vec<(u32, String)> = uids.iter().map(|u| (*u, format!("m{u}"))).collect();
        let refs: Vec<(u32, &str, &str)> =
            fixtures.iter().map(|(u, s)| (*u, s.as_str(), "a")).collect();
        let mut store = FakeStore::with_messages(uids, &refs);

        let out = consolidate(&mut store, "INBOX", &FilterCriteria::default(), &options(50))
            .await
            .expect("pipeline runs");
        assert_eq!(out.total_matched, 30);
        assert_eq!(out.records.len(), 20);
        assert_eq!(store.fetched.len(), 20);
        assert_eq!(store.fetched.first(), Some(&30));

        let mut store = FakeStore::with_messages((1..=30).collect(), &refs);
        let out = consolidate(&mut store, "INBOX", &FilterCriteria::default(), &options(3))
            .await
            .expect("pipeline runs");
        assert_eq!(subjects(&out.records), vec!["m30", "m29", "m28"]);
    }

    #[tokio::test]
    async fn subject_sort_is_descending_case_insensitive() {
        let mut store = FakeStore::with_messages(
            vec![1, 2, 3],
            &[(1, "banana", "a"), (2, "Cherry", "a"), (3, "apple", "a")],
        );
        let criteria = FilterCriteria::from_request(Some("SUBJECT"), None, None);
        let out = consolidate(&mut store, "INBOX", &criteria, &options(20))
            .await
            .expect("pipeline runs");
        assert_eq!(subjects(&out.records), vec!["Cherry", "banana", "apple"]);
    }

    #[tokio::test]
    async fn from_sort_orders_by_sender_display() {
        let mut store = FakeStore::with_messages(
            vec![1, 2],
            &[(1, "one", "Zed <z@example.com>"), (2, "two", "amy@example.com")],
        );
        let criteria = FilterCriteria::from_request(Some("from"), None, None);
        let out = consolidate(&mut store, "INBOX", &criteria, &options(20))
            .await
            .expect("pipeline runs");
        assert_eq!(criteria.sort_by, SortField::From);
        assert_eq!(subjects(&out.records), vec!["one", "two"]);
    }

    fn scrambled_mailbox() -> Vec<(u32, String, String)> {
        (1..=60)
            .map(|uid| {
                let subject = format!("topic {:02}", (uid * 37) % 61);
                let from = format!("Sender {:02} <s{uid}@example.com>", (uid * 11) % 61);
                (uid, subject, from)
            })
            .collect()
    }

    async fn run_with_store_order(
        sort_by: &str,
        search_result: Vec<u32>,
    ) -> (Vec<u32>, Vec<crate::models::ConsolidatedRecord>) {
        let mailbox = scrambled_mailbox();
        let refs: Vec<(u32, &str, &str)> = mailbox
            .iter()
            .map(|(uid, subject, from)| (*uid, subject.as_str(), from.as_str()))
            .collect();
        let mut store = FakeStore::with_messages(search_result, &refs);
        let criteria = FilterCriteria::from_request(Some(sort_by), None, None);
        let out = consolidate(&mut store, "INBOX", &criteria, &options(20))
            .await
            .expect("pipeline runs");
        assert_eq!(out.total_matched, 60);
        let mut fetched = store.fetched;
        fetched.sort_unstable();
        (fetched, out.records)
    }

    #[tokio::test]
    async fn key_sorts_select_newest_matches_whatever_store_order() {
        let newest: Vec<u32> = (41..=60).collect();
        let orders: [Vec<u32>; 3] = [
            (1..=60).map(|i| (i * 7) % 61).collect(),
            (1..=60).map(|i| (i * 13) % 61).collect(),
            (1..=60u32).collect::<HashSet<_>>().into_iter().collect(),
        ];

        for sort_by in ["subject", "from"] {
            let mut previous = None;
            for order in &orders {
                let (fetched, records) = run_with_store_order(sort_by, order.clone()).await;
                assert_eq!(fetched, newest, "{sort_by}");

                let keys: Vec<String> = records
                    .iter()
                    .map(|r| match sort_by {
                        "subject" => r.subject.to_lowercase(),
                        _ => r.from.to_lowercase(),
                    })
                    .collect();
                assert_eq!(keys.len(), 20);
                assert!(keys.windows(2).all(|w| w[0] >= w[1]), "{sort_by}: {keys:?}");

                if let Some(previous) = previous.replace(records.clone()) {
                    assert_eq!(previous, records, "{sort_by}");
                }
            }
        }
    }

    #[tokio::test]
    async fn filters_reach_the_store() {
        let mut store = FakeStore::default();
        let criteria = FilterCriteria::from_request(None, Some("invoice"), Some("billing"));
        let out = consolidate(&mut store, "INBOX", &criteria, &options(20))
            .await
            .expect("pipeline runs");

        assert!(out.records.is_empty());
        assert!(store.fetched.is_empty());
        assert_eq!(
            store.predicates,
            vec!["SUBJECT \"invoice\" FROM \"billing\"".to_owned()]
        );
    }

    #[tokio::test]
    async fn vanished_messages_are_skipped() {
        let mut store = FakeStore::with_messages(vec![1, 2, 3], &[(1, "m1", "a"), (3, "m3", "a")]);
        let out = consolidate(&mut store, "INBOX", &FilterCriteria::default(), &options(20))
            .await
            .expect("pipeline runs");
        assert_eq!(out.total_matched, 3);
        assert_eq!(subjects(&out.records), vec!["m3", "m1"]);
    }

    #[tokio::test]
    async fn store_failure_aborts_the_run() {
        let mut store = FakeStore::with_messages(vec![1, 2], &[(1, "m1", "a"), (2, "m2", "a")]);
        store.broken_uid = Some(1);
        let err = consolidate(&mut store, "INBOX", &FilterCriteria::default(), &options(20))
            .await
            .expect_err("store failure propagates");
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
