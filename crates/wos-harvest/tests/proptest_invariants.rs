//! Property-based tests for the normalizer and the backoff schedule.

use std::time::Duration;

use proptest::prelude::*;

use wos_harvest::config::RetryPolicy;
use wos_harvest::models::{AuthorName, Names, Organization, PublicationRecord, SearchQuery, YearRange};
use wos_harvest::normalize::{dedupe_rows, normalize};
use wos_harvest::stats::summarize;

fn arb_author() -> impl Strategy<Value = AuthorName> {
    ("[A-Z][a-z]{1,8}", proptest::option::of("[A-Z][a-z]{1,8}, [A-Z]")).prop_map(
        |(display_name, wos_standard)| AuthorName {
            display_name: Some(display_name),
            wos_standard,
            researcher_id: None,
        },
    )
}

fn arb_record() -> impl Strategy<Value = PublicationRecord> {
    ("WOS:[0-9]{6}", proptest::collection::vec(arb_author(), 0..6), any::<bool>()).prop_map(
        |(uid, authors, has_names)| PublicationRecord {
            uid,
            names: has_names.then_some(Names { authors }),
            ..Default::default()
        },
    )
}

proptest! {
    #[test]
    fn rows_per_record_is_max_of_authors_and_one(records in proptest::collection::vec(arb_record(), 0..30)) {
        let rows = normalize(&records, "Org");
        let expected: usize = records.iter().map(|r| r.authors().len().max(1)).sum();
        prop_assert_eq!(rows.len(), expected);
        prop_assert!(rows.iter().all(|r| r.organization == "Org"));
    }

    #[test]
    fn rows_share_their_record_uid(record in arb_record()) {
        let rows = normalize(std::slice::from_ref(&record), "Org");
        prop_assert!(rows.iter().all(|r| r.uid == record.uid));
        prop_assert_eq!(rows.iter().all(|r| r.is_authorless()), record.authors().is_empty());
    }

    #[test]
    fn dedupe_never_loses_publications(records in proptest::collection::vec(arb_record(), 0..30)) {
        let rows = normalize(&records, "Org");
        let before = summarize(&rows, 0).total_publications;
        let deduped = dedupe_rows(rows.clone());
        prop_assert!(deduped.len() <= rows.len());
        prop_assert_eq!(summarize(&deduped, 0).total_publications, before);
    }

    #[test]
    fn backoff_is_monotonic_and_capped(
        base_ms in 1u64..5_000,
        cap_ms in 1u64..200_000,
        attempt in 0u32..30,
    ) {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(cap_ms),
            max_attempts: 32,
        };
        let cap = policy.max_delay.max(policy.base_delay);
        let current = policy.delay_for(attempt).unwrap();
        let next = policy.delay_for(attempt + 1).unwrap();
        prop_assert!(current <= next);
        prop_assert!(next <= cap);
        if attempt < 16 {
            let uncapped = Duration::from_millis(base_ms) * (1u32 << attempt);
            prop_assert_eq!(current, uncapped.min(cap));
        }
    }

    #[test]
    fn backoff_allows_one_wait_fewer_than_attempts(max_attempts in 1u32..12) {
        let policy = RetryPolicy { max_attempts, ..RetryPolicy::default() };
        prop_assert!(policy.delay_for(max_attempts - 1).is_none());
        if max_attempts > 1 {
            prop_assert!(policy.delay_for(max_attempts - 2).is_some());
        }
    }

    #[test]
    fn page_count_covers_total(total in 0u64..1_000_000, page_size in 1u32..200) {
        let query = SearchQuery::new(Organization::named("Org"), YearRange::new(1900, 2030), page_size);
        let pages = u64::from(query.page_count(total, page_size));
        prop_assert!(pages >= 1);
        prop_assert!(pages * u64::from(page_size) >= total);
        prop_assert!(total == 0 || (pages - 1) * u64::from(page_size) < total);
    }
}

#[test]
fn default_backoff_schedule() {
    let policy = RetryPolicy { max_attempts: 10, ..RetryPolicy::default() };
    let delays: Vec<u64> = (0..9).map(|n| policy.delay_for(n).unwrap().as_secs()).collect();
    assert_eq!(delays, [1, 2, 4, 8, 16, 32, 64, 120, 120]);
}
