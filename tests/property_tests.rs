use chrono::{Duration, TimeZone, Utc};
use elsevier_client::cache::{age_in_days, RefreshPolicy};
use elsevier_client::{Endpoint, SearchRequest};
use proptest::prelude::*;

mod staleness_props {
    use super::*;

    proptest! {
        #[test]
        fn always_refreshes_regardless_of_age(age in 0u64..100_000) {
            prop_assert!(RefreshPolicy::Always.requires_refresh(age));
        }

        #[test]
        fn never_keeps_any_existing_file(age in 0u64..100_000) {
            prop_assert!(!RefreshPolicy::Never.requires_refresh(age));
        }

        #[test]
        fn day_policy_matches_strict_comparison(age in 0u64..10_000, max in 0u32..10_000) {
            let policy = RefreshPolicy::MaxAgeDays(max);
            prop_assert_eq!(policy.requires_refresh(age), age > u64::from(max));
        }

        #[test]
        fn age_is_elapsed_seconds_rounded_up_to_days(secs in 0i64..(86_400 * 30)) {
            let mtime = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
            let now = mtime + Duration::seconds(secs);
            let expected = (secs as u64 + 86_399) / 86_400;
            prop_assert_eq!(age_in_days(now, mtime), expected);
        }
    }
}

mod cache_key_props {
    use super::*;

    fn request_with(params: Vec<(String, String)>) -> SearchRequest {
        let mut request = SearchRequest::new(Endpoint::ScopusSearch, "TITLE(example)");
        request.params = params;
        request
    }

    proptest! {
        #[test]
        fn canonical_query_ignores_parameter_order(
            params in proptest::collection::vec(("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,12}"), 0..6)
        ) {
            let forward = request_with(params.clone());
            let mut reversed_params = params;
            reversed_params.reverse();
            let reversed = request_with(reversed_params);

            prop_assert_eq!(forward.canonical_query(), reversed.canonical_query());
        }

        #[test]
        fn canonical_query_distinguishes_queries(q1 in "[a-z]{1,12}", q2 in "[a-z]{1,12}") {
            let a = SearchRequest::new(Endpoint::ScopusSearch, q1.clone());
            let b = SearchRequest::new(Endpoint::ScopusSearch, q2.clone());
            if q1 == q2 {
                prop_assert_eq!(a.canonical_query(), b.canonical_query());
            } else {
                prop_assert_ne!(a.canonical_query(), b.canonical_query());
            }
        }
    }
}
