//! Property-based tests for the Frontier's priority arithmetic and the
//! rate limiter's spacing guarantee, grounded on this codebase's existing
//! `proptest!` usage in its own error/state property suites.

use std::time::Duration;

use proptest::prelude::*;
use riptide_crawl::{compute_priority, is_crawlable_link, query_param_count, Frontier, PopOutcome};

proptest! {
    /// `compute_priority`'s result is always clamped to `[1, 100]`
    /// regardless of how extreme its inputs are.
    #[test]
    fn priority_is_always_in_bounds(
        depth in 0u32..1000,
        domain_importance in -1000i32..1000,
        query_param_count in 0i32..1000,
        path_segment_count in 0i32..1000,
        source_page_importance in -1000i32..1000,
    ) {
        let p = compute_priority(
            depth,
            domain_importance,
            query_param_count,
            path_segment_count,
            source_page_importance,
        );
        prop_assert!(p >= 1 && p <= 100);
    }

    /// A deeper link is never assigned a strictly lower priority number
    /// than a shallower one when every other input is held fixed — shallow
    /// pages must not be overtaken by arbitrarily deep ones.
    #[test]
    fn deeper_links_are_not_prioritized_over_shallower_ones(
        shallow_depth in 0u32..50,
        extra_depth in 1u32..50,
        domain_importance in -20i32..20,
        query_param_count in 0i32..10,
        path_segment_count in 0i32..10,
    ) {
        let deep_depth = shallow_depth + extra_depth;
        let shallow_priority = compute_priority(
            shallow_depth,
            domain_importance,
            query_param_count,
            path_segment_count,
            5,
        );
        let deep_priority = compute_priority(
            deep_depth,
            domain_importance,
            query_param_count,
            path_segment_count,
            5,
        );
        // Both may saturate at the clamp boundary, so this is `<=` rather
        // than strict `<`.
        prop_assert!(shallow_priority <= deep_priority);
    }

    /// `query_param_count` always equals the number of non-empty
    /// `&`-separated segments after the first `?`.
    #[test]
    fn query_param_count_matches_ampersand_segments(n in 0usize..20) {
        let query = (0..n).map(|i| format!("p{i}=1")).collect::<Vec<_>>().join("&");
        let url = format!("http://h/a?{query}");
        let expected = if n == 0 { 0 } else { n as i32 };
        prop_assert_eq!(query_param_count(&url), expected);
    }

    /// A URL whose path ends in an excluded extension is never crawlable,
    /// no matter what query string or fragment follows it.
    #[test]
    fn excluded_extensions_are_never_crawlable(
        stem in "[a-z]{1,10}",
        ext in proptest::sample::select(vec![".pdf", ".jpg", ".png", ".zip", ".exe", ".docx"]),
        suffix in "[?#]?[a-z0-9=&]{0,10}",
    ) {
        let url = format!("http://h/{stem}{ext}{suffix}");
        prop_assert!(!is_crawlable_link(&url));
    }
}

/// Property 6 (priority monotonicity) and the no-double-dispatch guarantee,
/// exercised against the real async `Frontier` rather than the pure
/// priority function.
#[tokio::test]
async fn successive_pops_are_never_returned_out_of_priority_order() {
    let frontier = Frontier::new();
    let priorities = [42, 5, 17, 3, 99, 1, 64];
    for (i, p) in priorities.iter().enumerate() {
        frontier
            .push(riptide_types::FrontierEntry::new(*p, format!("http://h/{i}"), 0))
            .await;
    }

    let mut seen = Vec::new();
    loop {
        match frontier.pop(Duration::from_millis(10)).await {
            PopOutcome::Entry(entry) => seen.push(entry.priority),
            PopOutcome::Timeout => break,
        }
    }

    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted, "pops must be non-decreasing in priority");
}

/// Property 1: a URL popped once is never handed out a second time unless
/// explicitly re-pushed.
#[tokio::test]
async fn a_pushed_url_is_popped_at_most_once() {
    let frontier = Frontier::new();
    frontier
        .push(riptide_types::FrontierEntry::new(1, "http://h/a", 0))
        .await;

    let first = frontier.pop(Duration::from_millis(10)).await;
    assert!(matches!(first, PopOutcome::Entry(_)));

    let second = frontier.pop(Duration::from_millis(10)).await;
    assert!(matches!(second, PopOutcome::Timeout));
}
