//! Proptest strategies for batch and retry properties.

use proptest::prelude::*;
use proptest::sample::subsequence;
use reqflow_core::models::RequestId;
use std::collections::BTreeSet;

/// Between 1 and 40 distinct positive request ids, in arbitrary order
pub fn request_ids_strategy() -> impl Strategy<Value = Vec<RequestId>> {
    prop::collection::btree_set(1i64..100_000, 1..40)
        .prop_map(|ids: BTreeSet<RequestId>| ids.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Request ids paired with the subset that should fail
pub fn ids_with_failures_strategy() -> impl Strategy<Value = (Vec<RequestId>, Vec<RequestId>)> {
    request_ids_strategy().prop_flat_map(|ids| {
        let len = ids.len();
        (Just(ids.clone()), subsequence(ids, 0..=len))
    })
}

pub fn max_concurrent_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}

/// (max_retries, initial_delay_ms, backoff_factor, max_delay_ms)
pub fn retry_settings_strategy() -> impl Strategy<Value = (u32, u64, f64, u64)> {
    (0u32..10, 1u64..5_000, 1.0f64..4.0).prop_flat_map(|(retries, initial, factor)| {
        (Just(retries), Just(initial), Just(factor), initial..120_000)
    })
}
