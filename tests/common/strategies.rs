#![allow(dead_code)]

use fleet_core::models::State;
use proptest::prelude::*;
use proptest::sample::select;
use std::collections::BTreeSet;

/// Any known state code
pub fn state_strategy() -> impl Strategy<Value = State> {
    select(State::all().to_vec())
}

/// Remote site names: never the local site, never containing '.'
pub fn remote_site_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}".prop_filter("not the local site", |s| s != "hq")
}

/// 1..=6 distinct remote sites
pub fn remote_sites_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(remote_site_strategy(), 1..=6)
}

/// Output keys a provider might produce (no reserved prefix)
pub fn output_key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}
