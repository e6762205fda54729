//! Property tests over generated rule trees


use proptest::prelude::*;

use crate::ast::{Choice, ConditionChain, FilterChain, FilterEntry, When};

const FILTERS: &[&str] = &["Clear", "JoinArray", "SplitString", "Target", "SetValue"];
const COMPARATORS: &[&str] = &["Equals", "Like", "RegEx", "StringLength"];

pub(crate) fn condition_strategy() -> impl Strategy<Value = ConditionChain> {
    let leaf = (prop::sample::select(COMPARATORS), "[a-z]{0,3}")
        .prop_map(|(name, p)| ConditionChain::condition(name, &[p.as_str()]));
    leaf.prop_recursive(3, 8, 2, |inner| {
        (inner.clone(), inner, any::<bool>()).prop_map(|(l, r, and)| {
            if and {
                ConditionChain::and(l, r)
            } else {
                ConditionChain::or(l, r)
            }
        })
    })
}

pub(crate) fn chain_strategy() -> impl Strategy<Value = FilterChain> {
    let leaf = prop::collection::vec(
        (prop::sample::select(FILTERS), "[a-z]{0,3}")
            .prop_map(|(name, p)| FilterEntry::filter(name, &[p.as_str()])),
        0..4,
    )
    .prop_map(FilterChain::new);
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(
            prop_oneof![
                (prop::sample::select(FILTERS)).prop_map(|name| FilterEntry::filter(name, &[])),
                prop::collection::vec(
                    (condition_strategy(), inner.clone(), prop::option::of(inner.clone()))
                        .prop_map(|(condition, then, otherwise)| When { condition, then, otherwise }),
                    1..3,
                )
                .prop_map(|whens| FilterEntry::Choice(Choice(whens))),
            ],
            0..4,
        )
        .prop_map(FilterChain::new)
    })
}
