//! Proptest generators for property-based testing.

use proptest::prelude::*;

use trove_core::{GameConfig, ItemId, ObtainType, UserId};

/// Generate a user id.
pub fn user_id() -> impl Strategy<Value = UserId> {
    "[a-z0-9]{1,16}".prop_map(UserId::new)
}

/// Generate `count` distinct user ids.
pub fn distinct_users(count: usize) -> impl Strategy<Value = Vec<UserId>> {
    prop::collection::hash_set("[a-z0-9]{1,16}", count)
        .prop_map(|ids| ids.into_iter().map(UserId::new).collect())
}

/// Generate an item id: mostly items from `config`, sometimes an unknown one.
pub fn item_id(config: &GameConfig) -> impl Strategy<Value = ItemId> {
    let mut known: Vec<ItemId> = config
        .rarities
        .values()
        .flat_map(|rarity| rarity.items.iter().cloned())
        .collect();
    known.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    prop_oneof![
        9 => prop::sample::select(known),
        1 => "unknown-[a-z]{1,6}".prop_map(ItemId::new),
    ]
}

/// Generate a batch of up to `max_len` items.
pub fn item_batch(config: &GameConfig, max_len: usize) -> impl Strategy<Value = Vec<ItemId>> {
    prop::collection::vec(item_id(config), 0..=max_len)
}

/// Generate an ObtainType.
pub fn obtain_type() -> impl Strategy<Value = ObtainType> {
    prop_oneof![
        Just(ObtainType::Daily),
        Just(ObtainType::Gift),
        Just(ObtainType::Market),
        Just(ObtainType::Other),
    ]
}

/// Generate an active-boost count.
pub fn boost_count() -> impl Strategy<Value = u32> {
    0u32..200
}

/// Generate a base multiplier.
pub fn base_multiplier() -> impl Strategy<Value = u64> {
    0u64..100_000
}
