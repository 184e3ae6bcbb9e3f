//! # Trove Testkit
//!
//! Testing utilities for Trove.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a sample game configuration, pre-seeded stores and a
//!   settable clock
//! - **Fault injection**: [`FlakyStore`], a store wrapper that starts failing
//!   collection inserts after a set number of successes
//! - **Generators**: Proptest strategies for users, item batches and boosts
//!
//! ## Test Fixtures
//!
//! ```rust
//! use trove_core::Clock;
//! use trove_testkit::fixtures::{sample_config, FixedClock, RARE_ITEM};
//!
//! let config = sample_config();
//! assert!(config.grants_bonus_on_first_edition(&RARE_ITEM.into()));
//!
//! let clock = FixedClock::new(1_000);
//! clock.advance(500);
//! assert_eq!(clock.now_millis(), 1_500);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use trove_testkit::{fixtures::sample_config, generators::item_batch};
//!
//! proptest! {
//!     #[test]
//!     fn grants_never_exceed_twice_the_batch(items in item_batch(&sample_config(), 8)) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{sample_config, FixedClock, FlakyStore};
