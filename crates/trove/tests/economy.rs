//! End-to-end behavior of the economy over both store backends.

use std::sync::Arc;

use proptest::prelude::*;
use trove::core::streak::ONE_DAY_MS;
use trove::core::{compute_multiplier, PowerupGrant};
use trove::store::{MemoryStore, SqliteStore, Store, StoreExt};
use trove::{ClaimOutcome, Economy, EconomyError, Grant, ItemId, ObtainType, UserId};
use trove_testkit::fixtures::{
    sample_config, seeded_memory_store, seeded_sqlite_store, FixedClock, FlakyStore, BONUS_ITEM,
    COMMON_ITEM, MIDNIGHT, OTHER_COMMON_ITEM, RARE_ITEM,
};
use trove_testkit::generators::{
    base_multiplier, boost_count, distinct_users, item_batch, obtain_type, user_id,
};

const HOUR: i64 = 60 * 60 * 1000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn economy_on<S: Store>(store: S, now: i64) -> (Economy<S>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(now));
    let economy = Economy::with_clock(store, sample_config(), clock.clone())
        .expect("sample config is valid");
    (economy, clock)
}

fn grants_of(outcome: ClaimOutcome) -> Vec<Grant> {
    match outcome {
        ClaimOutcome::Claimed { grants, .. } => grants,
        other => panic!("expected a claim, got {other:?}"),
    }
}

async fn first_claim_of_rare_item<S: Store>(economy: &Economy<S>) -> anyhow::Result<()> {
    let user = UserId::new("newcomer");
    let handle = economy.session(&user).await?;

    assert!(economy.can_claim_daily(&handle).await?);
    let grants = grants_of(
        economy
            .claim_daily(&handle, &[ItemId::from(RARE_ITEM)])
            .await?,
    );

    assert_eq!(grants.len(), 2);
    assert_eq!(grants[0].item_id.as_str(), RARE_ITEM);
    assert_eq!((grants[0].edition, grants[0].bucks), (1, 20));
    assert_eq!(grants[1].item_id.as_str(), BONUS_ITEM);
    assert_eq!(grants[1].bucks, 0);
    assert!(grants[1].bonus);

    assert_eq!(economy.powerup_amount(&handle, "miracle").await?, 5);
    assert_eq!(economy.powerup_amount(&handle, "gift").await?, 1);

    let profile = economy.profile(&handle).await?;
    assert_eq!(profile.streak, 1);
    assert_eq!(profile.total_bucks, 20);
    assert!(profile.first_bonus_granted);
    Ok(())
}

#[tokio::test]
async fn test_first_claim_end_to_end_memory() -> anyhow::Result<()> {
    init_tracing();
    let store = seeded_memory_store(&sample_config()).await?;
    let (economy, _) = economy_on(store, MIDNIGHT + HOUR);
    first_claim_of_rare_item(&economy).await
}

#[tokio::test]
async fn test_first_claim_end_to_end_sqlite() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store = seeded_sqlite_store(dir.path().join("trove.db"), &sample_config()).await?;
    let (economy, _) = economy_on(store, MIDNIGHT + HOUR);
    first_claim_of_rare_item(&economy).await
}

#[tokio::test]
async fn test_first_claim_bonus_once_across_sessions() -> anyhow::Result<()> {
    let store = seeded_memory_store(&sample_config()).await?;
    let (economy, clock) = economy_on(store, MIDNIGHT + HOUR);
    let user = UserId::new("returning");

    for day in 0..3 {
        clock.set(MIDNIGHT + day * ONE_DAY_MS + HOUR);
        let handle = economy.session(&user).await?;
        assert!(economy.can_claim_daily(&handle).await?);
        economy
            .claim_daily(&handle, &[ItemId::from(COMMON_ITEM)])
            .await?;
        drop(handle);
        assert!(!economy.cache().contains(&user));
    }

    let balance = economy.store().powerup_balance(&user, "miracle").await?;
    assert_eq!(balance.amount, 5);
    assert_eq!(economy.store().require_user(&user).await?.streak, 3);
    Ok(())
}

#[tokio::test]
async fn test_bonus_survives_failed_claim_retry() -> anyhow::Result<()> {
    let config = sample_config();
    let store = FlakyStore::new(seeded_memory_store(&config).await?, 1);
    let (economy, _) = economy_on(store, MIDNIGHT + HOUR);
    let handle = economy.session(&UserId::new("unlucky")).await?;

    let items = [ItemId::from(COMMON_ITEM), ItemId::from(OTHER_COMMON_ITEM)];
    let err = economy.claim_daily(&handle, &items).await.unwrap_err();
    match err {
        EconomyError::PartialGrant { applied, .. } => {
            assert_eq!(applied.len(), 1);
            assert_eq!(applied[0].item_id.as_str(), COMMON_ITEM);
        }
        other => panic!("expected partial grant, got {other:?}"),
    }

    // The claim was not recorded, so the user may try again; the bonus
    // powerups were already handed out and are not granted twice.
    assert!(economy.can_claim_daily(&handle).await?);
    assert!(economy.claim_daily(&handle, &[]).await.is_ok());
    assert_eq!(economy.powerup_amount(&handle, "miracle").await?, 5);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_state_survives_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trove.db");
    let user = UserId::new("persistent");

    {
        let store = seeded_sqlite_store(&path, &sample_config()).await?;
        let (economy, _) = economy_on(store, MIDNIGHT + HOUR);
        let handle = economy.session(&user).await?;
        economy
            .claim_daily(&handle, &[ItemId::from(RARE_ITEM)])
            .await?;
        economy.activate_boost(&handle, 2).await?;
        economy.set_notifications(&handle, Some("dm")).await?;
    }

    let store = SqliteStore::open(&path)?;
    let (economy, _) = economy_on(store, MIDNIGHT + 2 * HOUR);
    let handle = economy.session(&user).await?;

    assert!(!economy.can_claim_daily(&handle).await?);
    let profile = economy.profile(&handle).await?;
    assert_eq!(profile.active_boosts, 2);
    assert_eq!(profile.notification_target.as_deref(), Some("dm"));
    assert_eq!(economy.powerup_amount(&handle, "miracle").await?, 3);

    // Editions continue where the first process left off.
    let other = economy.session(&UserId::new("latecomer")).await?;
    let grants = economy
        .grant_items(&other, &[ItemId::from(RARE_ITEM)], ObtainType::Market)
        .await?;
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].edition, 2);
    Ok(())
}

#[tokio::test]
async fn test_already_claimed_reports_next_reset() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let (economy, clock) = economy_on(store, MIDNIGHT + HOUR);
    economy.sync_catalog().await?;
    let handle = economy.session(&UserId::new("eager")).await?;

    economy.claim_daily(&handle, &[]).await?;
    clock.set(MIDNIGHT + ONE_DAY_MS - 1);
    assert_eq!(
        economy.claim_daily(&handle, &[]).await?,
        ClaimOutcome::AlreadyClaimed {
            next_reset: MIDNIGHT + ONE_DAY_MS
        }
    );

    clock.set(MIDNIGHT + ONE_DAY_MS);
    assert!(economy.can_claim_daily(&handle).await?);
    Ok(())
}

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grants_follow_request_order(
        users in distinct_users(2),
        obtain in obtain_type(),
        first in item_batch(&sample_config(), 8),
        second in item_batch(&sample_config(), 8),
    ) {
        let config = sample_config();
        let (requested, grants, rows) = run(async {
            let store = seeded_memory_store(&config).await.unwrap();
            let (economy, _) = economy_on(store, MIDNIGHT);
            let a = economy.session(&users[0]).await.unwrap();
            let b = economy.session(&users[1]).await.unwrap();

            economy.grant_items(&a, &first, obtain).await.unwrap();
            let grants = economy.grant_items(&b, &second, obtain).await.unwrap();
            let rows = economy.collection(&b).await.unwrap();
            (second.clone(), grants, rows)
        });

        // Requested grants appear in order, unknown items dropped.
        let direct: Vec<&ItemId> = grants.iter().filter(|g| !g.bonus).map(|g| &g.item_id).collect();
        let known: Vec<&ItemId> = requested.iter().filter(|i| config.rarity_of(i).is_some()).collect();
        prop_assert_eq!(direct, known);

        // Every bonus directly follows the first edition of a special item.
        for (i, grant) in grants.iter().enumerate() {
            if grant.bonus {
                prop_assert!(i > 0);
                let trigger = &grants[i - 1];
                prop_assert!(!trigger.bonus);
                prop_assert_eq!(trigger.edition, 1);
                prop_assert!(config.grants_bonus_on_first_edition(&trigger.item_id));
                prop_assert_eq!(grant.item_id.as_str(), BONUS_ITEM);
                prop_assert_eq!(grant.bucks, 0);
            }
        }

        // Stored rows mirror the grants; bonus rows are always `Other`.
        prop_assert_eq!(rows.len(), grants.len());
        for (row, grant) in rows.iter().zip(&grants) {
            prop_assert_eq!(&row.item_id, &grant.item_id);
            prop_assert_eq!(row.edition, grant.edition);
            prop_assert_eq!(row.bucks_granted, grant.bucks);
            let expected = if grant.bonus { ObtainType::Other } else { obtain };
            prop_assert_eq!(row.obtain_type, expected);
        }
    }

    #[test]
    fn claim_multiplier_spends_active_boosts(
        user in user_id(),
        base in base_multiplier(),
        boosts in boost_count(),
    ) {
        let mut config = sample_config();
        config.starting_multiplier = base;
        let cap = config.boost_increment_max;

        let (multiplier, record) = run(async {
            let store = seeded_memory_store(&config).await.unwrap();
            let clock = Arc::new(FixedClock::new(MIDNIGHT + HOUR));
            let economy = Economy::with_clock(store, config, clock).unwrap();
            let handle = economy.session(&user).await.unwrap();

            economy
                .store()
                .grant_powerups(&user, &[PowerupGrant::new("miracle", i64::from(boosts))])
                .await
                .unwrap();
            economy.activate_boost(&handle, boosts).await.unwrap();

            let multiplier = match economy.claim_daily(&handle, &[]).await.unwrap() {
                ClaimOutcome::Claimed { multiplier, .. } => multiplier,
                other => panic!("expected a claim, got {other:?}"),
            };
            (multiplier, economy.profile(&handle).await.unwrap())
        });

        prop_assert_eq!(multiplier, compute_multiplier(base, boosts, cap));
        prop_assert_eq!(record.base_multiplier, base);
        prop_assert_eq!(record.active_boosts, 0);
    }
}
