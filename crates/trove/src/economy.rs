//! The Economy: unified API for sessions, daily claims and rewards.
//!
//! The Economy brings together the store, the game configuration, the session
//! cache and the reward ledger. Callers obtain a [`SessionHandle`] through
//! [`Economy::session`] and pass it to every operation; each operation runs
//! under that user's session gate for its whole duration.

use std::sync::Arc;

use trove_core::{
    check_claim_eligibility, compute_multiplier, reconcile_streak, Clock, GameConfig, ItemId,
    ObtainType, SystemClock, UserId,
};
use trove_store::{CatalogItem, CollectedItem, Store, StoreExt, UserRecord};

use crate::cache::{SessionCache, SessionHandle};
use crate::error::{EconomyError, Result};
use crate::ledger::{Grant, RewardLedger};
use crate::session::SessionGuard;

/// Result of a daily claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim went through.
    Claimed {
        grants: Vec<Grant>,
        /// Streak after this claim.
        streak: u32,
        /// Multiplier in effect for this claim, including active boosts.
        multiplier: u64,
        /// This was the user's first claim ever.
        first_claim: bool,
    },
    /// The user already claimed in the current cycle.
    AlreadyClaimed {
        /// Next reset boundary (Unix ms).
        next_reset: i64,
    },
}

/// The main Economy struct.
pub struct Economy<S: Store> {
    ledger: RewardLedger<S>,
    cache: SessionCache,
    clock: Arc<dyn Clock>,
}

impl<S: Store> Economy<S> {
    /// Create an economy on the wall clock.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(store: S, config: GameConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create an economy with an explicit time source.
    pub fn with_clock(store: S, config: GameConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        if config.rarity_of(&config.first_item_id).is_none() {
            tracing::warn!(
                item = %config.first_item_id,
                "bonus item is not in any rarity tier, first editions will grant no bonus"
            );
        }
        Ok(Self {
            ledger: RewardLedger::new(Arc::new(store), Arc::new(config)),
            cache: SessionCache::new(),
            clock,
        })
    }

    pub fn store(&self) -> &S {
        self.ledger.store()
    }

    pub fn config(&self) -> &GameConfig {
        self.ledger.config()
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn ledger(&self) -> &RewardLedger<S> {
        &self.ledger
    }

    /// Load every configured item into the store's catalog.
    ///
    /// Returns the number of catalog entries written.
    pub async fn sync_catalog(&self) -> Result<usize> {
        let items = CatalogItem::from_config(self.config());
        self.store().upsert_catalog(&items).await?;
        tracing::info!(items = items.len(), "catalog synced");
        Ok(items.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Acquire the session for `user`.
    ///
    /// Creates the user's record if needed and resets a broken streak. The
    /// session stays live until the returned handle (and every clone of it)
    /// is dropped.
    pub async fn session(&self, user: &UserId) -> Result<SessionHandle> {
        let handle = self.cache.acquire(user);
        {
            let guard = self.enter(&handle).await?;
            self.reconcile(&guard).await?;
        }
        Ok(handle)
    }

    async fn enter<'a>(&self, handle: &'a SessionHandle) -> Result<SessionGuard<'a>> {
        let mut guard = handle.lock().await;
        self.ledger.ensure_record(&mut guard).await?;
        Ok(guard)
    }

    async fn reconcile(&self, guard: &SessionGuard<'_>) -> Result<()> {
        let user = guard.user_id();
        let record = self.store().require_user(user).await?;
        let boundary = self.config().last_reset(self.clock.now_millis());

        if record.streak > 0
            && reconcile_streak(record.last_claim_at, boundary, self.config().one_day_ms)
        {
            self.store().reset_streak(user).await?;
            tracing::info!(user = %user, streak = record.streak, "streak broken");
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Claims and Grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the user may claim in the current cycle.
    ///
    /// A user who never claimed is marked for the first-claim bonus, which the
    /// next grant hands out.
    pub async fn can_claim_daily(&self, handle: &SessionHandle) -> Result<bool> {
        let mut guard = self.enter(handle).await?;
        let record = self.store().require_user(guard.user_id()).await?;
        let boundary = self.config().last_reset(self.clock.now_millis());

        let eligibility = check_claim_eligibility(record.last_claim_at, boundary);
        if eligibility.eligible && eligibility.is_first_ever_claim {
            guard.set_first_claim_pending(true);
        }
        Ok(eligibility.eligible)
    }

    /// Run the daily claim: grant `items`, record the claim and spend the
    /// active boosts.
    ///
    /// The claim is recorded only after every grant went through, so a claim
    /// that fails part-way can be retried in the same cycle.
    pub async fn claim_daily(
        &self,
        handle: &SessionHandle,
        items: &[ItemId],
    ) -> Result<ClaimOutcome> {
        let mut guard = self.enter(handle).await?;
        let user = guard.user_id().clone();
        let now = self.clock.now_millis();
        let config = self.config();

        let record = self.store().require_user(&user).await?;
        let eligibility = check_claim_eligibility(record.last_claim_at, config.last_reset(now));
        if !eligibility.eligible {
            return Ok(ClaimOutcome::AlreadyClaimed {
                next_reset: config.reset.next_boundary(now),
            });
        }
        if eligibility.is_first_ever_claim {
            guard.set_first_claim_pending(true);
        }

        let multiplier = compute_multiplier(
            record.base_multiplier,
            record.active_boosts,
            config.boost_increment_max,
        );
        let grants = self
            .ledger
            .grant_items(&mut guard, items, ObtainType::Daily)
            .await?;
        // Spends the active boosts along with the claim.
        let streak = self.store().record_claim(&user, now).await?;

        tracing::info!(
            user = %user,
            streak,
            multiplier,
            grants = grants.len(),
            "daily claimed"
        );
        Ok(ClaimOutcome::Claimed {
            grants,
            streak,
            multiplier,
            first_claim: eligibility.is_first_ever_claim,
        })
    }

    /// Grant items outside the daily claim (gifts, market purchases).
    pub async fn grant_items(
        &self,
        handle: &SessionHandle,
        items: &[ItemId],
        obtain: ObtainType,
    ) -> Result<Vec<Grant>> {
        let mut guard = self.enter(handle).await?;
        self.ledger.grant_items(&mut guard, items, obtain).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Boosts and Powerups
    // ─────────────────────────────────────────────────────────────────────────

    /// The multiplier the user would claim with after activating `extra`
    /// more boosts.
    pub async fn multiplier(&self, handle: &SessionHandle, extra: u32) -> Result<u64> {
        let guard = self.enter(handle).await?;
        let record = self.store().require_user(guard.user_id()).await?;
        Ok(compute_multiplier(
            record.base_multiplier,
            record.active_boosts.saturating_add(extra),
            self.config().boost_increment_max,
        ))
    }

    /// Spend `amount` boost powerups and add them to the active boosts.
    pub async fn activate_boost(&self, handle: &SessionHandle, amount: u32) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let guard = self.enter(handle).await?;
        let user = guard.user_id();
        let powerup = &self.config().boost_powerup_id;
        let requested = i64::from(amount);

        self.ensure_available(user, powerup, requested).await?;
        self.store().activate_boost(user, powerup, requested).await?;
        tracing::debug!(user = %user, amount, "boost activated");
        Ok(())
    }

    /// Consume `amount` units of a powerup.
    pub async fn use_powerup(
        &self,
        handle: &SessionHandle,
        powerup: &str,
        amount: u32,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let guard = self.enter(handle).await?;
        let user = guard.user_id();
        let requested = i64::from(amount);

        self.ensure_available(user, powerup, requested).await?;
        self.store().use_powerup(user, powerup, requested).await?;
        Ok(())
    }

    /// Drop all active boosts. Returns how many there were.
    pub async fn consume_active_boosts(&self, handle: &SessionHandle) -> Result<u32> {
        let guard = self.enter(handle).await?;
        let user = guard.user_id();
        let active = self.store().require_user(user).await?.active_boosts;
        self.store().clear_active_boosts(user).await?;
        Ok(active)
    }

    pub async fn powerup_amount(&self, handle: &SessionHandle, powerup: &str) -> Result<i64> {
        let guard = self.enter(handle).await?;
        let balance = self.store().powerup_balance(guard.user_id(), powerup).await?;
        Ok(balance.amount)
    }

    async fn ensure_available(&self, user: &UserId, powerup: &str, requested: i64) -> Result<()> {
        let available = self.store().powerup_balance(user, powerup).await?.amount;
        if available < requested {
            return Err(EconomyError::InsufficientPowerups {
                powerup: powerup.to_string(),
                available,
                requested,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Profile
    // ─────────────────────────────────────────────────────────────────────────

    /// Enable notifications to `target`, or disable them with `None`.
    pub async fn set_notifications(
        &self,
        handle: &SessionHandle,
        target: Option<&str>,
    ) -> Result<()> {
        let guard = self.enter(handle).await?;
        self.store().set_notifications(guard.user_id(), target).await?;
        Ok(())
    }

    pub async fn notifications_enabled(&self, handle: &SessionHandle) -> Result<bool> {
        Ok(self.profile(handle).await?.notifications_enabled)
    }

    /// The user's persistent record.
    pub async fn profile(&self, handle: &SessionHandle) -> Result<UserRecord> {
        let guard = self.enter(handle).await?;
        Ok(self.store().require_user(guard.user_id()).await?)
    }

    /// Every item the user has collected, oldest first.
    pub async fn collection(&self, handle: &SessionHandle) -> Result<Vec<CollectedItem>> {
        let guard = self.enter(handle).await?;
        Ok(self.store().collected(guard.user_id()).await?)
    }
}
