//! Item grants: editions, chained bonus items and the first-claim bonus.
//!
//! Grants are processed from an explicit work-list. A candidate whose
//! insert comes back as edition 1 of a "gives special" item pushes the bonus
//! item to the front of the list, so the bonus lands right after the item
//! that earned it. Bonus entries carry their depth and never enqueue
//! anything themselves, which bounds the chain at one level regardless of
//! configuration. Bonus items are worth no bucks.

use std::collections::VecDeque;
use std::sync::Arc;

use trove_core::{GameConfig, ItemId, ObtainType, UserId};
use trove_store::{InsertedItem, Store, StoreError};

use crate::error::{EconomyError, Result};
use crate::session::SessionGuard;

/// Bonus grants may be triggered by directly granted items only.
pub const MAX_BONUS_DEPTH: usize = 1;

/// One item a user received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub item_id: ItemId,
    pub edition: u64,
    pub bucks: i64,
    /// Granted as the bonus for a first edition rather than requested.
    pub bonus: bool,
}

struct Pending {
    item: ItemId,
    obtain: ObtainType,
    depth: usize,
}

/// Applies grants for one user at a time, under that user's session gate.
pub struct RewardLedger<S: Store> {
    store: Arc<S>,
    config: Arc<GameConfig>,
}

impl<S: Store> RewardLedger<S> {
    pub fn new(store: Arc<S>, config: Arc<GameConfig>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Make sure the user's persistent record exists.
    ///
    /// Hits the store once per session; later calls are free.
    pub async fn ensure_record(&self, guard: &mut SessionGuard<'_>) -> Result<()> {
        if guard.record_ensured() {
            return Ok(());
        }

        let created = self
            .store
            .ensure_user(guard.user_id(), None, self.config.starting_multiplier)
            .await?;
        if created {
            tracing::debug!(user = %guard.user_id(), "user record created");
        }

        guard.mark_record_ensured();
        Ok(())
    }

    /// Grant `items` to the session's user.
    ///
    /// Returns the grants in order, with bonus items directly after the item
    /// that triggered them. Items unknown to the configuration or rejected by
    /// the store are left out. A store error stops the batch; if some grants
    /// were already written it is reported as
    /// [`EconomyError::PartialGrant`].
    pub async fn grant_items(
        &self,
        guard: &mut SessionGuard<'_>,
        items: &[ItemId],
        obtain: ObtainType,
    ) -> Result<Vec<Grant>> {
        self.ensure_record(guard).await?;

        if guard.first_claim_pending() {
            self.give_first_claim_bonus(guard.user_id()).await?;
            guard.set_first_claim_pending(false);
        }

        let user = guard.user_id();
        let mut queue: VecDeque<Pending> = items
            .iter()
            .map(|item| Pending {
                item: item.clone(),
                obtain,
                depth: 0,
            })
            .collect();
        let mut grants = Vec::with_capacity(items.len());

        while let Some(next) = queue.pop_front() {
            let inserted = match self.insert(user, &next).await {
                Ok(Some(inserted)) => inserted,
                Ok(None) => continue,
                Err(source) if grants.is_empty() => return Err(source.into()),
                Err(source) => {
                    tracing::warn!(
                        user = %user,
                        applied = grants.len(),
                        error = %source,
                        "grant batch aborted"
                    );
                    return Err(EconomyError::PartialGrant {
                        applied: grants,
                        source,
                    });
                }
            };

            if inserted.edition == 1
                && next.depth < MAX_BONUS_DEPTH
                && self.config.grants_bonus_on_first_edition(&next.item)
            {
                tracing::info!(user = %user, item = %next.item, "first edition, granting bonus item");
                queue.push_front(Pending {
                    item: self.config.first_item_id.clone(),
                    obtain: ObtainType::Other,
                    depth: next.depth + 1,
                });
            }

            let bonus = next.depth > 0;
            grants.push(Grant {
                item_id: next.item,
                edition: inserted.edition,
                bucks: if bonus { 0 } else { inserted.bucks },
                bonus,
            });
        }

        Ok(grants)
    }

    async fn insert(
        &self,
        user: &UserId,
        pending: &Pending,
    ) -> std::result::Result<Option<InsertedItem>, StoreError> {
        if self.config.rarity_of(&pending.item).is_none() {
            tracing::warn!(user = %user, item = %pending.item, "skipping unknown item");
            return Ok(None);
        }

        let inserted = if pending.depth > 0 {
            self.store.insert_bonus_item(user, &pending.item).await?
        } else {
            self.store
                .insert_collected(user, &pending.item, pending.obtain)
                .await?
        };
        if inserted.is_none() {
            tracing::warn!(user = %user, item = %pending.item, "store rejected item");
        }
        Ok(inserted)
    }

    async fn give_first_claim_bonus(&self, user: &UserId) -> Result<()> {
        let granted = self
            .store
            .grant_first_claim_bonus(user, &self.config.first_claim_bonus)
            .await?;

        if granted {
            tracing::info!(user = %user, "first claim bonus granted");
        } else {
            tracing::debug!(user = %user, "first claim bonus already granted");
        }
        Ok(())
    }
}
