//! Two-tier priority gate guarding one resource

use sempool_config::HighFallback;
use sempool_errors::Error;
use sempool_types::{Priority, Tier, TierPermits};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::semaphore::{acquire_semaphore_permit, create_semaphore, try_acquire_semaphore_permit};

/// Tier (or tiers) a dispatch will wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierChoice {
    Only(Tier),
    /// Whichever tier frees a permit first
    Either,
}

/// Permit held for the duration of one dispatch
///
/// Dropping the permit returns it to the tier it came from.
#[derive(Debug)]
pub struct GatePermit {
    tier: Tier,
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Tier that supplied the permit
    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Hand the permit back
    pub fn release(self) {
        drop(self);
    }
}

/// The pair of tiered semaphores associated with one resource
///
/// The gate is not reentrant: a task that already holds a permit and
/// acquires again may wait forever.
#[derive(Debug)]
pub struct PriorityGate {
    name: String,
    capacity: usize,
    permits: TierPermits,
    low: Arc<Semaphore>,
    high: Arc<Semaphore>,
}

impl PriorityGate {
    pub(crate) fn new(name: impl Into<String>, capacity: usize, permits: TierPermits) -> Self {
        Self {
            name: name.into(),
            capacity,
            permits,
            low: create_semaphore(permits.low),
            high: create_semaphore(permits.high),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured capacity the tiers were derived from
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn permits(&self) -> TierPermits {
        self.permits
    }

    /// Permits currently free in a tier
    #[must_use]
    pub fn available(&self, tier: Tier) -> usize {
        self.semaphore(tier).available_permits()
    }

    /// Permits currently held in a tier
    #[must_use]
    pub fn in_flight_in(&self, tier: Tier) -> usize {
        self.permits.get(tier).saturating_sub(self.available(tier))
    }

    /// Permits currently held across both tiers
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight_in(Tier::Low) + self.in_flight_in(Tier::High)
    }

    /// Take a permit without waiting.
    ///
    /// Low priority tries the low tier only. High priority tries the low tier
    /// and then the reserve. Each attempt is a single atomic try-acquire, so a
    /// tier that was seen free is never waited on. On success the free count
    /// of the supplying tier just before the permit was taken is returned with
    /// the permit.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Closed` if the gate has been closed.
    pub fn try_acquire(&self, priority: Priority) -> Result<Option<(GatePermit, usize)>, Error> {
        let tiers: &[Tier] = match priority {
            Priority::Low => &[Tier::Low],
            Priority::High => &[Tier::Low, Tier::High],
        };
        for &tier in tiers {
            let semaphore = self.semaphore(tier);
            let free = semaphore.available_permits();
            if let Some(permit) = try_acquire_semaphore_permit(semaphore, &self.name)? {
                return Ok(Some((
                    GatePermit {
                        tier,
                        _permit: permit,
                    },
                    free,
                )));
            }
        }
        Ok(None)
    }

    /// Tier(s) a request waits on once [`try_acquire`](Self::try_acquire)
    /// found no free permit.
    ///
    /// Low priority always waits on the low tier; high priority follows
    /// `fallback`.
    #[must_use]
    pub fn wait_choice(priority: Priority, fallback: HighFallback) -> TierChoice {
        match (priority, fallback) {
            (Priority::Low, _) | (Priority::High, HighFallback::WaitLow) => {
                TierChoice::Only(Tier::Low)
            }
            (Priority::High, HighFallback::WaitHigh) => TierChoice::Only(Tier::High),
            (Priority::High, HighFallback::FirstFree) => TierChoice::Either,
        }
    }

    /// Wait for a permit from the chosen tier(s).
    ///
    /// Cancelling the returned future before it completes leaves the permit
    /// counts untouched.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Closed` if the gate is closed before or while
    /// waiting.
    pub async fn acquire(&self, choice: TierChoice) -> Result<GatePermit, Error> {
        match choice {
            TierChoice::Only(tier) => self.acquire_tier(tier).await,
            TierChoice::Either => {
                tokio::select! {
                    biased;
                    permit = self.acquire_tier(Tier::Low) => permit,
                    permit = self.acquire_tier(Tier::High) => permit,
                }
            }
        }
    }

    /// Take a free permit for `priority`, or wait as `fallback` dictates.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Closed` if the gate has been closed.
    pub async fn acquire_for(
        &self,
        priority: Priority,
        fallback: HighFallback,
    ) -> Result<GatePermit, Error> {
        if let Some((permit, _)) = self.try_acquire(priority)? {
            return Ok(permit);
        }
        self.acquire(Self::wait_choice(priority, fallback)).await
    }

    /// Stop handing out permits.
    ///
    /// Pending and future acquisitions fail with `GateError::Closed`; permits
    /// already held stay valid until dropped.
    pub fn close(&self) {
        self.low.close();
        self.high.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.low.is_closed()
    }

    async fn acquire_tier(&self, tier: Tier) -> Result<GatePermit, Error> {
        let permit = acquire_semaphore_permit(self.semaphore(tier).clone(), &self.name).await?;
        Ok(GatePermit {
            tier,
            _permit: permit,
        })
    }

    fn semaphore(&self, tier: Tier) -> &Arc<Semaphore> {
        match tier {
            Tier::Low => &self.low,
            Tier::High => &self.high,
        }
    }
}
