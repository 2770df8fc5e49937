//! Registration admission control
//!
//! The Identity Registry runs every policy's `check` before touching state and
//! calls `record` only after the registration has been committed.

use ethers::types::{Address, U256};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::error::{RegistryError, RegistryResult};
use super::types::CallContext;

pub trait AdmissionPolicy: Send + Sync {
    /// Refuse the registration, or let it proceed
    fn check(&self, ctx: &CallContext, height: u64) -> RegistryResult<()>;

    /// Note a committed registration
    fn record(&self, _ctx: &CallContext, _height: u64) {}

    /// Value a caller must attach for `check` to pass
    fn required_value(&self) -> U256 {
        U256::zero()
    }
}

/// Fixed registration fee. Overpayment is accepted and kept.
#[derive(Debug, Clone, Default)]
pub struct FeePolicy {
    fee: U256,
}

impl FeePolicy {
    pub fn new(fee: U256) -> Self {
        Self { fee }
    }
}

impl AdmissionPolicy for FeePolicy {
    fn check(&self, ctx: &CallContext, _height: u64) -> RegistryResult<()> {
        if ctx.value < self.fee {
            return Err(RegistryError::InsufficientFee {
                required: self.fee,
                attached: ctx.value,
            });
        }
        Ok(())
    }

    fn required_value(&self) -> U256 {
        self.fee
    }
}

/// At most `max_registrations` per caller within any `window` consecutive heights
pub struct RateLimitPolicy {
    max_registrations: u32,
    window: u64,
    /// Heights of recent registrations, per caller
    history: Mutex<HashMap<Address, VecDeque<u64>>>,
}

impl RateLimitPolicy {
    /// Both `max_registrations` and `window` must be positive
    pub fn new(max_registrations: u32, window: u64) -> RegistryResult<Self> {
        if max_registrations == 0 || window == 0 {
            return Err(RegistryError::malformed(format!(
                "rate limit {}/{} must have a positive max and window",
                max_registrations, window
            )));
        }
        Ok(Self {
            max_registrations,
            window,
            history: Mutex::new(HashMap::new()),
        })
    }

    fn prune(&self, heights: &mut VecDeque<u64>, height: u64) {
        while let Some(&oldest) = heights.front() {
            if height.saturating_sub(oldest) >= self.window {
                heights.pop_front();
            } else {
                break;
            }
        }
    }
}

impl AdmissionPolicy for RateLimitPolicy {
    fn check(&self, ctx: &CallContext, height: u64) -> RegistryResult<()> {
        let mut history = self.history.lock();
        let Some(heights) = history.get_mut(&ctx.caller) else {
            return Ok(());
        };
        self.prune(heights, height);
        if heights.len() >= self.max_registrations as usize {
            log::warn!(
                "[Admission] {:?} hit {} registrations in {} blocks",
                ctx.caller,
                heights.len(),
                self.window
            );
            return Err(RegistryError::RateLimited {
                caller: ctx.caller,
                limit: self.max_registrations,
                window: self.window,
            });
        }
        Ok(())
    }

    fn record(&self, ctx: &CallContext, height: u64) {
        let mut history = self.history.lock();
        let heights = history.entry(ctx.caller).or_default();
        self.prune(heights, height);
        heights.push_back(height);
    }
}
