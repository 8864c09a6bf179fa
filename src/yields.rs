//! Yield resolution: turns a yield-multiplier stat into a guaranteed factor
//! plus a chance of one extra helping.
//!
//! ```text
//! guaranteed = floor(m / 100) + 1
//! chance     = m mod 100          (percent)
//! final      = nominal * guaranteed  (+ nominal with p = chance / 100)
//! ```

use crate::types::ItemStack;
use rand::Rng;

/// Outcome of the single draw made for one completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldRoll {
    pub guaranteed: u32,
    pub bonus: bool,
}

impl YieldRoll {
    /// Roll for a multiplier stat. Negative or non-finite stats count as 0.
    pub fn roll<R: Rng + ?Sized>(multiplier: f64, rng: &mut R) -> Self {
        let m = if multiplier.is_finite() && multiplier > 0.0 {
            multiplier
        } else {
            0.0
        };

        let guaranteed = ((m / 100.0).floor() as u32).saturating_add(1);
        let chance = m % 100.0;
        // Whole-hundred stats never draw.
        let bonus = chance > 0.0 && rng.gen_range(0.0..100.0) < chance;

        Self { guaranteed, bonus }
    }

    pub fn factor(&self) -> u32 {
        self.guaranteed + u32::from(self.bonus)
    }

    pub fn apply(&self, nominal: u32) -> u32 {
        nominal.saturating_mul(self.factor())
    }

    /// Scale every stack by the rolled factor.
    pub fn apply_to(&self, drops: Vec<ItemStack>) -> Vec<ItemStack> {
        drops
            .into_iter()
            .map(|stack| ItemStack {
                count: self.apply(stack.count),
                item: stack.item,
            })
            .collect()
    }
}

/// Final quantity for `nominal` items at the given multiplier stat.
pub fn resolve_yield<R: Rng + ?Sized>(nominal: u32, multiplier: f64, rng: &mut R) -> u32 {
    YieldRoll::roll(multiplier, rng).apply(nominal)
}
