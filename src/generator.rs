//! Synthetic order flow.
//!
//! Ids are strictly sequential from 1 so they line up with the ids the
//! correlator waits for. Side, price and quantity only add realism; any
//! `OrderSource` can be plugged into the session.

use crate::protocol::{OrderRequest, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Produces the next order to submit.
pub trait OrderSource {
    fn next_order(&mut self) -> OrderRequest;
}

/// Uniform side, price and quantity over fixed bounds.
pub struct UniformGenerator<R = StdRng> {
    next_id: u64,
    prices: RangeInclusive<i64>,
    quantities: RangeInclusive<u64>,
    rng: R,
}

impl UniformGenerator<StdRng> {
    /// Create a generator, seeded for reproducible runs or from entropy.
    pub fn new(
        prices: RangeInclusive<i64>,
        quantities: RangeInclusive<u64>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(prices, quantities, rng)
    }
}

impl<R: Rng> UniformGenerator<R> {
    /// Create a generator drawing from the given RNG.
    ///
    /// Both ranges must be non-empty; the config layer checks this.
    pub fn with_rng(prices: RangeInclusive<i64>, quantities: RangeInclusive<u64>, rng: R) -> Self {
        debug_assert!(!prices.is_empty(), "empty price band");
        debug_assert!(!quantities.is_empty() && *quantities.start() > 0, "bad quantity range");
        Self {
            next_id: 1,
            prices,
            quantities,
            rng,
        }
    }
}

impl<R: Rng> OrderSource for UniformGenerator<R> {
    fn next_order(&mut self) -> OrderRequest {
        let id = self.next_id;
        self.next_id += 1;

        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };

        OrderRequest {
            id,
            side,
            price: self.rng.gen_range(self.prices.clone()),
            quantity: self.rng.gen_range(self.quantities.clone()),
        }
    }
}
