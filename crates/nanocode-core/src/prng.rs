// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Seedable, snapshot-able PRNG for randomized scheduling.

/// Stateful `xoroshiro128+` pseudo-random number generator.
///
/// * Not cryptographically secure; use only for frontier ordering.
/// * Matching seeds yield identical sequences across supported platforms.
/// * The full generator state is two `u64` words; [`Prng::state`] and
///   [`Prng::from_state`] let a snapshot resume the exact same draw sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prng {
    state: [u64; 2],
}

const ZERO_STATE_FIXUP: u64 = 0x9e37_79b9_7f4a_7c15;

impl Prng {
    /// Constructs a PRNG from a single 64-bit seed via SplitMix64 expansion.
    pub fn from_seed_u64(seed: u64) -> Self {
        fn splitmix64(state: &mut u64) -> u64 {
            *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = *state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            z ^ (z >> 31)
        }

        let mut sm_state = seed;
        let state = [splitmix64(&mut sm_state), splitmix64(&mut sm_state)];
        Self::from_state(state)
    }

    /// Restores a generator from raw state words.
    ///
    /// The all-zero state is a fixed point of xoroshiro and is remapped.
    pub fn from_state(mut state: [u64; 2]) -> Self {
        if state[0] == 0 && state[1] == 0 {
            state[0] = ZERO_STATE_FIXUP;
        }
        Self { state }
    }

    /// Raw state words; feed back into [`Prng::from_state`] to resume.
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Returns the next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(55) ^ s1 ^ (s1 << 14);
        self.state[1] = s1.rotate_left(36);

        result
    }

    /// Returns a uniformly distributed index in `[0, upper)`.
    ///
    /// Uses rejection sampling to avoid modulo bias. `upper == 0` and
    /// `upper == 1` return `0` without consuming state.
    pub fn next_below(&mut self, upper: usize) -> usize {
        if upper <= 1 {
            return 0;
        }
        let span = upper as u64;
        let value = if span.is_power_of_two() {
            self.next_u64() & (span - 1)
        } else {
            let bound = u64::MAX - u64::MAX % span;
            loop {
                let candidate = self.next_u64();
                if candidate < bound {
                    break candidate % span;
                }
            }
        };
        // `value < span == upper`, so it fits back into usize.
        usize::try_from(value).unwrap_or(0)
    }
}
