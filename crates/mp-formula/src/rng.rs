const DEFAULT_SEED: u32 = 1;

/// Source of randomness injected into generation and choice ordering.
pub trait RandomSource: Send {
    fn next_u32(&mut self) -> u32;

    /// Uniform value in `0..bound`; a zero bound yields zero.
    fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        next_random_bounded_with(bound, || self.next_u32())
    }

    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    fn next_bool(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }
}

/// Mulberry32 generator with an explicit seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    pub fn new(seed: Option<u32>) -> Self {
        Self {
            state: seed.unwrap_or(DEFAULT_SEED),
        }
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RandomSource for SeededRandom {
    fn next_u32(&mut self) -> u32 {
        next_random_u32(&mut self.state)
    }
}

pub(crate) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

pub(crate) fn next_random_bounded_with<F>(bound: u32, mut next: F) -> u32
where
    F: FnMut() -> u32,
{
    let threshold = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
    let mut candidate = next();
    while u64::from(candidate) >= threshold {
        candidate = next();
    }
    candidate % bound
}
