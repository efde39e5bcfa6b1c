use rand::{rngs::StdRng, RngCore, SeedableRng};
use tracing::warn;

/// Number of challenges kept alive by default.
pub const DEFAULT_RING_SIZE: usize = 6;

const MAX_ATTEMPTS: usize = 16;

/// Bob Jenkins' 32-bit integer mix.
pub fn jenkins_hash(mut a: u32) -> u32 {
    a = a.wrapping_add(0x7ed55d16).wrapping_add(a << 12);
    a = (a ^ 0xc761c23c) ^ (a >> 19);
    a = a.wrapping_add(0x165667b1).wrapping_add(a << 5);
    a = a.wrapping_add(0xd3a2646c) ^ (a << 9);
    a = a.wrapping_add(0xfd7046c5).wrapping_add(a << 3);
    a = (a ^ 0xb55a4f09) ^ (a >> 16);

    a
}

fn is_degenerate(value: u32) -> bool {
    value == 0 || value == u32::MAX
}

/// Rolling challenge tokens for challenge/response protocols.
///
/// The last `size` issued values are kept so that a client answering with a
/// challenge handed out just before a rotation is still accepted.
pub struct ChallengeRing {
    slots: Vec<Option<u32>>,
    current: usize,
    rng: StdRng,
}

impl ChallengeRing {
    pub fn create(size: usize) -> Self {
        Self::with_rng(size, StdRng::from_entropy())
    }

    /// Deterministic ring, for tests and reproducible captures.
    pub fn with_seed(size: usize, seed: u64) -> Self {
        Self::with_rng(size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(size: usize, rng: StdRng) -> Self {
        Self {
            slots: vec![None; size.max(1)],
            current: 0,
            rng,
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Store a fresh value in the next slot and make it current.
    pub fn new_challenge(&mut self) {
        for _ in 0..MAX_ATTEMPTS {
            let value = jenkins_hash(self.rng.next_u32());

            if is_degenerate(value) {
                continue;
            }

            let next = match self.slots[self.current] {
                // The very first challenge fills slot 0.
                None => self.current,
                Some(_) => (self.current + 1) % self.slots.len(),
            };

            self.slots[next] = Some(value);
            self.current = next;
            return;
        }

        warn!(
            "Challenge generation hit only degenerate values {} times in a row",
            MAX_ATTEMPTS
        );
    }

    /// Challenge to hand out to a client identified by `mutate`.
    pub fn get_challenge(&mut self, mutate: u32) -> u32 {
        if self.slots[self.current].is_none() {
            self.new_challenge();
        }

        self.slots[self.current]
            .unwrap_or_default()
            .wrapping_add(jenkins_hash(mutate))
    }

    /// Check a challenge echoed back by a client against every live slot.
    pub fn validate(&self, challenge: u32, mutate: u32) -> bool {
        if is_degenerate(challenge) {
            return false;
        }

        let salt = jenkins_hash(mutate);
        let size = self.slots.len();

        (0..size)
            .map(|offset| self.slots[(self.current + offset) % size])
            .any(|slot| matches!(slot, Some(value) if value.wrapping_add(salt) == challenge))
    }
}

impl Default for ChallengeRing {
    fn default() -> Self {
        Self::create(DEFAULT_RING_SIZE)
    }
}
