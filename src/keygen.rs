use std::sync::atomic::{AtomicU64, Ordering};

use rand::{distributions::Alphanumeric, Rng};

use crate::validate::KEY_LEN;

/// Source of fresh device keys.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 22 characters drawn uniformly from `[A-Za-z0-9]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(KEY_LEN)
            .map(char::from)
            .collect()
    }
}

/// Predictable keys (`TestKey000000000000001`, ...) for fixtures.
#[derive(Debug, Default)]
pub struct SequenceKeyGenerator {
    next: AtomicU64,
}

impl SequenceKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key that the `n`th call to `generate` returns, counting from 1.
    pub fn nth(n: u64) -> String {
        format!("TestKey{:015}", n)
    }
}

impl KeyGenerator for SequenceKeyGenerator {
    fn generate(&self) -> String {
        Self::nth(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::is_device_key;

    #[test]
    fn random_keys_are_well_formed() {
        let keys = RandomKeyGenerator;
        for _ in 0..100 {
            assert!(is_device_key(&keys.generate()));
        }
        assert_ne!(keys.generate(), keys.generate());
    }

    #[test]
    fn sequence_keys_are_well_formed() {
        let keys = SequenceKeyGenerator::new();
        assert_eq!(keys.generate(), "TestKey000000000000001");
        assert_eq!(keys.generate(), SequenceKeyGenerator::nth(2));
        assert!(is_device_key(&SequenceKeyGenerator::nth(3)));
    }
}
