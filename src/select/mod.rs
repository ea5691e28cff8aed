//! Instance selection strategies
//!
//! When several instances exist for one destination, the manager picks one
//! per call. The contract for a strategy: return `None` only for an empty
//! group, and never permanently starve an instance over many calls.
//! Alternative strategies are drop-in behind `SelectStrategy`.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::supervisor::PoolHandle;

/// Pluggable selection strategy over a destination's instance group
pub trait SelectStrategy: Send + Sync {
    /// Pick one instance from a group; `None` only when the group is empty
    fn pick<'a>(&self, instances: &'a [PoolHandle]) -> Option<&'a PoolHandle>;
}

/// Uniform random selection (the default strategy)
#[derive(Debug, Default)]
pub struct RandomSelect;

impl SelectStrategy for RandomSelect {
    fn pick<'a>(&self, instances: &'a [PoolHandle]) -> Option<&'a PoolHandle> {
        if instances.is_empty() {
            return None;
        }
        if instances.len() == 1 {
            return instances.first();
        }
        let index = rand::thread_rng().gen_range(0..instances.len());
        instances.get(index)
    }
}

/// Round-robin selection: simple counter-based rotation
#[derive(Debug, Default)]
pub struct RoundRobinSelect {
    counter: AtomicUsize,
}

impl SelectStrategy for RoundRobinSelect {
    fn pick<'a>(&self, instances: &'a [PoolHandle]) -> Option<&'a PoolHandle> {
        if instances.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        instances.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolVariant;
    use crate::supervisor::InstanceId;

    fn group(count: u64) -> Vec<PoolHandle> {
        (0..count)
            .map(|id| PoolHandle::new(InstanceId(id), PoolVariant::Stream))
            .collect()
    }

    #[test]
    fn test_empty_group() {
        assert!(RandomSelect.pick(&[]).is_none());
        assert!(RoundRobinSelect::default().pick(&[]).is_none());
    }

    #[test]
    fn test_single_instance() {
        let group = group(1);
        for _ in 0..10 {
            assert_eq!(RandomSelect.pick(&group).unwrap().id(), InstanceId(0));
        }
    }

    #[test]
    fn test_round_robin_rotates() {
        let group = group(3);
        let strategy = RoundRobinSelect::default();

        let picks: Vec<_> = (0..6)
            .map(|_| strategy.pick(&group).unwrap().id())
            .collect();
        assert_eq!(
            picks,
            vec![
                InstanceId(0),
                InstanceId(1),
                InstanceId(2),
                InstanceId(0),
                InstanceId(1),
                InstanceId(2),
            ]
        );
    }

    #[test]
    fn test_random_is_roughly_uniform() {
        let group = group(4);
        let strategy = RandomSelect;
        let draws = 10_000usize;

        let mut counts = [0usize; 4];
        for _ in 0..draws {
            let id = strategy.pick(&group).unwrap().id();
            counts[id.0 as usize] += 1;
        }

        // No instance starved, and every bucket within a generous band
        // around the expected 2500 (binomial stddev is ~43 here).
        for count in counts {
            assert!(count > 0, "an instance was never selected: {:?}", counts);
            assert!(
                (2000..=3000).contains(&count),
                "selection far from uniform: {:?}",
                counts
            );
        }
    }
}
