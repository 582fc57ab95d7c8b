//! Hidden packet counter

use std::sync::atomic::{AtomicU64, Ordering};

/// Count of packets suppressed since the last drain
///
/// Incremented from the relay loop, drained by the reporter. Both operations
/// are single atomic instructions, so every increment lands in exactly one
/// drain.
#[derive(Debug, Default)]
pub struct HiddenCounter {
    value: AtomicU64,
}

impl HiddenCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one suppressed packet
    #[inline]
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current value and reset it to zero
    #[inline]
    pub fn drain(&self) -> u64 {
        self.value.swap(0, Ordering::AcqRel)
    }

    /// Current value without resetting
    pub fn peek(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_increment_and_drain() {
        let counter = HiddenCounter::new();
        counter.increment();
        counter.increment();
        counter.increment();

        assert_eq!(counter.drain(), 3);
        assert_eq!(counter.drain(), 0);
        assert_eq!(counter.peek(), 0);
    }

    #[test]
    fn test_concurrent_increments_conserved() {
        let counter = Arc::new(HiddenCounter::new());
        let per_thread = 10_000u64;
        let threads = 8u64;

        let drainer = {
            let counter = counter.clone();
            thread::spawn(move || {
                let mut drained = 0;
                for _ in 0..1_000 {
                    drained += counter.drain();
                    thread::yield_now();
                }
                drained
            })
        };

        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        counter.increment();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        let drained = drainer.join().unwrap();

        assert_eq!(drained + counter.drain(), threads * per_thread);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Increment,
        Drain,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![3 => Just(Op::Increment), 1 => Just(Op::Drain)]
    }

    proptest! {
        #[test]
        fn prop_drains_plus_remainder_equal_increments(ops in prop::collection::vec(op_strategy(), 0..500)) {
            let counter = HiddenCounter::new();
            let mut issued = 0u64;
            let mut drained = 0u64;

            for op in ops {
                match op {
                    Op::Increment => {
                        counter.increment();
                        issued += 1;
                    }
                    Op::Drain => drained += counter.drain(),
                }
            }

            prop_assert_eq!(drained + counter.peek(), issued);
        }
    }
}
