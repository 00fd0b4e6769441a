use std::sync::atomic::{AtomicU32, Ordering};

use super::Obfuscator;

/// Packet counter transform.
///
/// Emits a 4-byte big-endian counter starting at 0, incremented once per
/// obfuscated packet. The field exists so both ends of the tunnel lay out
/// packets identically; the receiving side has no way to know the expected
/// value, so extraction accepts everything and restores nothing. The counter
/// wraps at `u32::MAX` without resynchronization.
pub struct CounterObfuscator {
    counter: AtomicU32,
}

impl CounterObfuscator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    #[cfg(test)]
    fn starting_at(value: u32) -> Self {
        Self {
            counter: AtomicU32::new(value),
        }
    }
}

impl Default for CounterObfuscator {
    fn default() -> Self {
        Self::new()
    }
}

impl Obfuscator for CounterObfuscator {
    fn obfuscate(&self, dst: &mut [u8], _src: &[u8]) {
        let value = self.counter.fetch_add(1, Ordering::Relaxed);
        dst[..4].copy_from_slice(&value.to_be_bytes());
    }

    fn deobfuscate(&self, _dst: &mut [u8], _src: &[u8]) -> bool {
        true
    }

    fn obfuscated_len(&self, _payload_len: usize) -> usize {
        4
    }

    fn deobfuscated_len(&self, _payload_len: usize) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_counter_values() {
        let obf = CounterObfuscator::new();
        let mut dst = [0u8; 4];
        for expected in 0u32..256 {
            obf.obfuscate(&mut dst, b"payload");
            assert_eq!(u32::from_be_bytes(dst), expected);
        }
    }

    #[test]
    fn test_counter_wraps_silently() {
        let obf = CounterObfuscator::starting_at(u32::MAX);
        let mut dst = [0u8; 4];
        obf.obfuscate(&mut dst, &[]);
        assert_eq!(u32::from_be_bytes(dst), u32::MAX);
        obf.obfuscate(&mut dst, &[]);
        assert_eq!(u32::from_be_bytes(dst), 0);
        obf.obfuscate(&mut dst, &[]);
        assert_eq!(u32::from_be_bytes(dst), 1);
    }

    #[test]
    fn test_deobfuscate_accepts_everything() {
        let obf = CounterObfuscator::new();
        let mut dst = [0u8; 0];
        assert!(obf.deobfuscate(&mut dst, &[0, 0, 0, 0]));
        assert!(obf.deobfuscate(&mut dst, &[0xff, 0xff, 0xff, 0xff]));
        assert!(obf.deobfuscate(&mut dst, &[1, 2, 3, 4]));
    }

    #[test]
    fn test_lengths_are_constant() {
        let obf = CounterObfuscator::new();
        for payload_len in [0usize, 1, 4, 1500, 65535] {
            assert_eq!(obf.obfuscated_len(payload_len), 4);
            assert_eq!(obf.deobfuscated_len(payload_len), 0);
        }
    }

    #[test]
    fn test_state_is_per_instance() {
        let a = CounterObfuscator::new();
        let b = CounterObfuscator::new();
        let mut dst = [0u8; 4];

        for expected in 0u32..8 {
            a.obfuscate(&mut dst, &[]);
            assert_eq!(u32::from_be_bytes(dst), expected);
        }
        // A fresh instance starts over; nothing is process-global.
        for expected in 0u32..8 {
            b.obfuscate(&mut dst, &[]);
            assert_eq!(u32::from_be_bytes(dst), expected);
        }
    }

    #[test]
    fn test_concurrent_obfuscation_produces_distinct_values() {
        use std::sync::Arc;

        let obf = Arc::new(CounterObfuscator::new());
        let mut handles = vec![];
        for _ in 0..4 {
            let obf = obf.clone();
            handles.push(std::thread::spawn(move || {
                let mut values = Vec::with_capacity(1000);
                let mut dst = [0u8; 4];
                for _ in 0..1000 {
                    obf.obfuscate(&mut dst, &[]);
                    values.push(u32::from_be_bytes(dst));
                }
                values
            }));
        }

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
        assert_eq!(all[0], 0);
        assert_eq!(all[3999], 3999);
    }
}
