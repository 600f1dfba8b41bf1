#[cfg(test)]
mod tests {
    use crate::bloom::{BitArray, BloomFilter};
    use crate::types::Value;

    #[test]
    fn test_bitarray_set_get() {
        let mut bits = BitArray::new(20);
        assert!(!bits.get(0));
        bits.set(0);
        bits.set(7);
        bits.set(8);
        bits.set(19);
        assert!(bits.get(0));
        assert!(bits.get(7));
        assert!(bits.get(8));
        assert!(bits.get(19));
        assert!(!bits.get(1));

        // LSB-first packing: bits 0 and 7 live in byte 0, bit 8 in byte 1.
        assert_eq!(bits.as_bytes()[0], 0b1000_0001);
        assert_eq!(bits.as_bytes()[1], 0b0000_0001);
    }

    #[test]
    fn test_bitarray_out_of_range_ignored() {
        let mut bits = BitArray::new(8);
        bits.set(100);
        assert!(!bits.get(100));
        assert_eq!(bits.as_bytes(), &[0u8]);
    }

    #[test]
    fn test_bitarray_from_bytes_length_authoritative() {
        let bits = BitArray::from_bytes(vec![0xFF, 0x00, 0x01]);
        assert_eq!(bits.bit_len(), 24);
        assert!(bits.get(3));
        assert!(!bits.get(8));
        assert!(bits.get(16));
    }

    /// Added keys are always reported present.
    #[test]
    fn test_no_false_negatives() {
        let mut bloom = BloomFilter::new(1000, 0.01, None);
        for i in 0..1000u32 {
            bloom.add(&Value::U32(i));
        }
        for i in 0..1000u32 {
            assert!(bloom.lookup(&Value::U32(i)), "false negative for {i}");
        }
    }

    #[test]
    fn test_false_positive_rate_is_bounded() {
        let mut bloom = BloomFilter::new(1000, 0.01, None);
        for i in 0..1000u64 {
            bloom.add(&Value::U64(i));
        }

        let mut false_positives = 0u32;
        let probes = 10_000u64;
        for i in 1000..1000 + probes {
            if bloom.lookup(&Value::U64(i)) {
                false_positives += 1;
            }
        }
        let observed = f64::from(false_positives) / probes as f64;
        assert!(observed < 0.03, "observed false positive rate {observed}");
    }

    #[test]
    fn test_string_keys() {
        let mut bloom = BloomFilter::new(100, 0.01, None);
        bloom.add(&Value::Str("apple".into()));
        bloom.add(&Value::Str("banana".into()));
        assert!(bloom.lookup(&Value::Str("apple".into())));
        assert!(bloom.lookup(&Value::Str("banana".into())));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut bloom = BloomFilter::new(100, 0.01, None);
        bloom.add(&Value::U32(7));
        assert!(bloom.lookup(&Value::U32(7)));
        bloom.clear();
        assert!(!bloom.lookup(&Value::U32(7)));
    }

    #[test]
    fn test_bits_roundtrip_through_raw_bytes() {
        let mut bloom = BloomFilter::new(100, 0.01, None);
        for i in 0..50u32 {
            bloom.add(&Value::U32(i));
        }
        let saved = bloom.bits().as_bytes().to_vec();

        let mut restored = BloomFilter::new(100, 0.01, None);
        restored.load_bits(saved);
        for i in 0..50u32 {
            assert!(restored.lookup(&Value::U32(i)));
        }
    }

    #[test]
    fn test_load_bits_mis_sized_buffer_tolerated() {
        let mut bloom = BloomFilter::new(100, 0.01, None);
        bloom.load_bits(vec![0xFF; 4]);
        assert_eq!(bloom.bit_count(), 32);
        // All bits set: everything reports (possibly) present.
        assert!(bloom.lookup(&Value::U32(123)));
    }

    #[test]
    fn test_custom_hash_injected() {
        fn constant_hash(_key: &crate::types::Value, seed: u32) -> u32 {
            seed
        }
        let mut bloom = BloomFilter::new(100, 0.01, Some(constant_hash));
        bloom.add(&Value::U32(1));
        // Constant hash maps every key to the same bits.
        assert!(bloom.lookup(&Value::U32(2)));
    }
}
