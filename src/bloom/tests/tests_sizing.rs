#[cfg(test)]
mod tests {
    use crate::bloom::BloomFilter;

    /// Reference sizing: 100 expected keys at 1% error rate.
    #[test]
    fn test_params_reference_point() {
        let (m, k) = BloomFilter::params(100, 0.01);
        assert_eq!(m, 958);
        assert_eq!(k, 7);
    }

    #[test]
    fn test_params_scale_linearly_with_n() {
        let (m_small, _) = BloomFilter::params(100, 0.01);
        let (m_large, _) = BloomFilter::params(10_000, 0.01);
        let ratio = m_large as f64 / m_small as f64;
        assert!((ratio - 100.0).abs() < 0.5, "ratio {ratio}");
    }

    #[test]
    fn test_params_degenerate_zero_items() {
        let (m, k) = BloomFilter::params(0, 0.01);
        assert_eq!((m, k), (1, 1));
    }

    #[test]
    fn test_params_never_zero() {
        let (m, k) = BloomFilter::params(1, 0.5);
        assert!(m >= 1);
        assert!(k >= 1);
    }

    #[test]
    fn test_filter_allocates_rounded_up_bytes() {
        let bloom = BloomFilter::new(100, 0.01, None);
        // 958 bits pack into 120 bytes.
        assert_eq!(bloom.bits().as_bytes().len(), 120);
        assert_eq!(bloom.bit_count(), 958);
        assert_eq!(bloom.hash_count(), 7);
    }
}
