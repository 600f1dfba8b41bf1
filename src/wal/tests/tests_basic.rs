#[cfg(test)]
mod tests {
    use crate::record::{DataNode, LogMethod};
    use crate::types::{PrimitiveType, Value};
    use crate::wal::{Wal, WalError};
    use std::fs;
    use tempfile::TempDir;
    use tracing::Level;
    use tracing_subscriber::fmt::Subscriber;

    fn init_tracing() {
        let _ = Subscriber::builder()
            .with_max_level(Level::TRACE)
            .try_init();
    }

    fn node(key: u32, value: u32, timestamp: u64) -> DataNode {
        DataNode::with_timestamp(
            Value::U32(key),
            Value::U32(value),
            PrimitiveType::U32,
            PrimitiveType::U32,
            timestamp,
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_wal_prefix_bytes() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wal.log");
        let wal = Wal::open(&path, 64).unwrap();
        assert_eq!(wal.logical_len(), 5);
        drop(wal);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes, [0x01, 0x57, 0x41, 0x4C, 0x46]);
    }

    /// Full frame layout: start delimiter, tags, lengths, key, value,
    /// timestamp, method, end delimiter.
    #[test]
    fn test_record_frame_offsets() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wal.log");
        let mut wal = Wal::open(&path, 16).unwrap();
        wal.append(&node(7, 42, 1_700_000_000_000), LogMethod::Append).unwrap();
        wal.sync().unwrap();

        let bytes = fs::read(&path).unwrap();
        // prefix(5) + start(4) + payload(27) + end(4)
        assert_eq!(bytes.len(), 40);

        let frame = &bytes[5..];
        assert_eq!(&frame[0..4], &[0x01, 0x10, 0xEF, 0xFE]); // start
        assert_eq!(frame[4], 0x0A); // key tag at payload offset 0
        assert_eq!(frame[5], 0x0A); // value tag at payload offset 1
        assert_eq!(&frame[6..10], &[0x04, 0x00, 0x00, 0x00]); // key length at 2
        assert_eq!(&frame[10..14], &[0x04, 0x00, 0x00, 0x00]); // value length at 6
        assert_eq!(&frame[14..18], &[0x07, 0x00, 0x00, 0x00]); // key at 10
        assert_eq!(&frame[18..22], &[0x2A, 0x00, 0x00, 0x00]); // value at 14
        assert_eq!(&frame[22..30], &(1_700_000_000_000u64 as f64).to_le_bytes());
        assert_eq!(frame[30], 0x00); // method
        assert_eq!(&frame[31..35], &[0xFE, 0xEF, 0x10, 0x01]); // end
    }

    #[test]
    fn test_small_appends_are_batched() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wal.log");
        let mut wal = Wal::open(&path, 4096).unwrap();
        wal.append(&node(1, 1, 1), LogMethod::Append).unwrap();
        wal.append(&node(2, 2, 2), LogMethod::Append).unwrap();

        // Still staged: only the prefix is durable.
        assert_eq!(fs::metadata(&path).unwrap().len(), 5);
        assert_eq!(wal.logical_len(), 5 + 2 * 35);

        wal.sync().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 5 + 2 * 35);
    }

    #[test]
    fn test_reopen_preserves_records() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wal.log");
        {
            let mut wal = Wal::open(&path, 16).unwrap();
            wal.append(&node(1, 1, 1), LogMethod::Append).unwrap();
        }
        let wal = Wal::open(&path, 16).unwrap();
        assert_eq!(wal.logical_len(), 5 + 35);
    }

    #[test]
    fn test_garbage_prefix_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wal.log");
        fs::write(&path, b"not a wal").unwrap();

        let err = Wal::open(&path, 16).unwrap_err();
        assert!(matches!(err, WalError::Format { .. }), "{err}");
    }

    #[test]
    fn test_truncate_resets_to_prefix() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wal.log");
        let mut wal = Wal::open(&path, 16).unwrap();
        wal.append(&node(1, 1, 1), LogMethod::Append).unwrap();
        wal.append(&node(2, 2, 2), LogMethod::Delete).unwrap();
        wal.truncate().unwrap();

        assert_eq!(wal.logical_len(), 5);
        assert_eq!(fs::read(&path).unwrap(), [0x01, 0x57, 0x41, 0x4C, 0x46]);

        // The log remains usable after truncation.
        wal.append(&node(3, 3, 3), LogMethod::Append).unwrap();
        wal.sync().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 5 + 35);
    }
}
