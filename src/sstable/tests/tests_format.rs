#[cfg(test)]
mod tests {
    use crate::record::DataNode;
    use crate::sstable::{SSTable, TableConfig, TableError};
    use crate::types::{PrimitiveType, TypeError, Value};
    use std::fs;
    use tempfile::TempDir;
    use tracing::Level;
    use tracing_subscriber::fmt::Subscriber;

    fn init_tracing() {
        let _ = Subscriber::builder()
            .with_max_level(Level::TRACE)
            .try_init();
    }

    fn u32_config() -> TableConfig {
        TableConfig {
            size: 1000,
            block_size: 100,
            key_type: PrimitiveType::U32,
            value_type: PrimitiveType::U32,
            ..TableConfig::default()
        }
    }

    /// A freshly created u32/u32 table is exactly 11 bytes:
    /// header length, magic, version, metadata length, value tag,
    /// key tag, record width, filler.
    #[test]
    fn test_empty_table_reference_bytes() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("table-000001.sst");
        let table = SSTable::open(&path, u32_config()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.min_key(), None);
        assert_eq!(table.max_key(), None);
        drop(table);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(
            bytes,
            [0x05, 0x53, 0x53, 0x54, 0x54, 0x01, 0x03, 0x0A, 0x0A, 0x21, 0x0A]
        );
    }

    #[test]
    fn test_sidecar_paths_created_on_write() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        let mut table = SSTable::open(&path, u32_config()).unwrap();
        let node = DataNode::with_timestamp(
            Value::U32(1),
            Value::U32(2),
            PrimitiveType::U32,
            PrimitiveType::U32,
            1_700_000_000_000,
        )
        .unwrap();
        table.write(&[node]).unwrap();

        assert!(tmp.path().join("t.idx").exists());
        assert!(tmp.path().join("t.bloom").exists());
    }

    #[test]
    fn test_reopen_validates_and_restores_boundaries() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        {
            let mut table = SSTable::open(&path, u32_config()).unwrap();
            let records: Vec<DataNode> = (0..10u32)
                .map(|i| {
                    DataNode::with_timestamp(
                        Value::U32(i * 10),
                        Value::U32(i),
                        PrimitiveType::U32,
                        PrimitiveType::U32,
                        1_700_000_000_000 + u64::from(i),
                    )
                    .unwrap()
                })
                .collect();
            table.write(&records).unwrap();
        }

        let table = SSTable::open(&path, u32_config()).unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(table.min_key(), Some(&Value::U32(0)));
        assert_eq!(table.max_key(), Some(&Value::U32(90)));
    }

    #[test]
    fn test_bad_magic_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        SSTable::open(&path, u32_config()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[2] = 0x00;
        fs::write(&path, bytes).unwrap();

        let err = SSTable::open(&path, u32_config()).unwrap_err();
        assert!(matches!(err, TableError::Format { .. }), "{err}");
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        SSTable::open(&path, u32_config()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[5] = 9;
        fs::write(&path, bytes).unwrap();

        let err = SSTable::open(&path, u32_config()).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_mismatched_key_tag_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        SSTable::open(&path, u32_config()).unwrap();

        let config = TableConfig {
            key_type: PrimitiveType::U64,
            value_type: PrimitiveType::U32,
            ..u32_config()
        };
        let err = SSTable::open(&path, config).unwrap_err();
        assert!(err.to_string().contains("key tag") || err.to_string().contains("width"));
    }

    #[test]
    fn test_misaligned_data_region_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        SSTable::open(&path, u32_config()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0u8; 7]); // not a multiple of 33
        fs::write(&path, bytes).unwrap();

        let err = SSTable::open(&path, u32_config()).unwrap_err();
        assert!(err.to_string().contains("multiple of record width"));
    }

    #[test]
    fn test_nonzero_compression_flag_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let config = TableConfig {
            compression: 1,
            ..u32_config()
        };
        let err = SSTable::open(tmp.path().join("t.sst"), config).unwrap_err();
        assert!(err.to_string().contains("compression"));
    }

    #[test]
    fn test_nonzero_encoding_flag_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let config = TableConfig {
            encoding: 3,
            ..u32_config()
        };
        let err = SSTable::open(tmp.path().join("t.sst"), config).unwrap_err();
        assert!(err.to_string().contains("encoding"));
    }

    /// A wide type pair does not fit the one-byte width field of v1.
    #[test]
    fn test_v1_wide_record_rejected() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let config = TableConfig {
            key_type: PrimitiveType::Str(200),
            value_type: PrimitiveType::Str(100),
            ..u32_config()
        };
        let err = SSTable::open(tmp.path().join("t.sst"), config).unwrap_err();
        assert!(matches!(
            err,
            TableError::Type(TypeError::WidthUnrepresentable { width: 325 })
        ));
    }

    /// Version 2 carries the same pair with a two-byte width field.
    #[test]
    fn test_v2_wide_record_accepted() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        let config = TableConfig {
            key_type: PrimitiveType::Str(200),
            value_type: PrimitiveType::Str(100),
            version: 2,
            ..u32_config()
        };
        let mut table = SSTable::open(&path, config.clone()).unwrap();

        let header = fs::read(&path).unwrap();
        assert_eq!(header.len(), 12);
        assert_eq!(header[5], 0x02); // version
        assert_eq!(header[6], 0x04); // metadata length
        assert_eq!(u16::from_le_bytes([header[9], header[10]]), 325);
        assert_eq!(header[11], 0x0A);

        let node = DataNode::with_timestamp(
            Value::Str("k".into()),
            Value::Str("v".into()),
            PrimitiveType::Str(200),
            PrimitiveType::Str(100),
            1_700_000_000_000,
        )
        .unwrap();
        table.write(std::slice::from_ref(&node)).unwrap();
        drop(table);

        let mut reopened = SSTable::open(&path, config).unwrap();
        let found = reopened.read_key(&Value::Str("k".into())).unwrap().unwrap();
        assert_eq!(found.value(), &Value::Str("v".into()));
    }

    #[test]
    fn test_corrupt_index_offset_is_invariant_error() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        {
            let mut table = SSTable::open(&path, u32_config()).unwrap();
            let node = DataNode::with_timestamp(
                Value::U32(1),
                Value::U32(2),
                PrimitiveType::U32,
                PrimitiveType::U32,
                1_700_000_000_000,
            )
            .unwrap();
            table.write(&[node]).unwrap();
        }

        // Point the sidecar at an offset beyond EOF.
        let mut index = crate::index::SortedArray::default();
        index.set(Value::U32(1), 100_000);
        fs::write(
            tmp.path().join("t.idx"),
            index.serialize(PrimitiveType::U32).unwrap(),
        )
        .unwrap();

        let err = SSTable::open(&path, u32_config()).unwrap_err();
        assert!(matches!(err, TableError::Invariant { .. }), "{err}");
    }

    #[test]
    fn test_unlink_removes_all_three_files() {
        init_tracing();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.sst");
        let mut table = SSTable::open(&path, u32_config()).unwrap();
        let node = DataNode::with_timestamp(
            Value::U32(1),
            Value::U32(2),
            PrimitiveType::U32,
            PrimitiveType::U32,
            1_700_000_000_000,
        )
        .unwrap();
        table.write(&[node]).unwrap();
        table.unlink().unwrap();

        assert!(!path.exists());
        assert!(!tmp.path().join("t.idx").exists());
        assert!(!tmp.path().join("t.bloom").exists());
    }
}
