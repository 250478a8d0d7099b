//! Integration tests for reading dumps back.
//!
//! Every storage kind is written through a container and read back through
//! a `DumpReader`, checking values, timestamps and metadata.

use simdump::error::DatasetIoError;
use simdump::{
    Container, ContainerConfig, DumpReader, ElementType, SimDumpError, SimTime, StorageKind,
};
use tempfile::tempdir;

fn small_chunks() -> ContainerConfig {
    ContainerConfig {
        chunk_size: 8,
        ..ContainerConfig::default()
    }
}

#[test]
fn test_async_round_trip() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let mut container = Container::open(&path, small_chunks()).unwrap();
    let handle = container
        .add_signal("u_top.adc", StorageKind::Async, &[3], ElementType::I16)
        .unwrap();

    let mut expected_values = Vec::new();
    let mut expected_times = Vec::new();
    for step in 0..21i16 {
        let record = [step, -step, step * 2];
        let time = f64::from(step) * 0.125;
        container.write_values(handle, time, &record).unwrap();
        expected_values.extend_from_slice(&record);
        expected_times.push(time);
    }
    container.close().unwrap();

    let reader = DumpReader::open(&path).unwrap();
    let data = reader.read("u_top.adc").unwrap();
    assert_eq!(data.kind(), StorageKind::Async);
    assert_eq!(data.records(), 21);
    assert_eq!(data.stride(), 6);
    assert_eq!(data.times().unwrap(), expected_times.as_slice());
    assert_eq!(data.values::<i16>().unwrap(), expected_values);
}

#[test]
fn test_sync_scalar_round_trip_from_raw_bytes() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let mut container = Container::open(&path, small_chunks()).unwrap();
    let handle = container
        .add_signal("clk", StorageKind::Sync, &[], ElementType::U32)
        .unwrap();

    for value in 0..8u32 {
        container.write(handle, 99.0, &(value * 3).to_le_bytes()).unwrap();
    }
    container.close().unwrap();

    let data = DumpReader::open(&path).unwrap().read("clk").unwrap();
    assert_eq!(data.records(), 8);
    assert!(data.times().is_none());
    assert_eq!(
        data.values::<u32>().unwrap(),
        vec![0, 3, 6, 9, 12, 15, 18, 21]
    );
    assert_eq!(data.record(2), Some(6u32.to_le_bytes().as_slice()));
}

#[test]
fn test_sim_time_round_trip() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let mut container = Container::open(&path, small_chunks()).unwrap();
    let handle = container
        .add_signal("sim_time", StorageKind::SimTime, &[7, 7], ElementType::U8)
        .unwrap();

    let expected: Vec<SimTime> = (0..13i64)
        .map(|i| SimTime {
            ns: i * 1_000 - 5,
            rem: if i % 2 == 0 { 0.0 } else { 0.75 },
        })
        .collect();
    for t in &expected {
        container.write_time(handle, t.ns, t.rem).unwrap();
    }
    container.close().unwrap();

    let reader = DumpReader::open(&path).unwrap();
    let info = reader.signal("sim_time").unwrap();
    assert_eq!(info.kind, StorageKind::SimTime);
    assert_eq!(info.element, None);
    assert!(info.dims.is_empty());
    assert_eq!(info.storage(), Some("time"));

    let data = reader.read("sim_time").unwrap();
    assert_eq!(data.stride(), 8);
    assert!(data.times().is_none());
    assert_eq!(data.sim_times().unwrap(), expected);
    assert!(data.values::<i64>().is_err());
}

#[test]
fn test_empty_signal_reads_back_empty() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let mut container = Container::open(&path, small_chunks()).unwrap();
    container
        .add_signal("quiet", StorageKind::Async, &[2], ElementType::F64)
        .unwrap();
    container.close().unwrap();

    let data = DumpReader::open(&path).unwrap().read("quiet").unwrap();
    assert_eq!(data.records(), 0);
    assert!(data.payload().is_empty());
    assert_eq!(data.times().unwrap().len(), 0);
}

#[test]
fn test_unregistered_store_closed_on_its_own() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let container = Container::open(&path, small_chunks()).unwrap();

    let mut store = container
        .create_signal("loose.sig", StorageKind::Sync, &[], ElementType::I8)
        .unwrap();
    store.write_values(0.0, &[-1i8]).unwrap();
    store.set_attribute("svtype", "bit").unwrap();
    store.close().unwrap();
    container.close().unwrap();

    let reader = DumpReader::open(&path).unwrap();
    let info = reader.signal("loose.sig").unwrap();
    assert_eq!(info.records, 1);
    assert_eq!(info.svtype(), Some("bit"));
    assert_eq!(reader.read("loose.sig").unwrap().values::<i8>().unwrap(), vec![-1]);
}

#[test]
fn test_mismatched_dataset_detected() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let mut container = Container::open(&path, small_chunks()).unwrap();
    container
        .add_signal("a", StorageKind::Sync, &[], ElementType::U8)
        .unwrap();
    container
        .add_signal("b", StorageKind::Sync, &[4], ElementType::U8)
        .unwrap();
    container.close().unwrap();

    // Swap the record files so the descriptors no longer match.
    std::fs::rename(path.join("a.sds"), path.join("tmp.sds")).unwrap();
    std::fs::rename(path.join("b.sds"), path.join("a.sds")).unwrap();
    std::fs::rename(path.join("tmp.sds"), path.join("b.sds")).unwrap();

    match DumpReader::open(&path) {
        Err(SimDumpError::DatasetIo(DatasetIoError::CorruptedDataset { reason, .. })) => {
            assert!(reason.contains("record size"));
        }
        other => panic!("Expected CorruptedDataset, got: {other:?}"),
    }
}

#[test]
fn test_root_signal_named_container_round_trips() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("dump");
    let mut container = Container::open(&path, small_chunks()).unwrap();
    let handle = container
        .add_signal("container", StorageKind::Sync, &[], ElementType::U8)
        .unwrap();
    container.set_attribute("simulator", "xsim").unwrap();
    container.write(handle, 0.0, &[7]).unwrap();
    assert_eq!(container.close().unwrap().total_records(), 1);

    let reader = DumpReader::open(&path).unwrap();
    assert!(reader.is_complete());
    assert_eq!(reader.attributes().unwrap()["simulator"], "xsim");
    assert_eq!(reader.signals().len(), 1);
    let data = reader.read("container").unwrap();
    assert_eq!(data.values::<u8>().unwrap(), vec![7]);
}
