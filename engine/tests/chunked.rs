use hyperorbit_engine::chunked::{ChunkLayout, ChunkedBuffer};
use hyperorbit_engine::cpu::{CpuDevice, CpuDeviceConfig};
use hyperorbit_engine::error::{AllocError, DeviceError};
use hyperorbit_engine::layout::WORK_CELL_SIZE;

fn device(max_cells: usize, budget_cells: Option<usize>) -> CpuDevice {
    CpuDevice::new(CpuDeviceConfig {
        max_allocation_bytes: (max_cells * WORK_CELL_SIZE) as u64,
        memory_budget_bytes: budget_cells.map(|c| (c * WORK_CELL_SIZE) as u64),
        ..CpuDeviceConfig::default()
    })
}

#[test]
fn two_and_a_half_million_cells_split_in_three() {
    let layout = ChunkLayout::new(2_500_000, 1_000_000 * WORK_CELL_SIZE as u64, WORK_CELL_SIZE)
        .unwrap();
    assert_eq!(layout.count, 3);
    let lens: Vec<usize> = (0..layout.count).map(|i| layout.chunk_len(i)).collect();
    assert_eq!(lens, [1_000_000, 1_000_000, 500_000]);
    assert_eq!(layout.index_of(0), (0, 0));
    assert_eq!(layout.index_of(999_999), (0, 999_999));
    assert_eq!(layout.index_of(1_000_000), (1, 0));
    assert_eq!(layout.index_of(2_499_999), (2, 499_999));
}

#[test]
fn every_cell_lands_in_exactly_one_chunk_slot() {
    let mut dev = device(1_000, None);
    let buffer = ChunkedBuffer::allocate(&mut dev, 2_500).unwrap();
    let layout = buffer.layout().unwrap();
    let lens: Vec<usize> =
        buffer.chunks().iter().map(|c| dev.chunk_cells(*c).unwrap().len()).collect();
    assert_eq!(lens, [1_000, 1_000, 500]);

    let mut seen: Vec<Vec<bool>> = lens.iter().map(|&n| vec![false; n]).collect();
    for flat in 0..2_500 {
        let (chunk, offset) = layout.index_of(flat);
        assert!(!seen[chunk][offset], "cell {flat} aliases another");
        seen[chunk][offset] = true;
    }
    assert!(seen.iter().flatten().all(|s| *s));
    assert!(buffer.table().is_some());
}

#[test]
fn failed_chunk_rolls_back_earlier_allocations() {
    let mut dev = device(1_000, Some(2_200));
    let err = ChunkedBuffer::allocate(&mut dev, 2_500).unwrap_err();
    match err {
        AllocError::Chunk { index, count, source, .. } => {
            assert_eq!((index, count), (2, 3));
            assert!(matches!(source, DeviceError::OutOfMemory { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dev.live_chunks(), 0);
    // the budget is intact: a smaller buffer still fits
    assert!(ChunkedBuffer::allocate(&mut dev, 2_000).is_ok());
}

#[test]
fn too_many_chunks_for_the_bindings() {
    let mut dev = CpuDevice::new(CpuDeviceConfig {
        max_allocation_bytes: (10 * WORK_CELL_SIZE) as u64,
        memory_budget_bytes: None,
        max_chunks: 2,
    });
    let err = ChunkedBuffer::allocate(&mut dev, 25).unwrap_err();
    assert!(matches!(err, AllocError::TooManyChunks { needed: 3, max: 2 }));
    assert_eq!(dev.live_chunks(), 0);
}

#[test]
fn resize_and_free_release_everything() {
    let mut dev = device(100, None);
    let mut buffer = ChunkedBuffer::allocate(&mut dev, 250).unwrap();
    assert_eq!(dev.live_chunks(), 3);
    buffer.resize(&mut dev, 50).unwrap();
    assert_eq!(dev.live_chunks(), 1);
    assert_eq!(buffer.items(), 50);
    buffer.free(&mut dev);
    assert_eq!(dev.live_chunks(), 0);
    assert!(buffer.is_empty());
    assert_eq!(buffer.layout(), None);
}
