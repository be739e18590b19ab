use hyperorbit_engine::backbuffer::BackBuffer;
use hyperorbit_engine::cpu::{CpuDevice, CpuDeviceConfig};
use hyperorbit_engine::device::{ComputeDevice, Fence};
use hyperorbit_engine::error::EngineError;
use hyperorbit_engine::layout::{WorkCell, WORK_CELL_SIZE};

fn marked(iteration: u32, n: usize) -> Vec<WorkCell> {
    vec![WorkCell { iteration, ..WorkCell::default() }; n]
}

fn device_iterations(dev: &CpuDevice, back: &BackBuffer) -> Vec<u32> {
    back.buffer()
        .chunks()
        .iter()
        .flat_map(|c| dev.chunk_cells(*c).unwrap().iter().map(|cell| cell.iteration))
        .collect()
}

#[test]
fn switching_to_the_active_slot_copies_nothing() {
    let mut dev = CpuDevice::default();
    let mut back = BackBuffer::new(&mut dev, 64, 4).unwrap();
    let fence = back.use_slot(&mut dev, 0, false).unwrap();
    assert_eq!(fence, Fence::SIGNALED);
    assert_eq!(dev.stats().swapped_bytes, 0);
}

#[test]
fn slots_keep_their_contents_across_switches() {
    let mut dev = CpuDevice::new(CpuDeviceConfig {
        max_allocation_bytes: (4 * WORK_CELL_SIZE) as u64,
        ..CpuDeviceConfig::default()
    });
    let mut back = BackBuffer::new(&mut dev, 10, 3).unwrap();
    assert_eq!(back.buffer().chunks().len(), 3);

    // window 0 writes 7 everywhere
    for (chunk, n) in back.buffer().chunks().to_vec().into_iter().zip([4, 4, 2]) {
        dev.swap_chunk(chunk, &mut marked(7, n), true).unwrap();
    }
    let before = dev.stats().swapped_bytes;
    back.use_slot(&mut dev, 2, true).unwrap();
    assert_eq!(back.active(), 2);
    assert!(device_iterations(&dev, &back).iter().all(|i| *i == 0));
    assert_eq!(dev.stats().swapped_bytes - before, 10 * WORK_CELL_SIZE as u64);

    back.use_slot(&mut dev, 1, true).unwrap();
    back.use_slot(&mut dev, 0, true).unwrap();
    assert_eq!(device_iterations(&dev, &back), vec![7; 10]);
}

#[test]
fn unknown_slot_is_rejected() {
    let mut dev = CpuDevice::default();
    let mut back = BackBuffer::new(&mut dev, 8, 2).unwrap();
    let err = back.use_slot(&mut dev, 5, true).unwrap_err();
    assert!(matches!(err, EngineError::UnknownSlot { index: 5, count: 2 }));
}

#[test]
fn removing_the_active_slot_falls_back_to_slot_zero() {
    let mut dev = CpuDevice::default();
    let mut back = BackBuffer::new(&mut dev, 8, 2).unwrap();
    let chunk = back.buffer().chunks()[0];
    dev.swap_chunk(chunk, &mut marked(3, 8), true).unwrap();
    back.use_slot(&mut dev, 1, true).unwrap();
    back.remove_slot(&mut dev).unwrap();
    assert_eq!((back.slot_count(), back.active()), (1, 0));
    assert_eq!(device_iterations(&dev, &back), vec![3; 8]);

    back.add_slot();
    assert_eq!(back.slot_count(), 2);
    back.free(&mut dev);
    assert_eq!(dev.live_chunks(), 0);
}
