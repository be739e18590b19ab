//! Host compute backend.
//!
//! Executes kernels synchronously with [`crate::reference::Sweep`], so every fence it hands
//! out is already signaled. Resource limits are configurable to reproduce device memory
//! pressure in tests.

use tracing::{debug, trace};

use crate::codegen::ProgramSource;
use crate::device::{
    Arena, BuildFailure, BuildOutput, ChunkId, ComputeDevice, Fence, Launch, ProgramId, SurfaceId,
    TableId,
};
use crate::error::DeviceError;
use crate::grid::Extent;
use crate::layout::{WorkCell, MAX_CHUNK_BINDINGS, WORK_CELL_SIZE};
use crate::reference::Sweep;

/// Limits of a [`CpuDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuDeviceConfig {
    /// Largest single chunk, in bytes
    pub max_allocation_bytes: u64,
    /// Total chunk memory; `None` is unlimited
    pub memory_budget_bytes: Option<u64>,
    /// Chunks one kernel can bind
    pub max_chunks: usize,
}

impl Default for CpuDeviceConfig {
    fn default() -> Self {
        Self {
            max_allocation_bytes: 128 << 20,
            memory_budget_bytes: None,
            max_chunks: MAX_CHUNK_BINDINGS,
        }
    }
}

/// Counters of device traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuStats {
    /// Kernel dispatches executed
    pub dispatches: u64,
    /// Bytes exchanged by chunk swaps
    pub swapped_bytes: u64,
    /// Chunk allocations that succeeded
    pub allocations: u64,
    /// Program builds attempted
    pub builds: u64,
}

struct Surface {
    extent: Extent,
    texels: Vec<[u8; 4]>,
    acquired: bool,
}

struct ChunkTable {
    chunks: Vec<ChunkId>,
    capacity: usize,
    total: usize,
}

/// Host implementation of [`ComputeDevice`].
pub struct CpuDevice {
    config: CpuDeviceConfig,
    programs: Arena<ProgramSource>,
    chunks: Arena<Vec<WorkCell>>,
    tables: Arena<ChunkTable>,
    surfaces: Arena<Surface>,
    allocated_bytes: u64,
    stats: CpuStats,
    fail_next_build: Option<String>,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(CpuDeviceConfig::default())
    }
}

impl CpuDevice {
    /// Device with the given limits.
    pub fn new(config: CpuDeviceConfig) -> Self {
        Self {
            config,
            programs: Arena::default(),
            chunks: Arena::default(),
            tables: Arena::default(),
            surfaces: Arena::default(),
            allocated_bytes: 0,
            stats: CpuStats::default(),
            fail_next_build: None,
        }
    }

    /// Traffic counters.
    pub fn stats(&self) -> CpuStats {
        self.stats
    }

    /// Chunks currently allocated.
    pub fn live_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Contents of a chunk.
    pub fn chunk_cells(&self, chunk: ChunkId) -> Option<&[WorkCell]> {
        self.chunks.get(chunk.0).map(Vec::as_slice)
    }

    /// Contents of a surface.
    pub fn surface_texels(&self, surface: SurfaceId) -> Option<&[[u8; 4]]> {
        self.surfaces.get(surface.0).map(|s| s.texels.as_slice())
    }

    /// Reject the next program build with `log` as diagnostics.
    pub fn fail_next_build(&mut self, log: impl Into<String>) {
        self.fail_next_build = Some(log.into());
    }

    fn surface_mut(&mut self, surface: SurfaceId) -> Result<&mut Surface, DeviceError> {
        self.surfaces.get_mut(surface.0).ok_or(DeviceError::InvalidHandle(SurfaceId::KIND))
    }
}

impl ComputeDevice for CpuDevice {
    fn name(&self) -> String {
        "host reference".to_string()
    }

    fn is_gpu(&self) -> bool {
        false
    }

    fn max_allocation_bytes(&self) -> u64 {
        self.config.max_allocation_bytes
    }

    fn max_chunks(&self) -> usize {
        self.config.max_chunks
    }

    fn build_program(&mut self, source: &ProgramSource) -> Result<BuildOutput, BuildFailure> {
        self.stats.builds += 1;
        if let Some(log) = self.fail_next_build.take() {
            return Err(BuildFailure { log });
        }
        if source.entry_points.is_empty() {
            return Err(BuildFailure { log: "program has no entry points".to_string() });
        }
        let program = ProgramId(self.programs.insert(source.clone()));
        debug!(%program, entry_points = source.entry_points.len(), "built host program");
        Ok(BuildOutput { program, log: String::new() })
    }

    fn release_program(&mut self, program: ProgramId) {
        self.programs.remove(program.0);
    }

    fn allocate_chunk(&mut self, items: usize) -> Result<ChunkId, DeviceError> {
        let bytes = (items * WORK_CELL_SIZE) as u64;
        if bytes > self.config.max_allocation_bytes {
            return Err(DeviceError::TooLarge { bytes, limit: self.config.max_allocation_bytes });
        }
        if let Some(budget) = self.config.memory_budget_bytes {
            if self.allocated_bytes + bytes > budget {
                return Err(DeviceError::OutOfMemory { bytes });
            }
        }
        self.allocated_bytes += bytes;
        self.stats.allocations += 1;
        Ok(ChunkId(self.chunks.insert(vec![WorkCell::default(); items])))
    }

    fn free_chunk(&mut self, chunk: ChunkId) {
        if let Some(cells) = self.chunks.remove(chunk.0) {
            self.allocated_bytes -= (cells.len() * WORK_CELL_SIZE) as u64;
        }
    }

    fn create_chunk_table(
        &mut self,
        chunks: &[ChunkId],
        capacity: usize,
        total: usize,
    ) -> Result<TableId, DeviceError> {
        if chunks.iter().any(|c| self.chunks.get(c.0).is_none()) {
            return Err(DeviceError::InvalidHandle(ChunkId::KIND));
        }
        let table = ChunkTable { chunks: chunks.to_vec(), capacity, total };
        Ok(TableId(self.tables.insert(table)))
    }

    fn free_chunk_table(&mut self, table: TableId) {
        self.tables.remove(table.0);
    }

    fn swap_chunk(
        &mut self,
        chunk: ChunkId,
        host: &mut [WorkCell],
        _wait: bool,
    ) -> Result<Fence, DeviceError> {
        let cells =
            self.chunks.get_mut(chunk.0).ok_or(DeviceError::InvalidHandle(ChunkId::KIND))?;
        if cells.len() != host.len() {
            return Err(DeviceError::SizeMismatch {
                device: (cells.len() * WORK_CELL_SIZE) as u64,
                host: (host.len() * WORK_CELL_SIZE) as u64,
            });
        }
        cells.swap_with_slice(host);
        self.stats.swapped_bytes += (host.len() * WORK_CELL_SIZE) as u64;
        trace!(%chunk, cells = host.len(), "swapped chunk");
        Ok(Fence::SIGNALED)
    }

    fn create_surface(&mut self, extent: Extent) -> Result<SurfaceId, DeviceError> {
        let texels = vec![[0u8; 4]; extent.cells()];
        Ok(SurfaceId(self.surfaces.insert(Surface { extent, texels, acquired: false })))
    }

    fn free_surface(&mut self, surface: SurfaceId) {
        self.surfaces.remove(surface.0);
    }

    fn clear_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError> {
        self.surface_mut(surface)?.texels.fill([0; 4]);
        Ok(())
    }

    fn acquire_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError> {
        let s = self.surface_mut(surface)?;
        if s.acquired {
            return Err(DeviceError::AlreadyAcquired(surface.0));
        }
        s.acquired = true;
        Ok(())
    }

    fn release_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError> {
        let s = self.surface_mut(surface)?;
        if !s.acquired {
            return Err(DeviceError::NotAcquired(surface.0));
        }
        s.acquired = false;
        Ok(())
    }

    fn read_surface(&mut self, surface: SurfaceId) -> Result<Vec<[u8; 4]>, DeviceError> {
        Ok(self.surface_mut(surface)?.texels.clone())
    }

    fn dispatch(&mut self, launch: &Launch<'_>, _wait: bool) -> Result<Fence, DeviceError> {
        let program =
            self.programs.get(launch.program.0).ok_or(DeviceError::InvalidHandle(ProgramId::KIND))?;
        if program.entry_point(launch.variant).map(|e| e.name.as_str()) != Some(launch.entry_point) {
            return Err(DeviceError::Backend(format!(
                "program has no entry point `{}`",
                launch.entry_point
            )));
        }
        let config = program.config;
        let table =
            self.tables.get(launch.table.0).ok_or(DeviceError::InvalidHandle(TableId::KIND))?;
        let cells = launch.extent.cells();
        if table.total < cells {
            return Err(DeviceError::SizeMismatch {
                device: (table.total * WORK_CELL_SIZE) as u64,
                host: (cells * WORK_CELL_SIZE) as u64,
            });
        }
        let (ids, capacity) = (table.chunks.clone(), table.capacity);

        let surface = self
            .surfaces
            .get_mut(launch.output.0)
            .ok_or(DeviceError::InvalidHandle(SurfaceId::KIND))?;
        if !surface.acquired {
            return Err(DeviceError::NotAcquired(launch.output.0));
        }
        if surface.extent != launch.extent {
            return Err(DeviceError::SizeMismatch {
                device: surface.extent.cells() as u64 * 4,
                host: cells as u64 * 4,
            });
        }

        let mut chunks = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.chunks.get_mut(id.0) {
                Some(cells) => chunks.push(std::mem::take(cells)),
                None => {
                    // put back what was already taken
                    for (id, cells) in ids.iter().zip(chunks) {
                        if let Some(slot) = self.chunks.get_mut(id.0) {
                            *slot = cells;
                        }
                    }
                    return Err(DeviceError::InvalidHandle(ChunkId::KIND));
                }
            }
        }

        Sweep {
            variant: launch.variant,
            uniforms: &launch.uniforms,
            config: &config,
            chunks: &mut chunks,
            capacity,
            texels: &mut surface.texels,
        }
        .run();

        for (id, cells) in ids.iter().zip(chunks) {
            if let Some(slot) = self.chunks.get_mut(id.0) {
                *slot = cells;
            }
        }
        self.stats.dispatches += 1;
        trace!(kernel = launch.entry_point, extent = %launch.extent, "host dispatch");
        Ok(Fence::SIGNALED)
    }

    fn wait(&mut self, _fences: &[Fence]) -> Result<(), DeviceError> {
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_limits_allocations() {
        let mut device = CpuDevice::new(CpuDeviceConfig {
            max_allocation_bytes: 10 * WORK_CELL_SIZE as u64,
            memory_budget_bytes: Some(15 * WORK_CELL_SIZE as u64),
            ..CpuDeviceConfig::default()
        });
        assert!(matches!(device.allocate_chunk(11), Err(DeviceError::TooLarge { .. })));
        let a = device.allocate_chunk(10).unwrap();
        assert!(matches!(device.allocate_chunk(10), Err(DeviceError::OutOfMemory { .. })));
        device.free_chunk(a);
        assert!(device.allocate_chunk(10).is_ok());
    }

    #[test]
    fn surfaces_track_acquisition() {
        let mut device = CpuDevice::default();
        let s = device.create_surface(Extent::new(2, 2, 1)).unwrap();
        assert_eq!(device.release_surface(s), Err(DeviceError::NotAcquired(s.0)));
        device.acquire_surface(s).unwrap();
        assert_eq!(device.acquire_surface(s), Err(DeviceError::AlreadyAcquired(s.0)));
        device.release_surface(s).unwrap();
        assert_eq!(device.read_surface(s).unwrap(), vec![[0; 4]; 4]);
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut device = CpuDevice::default();
        let chunk = device.allocate_chunk(3).unwrap();
        let mut host = vec![WorkCell { iteration: 7, ..WorkCell::default() }; 3];
        device.swap_chunk(chunk, &mut host, true).unwrap();
        assert!(host.iter().all(|c| c.iteration == 0));
        assert!(device.chunk_cells(chunk).unwrap().iter().all(|c| c.iteration == 7));
        let mut short = vec![WorkCell::default(); 2];
        assert!(matches!(
            device.swap_chunk(chunk, &mut short, true),
            Err(DeviceError::SizeMismatch { .. })
        ));
    }
}
