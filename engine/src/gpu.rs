//! wgpu compute backend.
//!
//! One bind group layout serves every entry point: the uniform block, the chunk table, six
//! chunk slots (unused slots bind a one-cell placeholder) and the output storage texture.
//! Device-side failures are caught with error scopes and surfaced as [`DeviceError`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::mpsc;

use tracing::{debug, info, trace};
use wgpu::util::DeviceExt;
use wgpu::{Adapter, Device, Instance, Queue};

use crate::codegen::{
    ProgramSource, BINDING_CHUNK_TABLE, BINDING_FIRST_CHUNK, BINDING_OUTPUT, BINDING_PARAMS,
};
use crate::device::{
    Arena, BuildFailure, BuildOutput, ChunkId, ComputeDevice, Fence, Launch, ProgramId, SurfaceId,
    TableId,
};
use crate::error::DeviceError;
use crate::grid::Extent;
use crate::layout::{KernelUniforms, WorkCell, MAX_CHUNK_BINDINGS, WORK_CELL_SIZE};

/// Adapter, device and queue.
pub struct GpuContext {
    /// Instance used to create adapters
    pub instance: Instance,
    /// Selected adapter
    pub adapter: Adapter,
    /// Logical device
    pub device: Device,
    /// Submission queue
    pub queue: Queue,
}

impl GpuContext {
    /// Create a context on a high-performance adapter with the adapter's own limits.
    pub async fn new() -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| DeviceError::Backend("no suitable GPU adapter".to_string()))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("hyperorbit-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await
            .map_err(|e| DeviceError::Backend(format!("request device: {e}")))?;
        Ok(Self { instance, adapter, device, queue })
    }
}

struct Program {
    pipelines: HashMap<String, wgpu::ComputePipeline>,
    workgroup: [u32; 2],
}

struct Chunk {
    buffer: wgpu::Buffer,
    cells: usize,
}

struct ChunkTable {
    buffer: wgpu::Buffer,
    chunks: Vec<ChunkId>,
}

struct Surface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent,
    acquired: bool,
}

/// GPU implementation of [`ComputeDevice`].
pub struct WgpuDevice {
    ctx: GpuContext,
    name: String,
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniforms: wgpu::Buffer,
    placeholder: wgpu::Buffer,
    programs: Arena<Program>,
    chunks: Arena<Chunk>,
    tables: Arena<ChunkTable>,
    surfaces: Arena<Surface>,
    submissions: HashMap<u64, wgpu::SubmissionIndex>,
    next_serial: u64,
}

fn extent3d(extent: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: extent.depth,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl WgpuDevice {
    /// Open the default adapter.
    pub fn new() -> Result<Self, DeviceError> {
        let ctx = pollster::block_on(GpuContext::new())?;
        Ok(Self::from_context(ctx))
    }

    /// Wrap an existing context.
    pub fn from_context(ctx: GpuContext) -> Self {
        let device = &ctx.device;
        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: BINDING_PARAMS,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            storage_entry(BINDING_CHUNK_TABLE, true),
        ];
        for k in 0..MAX_CHUNK_BINDINGS as u32 {
            entries.push(storage_entry(BINDING_FIRST_CHUNK + k, false));
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: BINDING_OUTPUT,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba8Unorm,
                view_dimension: wgpu::TextureViewDimension::D3,
            },
            count: None,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel-bgl"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel-pl"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel-params"),
            size: std::mem::size_of::<KernelUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let placeholder = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chunk-placeholder"),
            size: WORK_CELL_SIZE as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let name = ctx.adapter.get_info().name;
        info!(adapter = %name, "opened GPU device");
        Self {
            ctx,
            name,
            layout,
            pipeline_layout,
            uniforms,
            placeholder,
            programs: Arena::default(),
            chunks: Arena::default(),
            tables: Arena::default(),
            surfaces: Arena::default(),
            submissions: HashMap::new(),
            next_serial: 0,
        }
    }

    /// Underlying context.
    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    fn scoped<T>(
        &self,
        filter: wgpu::ErrorFilter,
        f: impl FnOnce(&Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        self.ctx.device.push_error_scope(filter);
        let value = f(&self.ctx.device);
        let error = pollster::block_on(self.ctx.device.pop_error_scope());
        (value, error)
    }

    fn submit(&mut self, commands: Option<wgpu::CommandBuffer>, wait: bool) -> Fence {
        let index = self.ctx.queue.submit(commands);
        if wait {
            let _ = self.ctx.device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
            return Fence::SIGNALED;
        }
        let serial = self.next_serial;
        self.next_serial += 1;
        self.submissions.insert(serial, index);
        Fence::pending(serial)
    }

    fn read_mapped(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>, DeviceError> {
        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.ctx.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| DeviceError::Backend(format!("map callback dropped: {e}")))?
            .map_err(|e| DeviceError::Backend(format!("map failed: {e}")))?;
        let bytes = slice.get_mapped_range().to_vec();
        buffer.unmap();
        Ok(bytes)
    }

    fn staging(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn surface(&self, surface: SurfaceId) -> Result<&Surface, DeviceError> {
        self.surfaces.get(surface.0).ok_or(DeviceError::InvalidHandle(SurfaceId::KIND))
    }

    fn surface_mut(&mut self, surface: SurfaceId) -> Result<&mut Surface, DeviceError> {
        self.surfaces.get_mut(surface.0).ok_or(DeviceError::InvalidHandle(SurfaceId::KIND))
    }
}

impl ComputeDevice for WgpuDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn max_allocation_bytes(&self) -> u64 {
        let limits = self.ctx.device.limits();
        limits.max_buffer_size.min(u64::from(limits.max_storage_buffer_binding_size))
    }

    fn max_chunks(&self) -> usize {
        MAX_CHUNK_BINDINGS
    }

    fn build_program(&mut self, source: &ProgramSource) -> Result<BuildOutput, BuildFailure> {
        let (pipelines, error) = self.scoped(wgpu::ErrorFilter::Validation, |device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("hyperorbit-kernels"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.text.as_str())),
            });
            source
                .entry_points
                .iter()
                .map(|entry| {
                    let pipeline =
                        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(entry.name.as_str()),
                            layout: Some(&self.pipeline_layout),
                            module: &module,
                            entry_point: &entry.name,
                        });
                    (entry.name.clone(), pipeline)
                })
                .collect::<HashMap<_, _>>()
        });
        if let Some(error) = error {
            return Err(BuildFailure { log: error.to_string() });
        }
        let workgroup = source.config.workgroup;
        let program = ProgramId(self.programs.insert(Program { pipelines, workgroup }));
        debug!(%program, entry_points = source.entry_points.len(), "built GPU program");
        Ok(BuildOutput { program, log: String::new() })
    }

    fn release_program(&mut self, program: ProgramId) {
        self.programs.remove(program.0);
    }

    fn allocate_chunk(&mut self, items: usize) -> Result<ChunkId, DeviceError> {
        let bytes = (items * WORK_CELL_SIZE) as u64;
        let limit = self.max_allocation_bytes();
        if bytes > limit {
            return Err(DeviceError::TooLarge { bytes, limit });
        }
        let (buffer, error) = self.scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("work-chunk"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if error.is_some() {
            buffer.destroy();
            return Err(DeviceError::OutOfMemory { bytes });
        }
        Ok(ChunkId(self.chunks.insert(Chunk { buffer, cells: items })))
    }

    fn free_chunk(&mut self, chunk: ChunkId) {
        if let Some(chunk) = self.chunks.remove(chunk.0) {
            chunk.buffer.destroy();
        }
    }

    fn create_chunk_table(
        &mut self,
        chunks: &[ChunkId],
        capacity: usize,
        total: usize,
    ) -> Result<TableId, DeviceError> {
        if chunks.len() > MAX_CHUNK_BINDINGS || chunks.iter().any(|c| self.chunks.get(c.0).is_none())
        {
            return Err(DeviceError::InvalidHandle(ChunkId::KIND));
        }
        let header = [capacity as u32, chunks.len() as u32, total as u32, 0];
        let buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("chunk-table"),
            contents: bytemuck::cast_slice(&header),
            usage: wgpu::BufferUsages::STORAGE,
        });
        Ok(TableId(self.tables.insert(ChunkTable { buffer, chunks: chunks.to_vec() })))
    }

    fn free_chunk_table(&mut self, table: TableId) {
        if let Some(table) = self.tables.remove(table.0) {
            table.buffer.destroy();
        }
    }

    fn swap_chunk(
        &mut self,
        chunk: ChunkId,
        host: &mut [WorkCell],
        wait: bool,
    ) -> Result<Fence, DeviceError> {
        let entry = self.chunks.get(chunk.0).ok_or(DeviceError::InvalidHandle(ChunkId::KIND))?;
        let size = (entry.cells * WORK_CELL_SIZE) as u64;
        if entry.cells != host.len() {
            return Err(DeviceError::SizeMismatch {
                device: size,
                host: (host.len() * WORK_CELL_SIZE) as u64,
            });
        }
        let staging = self.staging("swap-staging", size);
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("swap") });
        encoder.copy_buffer_to_buffer(&entry.buffer, 0, &staging, 0, size);
        self.ctx.queue.submit(Some(encoder.finish()));
        // queued writes land at the next submit, after the copy above
        self.ctx.queue.write_buffer(&entry.buffer, 0, bytemuck::cast_slice(host));
        let fence = self.submit(None, wait);
        let previous = self.read_mapped(&staging)?;
        bytemuck::cast_slice_mut::<WorkCell, u8>(host).copy_from_slice(&previous);
        staging.destroy();
        trace!(%chunk, bytes = size, "swapped chunk");
        Ok(fence)
    }

    fn create_surface(&mut self, extent: Extent) -> Result<SurfaceId, DeviceError> {
        let (texture, error) = self.scoped(wgpu::ErrorFilter::Validation, |device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("kernel-output"),
                size: extent3d(extent),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        });
        if let Some(error) = error {
            return Err(DeviceError::Backend(error.to_string()));
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(SurfaceId(self.surfaces.insert(Surface { texture, view, extent, acquired: false })))
    }

    fn free_surface(&mut self, surface: SurfaceId) {
        if let Some(surface) = self.surfaces.remove(surface.0) {
            surface.texture.destroy();
        }
    }

    fn clear_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError> {
        let s = self.surface(surface)?;
        let extent = s.extent;
        let zeros = vec![0u8; extent.cells() * 4];
        self.ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &s.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &zeros,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * extent.width),
                rows_per_image: Some(extent.height),
            },
            extent3d(extent),
        );
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
        let s = self.surface(surface)?;
        let extent = s.extent;
        let row = 4 * extent.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = row.div_ceil(align) * align;
        let rows = extent.height * extent.depth;
        let staging = self.staging("surface-readback", u64::from(padded) * u64::from(rows));
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &s.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(extent.height),
                },
            },
            extent3d(extent),
        );
        self.submit(Some(encoder.finish()), true);
        let bytes = self.read_mapped(&staging)?;
        staging.destroy();
        let mut texels = Vec::with_capacity(extent.cells());
        for r in 0..rows as usize {
            let start = r * padded as usize;
            let line = &bytes[start..start + row as usize];
            texels.extend(line.chunks_exact(4).map(|t| [t[0], t[1], t[2], t[3]]));
        }
        Ok(texels)
    }

    fn dispatch(&mut self, launch: &Launch<'_>, wait: bool) -> Result<Fence, DeviceError> {
        let program =
            self.programs.get(launch.program.0).ok_or(DeviceError::InvalidHandle(ProgramId::KIND))?;
        let pipeline = program.pipelines.get(launch.entry_point).ok_or_else(|| {
            DeviceError::Backend(format!("program has no entry point `{}`", launch.entry_point))
        })?;
        let table =
            self.tables.get(launch.table.0).ok_or(DeviceError::InvalidHandle(TableId::KIND))?;
        let surface = self.surface(launch.output)?;
        if !surface.acquired {
            return Err(DeviceError::NotAcquired(launch.output.0));
        }
        let mut chunk_buffers = Vec::with_capacity(MAX_CHUNK_BINDINGS);
        for id in &table.chunks {
            let chunk = self.chunks.get(id.0).ok_or(DeviceError::InvalidHandle(ChunkId::KIND))?;
            chunk_buffers.push(&chunk.buffer);
        }
        while chunk_buffers.len() < MAX_CHUNK_BINDINGS {
            chunk_buffers.push(&self.placeholder);
        }

        self.ctx.queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&launch.uniforms));
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: BINDING_PARAMS,
                resource: self.uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: BINDING_CHUNK_TABLE,
                resource: table.buffer.as_entire_binding(),
            },
        ];
        for (k, buffer) in chunk_buffers.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: BINDING_FIRST_CHUNK + k as u32,
                resource: buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: BINDING_OUTPUT,
            resource: wgpu::BindingResource::TextureView(&surface.view),
        });

        let [wx, wy] = program.workgroup;
        let groups = [
            launch.extent.width.div_ceil(wx),
            launch.extent.height.div_ceil(wy),
            launch.extent.depth,
        ];
        let (commands, error) = self.scoped(wgpu::ErrorFilter::Validation, |device| {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kernel-bg"),
                layout: &self.layout,
                entries: &entries,
            });
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(launch.entry_point),
            });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(launch.entry_point),
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
            }
            encoder.finish()
        });
        if let Some(error) = error {
            return Err(DeviceError::Backend(error.to_string()));
        }
        let fence = self.submit(Some(commands), wait);
        trace!(kernel = launch.entry_point, ?groups, "GPU dispatch");
        Ok(fence)
    }

    fn wait(&mut self, fences: &[Fence]) -> Result<(), DeviceError> {
        for fence in fences {
            if let Some(index) = fence.serial().and_then(|s| self.submissions.remove(&s)) {
                let _ = self.ctx.device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DeviceError> {
        let _ = self.ctx.device.poll(wgpu::Maintain::Wait);
        self.submissions.clear();
        Ok(())
    }
}
