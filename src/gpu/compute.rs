//! Spline tessellation using a wgpu compute shader

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use super::shaders::spline_mesh_shader;
use crate::mesh::{DispatchGate, MeshBatch, MeshKernel, MeshVertex, SplineUniforms};

/// Rings handled per workgroup, matches `@workgroup_size` in the shader
const WORKGROUP_SIZE: u32 = 64;

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to map vertex buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("vertex buffer map callback was dropped")]
    MapCallbackDropped,

    #[error(
        "{num_sides} sides x {num_samples} samples does not fit a batch of {num_vertices} vertices"
    )]
    LayoutMismatch {
        num_sides: u32,
        num_samples: u32,
        num_vertices: u32,
    },
}

/// Compute pipeline producing tube vertices on the GPU.
///
/// Buffers are created per dispatch since batch sizes change whenever the
/// highlight set does.
pub struct SplineCompute {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    gate: DispatchGate,
}

impl SplineCompute {
    /// Create a pipeline on the default high-performance adapter
    pub fn new() -> Result<Self, GpuError> {
        let (device, queue) = pollster::block_on(Self::create_device())?;
        Ok(Self::with_device(Arc::new(device), Arc::new(queue)))
    }

    /// Create a pipeline using an existing device and queue
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Spline Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(spline_mesh_shader().into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Spline Mesh Bind Group Layout"),
            entries: &[
                storage(0, true),
                storage(1, true),
                storage(2, true),
                storage(3, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Spline Mesh Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Spline Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            gate: DispatchGate::new(),
        }
    }

    async fn create_device() -> Result<(wgpu::Device, wgpu::Queue), GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let device = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Spline Mesh Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None, // trace path
            )
            .await?;
        Ok(device)
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    /// Run the shader over a batch and read the vertices back
    pub fn dispatch(
        &self,
        batch: &MeshBatch,
        uniforms: &SplineUniforms,
    ) -> Result<Vec<MeshVertex>, GpuError> {
        if !batch.matches_uniforms(uniforms) {
            return Err(GpuError::LayoutMismatch {
                num_sides: uniforms.num_sides,
                num_samples: uniforms.num_samples,
                num_vertices: batch.num_vertices,
            });
        }
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let storage = |label: &str, contents: &[u8]| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage: wgpu::BufferUsages::STORAGE,
                })
        };
        let control_point_buffer = storage(
            "Control Point Buffer",
            bytemuck::cast_slice(&batch.control_points),
        );
        let segment_buffer = storage("Segment Buffer", bytemuck::cast_slice(&batch.segments));
        let spline_buffer = storage("Spline Buffer", bytemuck::cast_slice(&batch.splines));

        let vertex_buffer_size =
            (batch.num_vertices as usize * std::mem::size_of::<MeshVertex>()) as u64;
        let vertex_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Vertex Buffer"),
            size: vertex_buffer_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Spline Uniform Buffer"),
                contents: bytemuck::bytes_of(uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Spline Mesh Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: control_point_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: segment_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: spline_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: vertex_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Staging Buffer"),
            size: vertex_buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let num_rings = batch.segments.len() as u32 * uniforms.num_samples;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Spline Mesh Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Spline Mesh Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(num_rings.div_ceil(WORKGROUP_SIZE).max(1), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&vertex_buffer, 0, &staging_buffer, 0, vertex_buffer_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| GpuError::MapCallbackDropped)??;

        let data = buffer_slice.get_mapped_range();
        let vertices: Vec<MeshVertex> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();

        debug!(
            group = ?batch.group,
            rings = num_rings,
            vertices = vertices.len(),
            "Dispatched spline mesh shader"
        );
        Ok(vertices)
    }
}

impl MeshKernel for SplineCompute {
    fn compute(&self, batch: &MeshBatch, uniforms: &SplineUniforms) -> Option<Vec<MeshVertex>> {
        let Some(_permit) = self.gate.try_acquire() else {
            debug!(group = ?batch.group, "GPU kernel busy or shut down, request dropped");
            return None;
        };
        match self.dispatch(batch, uniforms) {
            Ok(vertices) => Some(vertices),
            Err(e) => {
                warn!(error = %e, group = ?batch.group, "Spline mesh dispatch failed");
                None
            }
        }
    }
}

impl Drop for SplineCompute {
    fn drop(&mut self) {
        self.gate.shut_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::CpuKernel;
    use crate::scene::GraphScene;
    use crate::test_graphs;

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_gpu_matches_cpu_kernel() {
        let mut scene = GraphScene::new(test_graphs::clustered_graph(), Default::default()).unwrap();
        scene.update_treemap_layout();
        scene.setup_edge_meshes();

        let gpu = SplineCompute::new().unwrap();
        let cpu = CpuKernel::new();
        let uniforms = scene.uniforms();
        let batch = scene.batch(crate::bundling::RenderGroup::Default);

        let expected = cpu.compute(batch, &uniforms).unwrap();
        let actual = gpu.compute(batch, &uniforms).unwrap();
        assert_eq!(expected.len(), actual.len());
        for (a, b) in expected.iter().zip(&actual) {
            for axis in 0..3 {
                assert!((a.position[axis] - b.position[axis]).abs() < 1e-2);
            }
        }
    }

    #[test]
    fn test_layout_mismatch_message() {
        let err = GpuError::LayoutMismatch {
            num_sides: 4,
            num_samples: 9,
            num_vertices: 96,
        };
        assert_eq!(
            err.to_string(),
            "4 sides x 9 samples does not fit a batch of 96 vertices"
        );
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_rejects_mismatched_uniforms() {
        let mut scene = GraphScene::new(test_graphs::clustered_graph(), Default::default()).unwrap();
        scene.update_treemap_layout();
        scene.setup_edge_meshes();

        let gpu = SplineCompute::new().unwrap();
        let uniforms = SplineUniforms {
            num_samples: scene.uniforms().num_samples + 1,
            ..scene.uniforms()
        };
        let batch = scene.batch(crate::bundling::RenderGroup::Default);
        let err = gpu.dispatch(batch, &uniforms).unwrap_err();
        assert!(matches!(err, GpuError::LayoutMismatch { .. }));
        assert!(gpu.compute(batch, &uniforms).is_none());
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_empty_batch() {
        let gpu = SplineCompute::new().unwrap();
        let vertices = gpu
            .compute(&MeshBatch::default(), &SplineUniforms::default())
            .unwrap();
        assert!(vertices.is_empty());
    }
}
