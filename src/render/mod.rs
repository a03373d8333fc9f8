mod shaders;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::Mat3;
use log::warn;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::frame::{DrawItem, FramePacket};
use crate::lighting::SkyPhase;
use crate::obj::{unit_cube, Mesh, Vertex};
use crate::scene::MeshSource;
use crate::shadow::SHADOW_RESOLUTION;

/// Largest number of point lights the shader block carries.
pub const MAX_POINT_LIGHTS: usize = 4;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const POSITION_ONLY_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];

fn vertex_layout(attributes: &[wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'_> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

/// GPU renderer executing the two-pass shadow pipeline over the frame
/// packets the orchestrator assembles.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    screen_depth: DepthBuffer,
    shadow_map: ShadowTarget,
    shadow_pipeline: wgpu::RenderPipeline,
    main_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    depth_debug_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    shadow_global_bind_group: wgpu::BindGroup,
    sky_buffer: wgpu::Buffer,
    sky_bind_group: wgpu::BindGroup,
    depth_debug_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    mesh_buffers: HashMap<MeshSource, MeshBuffers>,
    fallback_mesh: MeshBuffers,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window and uploads
    /// the preloaded meshes.
    pub async fn new(window: Arc<Window>, meshes: &HashMap<MeshSource, Mesh>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("showcase-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let screen_depth = DepthBuffer::create(&device, config.width, config.height);
        let shadow_map = ShadowTarget::create(&device);

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });
        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SHADOW_SHADER.into()),
        });
        let sky_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sky-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SKY_SHADER.into()),
        });
        let depth_debug_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth-debug-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::DEPTH_DEBUG_SHADER.into()),
        });

        let uniform_entry = |binding: u32, size: usize| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: Some(std::num::NonZeroU64::new(size as u64).unwrap()),
            },
            count: None,
        };

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[
                uniform_entry(0, std::mem::size_of::<GlobalUniform>()),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        // The shadow pass samples nothing; its global group carries only
        // the uniform so the shadow texture is never bound while it is
        // the pass's depth attachment.
        let shadow_global_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("shadow-global-bind-layout"),
                entries: &[uniform_entry(0, std::mem::size_of::<GlobalUniform>())],
            });

        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<ObjectConstants>())],
        });

        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(std::mem::size_of::<SkyUniform>() as u64)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        });

        let depth_debug_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("depth-debug-bind-layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sky_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sky-uniform"),
            size: std::mem::size_of::<SkyUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: global_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.comparison_sampler),
                },
            ],
        });
        let shadow_global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow-global-bind-group"),
            layout: &shadow_global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });
        let sky_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sky-bind-group"),
            layout: &sky_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: sky_buffer.as_entire_binding(),
            }],
        });
        let depth_debug_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth-debug-bind-group"),
            layout: &depth_debug_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.raw_sampler),
                },
            ],
        });

        let shadow_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("shadow-pipeline-layout"),
                bind_group_layouts: &[&shadow_global_layout, &object_layout],
                push_constant_ranges: &[],
            });
        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow-pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout(&POSITION_ONLY_ATTRIBUTES)],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: ShadowTarget::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview: None,
            cache: None,
        });

        let main_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("main-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });
        let main_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("main-pipeline"),
            layout: Some(&main_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &scene_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout(&VERTEX_ATTRIBUTES)],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &scene_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let sky_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky-pipeline-layout"),
            bind_group_layouts: &[&sky_layout],
            push_constant_ranges: &[],
        });
        let sky_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky-pipeline"),
            layout: Some(&sky_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &sky_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            // The sky never writes depth; scene geometry always wins.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &sky_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let depth_debug_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("depth-debug-pipeline-layout"),
                bind_group_layouts: &[&depth_debug_layout],
                push_constant_ranges: &[],
            });
        let depth_debug_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("depth-debug-pipeline"),
                layout: Some(&depth_debug_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &depth_debug_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &depth_debug_shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        let mut mesh_buffers = HashMap::new();
        for (source, mesh) in meshes {
            let label = match source {
                MeshSource::File(name) => name.as_str(),
                MeshSource::BuiltinCube => "builtin-cube",
            };
            mesh_buffers.insert(source.clone(), MeshBuffers::upload(&device, mesh, label));
        }
        let fallback_mesh = MeshBuffers::upload(&device, &unit_cube(), "fallback-cube");

        let renderer = Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            screen_depth,
            shadow_map,
            shadow_pipeline,
            main_pipeline,
            sky_pipeline,
            depth_debug_pipeline,
            global_buffer,
            global_bind_group,
            shadow_global_bind_group,
            sky_buffer,
            sky_bind_group,
            depth_debug_bind_group,
            object_layout,
            mesh_buffers,
            fallback_mesh,
        };
        renderer.set_sky_phase(SkyPhase::Day);
        Ok(renderer)
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain; the shadow map resolution is fixed.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.screen_depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    pub fn aspect(&self) -> f32 {
        if self.size.height == 0 {
            1.0
        } else {
            self.size.width as f32 / self.size.height as f32
        }
    }

    /// Swaps the sky palette. Called once per day-night boundary crossing,
    /// never every frame.
    pub fn set_sky_phase(&self, phase: SkyPhase) {
        self.queue
            .write_buffer(&self.sky_buffer, 0, bytes_of(&sky_palette(phase)));
    }

    /// Uploads the per-frame global uniform block.
    pub fn update_globals(&self, packet: &FramePacket) {
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&pack_globals(packet)));
    }

    /// Runs the depth pre-pass and the main (or depth-debug) pass for one
    /// frame packet, then presents.
    pub fn render(&mut self, packet: &FramePacket) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        let object_bind_groups: Vec<wgpu::BindGroup> = packet
            .draws
            .iter()
            .map(|draw| {
                let constants = pack_object(draw);
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("object-uniform"),
                        contents: bytes_of(&constants),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    });
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("object-bind-group"),
                    layout: &self.object_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        // Pass 1: scene depth from the light's point of view. Writes the
        // shadow map the main pass reads; ordering within this encoder is
        // the only synchronization the frame needs.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow-pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.shadow_pipeline);
            pass.set_bind_group(0, &self.shadow_global_bind_group, &[]);
            for (draw, bind_group) in packet.draws.iter().zip(&object_bind_groups) {
                if !draw.casts_shadow {
                    continue;
                }
                let mesh = self.lookup_mesh(&draw.mesh);
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        if packet.show_depth_map {
            // Debug view: blit the raw shadow depth instead of shading.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("depth-debug-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.depth_debug_pipeline);
            pass.set_bind_group(0, &self.depth_debug_bind_group, &[]);
            pass.draw(0..3, 0..1);
        } else {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.03,
                            g: 0.03,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.screen_depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Sky first, then opaque geometry, then the light markers
            // (already ordered last in the packet's draw list).
            pass.set_pipeline(&self.sky_pipeline);
            pass.set_bind_group(0, &self.sky_bind_group, &[]);
            pass.draw(0..3, 0..1);

            pass.set_pipeline(&self.main_pipeline);
            pass.set_bind_group(0, &self.global_bind_group, &[]);
            for (draw, bind_group) in packet.draws.iter().zip(&object_bind_groups) {
                let mesh = self.lookup_mesh(&draw.mesh);
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.set_bind_group(1, bind_group, &[]);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn lookup_mesh(&self, source: &MeshSource) -> &MeshBuffers {
        self.mesh_buffers.get(source).unwrap_or_else(|| {
            warn!("mesh {source:?} not uploaded; drawing fallback cube");
            &self.fallback_mesh
        })
    }
}

/// Packs one draw item's per-object constants for the shader's group(1)
/// block.
fn pack_object(draw: &DrawItem) -> ObjectConstants {
    ObjectConstants {
        model: draw.model.to_cols_array_2d(),
        normal: mat3_to_3x4(draw.normal),
        color: draw.color.extend(1.0).into(),
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Packs the frame packet into the shader's global uniform block. Lights
/// beyond [`MAX_POINT_LIGHTS`] are dropped with a warning.
fn pack_globals(packet: &FramePacket) -> GlobalUniform {
    if packet.point_lights.len() > MAX_POINT_LIGHTS {
        warn!(
            "{} point lights exceed the shader block of {MAX_POINT_LIGHTS}; extras ignored",
            packet.point_lights.len()
        );
    }
    let mut point_lights = [GpuPointLight::zeroed(); MAX_POINT_LIGHTS];
    let count = packet.point_lights.len().min(MAX_POINT_LIGHTS);
    for (slot, light) in point_lights.iter_mut().zip(&packet.point_lights) {
        *slot = GpuPointLight {
            position: light.position.extend(1.0).into(),
            color: light.color.extend(1.0).into(),
            attenuation: [light.constant, light.linear, light.quadratic, 0.0],
        };
    }
    GlobalUniform {
        view_proj: (packet.projection * packet.view).to_cols_array_2d(),
        light_space: packet.light_space.to_cols_array_2d(),
        camera_position: packet.camera_position.extend(1.0).into(),
        sun_direction: packet.sun_direction.extend(packet.sun_intensity).into(),
        sun_color: packet.sun_color.extend(count as f32).into(),
        point_lights,
    }
}

fn sky_palette(phase: SkyPhase) -> SkyUniform {
    match phase {
        SkyPhase::Day => SkyUniform {
            horizon: [0.74, 0.82, 0.94, 1.0],
            zenith: [0.32, 0.55, 0.90, 1.0],
        },
        SkyPhase::Night => SkyUniform {
            horizon: [0.07, 0.08, 0.16, 1.0],
            zenith: [0.01, 0.01, 0.05, 1.0],
        },
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn upload(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("screen-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// The depth-only offscreen target the shadow pass renders into and the
/// main pass samples.
struct ShadowTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    comparison_sampler: wgpu::Sampler,
    raw_sampler: wgpu::Sampler,
}

impl ShadowTarget {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn create(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow-map"),
            size: wgpu::Extent3d {
                width: SHADOW_RESOLUTION,
                height: SHADOW_RESOLUTION,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let comparison_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-comparison-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let raw_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow-raw-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            _texture: texture,
            view,
            comparison_sampler,
            raw_sampler,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuPointLight {
    position: [f32; 4],
    color: [f32; 4],
    attenuation: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    light_space: [[f32; 4]; 4],
    camera_position: [f32; 4],
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    point_lights: [GpuPointLight; MAX_POINT_LIGHTS],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model: [[f32; 4]; 4],
    // mat3x4 in the shader: three vec4 columns, fourth lane padding.
    normal: [[f32; 4]; 3],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SkyUniform {
    horizon: [f32; 4],
    zenith: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::assemble_frame;
    use crate::input::Action;
    use crate::scene::SceneState;

    #[test]
    fn packed_light_space_matches_the_packet_exactly() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 1.0);
        let globals = pack_globals(&packet);
        assert_eq!(globals.light_space, packet.light_space.to_cols_array_2d());
    }

    #[test]
    fn packs_the_active_point_light_count() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 1.0);
        let globals = pack_globals(&packet);
        assert_eq!(globals.sun_color[3], state.point_lights.len() as f32);
    }

    #[test]
    fn excess_point_lights_are_truncated() {
        let mut state = SceneState::new();
        let extra = state.point_lights[0];
        state.point_lights.extend([extra; 4]);
        let packet = assemble_frame(&state, 1.0);
        let globals = pack_globals(&packet);
        assert_eq!(globals.sun_color[3], MAX_POINT_LIGHTS as f32);
    }

    #[test]
    fn sun_intensity_rides_in_the_direction_w_component() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 1.0);
        let globals = pack_globals(&packet);
        assert_eq!(globals.sun_direction[3], packet.sun_intensity);
    }

    #[test]
    fn uniform_blocks_match_their_wgsl_sizes() {
        // mat4x4 + mat3x4 + vec4 for the object block; the global block is
        // two mat4x4, three vec4 and four 48-byte point lights.
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 128);
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 368);
        assert_eq!(std::mem::size_of::<SkyUniform>(), 32);
    }

    #[test]
    fn object_constants_carry_the_draw_item_matrices() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 1.0);
        let draw = &packet.draws[0];
        let constants = pack_object(draw);
        assert_eq!(constants.model, draw.model.to_cols_array_2d());
        assert_eq!(constants.color[3], 1.0);
        for (column, expected) in constants.normal.iter().zip(draw.normal.to_cols_array_2d()) {
            assert_eq!(column[..3], expected);
            // The fourth lane of each mat3x4 column is padding.
            assert_eq!(column[3], 0.0);
        }
    }

    #[test]
    fn sky_palettes_differ_per_phase() {
        let day = sky_palette(SkyPhase::Day);
        let night = sky_palette(SkyPhase::Night);
        assert_ne!(day.horizon, night.horizon);
        assert_ne!(day.zenith, night.zenith);
    }

    #[test]
    fn depth_view_packet_still_carries_the_light_space() {
        let mut state = SceneState::new();
        state.apply(Action::ToggleDepthView);
        let packet = assemble_frame(&state, 1.0);
        assert!(packet.show_depth_map);
        let globals = pack_globals(&packet);
        assert_eq!(globals.light_space, packet.light_space.to_cols_array_2d());
    }
}
