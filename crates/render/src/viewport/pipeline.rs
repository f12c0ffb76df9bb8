use std::borrow::Cow;

use egui_wgpu::wgpu::util::DeviceExt as _;

use crate::mesh_cache::{GpuMeshCache, MeshVertex, MESH_VERTEX_ATTRIBUTES};

pub(super) const DEPTH_FORMAT: egui_wgpu::wgpu::TextureFormat =
    egui_wgpu::wgpu::TextureFormat::Depth24Plus;

const INITIAL_DRAW_CAPACITY: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct Globals {
    pub(super) view_proj: [[f32; 4]; 4],
    pub(super) light_dir: [f32; 3],
    pub(super) _pad0: f32,
    pub(super) eye: [f32; 3],
    pub(super) _pad1: f32,
}

/// Per-draw block bound at a dynamic offset, one slot per instance.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct DrawUniform {
    pub(super) model: [[f32; 4]; 4],
    pub(super) color: [f32; 4],
}

pub(super) struct PipelineState {
    pub(super) mesh_pipeline: egui_wgpu::wgpu::RenderPipeline,
    pub(super) wire_pipeline: egui_wgpu::wgpu::RenderPipeline,
    pub(super) blit_pipeline: egui_wgpu::wgpu::RenderPipeline,
    pub(super) blit_bind_group: egui_wgpu::wgpu::BindGroup,
    pub(super) blit_bind_group_layout: egui_wgpu::wgpu::BindGroupLayout,
    pub(super) blit_sampler: egui_wgpu::wgpu::Sampler,
    pub(super) offscreen_view: egui_wgpu::wgpu::TextureView,
    pub(super) depth_view: egui_wgpu::wgpu::TextureView,
    pub(super) offscreen_size: [u32; 2],
    pub(super) globals_buffer: egui_wgpu::wgpu::Buffer,
    pub(super) globals_bind_group: egui_wgpu::wgpu::BindGroup,
    pub(super) draw_layout: egui_wgpu::wgpu::BindGroupLayout,
    pub(super) draw_buffer: egui_wgpu::wgpu::Buffer,
    pub(super) draw_bind_group: egui_wgpu::wgpu::BindGroup,
    pub(super) draw_capacity: u32,
    pub(super) draw_stride: u64,
    pub(super) mesh_cache: GpuMeshCache,
}

impl PipelineState {
    pub(super) fn new(
        device: &egui_wgpu::wgpu::Device,
        target_format: egui_wgpu::wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(egui_wgpu::wgpu::ShaderModuleDescriptor {
            label: Some("neurotess_viewport_shader"),
            source: egui_wgpu::wgpu::ShaderSource::Wgsl(Cow::Borrowed(
                r#"
struct Globals {
    view_proj: mat4x4<f32>,
    light_dir: vec3<f32>,
    _pad0: f32,
    eye: vec3<f32>,
    _pad1: f32,
};

struct Draw {
    model: mat4x4<f32>,
    color: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> draw: Draw;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) world_pos: vec3<f32>,
};

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = draw.model * vec4<f32>(input.position, 1.0);
    out.world_pos = world.xyz;
    out.normal = (draw.model * vec4<f32>(input.normal, 0.0)).xyz;
    out.position = globals.view_proj * world;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(input.normal);
    let light_dir = normalize(globals.light_dir);
    let ndotl = max(dot(n, light_dir), 0.0);
    let view_dir = normalize(globals.eye - input.world_pos);
    let half_dir = normalize(light_dir + view_dir);
    let spec = pow(max(dot(n, half_dir), 0.0), 32.0);
    let color = draw.color.rgb * (0.25 + 0.75 * ndotl) + vec3<f32>(0.9) * spec * 0.15;
    return vec4<f32>(color, 1.0);
}

@fragment
fn fs_wire(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(draw.color.rgb, 1.0);
}
"#,
            )),
        });

        let globals_buffer =
            device.create_buffer_init(&egui_wgpu::wgpu::util::BufferInitDescriptor {
                label: Some("neurotess_viewport_globals"),
                contents: bytemuck::bytes_of(&Globals {
                    view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
                    light_dir: [0.3, 0.6, 0.7],
                    _pad0: 0.0,
                    eye: [0.0, 0.0, 10.0],
                    _pad1: 0.0,
                }),
                usage: egui_wgpu::wgpu::BufferUsages::UNIFORM
                    | egui_wgpu::wgpu::BufferUsages::COPY_DST,
            });

        let globals_layout =
            device.create_bind_group_layout(&egui_wgpu::wgpu::BindGroupLayoutDescriptor {
                label: Some("neurotess_viewport_globals_layout"),
                entries: &[egui_wgpu::wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: egui_wgpu::wgpu::ShaderStages::VERTEX
                        | egui_wgpu::wgpu::ShaderStages::FRAGMENT,
                    ty: egui_wgpu::wgpu::BindingType::Buffer {
                        ty: egui_wgpu::wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let globals_bind_group = device.create_bind_group(&egui_wgpu::wgpu::BindGroupDescriptor {
            label: Some("neurotess_viewport_globals_bind_group"),
            layout: &globals_layout,
            entries: &[egui_wgpu::wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let draw_size = std::mem::size_of::<DrawUniform>() as u64;
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let draw_stride = draw_size.next_multiple_of(alignment);
        let draw_layout =
            device.create_bind_group_layout(&egui_wgpu::wgpu::BindGroupLayoutDescriptor {
                label: Some("neurotess_viewport_draw_layout"),
                entries: &[egui_wgpu::wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: egui_wgpu::wgpu::ShaderStages::VERTEX
                        | egui_wgpu::wgpu::ShaderStages::FRAGMENT,
                    ty: egui_wgpu::wgpu::BindingType::Buffer {
                        ty: egui_wgpu::wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: egui_wgpu::wgpu::BufferSize::new(draw_size),
                    },
                    count: None,
                }],
            });
        let draw_buffer = create_draw_buffer(device, INITIAL_DRAW_CAPACITY, draw_stride);
        let draw_bind_group = create_draw_bind_group(device, &draw_layout, &draw_buffer, draw_size);

        let pipeline_layout =
            device.create_pipeline_layout(&egui_wgpu::wgpu::PipelineLayoutDescriptor {
                label: Some("neurotess_viewport_layout"),
                bind_group_layouts: &[&globals_layout, &draw_layout],
                push_constant_ranges: &[],
            });

        let vertex_layout = egui_wgpu::wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as egui_wgpu::wgpu::BufferAddress,
            step_mode: egui_wgpu::wgpu::VertexStepMode::Vertex,
            attributes: &MESH_VERTEX_ATTRIBUTES,
        };

        let mesh_pipeline =
            device.create_render_pipeline(&egui_wgpu::wgpu::RenderPipelineDescriptor {
                label: Some("neurotess_viewport_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: egui_wgpu::wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: egui_wgpu::wgpu::PipelineCompilationOptions::default(),
                    buffers: &[vertex_layout.clone()],
                },
                fragment: Some(egui_wgpu::wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: egui_wgpu::wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(egui_wgpu::wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(egui_wgpu::wgpu::BlendState::REPLACE),
                        write_mask: egui_wgpu::wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: egui_wgpu::wgpu::PrimitiveState {
                    topology: egui_wgpu::wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: Some(egui_wgpu::wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: egui_wgpu::wgpu::CompareFunction::LessEqual,
                    stencil: egui_wgpu::wgpu::StencilState::default(),
                    bias: egui_wgpu::wgpu::DepthBiasState::default(),
                }),
                multisample: egui_wgpu::wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        // Wireframe runs the edge index buffer through the same vertex
        // stage, so no polygon-mode device feature is needed.
        let wire_pipeline =
            device.create_render_pipeline(&egui_wgpu::wgpu::RenderPipelineDescriptor {
                label: Some("neurotess_viewport_wireframe"),
                layout: Some(&pipeline_layout),
                vertex: egui_wgpu::wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: egui_wgpu::wgpu::PipelineCompilationOptions::default(),
                    buffers: &[vertex_layout],
                },
                fragment: Some(egui_wgpu::wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_wire"),
                    compilation_options: egui_wgpu::wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(egui_wgpu::wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(egui_wgpu::wgpu::BlendState::REPLACE),
                        write_mask: egui_wgpu::wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: egui_wgpu::wgpu::PrimitiveState {
                    topology: egui_wgpu::wgpu::PrimitiveTopology::LineList,
                    ..Default::default()
                },
                depth_stencil: Some(egui_wgpu::wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: egui_wgpu::wgpu::CompareFunction::LessEqual,
                    stencil: egui_wgpu::wgpu::StencilState::default(),
                    bias: egui_wgpu::wgpu::DepthBiasState::default(),
                }),
                multisample: egui_wgpu::wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let blit_shader = device.create_shader_module(egui_wgpu::wgpu::ShaderModuleDescriptor {
            label: Some("neurotess_viewport_blit"),
            source: egui_wgpu::wgpu::ShaderSource::Wgsl(Cow::Borrowed(
                r#"
@group(0) @binding(0)
var blit_tex: texture_2d<f32>;

@group(0) @binding(1)
var blit_sampler: sampler;

struct BlitOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_blit(@builtin(vertex_index) index: u32) -> BlitOut {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );
    var out: BlitOut;
    out.position = vec4<f32>(positions[index], 0.0, 1.0);
    out.uv = uvs[index];
    return out;
}

@fragment
fn fs_blit(input: BlitOut) -> @location(0) vec4<f32> {
    return textureSample(blit_tex, blit_sampler, input.uv);
}
"#,
            )),
        });

        let blit_bind_group_layout =
            device.create_bind_group_layout(&egui_wgpu::wgpu::BindGroupLayoutDescriptor {
                label: Some("neurotess_viewport_blit_layout"),
                entries: &[
                    egui_wgpu::wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: egui_wgpu::wgpu::ShaderStages::FRAGMENT,
                        ty: egui_wgpu::wgpu::BindingType::Texture {
                            sample_type: egui_wgpu::wgpu::TextureSampleType::Float {
                                filterable: true,
                            },
                            view_dimension: egui_wgpu::wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    egui_wgpu::wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: egui_wgpu::wgpu::ShaderStages::FRAGMENT,
                        ty: egui_wgpu::wgpu::BindingType::Sampler(
                            egui_wgpu::wgpu::SamplerBindingType::Filtering,
                        ),
                        count: None,
                    },
                ],
            });

        let blit_sampler = device.create_sampler(&egui_wgpu::wgpu::SamplerDescriptor {
            label: Some("neurotess_viewport_blit_sampler"),
            mag_filter: egui_wgpu::wgpu::FilterMode::Linear,
            min_filter: egui_wgpu::wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let blit_pipeline_layout =
            device.create_pipeline_layout(&egui_wgpu::wgpu::PipelineLayoutDescriptor {
                label: Some("neurotess_viewport_blit_pipeline_layout"),
                bind_group_layouts: &[&blit_bind_group_layout],
                push_constant_ranges: &[],
            });

        let blit_pipeline =
            device.create_render_pipeline(&egui_wgpu::wgpu::RenderPipelineDescriptor {
                label: Some("neurotess_viewport_blit_pipeline"),
                layout: Some(&blit_pipeline_layout),
                vertex: egui_wgpu::wgpu::VertexState {
                    module: &blit_shader,
                    entry_point: Some("vs_blit"),
                    compilation_options: egui_wgpu::wgpu::PipelineCompilationOptions::default(),
                    buffers: &[],
                },
                fragment: Some(egui_wgpu::wgpu::FragmentState {
                    module: &blit_shader,
                    entry_point: Some("fs_blit"),
                    compilation_options: egui_wgpu::wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(egui_wgpu::wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(egui_wgpu::wgpu::BlendState::REPLACE),
                        write_mask: egui_wgpu::wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: egui_wgpu::wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: egui_wgpu::wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let (offscreen_view, depth_view) = create_offscreen_targets(device, target_format, 1, 1);
        let blit_bind_group = device.create_bind_group(&egui_wgpu::wgpu::BindGroupDescriptor {
            label: Some("neurotess_viewport_blit_group"),
            layout: &blit_bind_group_layout,
            entries: &[
                egui_wgpu::wgpu::BindGroupEntry {
                    binding: 0,
                    resource: egui_wgpu::wgpu::BindingResource::TextureView(&offscreen_view),
                },
                egui_wgpu::wgpu::BindGroupEntry {
                    binding: 1,
                    resource: egui_wgpu::wgpu::BindingResource::Sampler(&blit_sampler),
                },
            ],
        });

        Self {
            mesh_pipeline,
            wire_pipeline,
            blit_pipeline,
            blit_bind_group,
            blit_bind_group_layout,
            blit_sampler,
            offscreen_view,
            depth_view,
            offscreen_size: [1, 1],
            globals_buffer,
            globals_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            draw_stride,
            mesh_cache: GpuMeshCache::new(),
        }
    }
}

fn create_draw_buffer(
    device: &egui_wgpu::wgpu::Device,
    capacity: u32,
    stride: u64,
) -> egui_wgpu::wgpu::Buffer {
    device.create_buffer(&egui_wgpu::wgpu::BufferDescriptor {
        label: Some("neurotess_viewport_draws"),
        size: capacity as u64 * stride,
        usage: egui_wgpu::wgpu::BufferUsages::UNIFORM | egui_wgpu::wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_draw_bind_group(
    device: &egui_wgpu::wgpu::Device,
    layout: &egui_wgpu::wgpu::BindGroupLayout,
    buffer: &egui_wgpu::wgpu::Buffer,
    draw_size: u64,
) -> egui_wgpu::wgpu::BindGroup {
    device.create_bind_group(&egui_wgpu::wgpu::BindGroupDescriptor {
        label: Some("neurotess_viewport_draw_bind_group"),
        layout,
        entries: &[egui_wgpu::wgpu::BindGroupEntry {
            binding: 0,
            resource: egui_wgpu::wgpu::BindingResource::Buffer(egui_wgpu::wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: egui_wgpu::wgpu::BufferSize::new(draw_size),
            }),
        }],
    })
}

pub(super) fn ensure_draw_capacity(
    device: &egui_wgpu::wgpu::Device,
    pipeline: &mut PipelineState,
    draw_count: u32,
) {
    if draw_count <= pipeline.draw_capacity {
        return;
    }
    let capacity = draw_count.next_power_of_two();
    pipeline.draw_buffer = create_draw_buffer(device, capacity, pipeline.draw_stride);
    pipeline.draw_bind_group = create_draw_bind_group(
        device,
        &pipeline.draw_layout,
        &pipeline.draw_buffer,
        std::mem::size_of::<DrawUniform>() as u64,
    );
    pipeline.draw_capacity = capacity;
}

// The views hold their textures alive, so only the views are kept.
fn create_offscreen_targets(
    device: &egui_wgpu::wgpu::Device,
    target_format: egui_wgpu::wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> (egui_wgpu::wgpu::TextureView, egui_wgpu::wgpu::TextureView) {
    let size = egui_wgpu::wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let offscreen_texture = device.create_texture(&egui_wgpu::wgpu::TextureDescriptor {
        label: Some("neurotess_viewport_offscreen"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: egui_wgpu::wgpu::TextureDimension::D2,
        format: target_format,
        usage: egui_wgpu::wgpu::TextureUsages::RENDER_ATTACHMENT
            | egui_wgpu::wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let offscreen_view =
        offscreen_texture.create_view(&egui_wgpu::wgpu::TextureViewDescriptor::default());
    let depth_texture = device.create_texture(&egui_wgpu::wgpu::TextureDescriptor {
        label: Some("neurotess_viewport_depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: egui_wgpu::wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: egui_wgpu::wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&egui_wgpu::wgpu::TextureViewDescriptor::default());
    (offscreen_view, depth_view)
}

pub(super) fn ensure_offscreen_targets(
    device: &egui_wgpu::wgpu::Device,
    pipeline: &mut PipelineState,
    target_format: egui_wgpu::wgpu::TextureFormat,
    width: u32,
    height: u32,
) {
    let width = width.max(1);
    let height = height.max(1);
    if pipeline.offscreen_size == [width, height] {
        return;
    }

    let (offscreen_view, depth_view) =
        create_offscreen_targets(device, target_format, width, height);
    pipeline.offscreen_view = offscreen_view;
    pipeline.depth_view = depth_view;
    pipeline.offscreen_size = [width, height];
    pipeline.blit_bind_group = device.create_bind_group(&egui_wgpu::wgpu::BindGroupDescriptor {
        label: Some("neurotess_viewport_blit_group"),
        layout: &pipeline.blit_bind_group_layout,
        entries: &[
            egui_wgpu::wgpu::BindGroupEntry {
                binding: 0,
                resource: egui_wgpu::wgpu::BindingResource::TextureView(&pipeline.offscreen_view),
            },
            egui_wgpu::wgpu::BindGroupEntry {
                binding: 1,
                resource: egui_wgpu::wgpu::BindingResource::Sampler(&pipeline.blit_sampler),
            },
        ],
    });
}
