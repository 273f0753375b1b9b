/// Per-layer uniform state uploaded before each draw.
///
/// Matches the WGSL `LayerUniforms` block (96 bytes):
/// ```text
/// view_proj: mat4x4<f32>  @ 0    column-major
/// offset:    vec2<f32>    @ 64
/// half_size: vec2<f32>    @ 72
/// frame:     u32          @ 80   (+12 bytes tail padding)
/// ```
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LayerUniforms {
    /// Column-major view-projection matrix from the caller's camera.
    pub view_proj: [[f32; 4]; 4],
    /// World-space offset added to every instance centre.
    pub offset: [f32; 2],
    /// Half the map tile size; the vertex stage expands each point by this.
    pub half_size: [f32; 2],
    /// Animation frame counter for this layer.
    pub frame: u32,
    pub _pad: [u32; 3],
}

const POSITION_ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
    0 => Float32x2,  // instance centre
];

const ID_ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
    1 => Sint32,     // atlas slice
];

/// Instance buffer at slot 0: one world-space centre per tile.
fn position_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &POSITION_ATTRIBS,
    }
}

/// Instance buffer at slot 1: one atlas slice index per tile, parallel to
/// the position buffer.
fn id_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<i32>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ID_ATTRIBS,
    }
}

pub struct TilePipeline {
    pub render_pipeline: wgpu::RenderPipeline,
    pub layer_bind_group_layout: wgpu::BindGroupLayout,
    pub atlas_bind_group_layout: wgpu::BindGroupLayout,
    pub animation_bind_group_layout: wgpu::BindGroupLayout,
}

/// Build the one pipeline every layer shares.
///
/// Each instance is a single (centre, slice) point; the vertex stage expands
/// it into a 4-vertex triangle strip sized by the layer's half-extent, so a
/// draw is always `0..4` vertices over `0..instance_count` instances.
/// Per-layer variation lives entirely in bind groups and instance buffers.
pub fn create_tile_pipeline(
    device: &wgpu::Device,
    output_format: wgpu::TextureFormat,
) -> TilePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("tilemap_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tilemap.wgsl").into()),
    });

    let layer_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("layer_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

    let atlas_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

    let animation_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("animation_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("tilemap_pipeline_layout"),
        bind_group_layouts: &[
            &layer_bind_group_layout,
            &atlas_bind_group_layout,
            &animation_bind_group_layout,
        ],
        ..Default::default()
    });

    let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("tilemap_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[position_layout(), id_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    TilePipeline {
        render_pipeline,
        layer_bind_group_layout,
        atlas_bind_group_layout,
        animation_bind_group_layout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_uniforms_match_the_wgsl_block_size() {
        // The WGSL block rounds to 96 bytes; the Rust struct must agree or
        // write_buffer uploads garbage into the tail fields.
        assert_eq!(std::mem::size_of::<LayerUniforms>(), 96);
        assert_eq!(std::mem::offset_of!(LayerUniforms, offset), 64);
        assert_eq!(std::mem::offset_of!(LayerUniforms, half_size), 72);
        assert_eq!(std::mem::offset_of!(LayerUniforms, frame), 80);
    }
}
