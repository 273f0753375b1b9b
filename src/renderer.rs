use glam::{Mat4, Vec2};
use wgpu::util::DeviceExt;

use crate::GpuContext;
use crate::atlas::{AnimationTable, Atlas, AtlasImage};
use crate::error::Error;
use crate::instances::LayerInstances;
use crate::pipeline::{LayerUniforms, TilePipeline, create_tile_pipeline};

/// GPU resources for one drawable layer.
struct LayerDraw {
    name: String,
    position_buffer: wgpu::Buffer,
    id_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instance_count: u32,
    /// Animation frame counter; advances only when a render call asks.
    frame: u32,
}

/// Owns every GPU resource a loaded map needs: the layered atlas texture,
/// the shared pipeline, the animation tables, and one buffer set per
/// drawable layer. Everything is released when the renderer drops.
///
/// Buffers and the atlas are immutable after load; the only mutable state
/// is each layer's animation counter and uniform contents.
pub struct TileMapRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: TilePipeline,
    atlas: Atlas,
    atlas_bind_group: wgpu::BindGroup,
    animation_bind_group: wgpu::BindGroup,
    layers: Vec<LayerDraw>,
}

impl TileMapRenderer {
    pub(crate) fn new(
        ctx: &GpuContext,
        atlas_image: &AtlasImage,
        animations: &AnimationTable,
        instances: Vec<LayerInstances>,
    ) -> Result<Self, Error> {
        let device = &ctx.device;
        let pipeline = create_tile_pipeline(device, ctx.output_format);
        let atlas = Atlas::upload(device, &ctx.queue, atlas_image)?;

        let atlas_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_bg"),
            layout: &pipeline.atlas_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas.texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&atlas.sampler),
                },
            ],
        });

        let ranges_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("anim_ranges_buffer"),
            contents: bytemuck::cast_slice(&animations.ranges),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let frames_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("anim_frames_buffer"),
            contents: bytemuck::cast_slice(&animations.frames),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let animation_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("animation_bg"),
            layout: &pipeline.animation_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ranges_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: frames_buffer.as_entire_binding(),
                },
            ],
        });

        let layers = instances
            .into_iter()
            .map(|layer| {
                let instance_count = layer.positions.len() as u32;
                let position_buffer =
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("layer_position_buffer"),
                        contents: bytemuck::cast_slice(&layer.positions),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                let id_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("layer_id_buffer"),
                    contents: bytemuck::cast_slice(&layer.ids),
                    usage: wgpu::BufferUsages::VERTEX,
                });

                // Seeded with the identity camera; every render call rewrites it.
                let uniforms = LayerUniforms {
                    view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                    offset: [0.0, 0.0],
                    half_size: [
                        atlas_image.tile_w as f32 * 0.5,
                        atlas_image.tile_h as f32 * 0.5,
                    ],
                    frame: 0,
                    _pad: [0; 3],
                };
                let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("layer_uniform_buffer"),
                    contents: bytemuck::cast_slice(std::slice::from_ref(&uniforms)),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("layer_bg"),
                    layout: &pipeline.layer_bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });

                LayerDraw {
                    name: layer.name,
                    position_buffer,
                    id_buffer,
                    uniform_buffer,
                    bind_group,
                    instance_count,
                    frame: 0,
                }
            })
            .collect();

        Ok(Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            pipeline,
            atlas,
            atlas_bind_group,
            animation_bind_group,
            layers,
        })
    }

    /// Number of drawable layers, in document order.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Name of a drawable layer.
    pub fn layer_name(&self, index: usize) -> Option<&str> {
        self.layers.get(index).map(|layer| layer.name.as_str())
    }

    /// Number of atlas slices (the map's highest gid).
    pub fn atlas_depth(&self) -> u32 {
        self.atlas.depth
    }

    /// Map tile size in pixels; every quad is drawn at this size.
    pub fn tile_size(&self) -> (u32, u32) {
        (self.atlas.tile_w, self.atlas.tile_h)
    }

    /// Draw one layer onto `target`.
    ///
    /// The pass loads the target's existing contents, so the caller clears
    /// (or draws under) it beforehand. `camera` is applied per corner;
    /// `offset` shifts the whole layer in world space. When
    /// `advance_animation` is set, the layer's frame counter steps once
    /// before drawing; otherwise rendering leaves all state untouched.
    pub fn render_layer(
        &mut self,
        index: usize,
        target: &wgpu::TextureView,
        camera: Mat4,
        offset: Vec2,
        advance_animation: bool,
    ) -> Result<(), Error> {
        check_layer_index(index, self.layers.len())?;
        self.update_layer_uniforms(index, camera, offset, advance_animation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = begin_pass(&mut encoder, target);
            self.draw_layer(&mut pass, index);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Draw every layer in document order inside one pass; later layers
    /// blend over earlier ones. A map with no drawable layers is a no-op.
    pub fn render_all(
        &mut self,
        target: &wgpu::TextureView,
        camera: Mat4,
        offset: Vec2,
        advance_animation: bool,
    ) {
        for index in 0..self.layers.len() {
            self.update_layer_uniforms(index, camera, offset, advance_animation);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut pass = begin_pass(&mut encoder, target);
            for index in 0..self.layers.len() {
                self.draw_layer(&mut pass, index);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn update_layer_uniforms(&mut self, index: usize, camera: Mat4, offset: Vec2, advance: bool) {
        let half_size = [
            self.atlas.tile_w as f32 * 0.5,
            self.atlas.tile_h as f32 * 0.5,
        ];
        let layer = &mut self.layers[index];
        layer.frame = next_frame(layer.frame, advance);
        let uniforms = LayerUniforms {
            view_proj: camera.to_cols_array_2d(),
            offset: offset.to_array(),
            half_size,
            frame: layer.frame,
            _pad: [0; 3],
        };
        self.queue.write_buffer(
            &layer.uniform_buffer,
            0,
            bytemuck::cast_slice(std::slice::from_ref(&uniforms)),
        );
    }

    fn draw_layer(&self, pass: &mut wgpu::RenderPass<'_>, index: usize) {
        let layer = &self.layers[index];
        if layer.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline.render_pipeline);
        pass.set_bind_group(0, &layer.bind_group, &[]);
        pass.set_bind_group(1, &self.atlas_bind_group, &[]);
        pass.set_bind_group(2, &self.animation_bind_group, &[]);
        pass.set_vertex_buffer(0, layer.position_buffer.slice(..));
        pass.set_vertex_buffer(1, layer.id_buffer.slice(..));
        pass.draw(0..4, 0..layer.instance_count);
    }
}

/// Guard a render call's layer index against the drawable layer count.
fn check_layer_index(index: usize, count: usize) -> Result<(), Error> {
    if index >= count {
        return Err(Error::LayerOutOfRange { index, count });
    }
    Ok(())
}

/// Next animation counter value: steps once when the caller asks,
/// otherwise unchanged.
fn next_frame(frame: u32, advance: bool) -> u32 {
    if advance { frame.wrapping_add(1) } else { frame }
}

/// One load-preserving colour pass against the caller's target.
fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("tilemap_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}
