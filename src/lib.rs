pub mod atlas;
pub mod error;
pub mod instances;
pub mod pipeline;
pub mod renderer;

use std::path::Path;

use log::debug;

pub use error::Error;
pub use renderer::TileMapRenderer;

/// Handles to the caller's wgpu device plus the texture format render
/// passes will target. Device and queue are reference counted, so the
/// context is cheap to clone.
#[derive(Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub output_format: wgpu::TextureFormat,
}

/// Load a Tiled `.tmx` map and build a [`TileMapRenderer`] for it.
///
/// External tilesets and tile images are resolved relative to the document
/// that references them. Every tile image is decoded, normalised to the
/// map's tile size and uploaded into one layered texture whose slice index
/// is the tile's gid minus one; each tile and object layer becomes a pair
/// of instance buffers. A missing file, undecodable image or unresolvable
/// gid aborts the whole load with an [`Error`].
pub fn load_level(path: impl AsRef<Path>, ctx: &GpuContext) -> Result<TileMapRenderer, Error> {
    let path = path.as_ref();
    let map = tiled::Loader::new().load_tmx_map(path)?;

    let gids = atlas::GidTable::from_map(&map)?;
    let atlas_image = atlas::build_atlas_image(&map, &gids)?;
    let animations = atlas::build_animation_table(&map, &gids)?;
    let layers = instances::build_layer_instances(&map, &gids)?;

    debug!(
        "loaded {:?}: {} atlas slices, {} drawable layers",
        path,
        gids.depth(),
        layers.len()
    );

    TileMapRenderer::new(ctx, &atlas_image, &animations, layers)
}
