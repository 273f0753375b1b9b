use std::path::Path;

use image::RgbaImage;
use log::{debug, warn};
use wgpu::util::DeviceExt;

use crate::error::Error;

// ── Gid table ────────────────────────────────────────────────────────────────

/// First-gid table rebuilt from the document's tileset registration order.
///
/// Global tile ids are 1-based; 0 means "no tile". The document exposes
/// tilesets in order without explicit offsets, so offsets are reconstructed
/// by accumulation:
/// ```text
/// first[0]     = 1
/// first[i + 1] = first[i] + span[i]
/// span[i]      = max(tilecount, highest local id + 1)
/// ```
/// `span` covers collection tilesets whose local ids have holes: deleting a
/// tile in the editor shrinks the tilecount but leaves the remaining ids in
/// place. Hole gids keep their (transparent) atlas slice so every later
/// tileset's slices stay at `gid - 1`.
#[derive(Debug)]
pub struct GidTable {
    firsts: Vec<u32>,
    spans: Vec<u32>,
    /// One flag per atlas slice; true = no tile content behind this gid.
    holes: Vec<bool>,
}

impl GidTable {
    pub fn from_map(map: &tiled::Map) -> Result<Self, Error> {
        let tilesets = map.tilesets();
        if tilesets.is_empty() {
            return Err(Error::NoTilesets);
        }

        let mut firsts = Vec::with_capacity(tilesets.len());
        let mut spans = Vec::with_capacity(tilesets.len());
        let mut holes = Vec::new();
        let mut next = 1u32;

        for tileset in tilesets {
            let max_id = tileset.tiles().map(|(id, _)| id).max();
            let span = match max_id {
                Some(id) => tileset.tilecount.max(id + 1),
                None => tileset.tilecount,
            };
            if span == 0 {
                warn!("tileset {:?} registers no tiles", tileset.name);
            }
            firsts.push(next);
            spans.push(span);
            next += span;

            if tileset.image.is_some() {
                // Sheet tilesets are dense; every local id has pixels.
                holes.resize(holes.len() + span as usize, false);
            } else {
                for local in 0..span {
                    match tileset.get_tile(local) {
                        Some(tile) if tile.image.is_some() => holes.push(false),
                        Some(_) => {
                            return Err(Error::MissingImage {
                                tileset: tileset.name.clone(),
                                local_id: local,
                            });
                        }
                        None => holes.push(true),
                    }
                }
            }
        }

        if next == 1 {
            return Err(Error::NoTilesets);
        }

        Ok(Self { firsts, spans, holes })
    }

    /// Number of atlas slices: the highest gid any tileset registers.
    pub fn depth(&self) -> u32 {
        self.holes.len() as u32
    }

    /// Atlas slice (`gid - 1`) for a local tile id in the given tileset.
    /// `None` when the id lies past the tileset's registered span.
    pub fn slice_of(&self, tileset_index: usize, local_id: u32) -> Option<u32> {
        let span = *self.spans.get(tileset_index)?;
        if local_id >= span {
            return None;
        }
        Some(self.firsts[tileset_index] + local_id - 1)
    }

    /// The gid a local tile id maps to. Index must be a valid tileset index.
    pub fn gid_of(&self, tileset_index: usize, local_id: u32) -> u32 {
        self.firsts[tileset_index] + local_id
    }

    /// True when the slice holds no tile content (a sparse collection hole).
    pub fn is_hole(&self, slice: u32) -> bool {
        self.holes.get(slice as usize).copied().unwrap_or(true)
    }

    fn span(&self, tileset_index: usize) -> u32 {
        self.spans[tileset_index]
    }

    fn first_gid(&self, tileset_index: usize) -> u32 {
        self.firsts[tileset_index]
    }

    #[cfg(test)]
    pub(crate) fn from_parts(spans: Vec<u32>, holes: Vec<bool>) -> Self {
        let mut firsts = Vec::with_capacity(spans.len());
        let mut next = 1u32;
        for &span in &spans {
            firsts.push(next);
            next += span;
        }
        assert_eq!(holes.len() as u32, next - 1);
        Self { firsts, spans, holes }
    }
}

// ── CPU atlas build ──────────────────────────────────────────────────────────

/// CPU-side atlas: every tile normalised to one `tile_w x tile_h` RGBA8
/// slice, in ascending gid order.
///
/// Slice `i` holds the pixels of gid `i + 1`; gid 0 ("no tile") has no
/// slice. Hole slices stay fully transparent.
#[derive(Debug)]
pub struct AtlasImage {
    pub tile_w: u32,
    pub tile_h: u32,
    pub depth: u32,
    /// `depth` slices of `tile_w * tile_h * 4` bytes, tightly packed.
    pub pixels: Vec<u8>,
}

impl AtlasImage {
    /// Byte view of one slice.
    pub fn slice(&self, index: u32) -> &[u8] {
        let len = (self.tile_w * self.tile_h * 4) as usize;
        let start = index as usize * len;
        &self.pixels[start..start + len]
    }
}

/// Decode every tile the gid table registers and stack the results into one
/// pixel volume. Sheet tilesets are sliced cell by cell; collection tilesets
/// decode one file per tile. Every slice ends up at the map tile size.
pub fn build_atlas_image(map: &tiled::Map, gids: &GidTable) -> Result<AtlasImage, Error> {
    let tile_w = map.tile_width;
    let tile_h = map.tile_height;
    let slice_len = (tile_w * tile_h * 4) as usize;
    let mut pixels = vec![0u8; gids.depth() as usize * slice_len];

    for (index, tileset) in map.tilesets().iter().enumerate() {
        let base = (gids.first_gid(index) - 1) as usize;

        if let Some(sheet) = &tileset.image {
            let decoded = decode_image(&sheet.source)?;
            check_declared_size(&decoded, &sheet.source, sheet.width, sheet.height)?;
            let columns = sheet_columns(tileset, decoded.width());
            for local in 0..gids.span(index) {
                let cell = cut_sheet_tile(&decoded, tileset, columns, local)?;
                let cell = normalise(cell, tile_w, tile_h);
                let start = (base + local as usize) * slice_len;
                pixels[start..start + slice_len].copy_from_slice(cell.as_raw());
            }
        } else {
            for (local, tile) in tileset.tiles() {
                // Imageless entries were already rejected by the gid table.
                let Some(img) = &tile.image else { continue };
                let decoded = decode_image(&img.source)?;
                check_declared_size(&decoded, &img.source, img.width, img.height)?;
                let decoded = normalise(decoded, tile_w, tile_h);
                let Some(slice) = gids.slice_of(index, local) else { continue };
                let start = slice as usize * slice_len;
                pixels[start..start + slice_len].copy_from_slice(decoded.as_raw());
            }
        }
    }

    debug!(
        "atlas: {} slices of {}x{} ({} KiB)",
        gids.depth(),
        tile_w,
        tile_h,
        pixels.len() / 1024
    );

    Ok(AtlasImage { tile_w, tile_h, depth: gids.depth(), pixels })
}

fn decode_image(path: &Path) -> Result<RgbaImage, Error> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| Error::Image { path: path.to_path_buf(), source })
}

/// Reject images whose decoded size contradicts the document. Documents
/// without declared dimensions (zero) skip the check.
fn check_declared_size(
    img: &RgbaImage,
    path: &Path,
    declared_w: i32,
    declared_h: i32,
) -> Result<(), Error> {
    if declared_w <= 0 || declared_h <= 0 {
        return Ok(());
    }
    let (actual_w, actual_h) = img.dimensions();
    if (actual_w, actual_h) != (declared_w as u32, declared_h as u32) {
        return Err(Error::ImageSizeMismatch {
            path: path.to_path_buf(),
            declared_w: declared_w as u32,
            declared_h: declared_h as u32,
            actual_w,
            actual_h,
        });
    }
    Ok(())
}

/// Column count of a sheet tileset, derived from the image width when the
/// document leaves it at zero.
fn sheet_columns(tileset: &tiled::Tileset, sheet_w: u32) -> u32 {
    if tileset.columns > 0 {
        return tileset.columns;
    }
    let cell = (tileset.tile_width + tileset.spacing).max(1);
    ((sheet_w.saturating_sub(2 * tileset.margin) + tileset.spacing) / cell).max(1)
}

/// Pixel origin of a local tile inside its sheet, honouring margin and
/// spacing. Row-major: ids run left to right, top to bottom.
fn sheet_origin(local: u32, columns: u32, tile_w: u32, tile_h: u32, margin: u32, spacing: u32) -> (u32, u32) {
    let col = local % columns;
    let row = local / columns;
    (
        margin + col * (tile_w + spacing),
        margin + row * (tile_h + spacing),
    )
}

fn cut_sheet_tile(
    sheet: &RgbaImage,
    tileset: &tiled::Tileset,
    columns: u32,
    local: u32,
) -> Result<RgbaImage, Error> {
    let (sx, sy) = sheet_origin(
        local,
        columns,
        tileset.tile_width,
        tileset.tile_height,
        tileset.margin,
        tileset.spacing,
    );
    if sx + tileset.tile_width > sheet.width() || sy + tileset.tile_height > sheet.height() {
        return Err(Error::SheetOutOfBounds {
            tileset: tileset.name.clone(),
            local_id: local,
        });
    }
    Ok(image::imageops::crop_imm(sheet, sx, sy, tileset.tile_width, tileset.tile_height).to_image())
}

/// Normalise a decoded tile to the map tile size. Tiles already at the
/// target size pass through untouched.
fn normalise(img: RgbaImage, tile_w: u32, tile_h: u32) -> RgbaImage {
    if img.dimensions() == (tile_w, tile_h) {
        img
    } else {
        image::imageops::resize(&img, tile_w, tile_h, image::imageops::FilterType::Nearest)
    }
}

// ── Animation tables ─────────────────────────────────────────────────────────

/// Flattened per-slice animation tables for the shader.
///
/// `ranges[slice]` is `[first, count]` into `frames`; `count == 0` marks a
/// static slice. `frames` holds atlas slice indices in document frame order.
/// The shader picks `frames[first + counter % count]` for animated slices,
/// so one animation step per `advance_animation` tick.
#[derive(Debug)]
pub struct AnimationTable {
    pub ranges: Vec<[u32; 2]>,
    pub frames: Vec<u32>,
}

pub fn build_animation_table(map: &tiled::Map, gids: &GidTable) -> Result<AnimationTable, Error> {
    let mut ranges = vec![[0u32; 2]; gids.depth() as usize];
    let mut frames: Vec<u32> = Vec::new();

    for (index, tileset) in map.tilesets().iter().enumerate() {
        for (local, tile) in tileset.tiles() {
            let Some(animation) = &tile.animation else { continue };
            if animation.is_empty() {
                continue;
            }
            let slice = gids.slice_of(index, local).ok_or_else(|| Error::AnimationOutOfRange {
                tileset: tileset.name.clone(),
                tile: local,
            })?;
            let first = frames.len() as u32;
            for frame in animation {
                let frame_slice = gids
                    .slice_of(index, frame.tile_id)
                    .filter(|&s| !gids.is_hole(s))
                    .ok_or_else(|| Error::AnimationOutOfRange {
                        tileset: tileset.name.clone(),
                        tile: frame.tile_id,
                    })?;
                frames.push(frame_slice);
            }
            ranges[slice as usize] = [first, animation.len() as u32];
        }
    }

    // Zero-sized buffer bindings are invalid; park one sentinel entry that
    // no range ever points at.
    if frames.is_empty() {
        frames.push(0);
    }

    Ok(AnimationTable { ranges, frames })
}

// ── GPU upload ───────────────────────────────────────────────────────────────

/// The layered texture every layer samples, plus its sampler.
pub struct Atlas {
    pub texture_view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub tile_w: u32,
    pub tile_h: u32,
    pub depth: u32,
}

impl Atlas {
    /// Upload a built [`AtlasImage`] as a `D2Array` texture.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &AtlasImage,
    ) -> Result<Self, Error> {
        let limits = device.limits();
        if image.depth > limits.max_texture_array_layers
            || image.tile_w > limits.max_texture_dimension_2d
            || image.tile_h > limits.max_texture_dimension_2d
        {
            return Err(Error::AtlasExceedsLimits {
                width: image.tile_w,
                height: image.tile_h,
                layers: image.depth,
                max_layers: limits.max_texture_array_layers,
                max_dim: limits.max_texture_dimension_2d,
            });
        }

        let size = wgpu::Extent3d {
            width: image.tile_w,
            height: image.tile_h,
            depth_or_array_layers: image.depth,
        };

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("tile_atlas"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &image.pixels,
        );

        // A depth-1 texture would otherwise default to a plain D2 view.
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            texture_view,
            sampler,
            tile_w: image.tile_w,
            tile_h: image.tile_h,
            depth: image.depth,
        })
    }
}
