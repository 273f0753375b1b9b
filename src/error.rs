use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while loading a map or driving the renderer.
///
/// All load-time variants abort [`load_level`](crate::load_level); nothing is
/// rendered from a partially loaded map.
#[derive(Debug, Error)]
pub enum Error {
    /// The map document failed to parse.
    #[error("map document error: {0}")]
    Document(#[from] tiled::Error),

    /// A layer references a gid past the end of every registered tileset.
    #[error("layer {layer:?} references gid {gid}, which no tileset provides")]
    UnresolvedGid { layer: String, gid: u32 },

    /// A layer references a gid inside a tileset's range where the tileset
    /// has no tile (sparse collection ids leave holes).
    #[error("layer {layer:?} references gid {gid}, but tileset {tileset:?} has no tile {local_id}")]
    MissingTile {
        layer: String,
        tileset: String,
        local_id: u32,
        gid: u32,
    },

    /// A collection tileset declares a tile without an image source.
    #[error("tile {local_id} in tileset {tileset:?} has no image")]
    MissingImage { tileset: String, local_id: u32 },

    /// An image file failed to open or decode.
    #[error("failed to decode {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    /// Decoded pixel dimensions contradict the size the document declares.
    #[error(
        "{path:?} decodes to {actual_w}x{actual_h} but the document declares {declared_w}x{declared_h}"
    )]
    ImageSizeMismatch {
        path: PathBuf,
        declared_w: u32,
        declared_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    /// A sheet tileset's margin/spacing/count geometry runs past its image.
    #[error("tileset {tileset:?}: tile {local_id} falls outside the sheet image")]
    SheetOutOfBounds { tileset: String, local_id: u32 },

    /// An animation names a tile its tileset does not carry.
    #[error("tileset {tileset:?}: animation references tile {tile} outside the tileset")]
    AnimationOutOfRange { tileset: String, tile: u32 },

    /// The document registers no tiles, so the atlas would have zero layers.
    #[error("map registers no tiles to build an atlas from")]
    NoTilesets,

    /// Infinite maps are unsupported.
    #[error("layer {name:?} is infinite; only finite tile layers are supported")]
    InfiniteLayer { name: String },

    /// The atlas does not fit the device's texture limits.
    #[error(
        "atlas of {layers} layers at {width}x{height} exceeds device limits \
         ({max_layers} layers, {max_dim}px per side)"
    )]
    AtlasExceedsLimits {
        width: u32,
        height: u32,
        layers: u32,
        max_layers: u32,
        max_dim: u32,
    },

    /// A render call addressed a layer the map does not have.
    #[error("layer index {index} out of range: map has {count} drawable layers")]
    LayerOutOfRange { index: usize, count: usize },
}
