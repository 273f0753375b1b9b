use log::warn;

use crate::atlas::GidTable;
use crate::error::Error;

/// One drawable layer lowered to GPU-ready instance arrays.
///
/// `positions[i]` is the world-space centre of instance `i` and `ids[i]` its
/// atlas slice; the two run in lockstep. World coordinates are pixels with Y
/// growing upward, so document row 0 ends up at the top of the map.
#[derive(Debug)]
pub struct LayerInstances {
    pub name: String,
    pub positions: Vec<[f32; 2]>,
    pub ids: Vec<i32>,
}

/// Lower every drawable layer (tile grids and object layers) in document
/// order. Image and group layers draw nothing here and are skipped; they do
/// not consume a layer index.
pub fn build_layer_instances(
    map: &tiled::Map,
    gids: &GidTable,
) -> Result<Vec<LayerInstances>, Error> {
    let mut layers = Vec::new();

    for layer in map.layers() {
        match layer.layer_type() {
            tiled::LayerType::Tiles(tiles) => {
                layers.push(grid_instances(map, gids, &layer, tiles)?);
            }
            tiled::LayerType::Objects(objects) => {
                layers.push(object_instances(map, gids, &layer, objects)?);
            }
            tiled::LayerType::Image(_) => {
                warn!("skipping image layer {:?}", layer.name);
            }
            tiled::LayerType::Group(_) => {
                warn!("skipping group layer {:?}", layer.name);
            }
        }
    }

    Ok(layers)
}

fn grid_instances(
    map: &tiled::Map,
    gids: &GidTable,
    layer: &tiled::Layer,
    tiles: tiled::TileLayer,
) -> Result<LayerInstances, Error> {
    let finite = match tiles {
        tiled::TileLayer::Finite(finite) => finite,
        tiled::TileLayer::Infinite(_) => {
            return Err(Error::InfiniteLayer { name: layer.name.clone() });
        }
    };

    let (tile_w, tile_h) = (map.tile_width as f32, map.tile_height as f32);
    let height = finite.height();
    let offset = [layer.offset_x, -layer.offset_y];

    let mut positions = Vec::new();
    let mut ids = Vec::new();

    for y in 0..height {
        for x in 0..finite.width() {
            // Empty cells (gid 0) yield no tile and emit nothing.
            let Some(cell) = finite.get_tile(x as i32, y as i32) else { continue };
            let slice = resolve_slice(map, gids, &layer.name, cell.tileset_index(), cell.id())?;
            let centre = grid_cell_centre(x, y, height, tile_w, tile_h);
            positions.push([centre[0] + offset[0], centre[1] + offset[1]]);
            ids.push(slice as i32);
        }
    }

    Ok(LayerInstances { name: layer.name.clone(), positions, ids })
}

fn object_instances(
    map: &tiled::Map,
    gids: &GidTable,
    layer: &tiled::Layer,
    objects: tiled::ObjectLayer,
) -> Result<LayerInstances, Error> {
    let world_h = (map.height * map.tile_height) as f32;
    let offset = [layer.offset_x, -layer.offset_y];

    let mut positions = Vec::new();
    let mut ids = Vec::new();

    for object in objects.objects() {
        // Shape-only objects (rects, polygons, points) carry no tile image.
        let Some(tile) = object.tile_data() else { continue };
        let tileset_index = match tile.tileset_location() {
            tiled::TilesetLocation::Map(index) => *index,
            tiled::TilesetLocation::Template(_) => {
                warn!(
                    "object {} in layer {:?} references a template tileset; skipping",
                    object.id(),
                    layer.name
                );
                continue;
            }
        };
        let slice = resolve_slice(map, gids, &layer.name, tileset_index, tile.id())?;
        positions.push([
            object.x + offset[0],
            object_world_y(object.y, world_h) + offset[1],
        ]);
        ids.push(slice as i32);
    }

    Ok(LayerInstances { name: layer.name.clone(), positions, ids })
}

/// Map a provider (tileset, local id) pair to its atlas slice, failing
/// loudly when the reference points at nothing.
fn resolve_slice(
    map: &tiled::Map,
    gids: &GidTable,
    layer: &str,
    tileset_index: usize,
    local_id: u32,
) -> Result<u32, Error> {
    let slice = gids
        .slice_of(tileset_index, local_id)
        .ok_or_else(|| Error::UnresolvedGid {
            layer: layer.to_string(),
            gid: gids.gid_of(tileset_index, local_id),
        })?;
    if gids.is_hole(slice) {
        return Err(Error::MissingTile {
            layer: layer.to_string(),
            tileset: map.tilesets()[tileset_index].name.clone(),
            local_id,
            gid: gids.gid_of(tileset_index, local_id),
        });
    }
    Ok(slice)
}

/// World-space centre of grid cell (x, y).
///
/// Document rows grow downward from the top; world Y grows upward:
/// ```text
/// world_x = x * tile_w + tile_w / 2
/// world_y = (height - y) * tile_h - tile_h / 2
/// ```
fn grid_cell_centre(x: u32, y: u32, height: u32, tile_w: f32, tile_h: f32) -> [f32; 2] {
    [
        x as f32 * tile_w + tile_w * 0.5,
        (height - y) as f32 * tile_h - tile_h * 0.5,
    ]
}

/// Object locations share the grid's vertical convention: the document's
/// y-down pixel coordinate flips around the map's pixel height. X passes
/// through untouched.
fn object_world_y(y: f32, world_h: f32) -> f32 {
    world_h - y
}
