mod common;

use common::{load_map, scratch_dir, write_file, write_png};
use wgpu_tmx::Error;
use wgpu_tmx::atlas::{GidTable, build_animation_table, build_atlas_image};

// ── Gid table ────────────────────────────────────────────────────────────────

const TWO_TILESETS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="a" tilewidth="16" tileheight="16" tilecount="3" columns="0">
  <tile id="0"><image source="a0.png" width="16" height="16"/></tile>
  <tile id="1"><image source="a1.png" width="16" height="16"/></tile>
  <tile id="2"><image source="a2.png" width="16" height="16"/></tile>
 </tileset>
 <tileset firstgid="4" name="b" tilewidth="16" tileheight="16" tilecount="2" columns="0">
  <tile id="0"><image source="b0.png" width="16" height="16"/></tile>
  <tile id="1"><image source="b1.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">5</data>
 </layer>
</map>
"#;

#[test]
fn gid_table_spans_every_tileset_in_document_order() {
    let dir = scratch_dir("gid_table_spans");
    for name in ["a0", "a1", "a2", "b0", "b1"] {
        write_png(&dir.join(format!("{name}.png")), 16, 16, [255, 0, 0, 255]);
    }
    write_file(&dir.join("map.tmx"), TWO_TILESETS);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();

    assert_eq!(gids.depth(), 5);
    assert_eq!(gids.slice_of(0, 0), Some(0));
    assert_eq!(gids.slice_of(0, 2), Some(2));
    assert_eq!(gids.slice_of(1, 0), Some(3));
    assert_eq!(gids.slice_of(1, 1), Some(4));
    assert_eq!(gids.slice_of(1, 2), None, "id past the second tileset's span");
}

// ── Atlas content ────────────────────────────────────────────────────────────

const THREE_TILES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="2" height="2" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="16" tileheight="16" tilecount="3" columns="0">
  <tile id="0"><image source="t0.png" width="16" height="16"/></tile>
  <tile id="1"><image source="t1.png" width="16" height="16"/></tile>
  <tile id="2"><image source="t2.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="2" height="2">
  <data encoding="csv">1,0,
2,3</data>
 </layer>
</map>
"#;

#[test]
fn atlas_slices_stack_in_ascending_gid_order() {
    let dir = scratch_dir("atlas_slice_order");
    write_png(&dir.join("t0.png"), 16, 16, [255, 0, 0, 255]);
    write_png(&dir.join("t1.png"), 16, 16, [0, 255, 0, 255]);
    write_png(&dir.join("t2.png"), 16, 16, [0, 0, 255, 255]);
    write_file(&dir.join("map.tmx"), THREE_TILES);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let atlas = build_atlas_image(&map, &gids).unwrap();

    assert_eq!(atlas.depth, 3);
    assert_eq!(atlas.slice(0).len(), 16 * 16 * 4);
    assert_eq!(&atlas.slice(0)[..4], &[255, 0, 0, 255]);
    assert_eq!(&atlas.slice(1)[..4], &[0, 255, 0, 255]);
    assert_eq!(&atlas.slice(2)[..4], &[0, 0, 255, 255]);
}

const ODD_SIZED_TILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="8" tileheight="8" tilecount="1" columns="0">
  <tile id="0"><image source="small.png" width="8" height="8"/></tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn tile_images_normalise_to_the_map_tile_size() {
    let dir = scratch_dir("normalise_tile");
    write_png(&dir.join("small.png"), 8, 8, [128, 64, 32, 255]);
    write_file(&dir.join("map.tmx"), ODD_SIZED_TILE);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let atlas = build_atlas_image(&map, &gids).unwrap();

    assert_eq!((atlas.tile_w, atlas.tile_h), (16, 16));
    assert_eq!(atlas.slice(0).len(), 16 * 16 * 4);
    assert!(
        atlas.slice(0).chunks_exact(4).all(|px| px == [128, 64, 32, 255]),
        "a solid tile must stay solid after resizing"
    );
}

const SPARSE_TILESET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="2" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="sparse" tilewidth="16" tileheight="16" tilecount="2" columns="0">
  <tile id="0"><image source="s0.png" width="16" height="16"/></tile>
  <tile id="2"><image source="s2.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="2" height="1">
  <data encoding="csv">1,3</data>
 </layer>
</map>
"#;

#[test]
fn sparse_tile_ids_leave_transparent_filler_slices() {
    let dir = scratch_dir("sparse_ids");
    write_png(&dir.join("s0.png"), 16, 16, [255, 0, 0, 255]);
    write_png(&dir.join("s2.png"), 16, 16, [0, 0, 255, 255]);
    write_file(&dir.join("map.tmx"), SPARSE_TILESET);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let atlas = build_atlas_image(&map, &gids).unwrap();

    assert_eq!(gids.depth(), 3, "span covers the highest id even when sparse");
    assert!(!gids.is_hole(0));
    assert!(gids.is_hole(1));
    assert!(!gids.is_hole(2));
    assert!(
        atlas.slice(1).iter().all(|&b| b == 0),
        "filler slice must stay transparent"
    );
    assert_eq!(&atlas.slice(2)[..4], &[0, 0, 255, 255]);
}

// ── Sheet tilesets ───────────────────────────────────────────────────────────

const SHEET_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="2" height="2" tilewidth="8" tileheight="8" infinite="0">
 <tileset firstgid="1" name="sheet" tilewidth="8" tileheight="8" tilecount="4" columns="2" spacing="2" margin="1">
  <image source="sheet.png" width="20" height="20"/>
 </tileset>
 <layer id="1" name="ground" width="2" height="2">
  <data encoding="csv">1,2,
3,4</data>
 </layer>
</map>
"#;

const CELL_COLOURS: [[u8; 4]; 4] = [
    [255, 0, 0, 255],
    [0, 255, 0, 255],
    [0, 0, 255, 255],
    [255, 255, 0, 255],
];

/// 20x20 sheet: 2x2 grid of 8x8 cells with margin 1 and spacing 2, each
/// cell painted one of CELL_COLOURS, the gutters transparent.
fn write_sheet_png(path: &std::path::Path) {
    let img = image::RgbaImage::from_fn(20, 20, |x, y| {
        let cell = match (x, y) {
            (1..=8, 1..=8) => Some(0),
            (11..=18, 1..=8) => Some(1),
            (1..=8, 11..=18) => Some(2),
            (11..=18, 11..=18) => Some(3),
            _ => None,
        };
        match cell {
            Some(i) => image::Rgba(CELL_COLOURS[i]),
            None => image::Rgba([0, 0, 0, 0]),
        }
    });
    img.save(path).unwrap();
}

#[test]
fn sheet_cells_are_cut_with_margin_and_spacing() {
    let dir = scratch_dir("sheet_cells");
    write_sheet_png(&dir.join("sheet.png"));
    write_file(&dir.join("map.tmx"), SHEET_MAP);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let atlas = build_atlas_image(&map, &gids).unwrap();

    assert_eq!(atlas.depth, 4);
    for (i, colour) in CELL_COLOURS.iter().enumerate() {
        assert_eq!(
            &atlas.slice(i as u32)[..4],
            colour,
            "cell {i} landed in the wrong slice"
        );
    }
}

const SHORT_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="8" tileheight="8" infinite="0">
 <tileset firstgid="1" name="short" tilewidth="8" tileheight="8" tilecount="4" columns="2">
  <image source="short.png" width="16" height="8"/>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn sheets_smaller_than_their_grid_are_rejected() {
    let dir = scratch_dir("short_sheet");
    write_png(&dir.join("short.png"), 16, 8, [9, 9, 9, 255]);
    write_file(&dir.join("map.tmx"), SHORT_SHEET);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let err = build_atlas_image(&map, &gids).unwrap_err();

    assert!(matches!(err, Error::SheetOutOfBounds { local_id: 2, .. }));
}

// ── Animations ───────────────────────────────────────────────────────────────

const ANIMATED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="16" tileheight="16" tilecount="3" columns="0">
  <tile id="0">
   <image source="t0.png" width="16" height="16"/>
   <animation>
    <frame tileid="1" duration="100"/>
    <frame tileid="2" duration="100"/>
   </animation>
  </tile>
  <tile id="1"><image source="t1.png" width="16" height="16"/></tile>
  <tile id="2"><image source="t2.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn animation_ranges_point_hosts_at_their_frame_lists() {
    let dir = scratch_dir("animation_ranges");
    for name in ["t0", "t1", "t2"] {
        write_png(&dir.join(format!("{name}.png")), 16, 16, [255, 255, 255, 255]);
    }
    write_file(&dir.join("map.tmx"), ANIMATED);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let table = build_animation_table(&map, &gids).unwrap();

    assert_eq!(table.ranges.len(), 3);
    assert_eq!(table.ranges[0], [0, 2], "host slice 0 owns two frames");
    assert_eq!(table.ranges[1], [0, 0], "frame tiles themselves stay static");
    assert_eq!(table.ranges[2], [0, 0]);
    assert_eq!(&table.frames[..2], &[1, 2], "frames store atlas slice indices");
}

const BAD_ANIMATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="16" tileheight="16" tilecount="2" columns="0">
  <tile id="0">
   <image source="t0.png" width="16" height="16"/>
   <animation>
    <frame tileid="9" duration="100"/>
   </animation>
  </tile>
  <tile id="1"><image source="t1.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn animation_frames_outside_the_tileset_are_rejected() {
    let dir = scratch_dir("bad_animation");
    write_png(&dir.join("t0.png"), 16, 16, [255, 255, 255, 255]);
    write_png(&dir.join("t1.png"), 16, 16, [255, 255, 255, 255]);
    write_file(&dir.join("map.tmx"), BAD_ANIMATION);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let err = build_animation_table(&map, &gids).unwrap_err();

    assert!(matches!(err, Error::AnimationOutOfRange { tile: 9, .. }));
}

// ── Load failures ────────────────────────────────────────────────────────────

const NO_TILESETS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">0</data>
 </layer>
</map>
"#;

#[test]
fn maps_without_tilesets_are_rejected() {
    let dir = scratch_dir("no_tilesets");
    write_file(&dir.join("map.tmx"), NO_TILESETS);

    let map = load_map(&dir.join("map.tmx"));
    let err = GidTable::from_map(&map).unwrap_err();

    assert!(matches!(err, Error::NoTilesets));
}

const IMAGELESS_TILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="16" tileheight="16" tilecount="2" columns="0">
  <tile id="0"><image source="t0.png" width="16" height="16"/></tile>
  <tile id="1">
   <properties>
    <property name="solid" type="bool" value="true"/>
   </properties>
  </tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn collection_tiles_without_images_are_rejected() {
    let dir = scratch_dir("imageless_tile");
    write_png(&dir.join("t0.png"), 16, 16, [255, 255, 255, 255]);
    write_file(&dir.join("map.tmx"), IMAGELESS_TILE);

    let map = load_map(&dir.join("map.tmx"));
    let err = GidTable::from_map(&map).unwrap_err();

    assert!(matches!(err, Error::MissingImage { local_id: 1, .. }));
}

const MISSING_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="16" tileheight="16" tilecount="1" columns="0">
  <tile id="0"><image source="missing.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn unreadable_tile_images_fail_the_load() {
    let dir = scratch_dir("missing_file");
    write_file(&dir.join("map.tmx"), MISSING_FILE);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let err = build_atlas_image(&map, &gids).unwrap_err();

    match err {
        Error::Image { path, .. } => assert!(path.ends_with("missing.png")),
        other => panic!("expected Image error, got {other:?}"),
    }
}

const WRONG_DECLARED_SIZE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" name="things" tilewidth="16" tileheight="16" tilecount="1" columns="0">
  <tile id="0"><image source="t0.png" width="16" height="16"/></tile>
 </tileset>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

#[test]
fn declared_image_sizes_must_match_the_file() {
    let dir = scratch_dir("wrong_declared_size");
    write_png(&dir.join("t0.png"), 8, 8, [255, 255, 255, 255]);
    write_file(&dir.join("map.tmx"), WRONG_DECLARED_SIZE);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let err = build_atlas_image(&map, &gids).unwrap_err();

    assert!(matches!(
        err,
        Error::ImageSizeMismatch {
            declared_w: 16,
            actual_w: 8,
            ..
        }
    ));
}

// ── External tilesets ────────────────────────────────────────────────────────

const EXTERNAL_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="1" height="1" tilewidth="16" tileheight="16" infinite="0">
 <tileset firstgid="1" source="ts/things.tsx"/>
 <layer id="1" name="ground" width="1" height="1">
  <data encoding="csv">1</data>
 </layer>
</map>
"#;

const EXTERNAL_TSX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.10" name="things" tilewidth="16" tileheight="16" tilecount="1" columns="0">
 <tile id="0"><image source="t0.png" width="16" height="16"/></tile>
</tileset>
"#;

#[test]
fn external_tileset_images_resolve_against_the_tsx() {
    let dir = scratch_dir("external_tileset");
    std::fs::create_dir_all(dir.join("ts")).unwrap();
    write_png(&dir.join("ts/t0.png"), 16, 16, [10, 20, 30, 255]);
    write_file(&dir.join("map.tmx"), EXTERNAL_MAP);
    write_file(&dir.join("ts/things.tsx"), EXTERNAL_TSX);

    let map = load_map(&dir.join("map.tmx"));
    let gids = GidTable::from_map(&map).unwrap();
    let atlas = build_atlas_image(&map, &gids).unwrap();

    assert_eq!(&atlas.slice(0)[..4], &[10, 20, 30, 255]);
}
