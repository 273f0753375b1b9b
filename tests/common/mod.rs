// Shared fixture plumbing: each test assembles a tiny Tiled document tree
// in its own scratch directory under the system temp dir.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

/// Fresh scratch directory unique to one test.
pub fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wgpu_tmx_{}_{}", test, std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a solid-colour RGBA png.
pub fn write_png(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
    RgbaImage::from_pixel(w, h, Rgba(rgba)).save(path).unwrap();
}

pub fn write_file(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

pub fn load_map(path: &Path) -> tiled::Map {
    tiled::Loader::new().load_tmx_map(path).unwrap()
}
