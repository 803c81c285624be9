// src/store.rs
// Lightmap persistence: headerless raw f32 atlas plus a PNG preview.
// The baker always knows the atlas size from its configuration, so the raw
// format carries no header; a size mismatch is a configuration error.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::framebuffer::Framebuffer;

/// Bytes per texel: four little-endian f32 channels.
const TEXEL_BYTES: usize = 16;

/// Write the framebuffer as raw little-endian f32 RGBA, row-major, rows
/// top to bottom. `4 * 4 * L * L` bytes, no header.
pub fn save(framebuffer: &Framebuffer, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in framebuffer.as_f32_slice() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    log::info!(
        "saved {}x{0} lightmap to {}",
        framebuffer.size(),
        path.display()
    );
    Ok(())
}

/// Read a framebuffer saved by `save`. The file length must be exactly
/// `4 * 4 * size * size` bytes.
pub fn load(path: &Path, size: u32) -> Result<Framebuffer> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    let expected = (size * size) as usize * TEXEL_BYTES;
    if bytes.len() != expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "{} is {} bytes, expected {expected} for a {size}x{size} lightmap",
                path.display(),
                bytes.len()
            ),
        )
        .into());
    }

    let texels = bytes
        .chunks_exact(TEXEL_BYTES)
        .map(|chunk| {
            let mut texel = [0.0f32; 4];
            for (channel, le) in texel.iter_mut().zip(chunk.chunks_exact(4)) {
                *channel = f32::from_le_bytes([le[0], le[1], le[2], le[3]]);
            }
            texel
        })
        .collect();
    Framebuffer::from_texels(size, texels)
}

/// Tonemapped 8-bit preview for eyeballing a bake. Never read back.
pub fn save_preview_png(framebuffer: &Framebuffer, path: &Path) -> Result<()> {
    let size = framebuffer.size();
    let mut image = image::RgbaImage::new(size, size);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let [r, g, b, a] = framebuffer.texel(x, y);
        *pixel = image::Rgba([tonemap(r), tonemap(g), tonemap(b), if a > 0.0 { 255 } else { 0 }]);
    }
    image
        .save(path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    Ok(())
}

/// Reinhard plus gamma 2.2; HDR irradiance spans several decades.
#[inline]
fn tonemap(value: f32) -> u8 {
    let v = (value.max(0.0) / (1.0 + value.max(0.0))).powf(1.0 / 2.2);
    (v * 255.0 + 0.5) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_roundtrip_is_bit_exact() {
        let mut fb = Framebuffer::new(16);
        for y in 0..16 {
            for x in 0..16 {
                fb.set_texel(x, y, [x as f32 * 0.1, y as f32 * 10.0, -1.5, 1.0]);
            }
        }
        let dir = std::env::temp_dir().join("lightforge_store_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.raw");

        save(&fb, &path).unwrap();
        let loaded = load(&path, 16).unwrap();
        assert_eq!(loaded, fb);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn wrong_size_is_rejected() {
        let fb = Framebuffer::new(8);
        let dir = std::env::temp_dir().join("lightforge_store_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("wrong_size.raw");

        save(&fb, &path).unwrap();
        assert!(load(&path, 16).is_err());
        std::fs::remove_file(&path).ok();
    }
}
