//! 2D texture resources.
//!
//! Textures for the scene objects are generated procedurally (checkerboard
//! for the board, a two-tone pattern for the dice); decoding image files is
//! out of scope. A texture is shared between objects through `Arc`, so the
//! pixel data is uploaded once however many objects reference it.

use crate::gpu::context::RenderContext;

pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl TextureResource {
    /// Upload tightly packed rgba8 pixels.
    pub fn from_pixels(
        ctx: &RenderContext,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// 1x1 single-color texture, used as the fallback binding for objects
    /// without a texture of their own.
    pub fn solid(ctx: &RenderContext, label: &str, rgba: [u8; 4]) -> Self {
        Self::from_pixels(ctx, label, 1, 1, &rgba)
    }

    pub fn checkerboard(
        ctx: &RenderContext,
        label: &str,
        size: u32,
        cells: u32,
        a: [u8; 4],
        b: [u8; 4],
    ) -> Self {
        let pixels = checkerboard_pixels(size, cells, a, b);
        Self::from_pixels(ctx, label, size, size, &pixels)
    }
}

/// Square checkerboard pixel data, `cells` x `cells` alternating fields.
pub fn checkerboard_pixels(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let cell = (size / cells).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let even = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend_from_slice(if even { &a } else { &b });
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_pixel_count() {
        let pixels = checkerboard_pixels(64, 8, [255; 4], [0, 0, 0, 255]);
        assert_eq!(pixels.len(), 64 * 64 * 4);
    }

    #[test]
    fn test_checkerboard_alternates() {
        let white = [255u8; 4];
        let black = [0, 0, 0, 255];
        let pixels = checkerboard_pixels(4, 2, white, black);
        // 2x2 cells of 2x2 pixels each; (0,0) white, (2,0) black.
        assert_eq!(&pixels[0..4], &white);
        assert_eq!(&pixels[2 * 4..2 * 4 + 4], &black);
        // One row down stays in the same cell row.
        assert_eq!(&pixels[4 * 4 * 1..4 * 4 * 1 + 4], &white);
        // Two rows down flips.
        assert_eq!(&pixels[4 * 4 * 2..4 * 4 * 2 + 4], &black);
    }

    #[test]
    fn test_checkerboard_degenerate_cells() {
        // cells larger than size must not divide by zero.
        let pixels = checkerboard_pixels(2, 16, [255; 4], [0; 4]);
        assert_eq!(pixels.len(), 2 * 2 * 4);
    }
}
