//! Reading attachment contents back to the CPU.
//!
//! Two flavors: a single-texel read used by the picking protocol, and a
//! whole-attachment read used for image export. Both submit their own copy
//! and block until the staging buffer is mapped - the one deliberate
//! synchronization point in the frame, which is allowed to stall.

use crate::error::RenderError;
use crate::gpu::context::RenderContext;

/// Round a row byte count up to wgpu's buffer copy row alignment.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn map_blocking(ctx: &RenderContext, buffer: &wgpu::Buffer) -> Result<(), RenderError> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| RenderError::Readback("map callback dropped".into()))?
        .map_err(|err| RenderError::Readback(err.to_string()))
}

/// Read one texel of a 4-byte-per-texel attachment as a raw little-endian
/// i32. `(x, y)` are texel coordinates with the top-left origin wgpu
/// textures use - the same orientation as window mouse coordinates, so no
/// row flip is involved.
pub fn read_pixel_i32(
    ctx: &RenderContext,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
) -> Result<i32, RenderError> {
    if x >= texture.width() || y >= texture.height() {
        return Err(RenderError::Readback(format!(
            "texel ({x}, {y}) outside {}x{} attachment",
            texture.width(),
            texture.height()
        )));
    }

    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("pick staging"),
        size: 4,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pick readback"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                // A single-row copy needs no row padding.
                bytes_per_row: None,
                rows_per_image: None,
            },
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    map_blocking(ctx, &staging)?;
    let value = {
        let data = staging.slice(..).get_mapped_range();
        i32::from_le_bytes([data[0], data[1], data[2], data[3]])
    };
    staging.unmap();
    Ok(value)
}

/// Read a whole `Rgba16Float` attachment, returning rgba f32 values row by
/// row (top row first), row padding stripped.
pub fn read_texture_rgba16f(
    ctx: &RenderContext,
    texture: &wgpu::Texture,
) -> Result<Vec<f32>, RenderError> {
    let width = texture.width();
    let height = texture.height();
    let unpadded = width * 8;
    let padded = padded_bytes_per_row(unpadded);

    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("image staging"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("image readback"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    map_blocking(ctx, &staging)?;
    let mut values = Vec::with_capacity((width * height * 4) as usize);
    {
        let data = staging.slice(..).get_mapped_range();
        for row in 0..height {
            let start = (row * padded) as usize;
            let row_bytes = &data[start..start + unpadded as usize];
            for half_bytes in row_bytes.chunks_exact(2) {
                let bits = u16::from_le_bytes([half_bytes[0], half_bytes[1]]);
                values.push(half::f16::from_bits(bits).to_f32());
            }
        }
    }
    staging.unmap();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
        assert_eq!(padded_bytes_per_row(4), 256);
        assert_eq!(padded_bytes_per_row(800 * 8), 6400);
    }
}
