//! Offscreen render target sets.
//!
//! A [`RenderTargets`] groups same-sized attachments (color, object id,
//! normal, depth) into one render destination. Attachments are fixed-size
//! once created, so resizing destroys and recreates the whole set. Layout
//! validation is a pure function so the completeness rules stay testable
//! without a device.

use crate::error::TargetError;
use crate::gpu::context::RenderContext;

/// Semantic role of one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRole {
    Color,
    ObjectId,
    Normal,
    Depth,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachmentSpec {
    pub role: AttachmentRole,
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
    pub label: &'static str,
}

impl AttachmentSpec {
    pub const fn new(
        role: AttachmentRole,
        format: wgpu::TextureFormat,
        filter: wgpu::FilterMode,
        label: &'static str,
    ) -> Self {
        Self {
            role,
            format,
            filter,
            label,
        }
    }
}

/// Formats the standard layouts use; the pass pipelines are built against
/// these.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Sint;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The attachment layout used by the deferred pipeline: color, integer
/// object id, world normal and depth.
pub fn deferred_specs() -> Vec<AttachmentSpec> {
    vec![
        AttachmentSpec::new(
            AttachmentRole::Color,
            COLOR_FORMAT,
            wgpu::FilterMode::Linear,
            "color",
        ),
        AttachmentSpec::new(
            AttachmentRole::ObjectId,
            ID_FORMAT,
            wgpu::FilterMode::Nearest,
            "object-id",
        ),
        AttachmentSpec::new(
            AttachmentRole::Normal,
            NORMAL_FORMAT,
            wgpu::FilterMode::Linear,
            "normal",
        ),
        AttachmentSpec::new(
            AttachmentRole::Depth,
            DEPTH_FORMAT,
            wgpu::FilterMode::Nearest,
            "depth",
        ),
    ]
}

/// The reduced layout used for the spot light's view: color and depth only.
pub fn light_view_specs() -> Vec<AttachmentSpec> {
    vec![
        AttachmentSpec::new(
            AttachmentRole::Color,
            COLOR_FORMAT,
            wgpu::FilterMode::Linear,
            "light color",
        ),
        AttachmentSpec::new(
            AttachmentRole::Depth,
            DEPTH_FORMAT,
            wgpu::FilterMode::Nearest,
            "light depth",
        ),
    ]
}

fn is_color_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Rgba8Unorm
            | wgpu::TextureFormat::Bgra8Unorm
            | wgpu::TextureFormat::Rgba16Float
            | wgpu::TextureFormat::Rgba32Float
    )
}

fn is_integer_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::R32Sint | wgpu::TextureFormat::R32Uint
    )
}

fn is_depth_format(format: wgpu::TextureFormat) -> bool {
    matches!(
        format,
        wgpu::TextureFormat::Depth32Float
            | wgpu::TextureFormat::Depth24Plus
            | wgpu::TextureFormat::Depth24PlusStencil8
    )
}

/// Check that a requested layout can form a complete target set. Mirrors the
/// validation a framebuffer-completeness check would report, but up front.
pub fn validate_layout(
    width: u32,
    height: u32,
    specs: &[AttachmentSpec],
) -> Result<(), TargetError> {
    if width == 0 || height == 0 {
        return Err(TargetError::ZeroSize { width, height });
    }

    let depth_count = specs
        .iter()
        .filter(|s| s.role == AttachmentRole::Depth)
        .count();
    if depth_count == 0 {
        return Err(TargetError::MissingDepth);
    }
    if depth_count > 1 {
        return Err(TargetError::DuplicateDepth);
    }
    if specs.len() == depth_count {
        return Err(TargetError::MissingColor);
    }

    for spec in specs {
        let ok = match spec.role {
            AttachmentRole::Color | AttachmentRole::Normal => is_color_format(spec.format),
            AttachmentRole::ObjectId => is_integer_format(spec.format),
            AttachmentRole::Depth => is_depth_format(spec.format),
        };
        if !ok {
            return Err(TargetError::UnsupportedFormat {
                label: spec.label,
                role: spec.role,
                format: spec.format,
            });
        }
        if is_integer_format(spec.format) && spec.filter != wgpu::FilterMode::Nearest {
            return Err(TargetError::IntegerFilter { label: spec.label });
        }
    }
    Ok(())
}

/// One attachment image bound into the set.
pub struct Attachment {
    pub spec: AttachmentSpec,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub struct RenderTargets {
    width: u32,
    height: u32,
    specs: Vec<AttachmentSpec>,
    /// Color-class attachments in spec order (the draw-buffer order the
    /// pipelines are built against).
    attachments: Vec<Attachment>,
    depth: Option<Attachment>,
    complete: bool,
}

impl RenderTargets {
    pub fn new(
        ctx: &RenderContext,
        width: u32,
        height: u32,
        specs: Vec<AttachmentSpec>,
    ) -> Result<Self, TargetError> {
        validate_layout(width, height, &specs)?;
        let mut targets = Self {
            width,
            height,
            specs,
            attachments: Vec::new(),
            depth: None,
            complete: false,
        };
        targets.create(ctx);
        Ok(targets)
    }

    fn create(&mut self, ctx: &RenderContext) {
        for spec in &self.specs {
            let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(spec.label),
                size: wgpu::Extent3d {
                    width: self.width,
                    height: self.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: spec.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let attachment = Attachment {
                spec: *spec,
                texture,
                view,
            };
            if spec.role == AttachmentRole::Depth {
                self.depth = Some(attachment);
            } else {
                self.attachments.push(attachment);
            }
        }
        self.complete = true;
    }

    /// Release every attachment. Safe to call on an already-destroyed set.
    pub fn destroy(&mut self) {
        self.attachments.clear();
        self.depth = None;
        self.complete = false;
    }

    /// Recreate the attachments at a new size. A no-op when the set is
    /// complete and already has the requested size.
    pub fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) -> Result<(), TargetError> {
        if self.complete && self.width == width && self.height == height {
            return Ok(());
        }
        validate_layout(width, height, &self.specs)?;
        self.destroy();
        self.width = width;
        self.height = height;
        self.create(ctx);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// First attachment with the given role, if present.
    pub fn attachment(&self, role: AttachmentRole) -> Option<&Attachment> {
        if role == AttachmentRole::Depth {
            self.depth.as_ref()
        } else {
            self.attachments.iter().find(|a| a.spec.role == role)
        }
    }

    /// Color attachment list for a render pass, with per-role clear values:
    /// color clears to the background, ids to the sentinel 0, normals to 0.
    pub fn color_attachments(
        &self,
        background: [f32; 3],
    ) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        self.attachments
            .iter()
            .map(|attachment| {
                let clear = match attachment.spec.role {
                    AttachmentRole::Color => wgpu::Color {
                        r: background[0] as f64,
                        g: background[1] as f64,
                        b: background[2] as f64,
                        a: 1.0,
                    },
                    _ => wgpu::Color::TRANSPARENT,
                };
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect()
    }

    /// Depth attachment for a render pass, cleared to the far plane.
    pub fn depth_attachment(&self) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
        self.depth
            .as_ref()
            .map(|attachment| wgpu::RenderPassDepthStencilAttachment {
                view: &attachment.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_layout_is_valid() {
        assert!(validate_layout(800, 600, &deferred_specs()).is_ok());
        assert!(validate_layout(2048, 2048, &light_view_specs()).is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            validate_layout(0, 600, &deferred_specs()),
            Err(TargetError::ZeroSize { .. })
        ));
    }

    #[test]
    fn test_missing_depth_rejected() {
        let specs: Vec<_> = deferred_specs()
            .into_iter()
            .filter(|s| s.role != AttachmentRole::Depth)
            .collect();
        assert!(matches!(
            validate_layout(800, 600, &specs),
            Err(TargetError::MissingDepth)
        ));
    }

    #[test]
    fn test_duplicate_depth_rejected() {
        let mut specs = deferred_specs();
        specs.push(AttachmentSpec::new(
            AttachmentRole::Depth,
            wgpu::TextureFormat::Depth32Float,
            wgpu::FilterMode::Nearest,
            "second depth",
        ));
        assert!(matches!(
            validate_layout(800, 600, &specs),
            Err(TargetError::DuplicateDepth)
        ));
    }

    #[test]
    fn test_depth_only_rejected() {
        let specs: Vec<_> = deferred_specs()
            .into_iter()
            .filter(|s| s.role == AttachmentRole::Depth)
            .collect();
        assert!(matches!(
            validate_layout(800, 600, &specs),
            Err(TargetError::MissingColor)
        ));
    }

    #[test]
    fn test_float_id_format_rejected() {
        let mut specs = deferred_specs();
        specs[1].format = wgpu::TextureFormat::Rgba8Unorm;
        assert!(matches!(
            validate_layout(800, 600, &specs),
            Err(TargetError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_filtered_integer_rejected() {
        let mut specs = deferred_specs();
        specs[1].filter = wgpu::FilterMode::Linear;
        assert!(matches!(
            validate_layout(800, 600, &specs),
            Err(TargetError::IntegerFilter { .. })
        ));
    }
}
