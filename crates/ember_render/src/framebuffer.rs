//! Framebuffers owning their color and depth attachments

use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::resource::{FramebufferId, TextureDesc, TextureFormat, TextureId};

/// Off-screen render target
///
/// Owns its attachments; call [`Framebuffer::release`] to free them.
#[derive(Debug)]
pub struct Framebuffer {
    id: FramebufferId,
    color: Option<TextureId>,
    depth: Option<TextureId>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    /// Color (RGBA8) plus depth target
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<Self> {
        let color = device.create_texture(&TextureDesc::new_2d(
            width,
            height,
            TextureFormat::Rgba8Unorm,
        ))?;
        let depth = device.create_texture(&TextureDesc::new_2d(
            width,
            height,
            TextureFormat::Depth24Plus,
        ))?;
        let id = device.create_framebuffer(Some(color), Some(depth))?;
        Ok(Self {
            id,
            color: Some(color),
            depth: Some(depth),
            width,
            height,
        })
    }

    /// Depth-only target (shadow maps)
    pub fn depth_only(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<Self> {
        let depth = device.create_texture(&TextureDesc::new_2d(
            width,
            height,
            TextureFormat::Depth32Float,
        ))?;
        let id = device.create_framebuffer(None, Some(depth))?;
        Ok(Self {
            id,
            color: None,
            depth: Some(depth),
            width,
            height,
        })
    }

    pub fn id(&self) -> FramebufferId {
        self.id
    }

    pub fn color_texture(&self) -> Option<TextureId> {
        self.color
    }

    pub fn depth_texture(&self) -> Option<TextureId> {
        self.depth
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(Some(self.id));
    }

    /// Bind the default framebuffer
    pub fn unbind(device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(None);
    }

    /// Reallocate attachments at a new size; contents are lost
    pub fn rescale(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        for texture in self.color.iter().chain(self.depth.iter()) {
            device.resize_texture(*texture, width, height);
        }
        self.width = width;
        self.height = height;
    }

    /// Delete the framebuffer and its attachments
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.delete_framebuffer(self.id);
        for texture in self.color.into_iter().chain(self.depth) {
            device.delete_texture(texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;

    #[test]
    fn test_release_frees_attachments() {
        let mut device = HeadlessDevice::new();
        let fb = Framebuffer::new(&mut device, 64, 32).unwrap();
        assert_eq!(device.live_textures(), 2);
        assert_eq!(device.live_framebuffers(), 1);

        fb.release(&mut device);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_framebuffers(), 0);
    }

    #[test]
    fn test_rescale() {
        let mut device = HeadlessDevice::new();
        let mut fb = Framebuffer::new(&mut device, 64, 32).unwrap();
        fb.rescale(&mut device, 128, 128);

        assert_eq!((fb.width(), fb.height()), (128, 128));
        let color = fb.color_texture().unwrap();
        assert_eq!(device.texture_desc(color).map(|d| d.width), Some(128));
    }

    #[test]
    fn test_depth_only_has_no_color() {
        let mut device = HeadlessDevice::new();
        let fb = Framebuffer::depth_only(&mut device, 256, 256).unwrap();
        assert!(fb.color_texture().is_none());
        assert_eq!(
            device.framebuffer_attachments(fb.id()),
            Some((None, fb.depth_texture()))
        );
    }
}
