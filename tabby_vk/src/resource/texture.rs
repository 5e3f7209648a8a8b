use std::path::PathBuf;

use ash::vk;
use derivative::Derivative;

use super::{ImageView, ResourceImage, Sampler, TransferBuffer};
use crate::config::SamplerSettings;
use crate::traits::Destructible;
use crate::{Result, TabbyError};

pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Number of bytes of a tightly packed RGBA8 image, [`None`] on overflow
pub fn rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
}

/// Checks `pixels` is exactly `width * height` RGBA8 texels
pub fn validate_rgba(width: u32, height: u32, pixels: &[u8]) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(TabbyError::TextureAlloc);
    }
    match rgba_len(width, height) {
        Some(expected) if expected == pixels.len() => Ok(()),
        expected => Err(TabbyError::TextureLoad {
            path: PathBuf::new(),
            reason: format!(
                "expected {} bytes of RGBA8 for {width}x{height}, got {}",
                expected.map_or_else(|| String::from("too many"), |len| len.to_string()),
                pixels.len()
            ),
        }),
    }
}

/// Sampled RGBA8 texture
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Texture {
    image: ResourceImage,
    view: ImageView,
    sampler: Sampler,
}

impl Texture {
    /// Uploads `pixels` into a new shader readable image. `pool` must be a graphics pool
    /// since the upload runs layout transitions.
    pub fn from_rgba(
        pool: &crate::command::CommandPool,
        settings: &SamplerSettings,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self> {
        validate_rgba(width, height, pixels)?;
        let device = pool.get_device().clone();

        let mut staging = TransferBuffer::new_host_visible(
            device.clone(),
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )?;
        let image = staging.fill(pixels).and_then(|_| {
            let image = ResourceImage::new(
                device.clone(),
                width,
                height,
                TEXTURE_FORMAT,
                vk::ImageTiling::OPTIMAL,
                vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            image.transition_layout(
                pool,
                TEXTURE_FORMAT,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )?;
            image.copy_from_buffer(pool, &staging, width, height)?;
            image.transition_layout(
                pool,
                TEXTURE_FORMAT,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?;
            Ok(image)
        });
        staging.destroy();
        let mut image = image?;

        let view = match ImageView::new(
            device.clone(),
            image.handle(),
            TEXTURE_FORMAT,
            vk::ImageAspectFlags::COLOR,
        ) {
            Ok(view) => view,
            Err(err) => {
                image.destroy();
                return Err(err);
            }
        };
        let sampler = match Sampler::new(device, settings) {
            Ok(sampler) => sampler,
            Err(err) => {
                let mut view = view;
                view.destroy();
                image.destroy();
                return Err(err);
            }
        };
        Ok(Self {
            image,
            view,
            sampler,
        })
    }

    pub fn image(&self) -> &ResourceImage {
        &self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }
}

impl Destructible for Texture {
    fn destroy(&mut self) {
        self.sampler.destroy();
        self.view.destroy();
        self.image.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_length_must_match() {
        assert!(validate_rgba(2, 2, &[0u8; 16]).is_ok());
        assert!(matches!(
            validate_rgba(2, 2, &[0u8; 15]),
            Err(TabbyError::TextureLoad { .. })
        ));
        assert_eq!(validate_rgba(0, 4, &[]), Err(TabbyError::TextureAlloc));
        assert_eq!(rgba_len(3, 5), Some(60));
    }
}
