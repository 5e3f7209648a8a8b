use std::path::Path;

/// Decoded RGBA8 pixels, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub trait TextureLoader {
    fn load_image(&mut self, path: &Path) -> anyhow::Result<TextureImage>;
}

/// Any format the `image` crate decodes, converted to RGBA8
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageTextureLoader;

impl TextureLoader for ImageTextureLoader {
    fn load_image(&mut self, path: &Path) -> anyhow::Result<TextureImage> {
        let decoded = image::open(path)?.to_rgba8();
        Ok(TextureImage {
            width: decoded.width(),
            height: decoded.height(),
            pixels: decoded.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_to_rgba() {
        let path = std::env::temp_dir().join(format!("tabby-{}-texel.png", std::process::id()));
        let mut source = image::RgbImage::new(2, 3);
        source.put_pixel(1, 2, image::Rgb([10, 20, 30]));
        source.save(&path).unwrap();

        let loaded = ImageTextureLoader.load_image(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (2, 3));
        assert_eq!(loaded.pixels.len(), 2 * 3 * 4);
        let last = &loaded.pixels[loaded.pixels.len() - 4..];
        assert_eq!(last, &[10, 20, 30, 255]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_fails() {
        assert!(
            ImageTextureLoader
                .load_image(Path::new("/nonexistent/tabby.png"))
                .is_err()
        );
    }
}
