use image::DynamicImage;

use super::{Payload, Transform, TransformContext};

/// Fan-out: keeps the input and adds a lossy WebP copy of it.
pub struct WebpTransform {
    quality: f32,
}

impl WebpTransform {
    pub fn new(quality: f32) -> Self {
        Self {
            quality: quality.clamp(0.0, 100.0),
        }
    }
}

impl Transform for WebpTransform {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        let img = image::load_from_memory(&payload.bytes)?;
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
        let encoder = webp::Encoder::from_image(&rgba)
            .map_err(|e| anyhow::anyhow!("cannot encode {} as webp: {}", payload.file_name, e))?;
        let memory = encoder.encode(self.quality);

        let webp = Payload::new(payload.renamed("webp"), memory.to_vec());
        Ok(vec![payload, webp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn ctx() -> TransformContext {
        TransformContext {
            source: PathBuf::from("/src/img/logo.png"),
            context_dir: PathBuf::from("/src"),
            source_maps: false,
        }
    }

    #[test]
    fn test_fans_out_original_and_webp() {
        let img = ImageBuffer::from_pixel(16, 16, Rgba([200u8, 10, 10, 255]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let out = WebpTransform::new(75.0)
            .apply(Payload::new("logo.png", png.clone()), &ctx())
            .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].file_name, "logo.png");
        assert_eq!(out[0].bytes, png);
        assert_eq!(out[1].file_name, "logo.webp");
        assert_eq!(&out[1].bytes[..4], b"RIFF");
        assert_eq!(&out[1].bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_undecodable_input_fails() {
        let result = WebpTransform::new(75.0).apply(Payload::new("x.png", vec![1, 2, 3]), &ctx());
        assert!(result.is_err());
    }
}
