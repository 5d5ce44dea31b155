use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tracing::trace;

use super::{Payload, Transform, TransformContext};

/// Recompress JPEG (lossy, at `jpeg_quality`) and PNG (lossless). Other
/// formats and re-encodes that come out larger keep the original bytes.
pub struct ImageTransform {
    jpeg_quality: u8,
}

impl ImageTransform {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn reencode(&self, format: ImageFormat, img: &DynamicImage) -> anyhow::Result<Option<Vec<u8>>> {
        let mut buffer = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let mut encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
                encoder.encode_image(&rgb)?;
            }
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buffer,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)?;
            }
            _ => return Ok(None),
        }
        Ok(Some(buffer))
    }
}

impl Transform for ImageTransform {
    fn name(&self) -> &'static str {
        "image"
    }

    fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        let format = image::guess_format(&payload.bytes)?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Ok(vec![payload]);
        }

        let img = image::load_from_memory_with_format(&payload.bytes, format)?;
        match self.reencode(format, &img)? {
            Some(bytes) if bytes.len() < payload.bytes.len() => {
                trace!(
                    "{}: {} -> {} bytes",
                    payload.file_name,
                    payload.bytes.len(),
                    bytes.len()
                );
                Ok(vec![Payload { bytes, ..payload }])
            }
            _ => Ok(vec![payload]),
        }
    }
}
