//! JPEG frame decoding.

use std::sync::Arc;

use image::{GenericImageView, ImageFormat};

use crate::error::{PipelineError, PipelineResult};

/// A frame that decoded successfully.
///
/// Only the original JPEG bytes and the dimensions are kept; replay buffers
/// hold these rather than raw pixels.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    jpeg: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl DecodedFrame {
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Decode on the blocking pool. Any decode failure is a `MalformedJob`.
pub async fn decode_jpeg(jpeg: Arc<[u8]>) -> PipelineResult<DecodedFrame> {
    tokio::task::spawn_blocking(move || decode_jpeg_blocking(jpeg))
        .await
        .map_err(|e| PipelineError::malformed(format!("decode task failed: {}", e)))?
}

fn decode_jpeg_blocking(jpeg: Arc<[u8]>) -> PipelineResult<DecodedFrame> {
    let image = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
        .map_err(|e| PipelineError::malformed(format!("frame is not a valid JPEG: {}", e)))?;
    let (width, height) = image.dimensions();

    Ok(DecodedFrame {
        jpeg,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::ColorType;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let pixels = vec![128u8; (width * height * 3) as usize];
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 80)
            .encode(&pixels, width, height, ColorType::Rgb8)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_decode_reads_dimensions() {
        let frame = decode_jpeg(jpeg(16, 8).into()).await.unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let err = decode_jpeg(vec![1, 2, 3, 4].into()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedJob(_)));
    }
}
