//! Image decode and normalization for model input.
//!
//! Turns an uploaded image file into the fixed-shape tensor the
//! classifiers expect: a single-sample batch of a square RGB image
//! with values scaled to [0, 1].

use crate::error::{Result, ServiceError};
use image::imageops::FilterType;

/// Normalized model input: NHWC `[1, size, size, 3]`, f32 in [0, 1].
#[derive(Debug, Clone)]
pub struct ImageTensor {
    size: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Wrap pre-normalized values. Fails when the length does not match
    /// the declared square RGB shape.
    pub fn from_values(size: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != size * size * 3 {
            return Err(ServiceError::InvalidImage(format!(
                "expected {} values for a {size}x{size}x3 tensor, got {}",
                size * size * 3,
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    /// Tensor shape including the batch dimension.
    pub fn shape(&self) -> [i64; 4] {
        [1, self.size as i64, self.size as i64, 3]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Decode/normalize utility for uploaded images.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    image_size: u32,
    max_upload_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl ImagePreprocessor {
    pub fn new(image_size: u32, max_upload_bytes: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            image_size,
            max_upload_bytes,
            allowed_extensions,
        }
    }

    /// Validate an upload before decoding: non-empty, within the size
    /// limit, and (when a filename is supplied) an allowed extension.
    pub fn validate_upload(&self, bytes: &[u8], filename: Option<&str>) -> Result<()> {
        if bytes.is_empty() {
            return Err(ServiceError::InvalidImage("file is empty".into()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::InvalidImage(format!(
                "file too large: maximum size is {} bytes",
                self.max_upload_bytes
            )));
        }
        if let Some(name) = filename {
            let extension = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
            if !self.allowed_extensions.iter().any(|e| e == &extension) {
                return Err(ServiceError::InvalidImage(format!(
                    "invalid file type .{extension}, allowed: {}",
                    self.allowed_extensions.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Decode image bytes and normalize into the model input tensor:
    /// RGB, resized to the configured square, scaled by 1/255.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<ImageTensor> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ServiceError::InvalidImage(format!("cannot decode image: {e}")))?;

        let resized = decoded
            .resize_exact(self.image_size, self.image_size, FilterType::Triangle)
            .to_rgb8();

        let data: Vec<f32> = resized.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
        ImageTensor::from_values(self.image_size as usize, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor() -> ImagePreprocessor {
        ImagePreprocessor::new(
            64,
            16 * 1024 * 1024,
            vec!["png".into(), "jpg".into(), "jpeg".into()],
        )
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, _| image::Rgb([x as u8, 128, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_preprocess_produces_normalized_square_tensor() {
        let tensor = preprocessor().preprocess(&png_bytes(120, 80)).unwrap();
        assert_eq!(tensor.shape(), [1, 64, 64, 3]);
        assert_eq!(tensor.data().len(), 64 * 64 * 3);
        assert!(tensor.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_rejects_undecodable_bytes() {
        let err = preprocessor().preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
    }

    #[test]
    fn test_upload_validation() {
        let p = preprocessor();
        assert!(p.validate_upload(&[1, 2, 3], Some("cell.png")).is_ok());
        assert!(p.validate_upload(&[1, 2, 3], Some("cell.JPG")).is_ok());
        assert!(p.validate_upload(&[], Some("cell.png")).is_err());
        assert!(p.validate_upload(&[1, 2, 3], Some("cell.gif")).is_err());

        let small = ImagePreprocessor::new(64, 2, vec!["png".into()]);
        assert!(small.validate_upload(&[1, 2, 3], None).is_err());
    }

    #[test]
    fn test_tensor_shape_mismatch_rejected() {
        let err = ImageTensor::from_values(64, vec![0.0; 10]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidImage(_)));
    }
}
