//! Frontal face detector backed by the `rustface` crate (SeetaFace funnel
//! cascade).
//!
//! Works on a grayscale copy of the frame; the sliding-window pyramid and
//! score threshold are taken from the service configuration.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Smallest window the SeetaFace cascade accepts.
const MIN_SUPPORTED_FACE_SIZE: u32 = 20;

/// Bounds for the pyramid step accepted by the cascade.
const MIN_PYRAMID_FACTOR: f32 = 0.1;
const MAX_PYRAMID_FACTOR: f32 = 0.99;

pub struct SeetaFaceDetector {
    detector: Box<dyn rustface::Detector>,
}

impl SeetaFaceDetector {
    /// Loads a SeetaFace model file and configures the cascade.
    ///
    /// `scale_factor` uses the cascade-classifier convention (window grows by
    /// this factor per pyramid level, e.g. 1.1); it is converted to the
    /// image shrink factor rustface expects.
    pub fn new(
        model_path: &Path,
        scale_factor: f32,
        score_threshold: f64,
        min_face_size: (u32, u32),
        window_step: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(model_path)
            .map_err(|e| format!("cannot open face model {}: {e}", model_path.display()))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| format!("invalid face model {}: {e}", model_path.display()))?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(min_window(min_face_size));
        detector.set_score_thresh(score_threshold);
        detector.set_pyramid_scale_factor(pyramid_factor(scale_factor));
        detector.set_slide_window_step(window_step.max(1), window_step.max(1));

        Ok(Self { detector })
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        let gray = to_grayscale(frame)?;
        let faces = self.detector.detect(&rustface::ImageData::new(
            &gray,
            frame.width(),
            frame.height(),
        ));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::new(bbox.x(), bbox.y(), bbox.width() as i32, bbox.height() as i32)
            })
            .collect())
    }
}

fn min_window(min_face_size: (u32, u32)) -> u32 {
    min_face_size
        .0
        .min(min_face_size.1)
        .max(MIN_SUPPORTED_FACE_SIZE)
}

fn pyramid_factor(scale_factor: f32) -> f32 {
    (1.0 / scale_factor).clamp(MIN_PYRAMID_FACTOR, MAX_PYRAMID_FACTOR)
}

fn to_grayscale(frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if frame.channels() != 3 {
        return Err(format!("expected RGB frame, got {} channels", frame.channels()).into());
    }
    let rgb = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("Failed to create image from frame data")?;
    Ok(image::imageops::grayscale(&rgb).into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pyramid_factor_inverts_cascade_scale() {
        assert_relative_eq!(pyramid_factor(1.25), 0.8);
        assert_relative_eq!(pyramid_factor(2.0), 0.5);
    }

    #[test]
    fn test_pyramid_factor_is_clamped() {
        assert_relative_eq!(pyramid_factor(1.0), MAX_PYRAMID_FACTOR);
        assert_relative_eq!(pyramid_factor(50.0), MIN_PYRAMID_FACTOR);
    }

    #[test]
    fn test_min_window_uses_smaller_side_with_floor() {
        assert_eq!(min_window((30, 40)), 30);
        assert_eq!(min_window((10, 10)), MIN_SUPPORTED_FACE_SIZE);
    }

    #[test]
    fn test_grayscale_of_white_is_white() {
        let frame = Frame::new(vec![255u8; 4 * 2 * 3], 4, 2, 3, 0);
        let gray = to_grayscale(&frame).unwrap();
        assert_eq!(gray.len(), 8);
        assert!(gray.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_grayscale_rejects_non_rgb() {
        let frame = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(to_grayscale(&frame).is_err());
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let result = SeetaFaceDetector::new(Path::new("/nonexistent/model.bin"), 1.1, 2.0, (30, 30), 4);
        assert!(result.is_err());
    }
}
