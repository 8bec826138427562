//! Face attribute classifier using ONNX Runtime via `ort`.
//!
//! Resizes each crop to the model input, applies the model's color
//! convention, stacks the batch into one tensor and maps each output row of
//! class scores to a label.
use std::path::Path;

use ndarray::Array4;

use crate::classification::domain::classifier::{scores_to_result, ClassificationResult, Classifier};
use crate::classification::domain::color_convention::ColorConvention;
use crate::shared::frame::Frame;
use crate::shared::label::LabelSet;

/// ImageNet channel means in BGR order, as used by Caffe-style ResNet exports.
const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// Tensor layout of the model input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputLayout {
    Nhwc,
    Nchw,
}

pub struct OnnxClassifier {
    session: ort::session::Session,
    labels: LabelSet,
    color: ColorConvention,
    layout: InputLayout,
    /// `(width, height)` of the model input.
    input_size: (u32, u32),
}

impl OnnxClassifier {
    /// Load a classification model and prepare for inference.
    ///
    /// Layout and input size are read from the model's input shape. Dynamic
    /// spatial dimensions fall back to `fallback_size` (`(width, height)`),
    /// and an unreadable shape is assumed to be NHWC, the Keras default.
    pub fn new(
        model_path: &Path,
        labels: LabelSet,
        color: ColorConvention,
        fallback_size: (u32, u32),
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(execution_providers())?
            .commit_from_file(model_path)?;

        let dims: Option<Vec<i64>> = session.inputs().first().and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                Some(shape.iter().copied().collect())
            } else {
                None
            }
        });
        let (layout, input_size) = match dims {
            Some(dims) => input_shape(&dims, fallback_size),
            None => (InputLayout::Nhwc, fallback_size),
        };
        log::info!(
            "Classifier input {}x{} ({:?}, {:?}), {} labels",
            input_size.0,
            input_size.1,
            layout,
            color,
            labels.len()
        );

        Ok(Self {
            session,
            labels,
            color,
            layout,
            input_size,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(
        &mut self,
        faces: &[Frame],
    ) -> Result<Vec<ClassificationResult>, Box<dyn std::error::Error>> {
        if faces.is_empty() {
            return Ok(Vec::new());
        }

        let tensor = preprocess(faces, self.input_size, self.layout, self.color)?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("classification model produced no outputs".into());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        let shape = scores.shape().to_vec();
        if shape.len() != 2 || shape[0] != faces.len() {
            return Err(format!(
                "unexpected classifier output shape {shape:?} for batch of {}",
                faces.len()
            )
            .into());
        }

        scores
            .outer_iter()
            .map(|row| {
                let row: Vec<f32> = row.iter().copied().collect();
                scores_to_result(&row, &self.labels)
            })
            .collect()
    }
}

/// Preferred execution providers for the current platform; empty means CPU.
fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Infers layout and `(width, height)` from a 4-D input shape.
fn input_shape(dims: &[i64], fallback_size: (u32, u32)) -> (InputLayout, (u32, u32)) {
    if dims.len() != 4 {
        return (InputLayout::Nhwc, fallback_size);
    }
    let (layout, h, w) = if dims[1] == 3 {
        (InputLayout::Nchw, dims[2], dims[3])
    } else {
        (InputLayout::Nhwc, dims[1], dims[2])
    };
    let size = if h > 0 && w > 0 {
        (w as u32, h as u32)
    } else {
        fallback_size
    };
    (layout, size)
}

/// Resize every crop to `size` and stack them into one normalised batch.
fn preprocess(
    faces: &[Frame],
    size: (u32, u32),
    layout: InputLayout,
    color: ColorConvention,
) -> Result<Array4<f32>, Box<dyn std::error::Error>> {
    let (w, h) = (size.0 as usize, size.1 as usize);
    let mut tensor = match layout {
        InputLayout::Nhwc => Array4::<f32>::zeros((faces.len(), h, w, 3)),
        InputLayout::Nchw => Array4::<f32>::zeros((faces.len(), 3, h, w)),
    };

    for (n, face) in faces.iter().enumerate() {
        if face.channels() != 3 {
            return Err(format!("expected RGB crop, got {} channels", face.channels()).into());
        }
        let rgb = image::RgbImage::from_raw(face.width(), face.height(), face.data().to_vec())
            .ok_or("Failed to create image from crop data")?;
        let resized =
            image::imageops::resize(&rgb, size.0, size.1, image::imageops::FilterType::Triangle);

        for (x, y, pixel) in resized.enumerate_pixels() {
            let values = normalize(pixel.0, color);
            let (x, y) = (x as usize, y as usize);
            for (c, value) in values.into_iter().enumerate() {
                match layout {
                    InputLayout::Nhwc => tensor[[n, y, x, c]] = value,
                    InputLayout::Nchw => tensor[[n, c, y, x]] = value,
                }
            }
        }
    }

    Ok(tensor)
}

fn normalize(rgb: [u8; 3], color: ColorConvention) -> [f32; 3] {
    match color {
        ColorConvention::CaffeBgr => [
            rgb[2] as f32 - CAFFE_MEAN_BGR[0],
            rgb[1] as f32 - CAFFE_MEAN_BGR[1],
            rgb[0] as f32 - CAFFE_MEAN_BGR[2],
        ],
        ColorConvention::UnitRgb => [
            rgb[0] as f32 / 255.0,
            rgb[1] as f32 / 255.0,
            rgb[2] as f32 / 255.0,
        ],
    }
}
