use std::time::Duration;

use crate::reporting::domain::frame_sink::FrameSink;
use crate::reporting::domain::report_sink::ReportError;
use crate::reporting::infrastructure::http_report_sink::endpoint_url;
use crate::shared::constants::{FRAME_ENDPOINT, FRAME_FIELD_NAME};
use crate::shared::frame::Frame;

/// Streams JPEG stills of the processed frames to the dashboard.
pub struct HttpFrameSink {
    client: reqwest::blocking::Client,
    url: String,
    quality: u8,
}

impl HttpFrameSink {
    pub fn new(base_url: &str, timeout: Duration, quality: u8) -> Result<Self, ReportError> {
        let url = endpoint_url(base_url, FRAME_ENDPOINT);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ReportError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            url,
            quality,
        })
    }
}

impl FrameSink for HttpFrameSink {
    fn publish(&mut self, frame: &Frame) -> Result<(), ReportError> {
        let jpeg = encode_jpeg(frame, self.quality)?;
        let part = reqwest::blocking::multipart::Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|source| ReportError::Http {
                url: self.url.clone(),
                source,
            })?;
        let form = reqwest::blocking::multipart::Form::new().part(FRAME_FIELD_NAME, part);

        self.client
            .post(&self.url)
            .multipart(form)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|source| ReportError::Http {
                url: self.url.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Encodes an RGB frame as a baseline JPEG at the given quality (1-100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    {
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode(
            frame.data(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_produces_decodable_image() {
        let frame = Frame::new(vec![90u8; 32 * 16 * 3], 32, 16, 3, 0);
        let jpeg = encode_jpeg(&frame, 85).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
    }

    #[test]
    fn test_lower_quality_is_not_larger() {
        let data: Vec<u8> = (0..64 * 64 * 3).map(|i| (i * 7 % 251) as u8).collect();
        let frame = Frame::new(data, 64, 64, 3, 0);
        let high = encode_jpeg(&frame, 95).unwrap();
        let low = encode_jpeg(&frame, 10).unwrap();
        assert!(low.len() <= high.len());
    }
}
