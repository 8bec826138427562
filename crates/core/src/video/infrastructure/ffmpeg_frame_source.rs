use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Captures frames from a camera, network stream, or file via ffmpeg-next.
///
/// `source` is anything libavformat can open: a V4L2 device such as
/// `/dev/video0`, an `rtsp://` or `http://` stream, or a video file.
/// Every decoded frame is converted to tightly packed RGB24.
pub struct FfmpegFrameSource {
    source: String,
    decoding: Option<Decoding>,
    next_index: u64,
}

struct Decoding {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

impl FfmpegFrameSource {
    pub fn open(source: &str) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let ictx = ffmpeg_next::format::input(&source)?;
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| format!("no video stream in {source}"))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!("Opened video source {source} ({width}x{height})");
        Ok(Self {
            source: source.to_string(),
            decoding: Some(Decoding {
                ictx,
                decoder,
                scaler,
                stream_index,
                width,
                height,
                flushing: false,
            }),
            next_index: 0,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_released(&self) -> bool {
        self.decoding.is_none()
    }
}

impl Decoding {
    fn receive(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;
        Ok(Some(extract_rgb_pixels(
            rgb.data(0),
            rgb.stride(0),
            self.width,
            self.height,
        )))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(d) = self.decoding.as_mut() else {
            return Ok(None);
        };

        loop {
            if let Some(pixels) = d.receive()? {
                self.next_index += 1;
                return Ok(Some(Frame::new(
                    pixels,
                    d.width,
                    d.height,
                    3,
                    self.next_index,
                )));
            }
            if d.flushing {
                return Ok(None);
            }

            match d.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != d.stream_index {
                        continue;
                    }
                    if let Err(e) = d.decoder.send_packet(&packet) {
                        log::debug!("Dropped undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = d.decoder.send_eof();
                    d.flushing = true;
                }
            }
        }
    }

    fn release(&mut self) {
        if self.decoding.take().is_some() {
            log::info!("Released video source {}", self.source);
        }
    }
}

/// Copies RGB24 rows out of an ffmpeg plane, dropping the per-row padding
/// (`stride` may exceed `width * 3`).
fn extract_rgb_pixels(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
