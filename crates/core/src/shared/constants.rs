pub const DEFAULT_DASHBOARD_URL: &str = "http://localhost:5000";

pub const COUNTS_ENDPOINT: &str = "/api/gender-classification/update";
pub const FRAME_ENDPOINT: &str = "/api/internal/update-frame";

/// Multipart field name the dashboard reads streamed frames from.
pub const FRAME_FIELD_NAME: &str = "frame";

pub const DEFAULT_LABELS: &[&str] = &["female", "male"];

/// Processed frames required before the measured rate is trusted.
pub const DEFAULT_WARMUP_FRAMES: u64 = 10;

pub const DEFAULT_REPORT_EVERY: u64 = 10;
pub const DEFAULT_REPORT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
pub const DEFAULT_FPS_LOG_EVERY: u64 = 30;
