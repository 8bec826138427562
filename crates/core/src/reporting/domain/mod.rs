pub mod frame_sink;
pub mod report_sink;
