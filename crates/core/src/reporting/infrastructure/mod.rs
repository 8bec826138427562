pub mod background_sinks;
pub mod http_frame_sink;
pub mod http_report_sink;
