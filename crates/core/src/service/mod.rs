pub mod frame_rate_governor;
pub mod service_config;
pub mod service_error;
pub mod service_logger;
pub mod service_loop;
