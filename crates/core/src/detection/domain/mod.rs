pub mod face_detector;
pub mod size_filter;
