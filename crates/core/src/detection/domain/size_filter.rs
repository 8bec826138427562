use crate::shared::bounding_box::{BoundingBox, Detection};

/// Keeps boxes whose width and height both reach `min_size`, tagging each
/// survivor with the frame it came from.
///
/// Input order is preserved so downstream results line up with detector
/// output.
pub fn filter_by_min_size(
    boxes: &[BoundingBox],
    min_size: (u32, u32),
    frame_index: u64,
) -> Vec<Detection> {
    boxes
        .iter()
        .filter(|b| b.is_at_least(min_size.0, min_size.1))
        .map(|b| Detection::new(*b, frame_index))
        .collect()
}
