pub mod identity_tracker;
pub mod people_counts;
