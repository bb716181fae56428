// ABOUTME: Validated domain types shared by the store and the coordinator.
// ABOUTME: Image references key pulls, image IDs key reference counts.

mod id;
mod image_ref;

pub use id::ImageId;
pub use image_ref::{DEFAULT_TAG, ImageRef, ParseImageRefError};
