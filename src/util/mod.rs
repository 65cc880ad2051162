//! Utility functions.

pub mod env;
pub mod format;
pub mod image;

pub use format::{format_category_name, format_cost, format_latency, format_tokens, truncate};
pub use image::{MAX_IMAGE_BYTES, encode_image, encode_images};
