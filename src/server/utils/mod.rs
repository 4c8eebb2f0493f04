pub mod feed_utils;
pub mod hls_utils;
pub mod tag_utils;
