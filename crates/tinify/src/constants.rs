//! Tinify API constants

/// Default API base URL
pub const DEFAULT_ENDPOINT: &str = "https://api.tinify.com";

/// Path of the shrink endpoint, relative to the base URL
pub const SHRINK_PATH: &str = "/shrink";

/// Basic-auth username; the key goes in the password slot
pub const AUTH_USER: &str = "api";

/// Response header carrying the key's compression count for the month
pub const COMPRESSION_COUNT_HEADER: &str = "compression-count";
