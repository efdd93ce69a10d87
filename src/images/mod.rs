pub mod multipart;
pub mod services;

/// Upper bound for image upload request bodies.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
