pub mod services;

pub use services::{MediaKind, UploadItem};
