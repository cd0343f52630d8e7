//! File versioning services: upload, resolution, download, catalog.

pub mod download;
pub mod resolver;
pub mod service;
pub mod upload;

pub use download::{DownloadService, VersionContent};
pub use resolver::VersionResolver;
pub use service::FileService;
pub use upload::UploadService;
