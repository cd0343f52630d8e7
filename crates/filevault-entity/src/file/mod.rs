//! File domain entities.

pub mod model;
pub mod version;

pub use model::{File, FileWithVersions};
pub use version::FileVersion;
