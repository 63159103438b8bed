//! Cloud storage transports for the remote backup.
//!
//! File-level access to a provider: a folder of named files addressed by
//! opaque file ids. [`crate::remote::CloudRemote`] builds the backup
//! document and attachment semantics on top.

pub mod folder;
pub mod google_drive;
pub mod storage;

pub use folder::{FolderConfig, FolderStorage};
pub use google_drive::{GoogleDriveConfig, GoogleDriveStorage};
pub use storage::{CloudFile, CloudStorage, CloudStorageConfig};
