//! Safe validation and extraction of untrusted archives.
//!
//! `arcsafe-core` checks zip and tar-family archives (plain, gzip, bzip2, xz
//! and zstd compressed) before anything reaches the disk. It defends against
//! archive bombs (too many entries, too many bytes, extreme compression
//! ratios) and against entries or symlinks that would land outside the
//! destination directory.
//!
//! Limits are enforced while the archive is read: a breach stops the walk
//! mid-entry, before the bomb has been decompressed. Extraction is
//! all-or-nothing; on any error the files written so far are removed.
//!
//! # Examples
//!
//! ```no_run
//! use arcsafe_core::ThresholdConfig;
//! use arcsafe_core::extract;
//! use arcsafe_core::validate;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ThresholdConfig::default();
//! validate("upload.tar.gz", &config)?;
//! let report = extract("upload.tar.gz", "/srv/uploads/1234", &config)?;
//! println!("Extracted {} files", report.files_extracted);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod archive;
pub mod config;
pub mod copy;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod report;
pub mod security;
pub mod settings;
pub mod types;

#[doc(hidden)]
pub mod test_utils;

// Re-export main API types
pub use api::extract;
pub use api::extract_with_options;
pub use api::validate;
pub use api::validate_into;
pub use archive::ArchiveBuilder;
pub use config::ExtractOptions;
pub use config::ThresholdConfig;
pub use error::ErrorKind;
pub use error::ExtractionError;
pub use error::QuotaResource;
pub use error::Result;
pub use report::ExtractionReport;
pub use report::ValidationReport;

// Re-export types module for easier access
pub use types::DestDir;
pub use types::EntryDescriptor;
pub use types::EntryKind;
pub use types::SafePath;
pub use types::SafeSymlink;
