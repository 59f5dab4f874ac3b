//! Types shared by the readers, the safety checks and the extractor.
//!
//! Path types are validated on construction and cannot be created from raw
//! paths, so holding a `SafePath` or `SafeSymlink` means the checks ran.

pub mod dest_dir;
pub mod entry;
pub mod safe_path;
pub mod safe_symlink;

pub use dest_dir::DestDir;
pub use entry::EntryDescriptor;
pub use entry::EntryKind;
pub use safe_path::SafePath;
pub use safe_symlink::SafeSymlink;
