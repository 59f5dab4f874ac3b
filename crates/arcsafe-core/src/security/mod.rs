//! Security validation modules.

pub mod path;
pub mod permissions;
pub mod quota;
pub mod symlink;
pub mod validator;
pub mod zipbomb;

// Re-export public types and functions
pub use path::MAX_SYMLINK_HOPS;
pub use path::Node;
pub use path::PathResolver;
pub use permissions::sanitize_permissions;
pub use quota::Admission;
pub use quota::RatioBasis;
pub use quota::RunningTotals;
pub use quota::SIZE_TOLERANCE;
pub use quota::ThresholdEnforcer;
pub use symlink::validate_symlink;
pub use symlink::verify_recorded_symlinks;
pub use validator::EntryValidator;
pub use validator::ValidatedEntry;
pub use validator::ValidatedEntryType;
pub use zipbomb::check_compression_ratio;
pub use zipbomb::compression_ratio;
