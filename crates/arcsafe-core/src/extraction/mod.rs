//! The walk that validation and extraction share, and the sinks it feeds.

pub mod atomic;
pub mod engine;
pub mod stream;

pub use atomic::ExtractionJournal;
pub use atomic::TempFileGuard;
pub use engine::DiscardSink;
pub use engine::DiskSink;
pub use engine::EngineState;
pub use engine::EntrySink;
pub use engine::ExtractionEngine;
pub use engine::StagedFile;
pub use engine::WalkSummary;
pub use stream::stream_entry;
