// Service layer
pub mod envelope; // Result envelopes and selections
pub mod record_service; // Validated record operations

pub use envelope::{Envelope, FieldErrors, Outcome, Selection};
pub use record_service::{PhotoSettings, PhotoUpload, RecordService, SortBy};
