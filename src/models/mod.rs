pub mod flashcard;
pub mod record;
pub mod upload;

pub use flashcard::{Flashcard, GeneratedCard, NewFlashcard};
pub use record::{Fields, Filter, ListQuery, Record, RecordUpdate, Sort, SortDirection, UpsertRecord};
pub use upload::{NewUpload, Upload, UploadSummary};
