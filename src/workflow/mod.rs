pub mod generation_flow;
pub mod process_request;

pub use generation_flow::{GenerationFlow, ProcessOutcome, TEXT_SEPARATOR};
pub use process_request::{ImageInput, ProcessRequest};
