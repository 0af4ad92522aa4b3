pub mod client;
pub mod interface;

pub use client::DocumentTranslator;
pub use interface::{SubmissionResponse, TranslationJobRequest, TranslationService, TranslatorError};
