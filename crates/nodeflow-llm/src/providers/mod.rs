pub mod openai;

pub use openai::OpenAiCleaner;
