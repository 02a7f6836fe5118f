pub mod llm;
pub mod push;
pub mod twitter;
