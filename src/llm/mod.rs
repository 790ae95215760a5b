//! LLM Module - condition-to-SQL translation over a swappable completion backend

pub mod backend;
pub mod ollama_client;
pub mod openai_client;
pub mod schema_summary;
pub mod translator;

pub use backend::{build_backend, CompletionBackend};
pub use ollama_client::OllamaClient;
pub use openai_client::OpenAiClient;
pub use schema_summary::SchemaSummary;
pub use translator::{strip_query_markup, QueryTranslator, TranslatedQuery};
