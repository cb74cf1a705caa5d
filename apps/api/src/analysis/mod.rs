// Résumé analysis: prompt building, model output parsing, the end-to-end
// pipeline and the single background job that runs it.
// All model calls go through llm_client.

pub mod decoder;
pub mod extractor;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod worker;
