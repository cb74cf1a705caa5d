// Shared prompt fragments for every evaluation sent to the local model.
// Task-specific prompts live next to the code that builds them.

/// Output-format block that demands a single strict-JSON object.
pub const JSON_ONLY_INSTRUCTION: &str = "\
Retorne APENAS um JSON válido (RFC 8259).
Use exclusivamente aspas duplas.
NÃO use aspas simples.
NÃO adicione texto antes ou depois";
