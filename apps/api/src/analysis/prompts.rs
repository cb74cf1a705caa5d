// Evaluation prompt and the fixed rubric it is built from.
// Reuses the cross-cutting output-format fragment from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::models::history::{ResumeEvaluation, ValidationItem};

/// Name of the document kind, as shown to the model.
pub const DOCUMENT_TYPE: &str = "CURRÍCULO";

/// The rubric, in presentation order.
pub const REQUIREMENTS: [&str; 4] = [
    "Coerência geral",
    "Introdução / Resumo profissional",
    "Formação Acadêmica",
    "Experiência Profissional",
];

/// Builds the full evaluation prompt. Pure; the text is embedded as-is,
/// callers that need a length cap must truncate before calling.
pub fn build_prompt(text: &str, requirements: &[&str]) -> String {
    let req_text = requirements
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nAnalise o {DOCUMENT_TYPE} abaixo segundo os requisitos a seguir:\n\n\
         REQUISITOS:\n{req_text}\n\n\
         FORMATO OBRIGATÓRIO DA RESPOSTA:\n{JSON_ONLY_INSTRUCTION}\n\n\
         {template}\n\n\
         {DOCUMENT_TYPE}:\n{text}\n",
        template = answer_template(requirements),
    )
}

/// The JSON skeleton the model must fill in, one `validacao` slot per requirement.
fn answer_template(requirements: &[&str]) -> String {
    let template = ResumeEvaluation {
        validacao: requirements
            .iter()
            .map(|name| ValidationItem {
                item: (*name).to_string(),
                status: String::new(),
                detalhes: String::new(),
            })
            .collect(),
        pontuacao_final: "0-100".to_string(),
        melhorias_recomendadas: String::new(),
    };
    // Serialising plain strings into a struct cannot fail.
    serde_json::to_string_pretty(&template).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn embedded_template(prompt: &str) -> Value {
        let start = prompt.find("\n{\n").unwrap() + 1;
        let end = prompt.find("\n}\n").unwrap() + 2;
        serde_json::from_str(&prompt[start..end]).unwrap()
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_prompt("Ana Souza\nEngenheira", &REQUIREMENTS);
        let positions: Vec<usize> = [
            "Analise o CURRÍCULO abaixo",
            "REQUISITOS:",
            "- Coerência geral",
            "- Experiência Profissional",
            "FORMATO OBRIGATÓRIO DA RESPOSTA:",
            "Use exclusivamente aspas duplas.",
            "\"validacao\"",
            "\"pontuacao_final\"",
            "\"melhorias_recomendadas\"",
            "CURRÍCULO:\nAna Souza\nEngenheira",
        ]
        .iter()
        .map(|needle| prompt.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
        assert!(prompt.ends_with("Engenheira\n"));
    }

    #[test]
    fn test_template_is_strict_json_seeded_per_requirement() {
        let prompt = build_prompt("texto", &REQUIREMENTS);
        let template = embedded_template(&prompt);

        let items = template["validacao"].as_array().unwrap();
        assert_eq!(items.len(), REQUIREMENTS.len());
        for (item, name) in items.iter().zip(REQUIREMENTS) {
            assert_eq!(item["item"], name);
            assert_eq!(item["status"], "");
            assert_eq!(item["detalhes"], "");
        }
        assert_eq!(template["pontuacao_final"], "0-100");
        assert_eq!(template["melhorias_recomendadas"], "");
    }

    #[test]
    fn test_prompt_is_deterministic_and_tolerates_empty_text() {
        let a = build_prompt("", &["Único"]);
        let b = build_prompt("", &["Único"]);
        assert_eq!(a, b);
        assert!(a.contains("- Único"));
        assert!(a.ends_with("CURRÍCULO:\n\n"));
    }
}
