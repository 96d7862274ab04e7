//! Differential diagnosis generators.
//!
//! Each provider asks for three ranked diagnoses plus a rationale and returns them as a flat
//! record whose field names are namespaced per provider (`first_diagnosis`,
//! `r1_first_diagnosis`, `gemini_first_diagnosis`, ...).

use crate::error::PipelineError;
use crate::generation::{CaseGenerator, GenerationResult};
use crate::provider::parse::{json_after_think, strip_json_fence};
use crate::provider::{ChatMessage, CompletionOptions, DynProviderClient, ResponseFormat};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const FIELD_DESCRIPTIONS: [(&str, &str); 4] = [
    ("first_diagnosis", "The most likely diagnosis"),
    ("second_diagnosis", "The second most likely diagnosis"),
    ("third_diagnosis", "The third most likely diagnosis"),
    ("rationale", "Detailed explanation for the diagnoses"),
];

/// Shape of a diagnosis record: a schema title and a field-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosisSchema {
    pub title: &'static str,
    pub prefix: &'static str,
}

impl DiagnosisSchema {
    pub const OPENAI: DiagnosisSchema = DiagnosisSchema {
        title: "OpenAIDiagnosis",
        prefix: "",
    };
    pub const DEEPSEEK: DiagnosisSchema = DiagnosisSchema {
        title: "DeepSeekDiagnosis",
        prefix: "r1_",
    };
    pub const GEMINI: DiagnosisSchema = DiagnosisSchema {
        title: "GeminiDiagnosis",
        prefix: "gemini_",
    };

    /// Field names in record order.
    pub fn field_names(&self) -> Vec<String> {
        FIELD_DESCRIPTIONS
            .iter()
            .map(|(name, _)| format!("{}{}", self.prefix, name))
            .collect()
    }

    /// JSON Schema describing the record, embedded in prompts and structured-output requests.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for (name, description) in FIELD_DESCRIPTIONS {
            let field = format!("{}{}", self.prefix, name);
            properties.insert(
                field,
                json!({"type": "string", "description": description}),
            );
        }
        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": self.field_names(),
            "additionalProperties": false,
        })
    }

    /// Validate `raw` JSON against the schema and flatten it into a result.
    ///
    /// Every field must be present and a string. Unknown keys are ignored.
    pub fn parse(&self, raw: &str) -> Result<GenerationResult, PipelineError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| {
            PipelineError::ResponseParse(format!("{} is not valid JSON: {}", self.title, e))
        })?;
        let object = value.as_object().ok_or_else(|| {
            PipelineError::ResponseParse(format!("{} must be a JSON object", self.title))
        })?;

        let mut result = GenerationResult::new();
        for field in self.field_names() {
            let text = object
                .get(&field)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PipelineError::ResponseParse(format!(
                        "{} is missing string field '{}'",
                        self.title, field
                    ))
                })?;
            result.insert(field, text);
        }
        Ok(result)
    }
}

fn case_prompt(case_text: &str) -> String {
    format!(
        "You are an experienced neuroradiologist.\n\n\
         Below is a case presentation including patient demographics, relevant clinical \
         history, and brain MRI findings. Based on this information, provide your top three \
         differential diagnoses ranked in order of likelihood.\n\n\
         CASE: {}\n\n\
         For each differential diagnosis, briefly explain your reasoning.",
        case_text
    )
}

/// OpenAI structured-output generator.
pub struct OpenAIDiagnosisGenerator;

#[async_trait]
impl CaseGenerator<DynProviderClient> for OpenAIDiagnosisGenerator {
    async fn generate(
        &self,
        case_text: &str,
        client: &DynProviderClient,
    ) -> Result<GenerationResult, PipelineError> {
        let schema = DiagnosisSchema::OPENAI;
        let messages = vec![
            ChatMessage::system(format!(
                "You produce structured JSON output only with the following keys: {}.",
                schema.field_names().join(", ")
            )),
            ChatMessage::user(case_prompt(case_text)),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: None,
            response_format: Some(ResponseFormat {
                name: schema.title.to_string(),
                schema: schema.json_schema(),
            }),
        };

        let response = client.complete(messages, options).await?;
        schema.parse(response.content.trim())
    }
}

/// DeepSeek R1 generator: reasoning inside `<think>` followed by one JSON object.
pub struct DeepSeekDiagnosisGenerator;

#[async_trait]
impl CaseGenerator<DynProviderClient> for DeepSeekDiagnosisGenerator {
    async fn generate(
        &self,
        case_text: &str,
        client: &DynProviderClient,
    ) -> Result<GenerationResult, PipelineError> {
        let schema = DiagnosisSchema::DEEPSEEK;
        let prompt = format!(
            "You are an experienced neuroradiologist.\n\n\
             Below is a case presentation. Based on this information, provide your top three \
             differential diagnoses ranked in order of likelihood.\n\n\
             CASE:\n{}\n\n\
             First, show your chain of thought enclosed in <think>...</think>.\n\
             Then output exactly one JSON object matching this schema:\n{}\n\n\
             Do NOT include any extra keys or markdown.",
            case_text,
            schema.json_schema()
        );
        let messages = vec![
            ChatMessage::system("Think first, then output JSON matching the schema."),
            ChatMessage::user(prompt),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(6000),
            response_format: None,
        };

        let response = client.complete(messages, options).await?;
        schema.parse(json_after_think(&response.content)?)
    }
}

/// Gemini generator: raw JSON or a fenced ```json block.
pub struct GeminiDiagnosisGenerator;

#[async_trait]
impl CaseGenerator<DynProviderClient> for GeminiDiagnosisGenerator {
    async fn generate(
        &self,
        case_text: &str,
        client: &DynProviderClient,
    ) -> Result<GenerationResult, PipelineError> {
        let schema = DiagnosisSchema::GEMINI;
        let prompt = format!(
            "You are an expert neuroradiologist.\n\n\
             Below is a case presentation including patient demographics, relevant clinical \
             history, and brain MRI findings. Based on this information, provide your top three \
             differential diagnoses ranked in order of likelihood.\n\n\
             CASE:\n{}\n\n\
             For each differential diagnosis, briefly explain your reasoning.\n\n\
             Output your response ONLY as a single JSON object matching this schema. Do not \
             include any extra text or markdown formatting like ```json ... ```.\n\n\
             JSON Schema:\n{}\n",
            case_text,
            schema.json_schema()
        );
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(6000),
            response_format: None,
        };

        let response = client
            .complete(vec![ChatMessage::user(prompt)], options)
            .await?;
        schema.parse(strip_json_fence(&response.content))
    }
}
