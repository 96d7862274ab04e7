//! Extraction of JSON payloads from free-form model output.

use crate::error::PipelineError;

const THINK_CLOSE: &str = "</think>";
const JSON_FENCE_OPEN: &str = "```json";
const FENCE: &str = "```";

/// JSON object that follows a `</think>` reasoning block.
///
/// Takes everything from the first `{` after the tag up to the last `}` in the text.
pub fn json_after_think(raw: &str) -> Result<&str, PipelineError> {
    let not_found =
        || PipelineError::ResponseParse("Could not find valid JSON after </think> tag".to_string());

    let tag = raw.find(THINK_CLOSE).ok_or_else(not_found)?;
    let rest = raw[tag + THINK_CLOSE.len()..].trim_start();
    if !rest.starts_with('{') {
        return Err(not_found());
    }
    let end = rest.rfind('}').ok_or_else(not_found)?;
    Ok(&rest[..=end])
}

/// Body of the first ```json fenced block holding an object, or the whole text trimmed.
pub fn strip_json_fence(raw: &str) -> &str {
    let text = raw.trim();
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(JSON_FENCE_OPEN) {
        let open = search_from + found;
        let body = text[open + JSON_FENCE_OPEN.len()..].trim_start();
        if body.starts_with('{') {
            for (close, _) in body.match_indices('}') {
                if body[close + 1..].trim_start().starts_with(FENCE) {
                    return &body[..=close];
                }
            }
        }
        search_from = open + JSON_FENCE_OPEN.len();
    }
    text
}
