//! Turn a raw model completion into a typed artifact. JSON mode keeps most
//! responses bare, but models still wrap output in code fences often enough
//! that fence stripping stays.

use serde::de::DeserializeOwned;

/// Parse a completion into `T`. Accepts a bare JSON object or one wrapped in
/// a ```json fence (case-insensitive). The error string feeds the schema
/// validation failure path.
pub fn parse_payload<T: DeserializeOwned>(response: &str) -> Result<T, String> {
    let json = extract_json(response)?;
    serde_json::from_str(json).map_err(|e| e.to_string())
}

fn extract_json(response: &str) -> Result<&str, String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err("empty response".into());
    }
    if trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    let lower = trimmed.to_lowercase();
    let fence_start = lower
        .find("```json")
        .map(|i| i + 7)
        .or_else(|| lower.find("```").map(|i| i + 3))
        .ok_or_else(|| "response is neither a JSON object nor a fenced block".to_string())?;
    let rest = &trimmed[fence_start..];
    let fence_end = rest
        .find("```")
        .ok_or_else(|| "unclosed code fence".to_string())?;
    Ok(rest[..fence_end].trim())
}
