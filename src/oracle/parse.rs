use serde::Deserialize;

use super::{ARGUMENTS_PER_ROUND, CaseFile, MAX_ARGUMENT_SCORE, OracleError, RoundScores};

#[derive(Debug, Deserialize)]
struct RawCase {
    title: String,
    description: String,
    #[serde(rename = "sideALabel")]
    side_a_label: String,
    #[serde(rename = "sideBLabel")]
    side_b_label: String,
}

#[derive(Debug, Deserialize)]
struct RawRoundScores {
    scores: Vec<f64>,
    #[serde(alias = "analysisText")]
    analysis: String,
}

/// Locate the JSON object inside a model answer.
///
/// Markdown code fences are stripped first; then the slice from the first `{` to the last `}`
/// is returned. `None` when the text holds no object at all.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut body = text.trim();
    if let Some(start) = body.find("```") {
        let after_fence = &body[start + 3..];
        let fenced = match after_fence.find("```") {
            Some(end) => &after_fence[..end],
            None => after_fence,
        };
        // The object may share the fence line with an info word such as `json`.
        body = fenced.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Parse a generated case. Every field must be a non-empty string.
pub fn parse_case(text: &str) -> Result<CaseFile, OracleError> {
    let json = extract_json_object(text)
        .ok_or_else(|| OracleError::GenerationFailed("no JSON object in response".into()))?;
    let raw: RawCase = serde_json::from_str(json)
        .map_err(|err| OracleError::GenerationFailed(format!("malformed case JSON: {err}")))?;

    let case = CaseFile {
        title: raw.title.trim().to_string(),
        description: raw.description.trim().to_string(),
        side_a_label: raw.side_a_label.trim().to_string(),
        side_b_label: raw.side_b_label.trim().to_string(),
    };
    let fields = [
        ("title", &case.title),
        ("description", &case.description),
        ("sideALabel", &case.side_a_label),
        ("sideBLabel", &case.side_b_label),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
        return Err(OracleError::GenerationFailed(format!(
            "case field `{name}` is empty"
        )));
    }
    Ok(case)
}

/// Parse round grades: exactly six finite scores within `0..=10` and an analysis.
pub fn parse_round_scores(text: &str) -> Result<RoundScores, OracleError> {
    let json = extract_json_object(text)
        .ok_or_else(|| OracleError::ScoringFailed("no JSON object in response".into()))?;
    let raw: RawRoundScores = serde_json::from_str(json)
        .map_err(|err| OracleError::ScoringFailed(format!("malformed score JSON: {err}")))?;

    if raw.scores.len() != ARGUMENTS_PER_ROUND {
        return Err(OracleError::ScoringFailed(format!(
            "expected {ARGUMENTS_PER_ROUND} scores, got {}",
            raw.scores.len()
        )));
    }
    if let Some(bad) = raw
        .scores
        .iter()
        .find(|score| !score.is_finite() || **score < 0.0 || **score > MAX_ARGUMENT_SCORE)
    {
        return Err(OracleError::ScoringFailed(format!(
            "score {bad} outside 0..={MAX_ARGUMENT_SCORE}"
        )));
    }

    Ok(RoundScores {
        scores: raw.scores,
        analysis: raw.analysis.trim().to_string(),
    })
}
