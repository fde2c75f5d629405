//! Extraction of the plan object from free-form planner output.

use tracing::debug;

use crate::data::plan::{Plan, PlanError};

/// Returns the first balanced top-level `{...}` in `text`.
///
/// Braces inside JSON string literals (including escaped quotes) are
/// ignored. An unterminated object yields `None`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses planner output into a [`Plan`] without validating it.
pub fn parse_plan_response(text: &str) -> Result<Plan, PlanError> {
    let json = extract_json_object(text).ok_or(PlanError::NoJsonObject)?;
    debug!(
        response_len = text.len(),
        json_len = json.len(),
        "Extracted plan JSON from planner response"
    );
    Plan::from_json(json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn bare_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn object_inside_prose_and_fences() {
        let text = "Here is the plan:\n```json\n{\"commits\": [{\"message\": \"fix: x\"}]}\n```\nDone {not json}";
        assert_eq!(
            extract_json_object(text),
            Some("{\"commits\": [{\"message\": \"fix: x\"}]}")
        );
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"{"message": "fix: handle } and { in \"quotes\"", "n": {"x": "}"}} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"message": "fix: handle } and { in \"quotes\"", "n": {"x": "}"}}"#)
        );
    }

    #[test]
    fn escaped_backslash_before_quote_closes_string() {
        let text = r#"{"path": "C:\\", "k": 1}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn unterminated_or_missing() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"a\": {\"b\": 1}"), None);
    }

    #[test]
    fn parse_reports_missing_object() {
        assert!(matches!(
            parse_plan_response("I could not do it."),
            Err(PlanError::NoJsonObject)
        ));
    }

    #[test]
    fn parse_reports_invalid_json() {
        assert!(matches!(
            parse_plan_response("{\"commits\": 5}"),
            Err(PlanError::InvalidJson(_))
        ));
    }

    #[test]
    fn parse_plan_with_defaults() {
        let plan = parse_plan_response(
            "```json\n{\"commits\":[{\"message\":\"chore: initial\",\"hunks\":[\"h1\"]}]}\n```",
        )
        .unwrap();
        assert_eq!(plan.commits.len(), 1);
        assert_eq!(plan.commits[0].hunks, vec!["h1"]);
        assert!(plan.commits[0].ops.is_empty());
        assert_eq!(plan.commits[0].body, None);
    }
}
