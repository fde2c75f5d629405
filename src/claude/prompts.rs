//! Prompt templates for commit split planning.

/// System prompt for grouping snapshot units into commits.
pub const SPLIT_SYSTEM_PROMPT: &str = r#"You are an expert software engineer who organises uncommitted work into a clean git history. You will receive a YAML description of every uncommitted change in a repository, broken into addressable units:

- `operations`: whole-file changes (add, delete, rename, copy, binary, type-change, mode-change). Each has an `id`, a `kind`, a `path` and, for renames and copies, an `orig_path`.
- `hunks`: contiguous blocks of line changes. Each has an `id`, the `file` it belongs to, its `@@` header, added/removed line counts and an `excerpt` of its content.

Your task is to group these units into a sequence of small, logically coherent commits.

HARD RULES (a plan breaking any of them is rejected):
1. Every hunk id and every operation id must appear in exactly one commit. Never drop a unit, never repeat one, never invent one.
2. Every commit must reference at least one hunk or operation.
3. Every commit message must match `type(scope): subject` or `type: subject`:
   - `type` is lowercase letters only (feat, fix, refactor, docs, test, chore, build, ci, perf, style)
   - `scope` is optional
   - `subject` is 1-72 characters, imperative mood, no trailing period
   - no `!` marker, no extra lines in `message`
4. Order commits so each one builds on the previous ones (e.g. a new helper before the code that calls it).

GUIDELINES:
- Read the excerpts: group by what the code does, not by directory.
- Keep unrelated fixes in separate commits; keep a refactor apart from the feature that needs it.
- A rename and the edits that only make sense after it belong together.
- Put longer explanations in the optional `body` field, never in `message`.

OUTPUT FORMAT:
Respond with exactly one JSON object and nothing else:

{"commits": [{"message": "feat(parser): add status record parser", "body": "optional paragraph", "hunks": ["h..."], "ops": ["op..."]}]}
"#;

/// Builds the user prompt carrying the snapshot YAML.
pub fn generate_split_user_prompt(snapshot_yaml: &str) -> String {
    format!(
        r#"Group the following uncommitted changes into commits:

{snapshot_yaml}

CHECKLIST BEFORE ANSWERING:
1. Count the hunk ids and operation ids above; your plan must reference each of them exactly once.
2. Check every message against `type(scope): subject` with a lowercase type and a subject of at most 72 characters.
3. Return only the JSON object."#
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_snapshot() {
        let prompt = generate_split_user_prompt("hunks:\n  - id: habc\n");
        assert!(prompt.contains("  - id: habc"));
        assert!(prompt.contains("exactly once"));
    }

    #[test]
    fn system_prompt_describes_output_shape() {
        assert!(SPLIT_SYSTEM_PROMPT.contains(r#"{"commits": ["#));
        assert!(SPLIT_SYSTEM_PROMPT.contains("1-72 characters"));
    }
}
