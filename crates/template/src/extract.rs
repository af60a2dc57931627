//! Fenced code-block extraction and classification.
//!
//! Scans template text for ``` fences. Fences carrying a non-empty tag are
//! extracted: `schema` / `json:schema` bodies feed the schema synthesizer,
//! every other tagged fence becomes a [`CodeBlock`]. Tagged fences are
//! removed from the text; untagged fences are left untouched.

use crate::schema::SchemaNode;
use crate::types::CodeBlock;
use codeprompt_core::{AppError, AppResult};

/// A raw fenced segment found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fence {
    /// The fence tag, possibly empty
    pub tag: String,
    /// The fence body, without the fence lines
    pub body: String,
}

/// Result of extracting tagged fences from template text.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Template text with every tagged fence removed
    pub stripped: String,
    /// Executable blocks, in source order
    pub blocks: Vec<CodeBlock>,
    /// Schema synthesized from the first `schema` / `json:schema` fence
    pub schema: Option<SchemaNode>,
}

/// Tags reserved for schema declarations; never treated as executable.
fn is_schema_tag(tag: &str) -> bool {
    tag == "schema" || tag == "json:schema"
}

/// Scan text for every fenced segment, tagged or not.
///
/// Also usable on arbitrary text, e.g. to parse code blocks out of a
/// model's own response for further chained execution.
pub fn extract_fences(text: &str) -> Vec<Fence> {
    scan(text)
        .into_iter()
        .map(|raw| Fence {
            tag: raw.tag,
            body: raw.body,
        })
        .collect()
}

/// Extract and classify tagged fences from template text.
///
/// A malformed JSON body in a schema fence is a fatal load error — never
/// silently skipped.
pub fn extract_template(text: &str) -> AppResult<Extraction> {
    let lines: Vec<&str> = text.lines().collect();
    let fences = scan(text);

    let mut removed = vec![false; lines.len()];
    let mut blocks = Vec::new();
    let mut schema = None;

    for raw in &fences {
        if raw.tag.is_empty() {
            continue;
        }

        for flag in &mut removed[raw.start_line..=raw.end_line] {
            *flag = true;
        }

        if is_schema_tag(&raw.tag) {
            let example: serde_json::Value = serde_json::from_str(&raw.body).map_err(|e| {
                AppError::Load(format!("Malformed JSON in `{}` fence: {}", raw.tag, e))
            })?;
            let synthesized = SchemaNode::synthesize(&example);
            if schema.is_none() {
                schema = Some(synthesized);
            }
            tracing::debug!("Synthesized response schema from `{}` fence", raw.tag);
        } else {
            let block = CodeBlock::from_fence(raw.tag.clone(), raw.body.clone());
            tracing::debug!(
                "Extracted `{}` block ({:?}, {:?})",
                block.tag,
                block.phase,
                block.runtime
            );
            blocks.push(block);
        }
    }

    let mut stripped = lines
        .iter()
        .zip(&removed)
        .filter(|(_, gone)| !**gone)
        .map(|(line, _)| *line)
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') && !stripped.is_empty() {
        stripped.push('\n');
    }

    Ok(Extraction {
        stripped,
        blocks,
        schema,
    })
}

struct RawFence {
    tag: String,
    body: String,
    start_line: usize,
    end_line: usize,
}

/// Line-based fence scanner.
///
/// An opening fence is a line starting with ``` followed by the tag; the
/// fence closes at the next line that is exactly ``` after trimming. An
/// unclosed fence does not count as a fence at all.
fn scan(text: &str) -> Vec<RawFence> {
    let lines: Vec<&str> = text.lines().collect();
    let mut fences = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        let Some(rest) = trimmed.strip_prefix("```") else {
            i += 1;
            continue;
        };

        let tag = rest.trim().to_string();
        let close = (i + 1..lines.len()).find(|&j| lines[j].trim() == "```");
        match close {
            Some(end) => {
                fences.push(RawFence {
                    tag,
                    body: lines[i + 1..end].join("\n"),
                    start_line: i,
                    end_line: end,
                });
                i = end + 1;
            }
            None => {
                // Unclosed fence: leave the rest of the text alone
                break;
            }
        }
    }

    fences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockRuntime, Phase};

    const TEMPLATE: &str = "Header\n\n```js:pre\nreturn { x: 1 };\n```\n\nMiddle\n\n```\nuntagged body\n```\n\n```schema\n{\"a\": \"desc\"}\n```\n\nFooter\n";

    #[test]
    fn test_extract_fences_finds_all() {
        let fences = extract_fences(TEMPLATE);
        assert_eq!(fences.len(), 3);
        assert_eq!(fences[0].tag, "js:pre");
        assert_eq!(fences[0].body, "return { x: 1 };");
        assert_eq!(fences[1].tag, "");
        assert_eq!(fences[2].tag, "schema");
    }

    #[test]
    fn test_tagged_fences_removed_untagged_kept() {
        let extraction = extract_template(TEMPLATE).unwrap();
        assert!(!extraction.stripped.contains("js:pre"));
        assert!(!extraction.stripped.contains("schema"));
        assert!(extraction.stripped.contains("untagged body"));
        assert!(extraction.stripped.contains("Header"));
        assert!(extraction.stripped.contains("Footer"));
    }

    #[test]
    fn test_block_count_excludes_schema_fences() {
        let extraction = extract_template(TEMPLATE).unwrap();
        // Three fences, one untagged, one schema: a single executable block
        assert_eq!(extraction.blocks.len(), 1);
        assert_eq!(extraction.blocks[0].phase, Phase::Pre);
        assert_eq!(extraction.blocks[0].runtime, Some(BlockRuntime::Js));
        assert!(extraction.schema.is_some());
    }

    #[test]
    fn test_malformed_schema_json_is_fatal() {
        let text = "```schema\n{not json}\n```\n";
        let result = extract_template(text);
        assert!(matches!(result, Err(codeprompt_core::AppError::Load(_))));
    }

    #[test]
    fn test_json_schema_tag_is_reserved() {
        let text = "```json:schema\n{\"a\": \"x\"}\n```\n";
        let extraction = extract_template(text).unwrap();
        assert!(extraction.blocks.is_empty());
        assert!(extraction.schema.is_some());
    }

    #[test]
    fn test_first_schema_fence_wins() {
        let text = "```schema\n{\"a\": \"first\"}\n```\n```schema\n{\"b\": \"second\"}\n```\n";
        let extraction = extract_template(text).unwrap();
        let shape = extraction.schema.unwrap().shape_json();
        assert_eq!(shape, serde_json::json!({"a": "first"}));
    }

    #[test]
    fn test_blocks_keep_source_order() {
        let text = "```bash:pre\necho one\n```\n```js\nreturn {};\n```\n```python\npass\n```\n";
        let extraction = extract_template(text).unwrap();
        let tags: Vec<&str> = extraction.blocks.iter().map(|b| b.tag.as_str()).collect();
        assert_eq!(tags, vec!["bash:pre", "js", "python"]);
    }

    #[test]
    fn test_unclosed_fence_left_alone() {
        let text = "Start\n```js\nno close";
        let extraction = extract_template(text).unwrap();
        assert!(extraction.blocks.is_empty());
        assert_eq!(extraction.stripped, "Start\n```js\nno close");
    }
}
