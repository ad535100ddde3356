//! Typed message blocks and the hard platform limits.
//!
//! The platform rejects messages over 50 blocks or 3000 characters. The
//! builder enforces a tighter internal budget (47 blocks, 2900 characters)
//! to leave headroom for the header/footer it always appends. Exceeding a
//! limit is never an error: `combine_blocks` resolves it by truncation.

use serde_json::{json, Value};

/// Platform hard limits.
pub const PLATFORM_MAX_BLOCKS: usize = 50;
pub const PLATFORM_MAX_CHARS: usize = 3000;
/// Internal budget the builder never exceeds.
pub const BLOCK_BUDGET: usize = 47;
pub const CHAR_BUDGET: usize = 2900;

const TRUNCATION_MARKER: &str = "… content truncated to fit the message limit";

/// One structural unit of a rendered message.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Header {
        text: String,
    },
    Section {
        text: String,
        fields: Vec<String>,
        accessory: Option<String>,
    },
    Context {
        text: String,
    },
    Divider,
}

impl Block {
    pub fn header(text: impl Into<String>) -> Self {
        Block::Header { text: text.into() }
    }

    pub fn section(text: impl Into<String>) -> Self {
        Block::Section {
            text: text.into(),
            fields: Vec::new(),
            accessory: None,
        }
    }

    pub fn context(text: impl Into<String>) -> Self {
        Block::Context { text: text.into() }
    }

    /// Character weight of this block against the message budget.
    pub fn char_count(&self) -> usize {
        match self {
            Block::Header { text } | Block::Context { text } => text.chars().count(),
            Block::Section { text, fields, accessory } => {
                text.chars().count()
                    + fields.iter().map(|f| f.chars().count()).sum::<usize>()
                    + accessory.as_ref().map_or(0, |a| a.chars().count())
            }
            Block::Divider => 0,
        }
    }

    /// Wire shape for the chat platform.
    pub fn to_json(&self) -> Value {
        match self {
            Block::Header { text } => json!({
                "type": "header",
                "text": { "type": "plain_text", "text": text },
            }),
            Block::Section { text, fields, accessory } => {
                let mut obj = json!({
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": text },
                });
                if !fields.is_empty() {
                    obj["fields"] = Value::Array(
                        fields
                            .iter()
                            .map(|f| json!({ "type": "mrkdwn", "text": f }))
                            .collect(),
                    );
                }
                if let Some(acc) = accessory {
                    obj["accessory"] = json!({ "type": "mrkdwn", "text": acc });
                }
                obj
            }
            Block::Context { text } => json!({
                "type": "context",
                "elements": [{ "type": "mrkdwn", "text": text }],
            }),
            Block::Divider => json!({ "type": "divider" }),
        }
    }
}

/// A fully assembled message: blocks plus the plain-text fallback that
/// describes the same data. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub blocks: Vec<Block>,
    pub text: String,
}

impl RenderedMessage {
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn char_count(&self) -> usize {
        self.blocks.iter().map(Block::char_count).sum()
    }

    /// Callback payload for the chat platform.
    pub fn to_payload(&self) -> Value {
        json!({
            "response_type": "in_channel",
            "text": self.text,
            "blocks": self.blocks.iter().map(Block::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Combine block groups into one message, stopping at the internal budget.
///
/// Groups are taken whole-block at a time; once adding a block would exceed
/// the block or character budget, a single truncation context block is
/// appended instead and the rest is dropped.
pub fn combine_blocks(groups: Vec<Vec<Block>>) -> Vec<Block> {
    let mut out: Vec<Block> = Vec::new();
    let mut chars = 0usize;
    let marker_chars = TRUNCATION_MARKER.chars().count();

    for block in groups.into_iter().flatten() {
        let cost = block.char_count();
        // Keep one block slot and the marker's characters in reserve.
        if out.len() + 1 >= BLOCK_BUDGET || chars + cost + marker_chars > CHAR_BUDGET {
            let dropped = Block::context(TRUNCATION_MARKER);
            tracing::info!(
                "✂️ Message truncated at {} blocks / {} chars",
                out.len(),
                chars
            );
            out.push(dropped);
            return out;
        }
        chars += cost;
        out.push(block);
    }
    out
}

/// Enforce the budget on an already-built block list.
pub fn truncate_blocks(blocks: Vec<Block>) -> Vec<Block> {
    combine_blocks(vec![blocks])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_json_shapes() {
        let header = Block::header("Daily report").to_json();
        assert_eq!(header["type"], "header");
        let section = Block::Section {
            text: "body".into(),
            fields: vec!["f1".into()],
            accessory: None,
        }
        .to_json();
        assert_eq!(section["fields"][0]["text"], "f1");
        assert_eq!(Block::Divider.to_json()["type"], "divider");
    }

    #[test]
    fn test_combine_within_budget_is_untouched() {
        let groups = vec![
            vec![Block::header("title")],
            vec![Block::section("one"), Block::section("two")],
        ];
        let combined = combine_blocks(groups);
        assert_eq!(combined.len(), 3);
        assert!(!combined
            .iter()
            .any(|b| matches!(b, Block::Context { text } if text.contains("truncated"))));
    }

    #[test]
    fn test_combine_truncates_on_block_count() {
        let big: Vec<Block> = (0..80).map(|i| Block::section(format!("s{i}"))).collect();
        let combined = combine_blocks(vec![big]);
        assert!(combined.len() <= BLOCK_BUDGET);
        let last = combined.last().unwrap();
        assert!(matches!(last, Block::Context { text } if text.contains("truncated")));
    }

    #[test]
    fn test_combine_truncates_on_char_count() {
        let wall = "x".repeat(500);
        let big: Vec<Block> = (0..10).map(|_| Block::section(wall.clone())).collect();
        let combined = combine_blocks(vec![big]);
        let chars: usize = combined.iter().map(Block::char_count).sum();
        assert!(chars <= CHAR_BUDGET);
        assert!(combined.len() < 11);
        assert!(matches!(
            combined.last().unwrap(),
            Block::Context { text } if text.contains("truncated")
        ));
    }

    #[test]
    fn test_budgets_leave_platform_headroom() {
        assert!(BLOCK_BUDGET < PLATFORM_MAX_BLOCKS);
        assert!(CHAR_BUDGET < PLATFORM_MAX_CHARS);
    }
}
