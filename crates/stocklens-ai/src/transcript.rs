//! Conversation transcripts for follow-up questions

use serde::{Deserialize, Serialize};

/// Who spoke a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior exchange turn supplied with a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Drop turns with empty text. Roles are already constrained by the type;
/// callers deserializing loose history should map unknown roles to `None`
/// before this point.
pub fn normalize_transcript(turns: Vec<ChatTurn>) -> Vec<ChatTurn> {
    turns
        .into_iter()
        .filter(|t| !t.text.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_empty_turns() {
        let turns = vec![
            ChatTurn::user("What changed?"),
            ChatTurn::assistant("   "),
            ChatTurn::assistant("Margins improved."),
            ChatTurn::user(""),
        ];
        let normalized = normalize_transcript(turns);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].role, ChatRole::User);
        assert_eq!(normalized[1].text, "Margins improved.");
    }

    #[test]
    fn test_empty_transcript_stays_empty() {
        assert!(normalize_transcript(Vec::new()).is_empty());
    }
}
