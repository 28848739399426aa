use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-user conversation state as persisted in the memory document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Alternating user / bot turns, oldest first.
    #[serde(default)]
    pub chat_history: Vec<String>,
    #[serde(default)]
    pub voice_reply: bool,
}

/// The whole memory file: user id -> record.
pub type MemoryDocument = BTreeMap<String, UserRecord>;
