//! Stored session row. `data` holds ciphertext only.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Per-save random component of the encryption key.
    pub skey: String,
    /// Encrypted JSON payload; `None` when not loaded.
    pub data: Option<String>,
    /// `None` until the session is stored.
    pub created_at: Option<i64>,
    pub updated_at: i64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn is_stored(&self) -> bool {
        self.created_at.is_some()
    }
}
