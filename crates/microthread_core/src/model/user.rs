//! Registered user.

use super::entry::{EntryFields, Persistable};
use crate::query::Fields;

pub const USER_STATUS_NORMAL: i64 = 1;
pub const USER_STATUS_BANNED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub entry: EntryFields,
    pub username: String,
    /// Opaque hash; `None` keeps the stored value on edit.
    pub password_hash: Option<String>,
    pub bio: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            entry: EntryFields {
                status: USER_STATUS_NORMAL,
                ..EntryFields::default()
            },
            username: username.into(),
            password_hash: None,
            bio: None,
        }
    }

    pub fn is_banned(&self) -> bool {
        self.entry.status == USER_STATUS_BANNED
    }
}

impl Persistable for User {
    const TABLE: &'static str = "users";

    fn entry(&self) -> &EntryFields {
        &self.entry
    }

    fn entry_mut(&mut self) -> &mut EntryFields {
        &mut self.entry
    }

    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new()
            .with("username", self.username.clone())
            .with("status", self.entry.status);
        if let Some(hash) = &self.password_hash {
            fields.set("password", hash.clone());
        }
        if let Some(bio) = &self.bio {
            fields.set("bio", bio.clone());
        }
        fields
    }
}
