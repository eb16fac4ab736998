//! User accounts.
//!
//! # Invariants
//! - Usernames are unique and 2..=20 characters long.
//! - `bio` is stored sanitized; password hashes are opaque.

use crate::engine::{EngineResult, Store};
use crate::model::{Persistable, User, USER_STATUS_BANNED, USER_STATUS_NORMAL};
use crate::query::{like_pattern, Fields, Filter, SelectQuery};
use crate::text::Sanitizer;
use rusqlite::Row;

const MIN_USERNAME_CHARS: usize = 2;
const MAX_USERNAME_CHARS: usize = 20;
const USER_COLUMNS: &[&str] = &["id", "username", "bio", "status", "created_at", "updated_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSaveStatus {
    Complete,
    StorageError,
    /// Another user already has this username.
    Conflict,
    InvalidUsername,
}

pub struct UserRepository<'e> {
    store: Store<'e>,
}

impl<'e> UserRepository<'e> {
    pub fn new(store: Store<'e>) -> Self {
        Self { store }
    }

    /// Creates or edits `user`; new users get their id assigned.
    pub fn save(&mut self, user: &mut User, sanitizer: &dyn Sanitizer) -> EngineResult<UserSaveStatus> {
        user.username = user.username.trim().to_string();
        let length = user.username.chars().count();
        if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&length) {
            self.store.reject("save:users", "username must be 2 to 20 characters");
            return Ok(UserSaveStatus::InvalidUsername);
        }
        if let Some(bio) = user.bio.as_deref() {
            user.bio = Some(sanitizer.filter(bio));
        }

        if !user.entry.is_stored() && self.exists(&user.username)? {
            return Ok(UserSaveStatus::Conflict);
        }
        if self.store.save(user)? == 0 {
            return Ok(UserSaveStatus::StorageError);
        }
        Ok(UserSaveStatus::Complete)
    }

    pub fn exists(&mut self, username: &str) -> EngineResult<bool> {
        let statement = SelectQuery::from(User::TABLE)
            .column("users.id")
            .condition("users.username = :username")
            .bind("username", username.trim().to_string())
            .limit(1)
            .build();
        Ok(self
            .store
            .find_one(&statement, |row| row.get::<_, i64>(0))?
            .is_some())
    }

    pub fn get(&mut self, id: i64) -> EngineResult<Option<User>> {
        let statement = SelectQuery::from(User::TABLE)
            .fields(User::TABLE, USER_COLUMNS)
            .condition("users.id = :id")
            .bind("id", id)
            .build();
        self.store.find_one(&statement, user_from_row)
    }

    /// Users whose name contains `filter.search`, paged, oldest first.
    pub fn find(&mut self, filter: &Filter) -> EngineResult<Vec<User>> {
        let mut query = SelectQuery::from(User::TABLE).fields(User::TABLE, USER_COLUMNS);
        if !filter.search.is_empty() {
            query = query
                .condition("users.username LIKE :username ESCAPE '!'")
                .bind("username", like_pattern(&filter.search));
        }
        let statement = query
            .order_by("users.id ASC")
            .limit(filter.limit)
            .offset(filter.offset)
            .build();
        self.store.find(&statement, user_from_row)
    }

    /// Bans or restores a user; returns affected rows.
    pub fn set_ban(&mut self, id: i64, banned: bool) -> EngineResult<usize> {
        let status = if banned {
            USER_STATUS_BANNED
        } else {
            USER_STATUS_NORMAL
        };
        let fields = Fields::new().with("id", id).with("status", status);
        self.store.edit(User::TABLE, &fields)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let mut user = User::new(row.get::<_, String>("username")?);
    user.bio = row.get("bio")?;
    user.entry.id = Some(row.get("id")?);
    user.entry.status = row.get("status")?;
    user.entry.created_at = row.get("created_at")?;
    user.entry.updated_at = row.get("updated_at")?;
    Ok(user)
}
