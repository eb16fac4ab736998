//! Encrypted session storage.
//!
//! # Responsibility
//! - Store session payloads as JSON encrypted through `ConfidentialityCodec`.
//! - Expire sessions by last update time.
//!
//! # Invariants
//! - Every save draws a fresh `skey`; the key is `signature + skey`.
//! - Plaintext payloads never reach the database.

use crate::codec::ConfidentialityCodec;
use crate::engine::{EngineResult, Store};
use crate::model::{now_millis, Session};
use crate::query::{update_statement, Fields, SelectQuery, Statement};
use log::warn;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

pub const SESSION_TABLE: &str = "sessions";

pub struct SessionRepository<'e> {
    store: Store<'e>,
}

impl<'e> SessionRepository<'e> {
    pub fn new(store: Store<'e>) -> Self {
        Self { store }
    }

    /// Loads one session; `with_data` also loads the ciphertext.
    pub fn find(&mut self, id: &str, with_data: bool) -> EngineResult<Option<Session>> {
        let mut query = SelectQuery::from(SESSION_TABLE).fields(
            SESSION_TABLE,
            &["id", "skey", "created_at", "updated_at"],
        );
        if with_data {
            query = query.column("sessions.data AS data");
        }
        let statement = query
            .condition("sessions.id = :id")
            .bind("id", id.to_string())
            .limit(1)
            .build();
        self.store.find_one(&statement, |row| {
            Ok(Session {
                id: row.get("id")?,
                skey: row.get("skey")?,
                data: if with_data { row.get("data")? } else { None },
                created_at: Some(row.get("created_at")?),
                updated_at: row.get("updated_at")?,
            })
        })
    }

    /// Encrypts `payload` under a fresh key and writes the session.
    ///
    /// Returns `false` when encoding, encryption or storage fails.
    pub fn save(
        &mut self,
        session: &mut Session,
        payload: &JsonValue,
        codec: &dyn ConfidentialityCodec,
        signature: &str,
    ) -> EngineResult<bool> {
        if session.id.trim().is_empty() {
            self.store.reject("save:sessions", "session id is empty");
            return Ok(false);
        }
        let plaintext = match serde_json::to_string(payload) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                self.store
                    .reject("save:sessions", format!("payload encoding failed: {err}"));
                return Ok(false);
            }
        };
        let skey = Uuid::new_v4().simple().to_string();
        let Some(ciphertext) = codec.encrypt(&plaintext, &session_key(signature, &skey)) else {
            self.store.reject("save:sessions", "payload encryption failed");
            return Ok(false);
        };

        let now = now_millis();
        let mut fields = Fields::new()
            .with("skey", skey.clone())
            .with("data", ciphertext.clone())
            .with("updated_at", now);

        let written = if session.is_stored() {
            let mut statement =
                update_statement(SESSION_TABLE, &fields, Some("sessions.id = :id"));
            statement.push_param("id", session.id.clone());
            self.store.execute(&statement)? == 1
        } else {
            fields.set("id", session.id.clone());
            fields.set("created_at", now);
            self.store.put_no_key(SESSION_TABLE, &fields)?
        };

        if written {
            session.skey = skey;
            session.data = Some(ciphertext);
            session.created_at.get_or_insert(now);
            session.updated_at = now;
        }
        Ok(written)
    }

    pub fn delete(&mut self, id: &str) -> EngineResult<usize> {
        let criteria = Fields::new().with("id", id.to_string());
        self.store.delete(SESSION_TABLE, &criteria, None)
    }

    /// Removes sessions last updated before `expired_before` (epoch ms).
    pub fn gc(&mut self, expired_before: i64) -> EngineResult<usize> {
        let statement = Statement::new("DELETE FROM sessions WHERE ( updated_at < :exp );")
            .bind("exp", expired_before);
        let removed = self.store.transaction("gc:sessions", |store| {
            store.try_execute("gc:sessions", &statement)
        })?;
        Ok(removed.unwrap_or(0))
    }
}

/// Decrypts a loaded session payload.
///
/// Missing data or any decode failure yields an empty object.
pub fn decrypted(
    session: &Session,
    codec: &dyn ConfidentialityCodec,
    signature: &str,
) -> JsonValue {
    let empty = || JsonValue::Object(Map::new());
    let Some(data) = session.data.as_deref().filter(|data| !data.is_empty()) else {
        return empty();
    };
    let Some(plaintext) = codec.decrypt(data, &session_key(signature, &session.skey)) else {
        warn!("event=session_decrypt module=session status=error");
        return empty();
    };
    serde_json::from_str(&plaintext).unwrap_or_else(|_| empty())
}

fn session_key(signature: &str, skey: &str) -> String {
    format!("{signature}{skey}")
}
