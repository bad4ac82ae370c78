//! Local persistence: a tiny string key/value file, and the active-session record kept in it
//! so an open session survives a restart of the kiosk.

use crate::error::{Error, Result};
use crate::form::{DocumentType, Field, Registration};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON object of string → string, rewritten whole on every change.
pub struct KvStore {
    path: PathBuf,
}

impl KvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Store(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(map).map_err(|e| Error::Store(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        // A corrupt file is replaced rather than blocking new writes.
        let mut map = self.load().unwrap_or_else(|e| {
            warn!("discarding unreadable store: {e}");
            BTreeMap::new()
        });
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match self.load() {
            Ok(mut map) => {
                if map.remove(key).is_some() {
                    self.persist(&map)?;
                }
                Ok(())
            }
            Err(e) => {
                warn!("discarding unreadable store: {e}");
                self.persist(&BTreeMap::new())
            }
        }
    }
}

/// What is remembered about a signed-in guest. Photos and signature are not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub active: bool,
    pub full_name: String,
    pub artistic_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    /// RFC 3339 local time the session was opened.
    pub started_at: String,
}

impl ActiveSession {
    pub fn from_registration(reg: &Registration, started_at: String) -> Self {
        Self {
            active: true,
            full_name: reg.full_name.clone(),
            artistic_name: reg.artistic_name.clone(),
            document_type: reg.document_type,
            document_number: reg.document_number.clone(),
            started_at,
        }
    }

    pub fn to_registration(&self) -> Registration {
        let mut reg = Registration { document_type: self.document_type, ..Registration::default() };
        reg.set_field(Field::FullName, &self.full_name);
        reg.set_field(Field::ArtisticName, &self.artistic_name);
        reg.set_field(Field::DocumentNumber, &self.document_number);
        reg
    }
}

pub struct SessionStore {
    kv: KvStore,
}

impl SessionStore {
    pub const ACTIVE_KEY: &'static str = "active_session";

    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn save(&self, session: &ActiveSession) -> Result<()> {
        let json = serde_json::to_string(session).map_err(|e| Error::Store(e.to_string()))?;
        self.kv.set(Self::ACTIVE_KEY, &json)?;
        debug!("session saved for {}", session.document_number);
        Ok(())
    }

    /// The saved active session, if any. Unparsable records are dropped.
    pub fn load(&self) -> Option<ActiveSession> {
        let raw = match self.kv.get(Self::ACTIVE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("session store unreadable: {e}");
                return None;
            }
        };
        match serde_json::from_str::<ActiveSession>(&raw) {
            Ok(session) if session.active => Some(session),
            Ok(_) => None,
            Err(e) => {
                warn!("dropping corrupt session record: {e}");
                self.clear();
                None
            }
        }
    }

    /// Forget the active session. Failures are logged; the kiosk carries on.
    pub fn clear(&self) {
        if let Err(e) = self.kv.remove(Self::ACTIVE_KEY) {
            warn!("clearing session store: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn session() -> ActiveSession {
        ActiveSession {
            active: true,
            full_name: "ANA".into(),
            artistic_name: String::new(),
            document_type: DocumentType::Passport,
            document_number: "X1".into(),
            started_at: "2026-10-19T22:00:00-05:00".into(),
        }
    }

    #[test]
    fn kv_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::new(dir.path().join("nested/store.json"));
        assert_eq!(kv.get("a").unwrap(), None);
        kv.set("a", "1").unwrap();
        kv.set("b", "2").unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some("1"));
        kv.remove("a").unwrap();
        assert_eq!(kv.get("a").unwrap(), None);
        assert_eq!(kv.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn session_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        SessionStore::new(KvStore::new(&path)).save(&session()).unwrap();

        let reopened = SessionStore::new(KvStore::new(&path));
        assert_eq!(reopened.load(), Some(session()));
        reopened.clear();
        assert_eq!(reopened.load(), None);
    }

    #[test]
    fn corrupt_record_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::new(dir.path().join("store.json"));
        kv.set(SessionStore::ACTIVE_KEY, "{not json").unwrap();
        let store = SessionStore::new(KvStore::new(kv.path()));
        assert_eq!(store.load(), None);
        assert_eq!(kv.get(SessionStore::ACTIVE_KEY).unwrap(), None);
    }

    #[test]
    fn registration_round_trip_keeps_text_fields() {
        let s = session();
        let reg = s.to_registration();
        assert_eq!(reg.full_name, "ANA");
        assert_eq!(reg.document_type, DocumentType::Passport);
        assert!(reg.selfie.is_none());
        assert_eq!(ActiveSession::from_registration(&reg, s.started_at.clone()), s);
    }
}
