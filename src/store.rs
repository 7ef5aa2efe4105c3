//! Profile persistence boundary
//!
//! The engine never touches the filesystem itself; orchestration code is
//! handed a [`ProfileStore`]. Two implementations ship with the crate: a
//! directory of JSON files and an in-memory map.

use crate::error::{KeyguardError, Result};
use crate::profile::{unix_timestamp, Phrase, Profile};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Storage capability for biometric profiles
pub trait ProfileStore {
    /// Load a profile; `Ok(None)` when it does not exist
    fn load(&self, id: Uuid) -> Result<Option<Profile>>;

    /// Persist a profile, replacing any previous version
    fn save(&mut self, profile: &Profile) -> Result<()>;

    /// Remove a profile; removing a missing profile succeeds
    fn delete(&mut self, id: Uuid) -> Result<()>;

    /// Create, persist and return a fresh untrained profile
    fn create(&mut self, phrase: Phrase) -> Result<Profile> {
        let profile = Profile::new(phrase, unix_timestamp());
        self.save(&profile)?;
        info!(profile = %profile.id, "profile created");
        Ok(profile)
    }

    fn exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.load(id)?.is_some())
    }

    /// Load a profile that must exist
    fn require(&self, id: Uuid) -> Result<Profile> {
        self.load(id)?
            .ok_or_else(|| KeyguardError::ProfileNotFound(id.to_string()))
    }
}

/// One pretty-printed JSON file per profile: `<dir>/<uuid>.json`
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Ids of every profile file in the store directory
    pub fn list(&self) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, id: Uuid) -> Result<Option<Profile>> {
        let path = self.path_for(id);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let profile = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "profile loaded");
        Ok(Some(profile))
    }

    fn save(&mut self, profile: &Profile) -> Result<()> {
        let path = self.path_for(profile.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(profile)?;

        // write-then-rename so a failed save never leaves a truncated profile
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "profile saved");
        Ok(())
    }

    fn delete(&mut self, id: Uuid) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(profile = %id, "profile deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(profile = %id, "profile already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: HashMap<Uuid, Profile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.profiles.get(&id).cloned())
    }

    fn save(&mut self, profile: &Profile) -> Result<()> {
        self.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    fn delete(&mut self, id: Uuid) -> Result<()> {
        self.profiles.remove(&id);
        Ok(())
    }
}
