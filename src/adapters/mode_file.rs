//! Mode persistence adapters.
//!
//! Implements [`ModeStore`] on a plain text file holding exactly one mode
//! token, plus an in-memory store for tests and simulation.
//!
//! - Durable writes: the file is truncated, written and `sync_all`ed
//!   before `save` returns.
//! - No validation here: the controller decides what a corrupt token means.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::app::ports::ModeStore;
use crate::error::PersistenceError;

pub struct FileModeStore {
    path: PathBuf,
}

impl FileModeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModeStore for FileModeStore {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, token: &str) -> Result<(), PersistenceError> {
        let mut file = File::create(&self.path)?;
        file.write_all(token.as_bytes())?;
        file.sync_all()?;
        debug!("Saved mode {token} to {}", self.path.display());
        Ok(())
    }
}

/// Volatile store, empty until the first `save`.
#[derive(Debug, Clone, Default)]
pub struct MemoryModeStore {
    token: Option<String>,
}

impl MemoryModeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_owned()),
        }
    }
}

impl ModeStore for MemoryModeStore {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.token.clone())
    }

    fn save(&mut self, token: &str) -> Result<(), PersistenceError> {
        self.token = Some(token.to_owned());
        Ok(())
    }
}
