//! Saved chat sessions: a transcript plus where it came from.

use std::path::Path;

use chrono::{DateTime, Utc};
use forgeloop_core::provider::Transcript;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    pub saved_at: DateTime<Utc>,
    /// Provider name the transcript was recorded against
    pub provider: String,
    pub transcript: Transcript,
}

impl SavedSession {
    pub fn new(provider: impl Into<String>, transcript: Transcript) -> Self {
        Self {
            saved_at: Utc::now(),
            provider: provider.into(),
            transcript,
        }
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read session {}: {e}", path.display()))?;
        let session = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid session file {}: {e}", path.display()))?;
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
