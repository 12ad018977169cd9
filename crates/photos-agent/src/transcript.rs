//! Run transcripts.
//!
//! Each agent run is recorded (request, pipeline stages, tool calls and the
//! final answer) and sealed with a BLAKE3 content hash, so a stored
//! transcript can be checked for modification. Transcripts are written as
//! JSON files under `{root}/YYYY/MM/DD/{id}.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TranscriptId(pub Uuid);

impl TranscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TranscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded step of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    /// `stage`, `tool_call`, `tool_result` or `model_text`.
    pub kind: String,
    pub detail: Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub id: TranscriptId,
    pub user_name: String,
    pub request: String,
    pub model: String,
    pub entries: Vec<TranscriptEntry>,
    pub answer: Option<Vec<String>>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// BLAKE3 hex digest over every other field; set by `finalize`.
    pub content_hash: Option<String>,
}

#[derive(Serialize)]
struct Hashable<'a> {
    id: &'a TranscriptId,
    user_name: &'a str,
    request: &'a str,
    model: &'a str,
    entries: &'a [TranscriptEntry],
    answer: &'a Option<Vec<String>>,
    error: &'a Option<String>,
    started_at: &'a DateTime<Utc>,
    completed_at: &'a Option<DateTime<Utc>>,
}

impl Transcript {
    pub fn compute_hash(&self) -> Result<String> {
        let hashable = Hashable {
            id: &self.id,
            user_name: &self.user_name,
            request: &self.request,
            model: &self.model,
            entries: &self.entries,
            answer: &self.answer,
            error: &self.error,
            started_at: &self.started_at,
            completed_at: &self.completed_at,
        };
        let json = serde_json::to_vec(&hashable).map_err(|e| AgentError::Transcript(e.to_string()))?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    pub fn verify_integrity(&self) -> bool {
        match (&self.content_hash, self.compute_hash()) {
            (Some(stored), Ok(computed)) => *stored == computed,
            _ => false,
        }
    }
}

/// Records a run incrementally.
pub struct TranscriptSession {
    transcript: Transcript,
}

impl TranscriptSession {
    pub fn new(user_name: &str, request: &str, model: &str) -> Self {
        Self {
            transcript: Transcript {
                id: TranscriptId::new(),
                user_name: user_name.to_string(),
                request: request.to_string(),
                model: model.to_string(),
                entries: Vec::new(),
                answer: None,
                error: None,
                started_at: Utc::now(),
                completed_at: None,
                content_hash: None,
            },
        }
    }

    pub fn id(&self) -> TranscriptId {
        self.transcript.id
    }

    pub fn record(&mut self, kind: &str, detail: Value) {
        self.transcript.entries.push(TranscriptEntry {
            kind: kind.to_string(),
            detail,
            at: Utc::now(),
        });
    }

    pub fn finalize(mut self, outcome: std::result::Result<&[String], String>) -> Result<Transcript> {
        match outcome {
            Ok(answer) => self.transcript.answer = Some(answer.to_vec()),
            Err(error) => self.transcript.error = Some(error),
        }
        self.transcript.completed_at = Some(Utc::now());
        self.transcript.content_hash = Some(self.transcript.compute_hash()?);
        Ok(self.transcript)
    }
}

/// File-system transcript store.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    /// Creates `root` if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error)?;
        Ok(Self { root })
    }

    fn path_for(&self, transcript: &Transcript) -> PathBuf {
        let date = transcript.started_at.format("%Y/%m/%d");
        self.root.join(format!("{date}/{}.json", transcript.id))
    }

    pub fn save(&self, transcript: &Transcript) -> Result<PathBuf> {
        if transcript.content_hash.is_none() {
            return Err(AgentError::Transcript("transcript is not finalized".to_string()));
        }
        let path = self.path_for(transcript);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(transcript)
            .map_err(|e| AgentError::Transcript(e.to_string()))?;
        fs::write(&path, json).map_err(io_error)?;

        tracing::debug!(transcript_id = %transcript.id, path = %path.display(), "Transcript saved");
        Ok(path)
    }

    /// [`save`](Self::save) on the blocking pool, for use from async code.
    pub async fn persist(&self, transcript: Transcript) -> Result<PathBuf> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&transcript))
            .await
            .map_err(|e| AgentError::Transcript(format!("transcript writer failed: {e}")))?
    }

    /// Load a transcript by id, verifying its hash.
    pub fn get(&self, id: TranscriptId) -> Result<Transcript> {
        let path = find_file(&self.root, &format!("{id}.json"))
            .ok_or_else(|| AgentError::Transcript(format!("transcript {id} not found")))?;
        let json = fs::read_to_string(&path).map_err(io_error)?;
        let transcript: Transcript =
            serde_json::from_str(&json).map_err(|e| AgentError::Transcript(e.to_string()))?;
        if !transcript.verify_integrity() {
            return Err(AgentError::Transcript(format!(
                "integrity check failed for transcript {id}"
            )));
        }
        Ok(transcript)
    }

    /// All stored transcripts, oldest first.
    pub fn list(&self) -> Result<Vec<Transcript>> {
        let mut paths = Vec::new();
        collect_files(&self.root, &mut paths);
        let mut transcripts = Vec::with_capacity(paths.len());
        for path in paths {
            let json = fs::read_to_string(&path).map_err(io_error)?;
            match serde_json::from_str::<Transcript>(&json) {
                Ok(transcript) => transcripts.push(transcript),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable transcript"),
            }
        }
        transcripts.sort_by_key(|t| t.started_at);
        Ok(transcripts)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            collect_files(&path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
}

fn io_error(e: std::io::Error) -> AgentError {
    AgentError::Transcript(e.to_string())
}

fn find_file(dir: &Path, filename: &str) -> Option<PathBuf> {
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file(&path, filename) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
            return Some(path);
        }
    }
    None
}
