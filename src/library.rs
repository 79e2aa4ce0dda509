use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ScrollError, ScrollResult};

pub const LIBRARY_REGISTRY_REL_PATH: &str = "video/records.json";
pub const LIBRARY_VIDEOS_REL_PATH: &str = "video/videos";
pub const RECORD_LABEL_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LibraryRegistry {
    #[serde(default = "default_registry_version")]
    pub version: u32,
    #[serde(default = "default_next_id")]
    pub next_id: u64,
    #[serde(default)]
    pub items: Vec<VideoRecord>,
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self {
            version: default_registry_version(),
            next_id: default_next_id(),
            items: Vec::new(),
        }
    }
}

/// Metadata kept for every generated video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VideoRecord {
    pub id: u64,
    pub text: String,
    /// Path relative to the media root, always `/`-separated.
    pub video_file: String,
    pub created_at: DateTime<Utc>,
    pub sha256: String,
    pub frames: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl VideoRecord {
    /// Short human label: the first characters of the text.
    pub fn label(&self) -> String {
        self.text.chars().take(RECORD_LABEL_CHARS).collect()
    }

    pub fn file_name(&self) -> &str {
        self.video_file
            .rsplit('/')
            .next()
            .unwrap_or(self.video_file.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NewVideoRecord {
    pub text: String,
    pub video_path: PathBuf,
    pub frames: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

fn default_registry_version() -> u32 {
    1
}

fn default_next_id() -> u64 {
    1
}

/// JSON-backed record store rooted at a media directory.
///
/// Read-modify-write cycles are serialised within the process; the registry
/// file itself is replaced atomically on every save.
#[derive(Debug)]
pub struct VideoLibrary {
    media_root: PathBuf,
    lock: Mutex<()>,
}

impl VideoLibrary {
    pub fn open(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.media_root.join(LIBRARY_REGISTRY_REL_PATH)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.media_root.join(LIBRARY_VIDEOS_REL_PATH)
    }

    pub fn resolve(&self, record: &VideoRecord) -> PathBuf {
        self.media_root.join(&record.video_file)
    }

    pub fn insert(&self, new: NewVideoRecord) -> ScrollResult<VideoRecord> {
        let video_file = self.relative_video_path(&new.video_path)?;
        let sha256 = sha256_file(&new.video_path)?;

        let _guard = self.guard()?;
        let mut registry = self.load_unlocked()?;
        let record = VideoRecord {
            id: registry.next_id,
            text: new.text,
            video_file,
            created_at: Utc::now(),
            sha256,
            frames: new.frames,
            fps: new.fps,
            width: new.width,
            height: new.height,
        };
        registry.next_id += 1;
        registry.items.push(record.clone());
        self.save_unlocked(&registry)?;
        debug!(id = record.id, video_file = %record.video_file, "recorded video");
        Ok(record)
    }

    pub fn get(&self, id: u64) -> ScrollResult<Option<VideoRecord>> {
        let _guard = self.guard()?;
        Ok(self
            .load_unlocked()?
            .items
            .into_iter()
            .find(|record| record.id == id))
    }

    /// Newest first.
    pub fn list(&self) -> ScrollResult<Vec<VideoRecord>> {
        let _guard = self.guard()?;
        let mut items = self.load_unlocked()?.items;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    /// Drops the record and deletes its video file.
    pub fn remove(&self, id: u64) -> ScrollResult<Option<VideoRecord>> {
        let _guard = self.guard()?;
        let mut registry = self.load_unlocked()?;
        let Some(position) = registry.items.iter().position(|record| record.id == id) else {
            return Ok(None);
        };
        let record = registry.items.remove(position);
        self.save_unlocked(&registry)?;

        let path = self.resolve(&record);
        if let Err(error) = fs::remove_file(&path) {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "failed to delete video file");
            }
        }
        Ok(Some(record))
    }

    fn guard(&self) -> ScrollResult<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| ScrollError::store("record store lock poisoned"))
    }

    fn load_unlocked(&self) -> ScrollResult<LibraryRegistry> {
        let registry_path = self.registry_path();
        if !registry_path.exists() {
            return Ok(LibraryRegistry::default());
        }
        let content = fs::read_to_string(&registry_path).map_err(|error| {
            ScrollError::store(format!(
                "failed to read record registry {}: {error}",
                registry_path.display()
            ))
        })?;
        let mut registry: LibraryRegistry = serde_json::from_str(&content).map_err(|error| {
            ScrollError::store(format!(
                "failed to parse record registry JSON {}: {error}",
                registry_path.display()
            ))
        })?;
        normalize_registry_in_place(&mut registry)?;
        Ok(registry)
    }

    fn save_unlocked(&self, registry: &LibraryRegistry) -> ScrollResult<()> {
        let mut normalized = registry.clone();
        normalize_registry_in_place(&mut normalized)?;

        let path = self.registry_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                ScrollError::store(format!(
                    "failed to create record directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(&normalized).map_err(|error| {
            ScrollError::store(format!("failed to serialize record registry JSON: {error}"))
        })?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, format!("{json}\n"))
            .and_then(|()| fs::rename(&tmp_path, &path))
            .map_err(|error| {
                ScrollError::store(format!(
                    "failed to write record registry {}: {error}",
                    path.display()
                ))
            })
    }

    fn relative_video_path(&self, video_path: &Path) -> ScrollResult<String> {
        let relative = video_path.strip_prefix(&self.media_root).map_err(|_| {
            ScrollError::store(format!(
                "video '{}' is outside media root '{}'",
                video_path.display(),
                self.media_root.display()
            ))
        })?;
        let parts = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => Ok(part.to_string_lossy().into_owned()),
                _ => Err(ScrollError::store(format!(
                    "video path '{}' must be a plain media-relative path",
                    relative.display()
                ))),
            })
            .collect::<ScrollResult<Vec<_>>>()?;
        Ok(parts.join("/"))
    }
}

fn normalize_registry_in_place(registry: &mut LibraryRegistry) -> ScrollResult<()> {
    if registry.version == 0 {
        return Err(ScrollError::store("record registry version must be >= 1"));
    }

    registry.items.sort_by_key(|record| record.id);
    let mut seen = BTreeSet::new();
    for record in &registry.items {
        if !seen.insert(record.id) {
            return Err(ScrollError::store(format!(
                "duplicate record id {} in registry",
                record.id
            )));
        }
        if record.video_file.trim().is_empty() {
            return Err(ScrollError::store(format!(
                "record {} video_file cannot be empty",
                record.id
            )));
        }
        let path = Path::new(&record.video_file);
        if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ScrollError::store(format!(
                "record {} video_file '{}' must be media-relative without '..'",
                record.id, record.video_file
            )));
        }
        if record.sha256.len() != 64 || !record.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ScrollError::store(format!(
                "record {} has invalid sha256 '{}': expected 64 lowercase hex chars",
                record.id, record.sha256
            )));
        }
    }

    let max_id = registry.items.last().map_or(0, |record| record.id);
    registry.next_id = registry.next_id.max(max_id + 1);
    Ok(())
}

fn sha256_file(path: &Path) -> ScrollResult<String> {
    let mut file = File::open(path).map_err(|error| {
        ScrollError::store(format!("failed to open video {}: {error}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|error| {
        ScrollError::store(format!("failed to hash video {}: {error}", path.display()))
    })?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
