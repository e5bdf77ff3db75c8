//! Workflow store
//!
//! Layout: `<root>/<workflow-id>/<name>.jsonl` plus `screenshot-<ts>.jpg|png`
//! preview files (`screenshot-<ts>-<n>` when timestamps collide). Saving
//! always creates a fresh directory holding exactly one trace file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use retrace_core_types::WorkflowId;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use trace_compactor::{PreviewImage, ReferenceTrace};

use crate::errors::PersistenceError;

const TRACE_EXTENSION: &str = "jsonl";
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Result of a save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedWorkflow {
    pub id: String,
    pub name: String,
    pub files: Vec<String>,
}

/// Directory listing entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub files: Vec<String>,
}

/// A workflow read back from disk. `trace` is `None` when the directory holds
/// no trace file.
#[derive(Clone, Debug)]
pub struct StoredWorkflow {
    pub id: String,
    pub name: Option<String>,
    pub trace: Option<ReferenceTrace>,
    pub previews: Vec<PreviewImage>,
}

#[derive(Clone, Debug)]
pub struct WorkflowStore {
    root: PathBuf,
}

impl WorkflowStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a trace and its previews under a new workflow id.
    pub async fn save(
        &self,
        name: Option<&str>,
        trace: &ReferenceTrace,
    ) -> Result<SavedWorkflow, PersistenceError> {
        if trace.is_empty() {
            return Err(PersistenceError::EmptyTrace);
        }

        let id = WorkflowId::new().to_string();
        let dir = self.root.join(&id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| PersistenceError::io(&dir, err))?;

        let stem = name
            .map(sanitize_name)
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| format!("session-record-{}", Utc::now().format("%Y%m%dt%H%M%S")));
        let trace_file = format!("{stem}.{TRACE_EXTENSION}");
        let body = trace.to_jsonl().map_err(trace_compactor::CompactError::from)?;
        write_file(&dir.join(&trace_file), body.as_bytes()).await?;

        let mut files = vec![trace_file];
        let mut taken = HashSet::new();
        for preview in trace.previews() {
            let file_name = unique_preview_name(preview, &mut taken);
            write_file(&dir.join(&file_name), &preview.bytes).await?;
            files.push(file_name);
        }

        info!(
            workflow_id = %id,
            events = trace.len(),
            previews = trace.previews().len(),
            "workflow saved"
        );
        Ok(SavedWorkflow {
            id,
            name: stem,
            files,
        })
    }

    /// Read a workflow back. Several trace files in one directory is an error.
    pub async fn load(&self, id: &str) -> Result<StoredWorkflow, PersistenceError> {
        validate_segment(id)?;
        let dir = self.root.join(id);
        if !fs::try_exists(&dir)
            .await
            .map_err(|err| PersistenceError::io(&dir, err))?
        {
            return Err(PersistenceError::WorkflowNotFound(id.to_string()));
        }

        let files = list_files(&dir).await?;
        let traces: Vec<&String> = files.iter().filter(|file| is_trace(file)).collect();
        if traces.len() > 1 {
            return Err(PersistenceError::MultipleTraces {
                workflow_id: id.to_string(),
                count: traces.len(),
            });
        }

        let mut previews = Vec::new();
        for file in files.iter().filter(|file| is_image(file)) {
            let bytes = read(&dir.join(file)).await?;
            previews.push(PreviewImage::new(preview_timestamp(file), bytes));
        }

        let (name, trace) = match traces.first() {
            Some(file) => {
                let raw = read(&dir.join(file.as_str())).await?;
                let text = String::from_utf8_lossy(&raw);
                let trace = ReferenceTrace::from_jsonl(&text)?.with_previews(previews.clone());
                let name = file.trim_end_matches(&format!(".{TRACE_EXTENSION}")).to_string();
                (Some(name), Some(trace))
            }
            None => {
                warn!(workflow_id = %id, "no trace file found");
                (None, None)
            }
        };

        debug!(
            workflow_id = %id,
            events = trace.as_ref().map_or(0, ReferenceTrace::len),
            previews = previews.len(),
            "workflow loaded"
        );
        Ok(StoredWorkflow {
            id: id.to_string(),
            name,
            trace,
            previews,
        })
    }

    /// Every workflow directory and its files. A missing root lists nothing.
    pub async fn list(&self) -> Result<Vec<WorkflowSummary>, PersistenceError> {
        if !fs::try_exists(&self.root)
            .await
            .map_err(|err| PersistenceError::io(&self.root, err))?
        {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|err| PersistenceError::io(&self.root, err))?;
        let mut workflows = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| PersistenceError::io(&self.root, err))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            workflows.push(WorkflowSummary {
                id: id.to_string(),
                files: list_files(&path).await?,
            });
        }
        workflows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(workflows)
    }

    /// Raw bytes of one stored file.
    pub async fn read_file(&self, id: &str, filename: &str) -> Result<Vec<u8>, PersistenceError> {
        validate_segment(id)?;
        validate_segment(filename)?;
        let path = self.root.join(id).join(filename);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(PersistenceError::FileNotFound(format!("{id}/{filename}")))
            }
            Err(err) => Err(PersistenceError::io(path, err)),
        }
    }
}

/// Reject anything that could step outside the store.
pub fn validate_segment(segment: &str) -> Result<(), PersistenceError> {
    if segment.is_empty()
        || segment.contains("..")
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(PersistenceError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

/// Lower-case, with every character outside `[a-z0-9]` replaced by `_`.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn extension(file: &str) -> Option<String> {
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_trace(file: &str) -> bool {
    extension(file).as_deref() == Some(TRACE_EXTENSION)
}

fn is_image(file: &str) -> bool {
    extension(file).map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// `screenshot-<ts>.<ext>` → `<ts>`; anything else sorts first.
fn unique_preview_name(preview: &PreviewImage, taken: &mut HashSet<String>) -> String {
    let mut name = preview.file_name();
    let mut n = 1;
    while !taken.insert(name.clone()) {
        name = format!("screenshot-{}-{n}.{}", preview.timestamp, preview.extension());
        n += 1;
    }
    name
}

/// `screenshot-<ts>` or `screenshot-<ts>-<n>`; anything else sorts as 0.
fn preview_timestamp(file: &str) -> i64 {
    let Some(ts) = Path::new(file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix("screenshot-"))
    else {
        return 0;
    };
    ts.parse()
        .ok()
        .or_else(|| ts.rsplit_once('-').and_then(|(ts, _)| ts.parse().ok()))
        .unwrap_or(0)
}

async fn list_files(dir: &Path) -> Result<Vec<String>, PersistenceError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|err| PersistenceError::io(dir, err))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| PersistenceError::io(dir, err))?
    {
        if entry.path().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    Ok(files)
}

async fn read(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    fs::read(path)
        .await
        .map_err(|err| PersistenceError::io(path, err))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    fs::write(path, bytes)
        .await
        .map_err(|err| PersistenceError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const JPEG: [u8; 3] = [0xff, 0xd8, 0xff];

    fn sample_trace() -> ReferenceTrace {
        ReferenceTrace::from_jsonl(
            r#"{"type":4,"timestamp":1,"data":{"href":"https://shop.test/"}}
{"type":2,"timestamp":2,"data":{"node":{"type":0,"id":1,"childNodes":[]}}}
{"type":3,"timestamp":3,"data":{"source":1,"positions":[]}}
{"type":3,"timestamp":4,"data":{"source":2,"type":2,"id":5}}"#,
        )
        .unwrap()
        .with_previews(vec![PreviewImage::new(1700, JPEG.to_vec())])
    }

    #[tokio::test]
    async fn previews_sharing_a_timestamp_are_all_kept() {
        let dir = tempdir().unwrap();
        let store = WorkflowStore::new(dir.path());
        let trace = sample_trace().with_previews(vec![
            PreviewImage::new(5, vec![0xff, 0xd8, 0x01]),
            PreviewImage::new(5, vec![0xff, 0xd8, 0x02]),
        ]);

        let saved = store.save(Some("flow"), &trace).await.unwrap();
        assert_eq!(
            saved.files,
            vec!["flow.jsonl", "screenshot-5.jpg", "screenshot-5-1.jpg"]
        );

        let loaded = store.load(&saved.id).await.unwrap();
        let previews = loaded.trace.unwrap().previews().to_vec();
        assert_eq!(previews.len(), 2);
        assert!(previews.iter().all(|preview| preview.timestamp == 5));
        let mut bodies: Vec<u8> = previews.iter().map(|preview| preview.bytes[2]).collect();
        bodies.sort();
        assert_eq!(bodies, vec![0x01, 0x02]);
    }

    #[test]
    fn preview_timestamp_reads_suffixed_names() {
        assert_eq!(preview_timestamp("screenshot-1700.jpg"), 1700);
        assert_eq!(preview_timestamp("screenshot-1700-2.png"), 1700);
        assert_eq!(preview_timestamp("cover.png"), 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = WorkflowStore::new(dir.path());
        let trace = sample_trace();

        let saved = store.save(Some("Checkout Flow!"), &trace).await.unwrap();
        assert_eq!(saved.name, "checkout_flow_");
        assert_eq!(
            saved.files,
            vec!["checkout_flow_.jsonl".to_string(), "screenshot-1700.jpg".to_string()]
        );

        let loaded = store.load(&saved.id).await.unwrap();
        assert_eq!(loaded.name.as_deref(), Some("checkout_flow_"));
        let loaded_trace = loaded.trace.unwrap();
        assert_eq!(loaded_trace.events(), trace.events());
        assert_eq!(loaded_trace.previews(), trace.previews());
        // mouse move was already dropped at compaction
        assert_eq!(loaded_trace.len(), 3);
    }

    #[tokio::test]
    async fn empty_trace_is_rejected() {
        let dir = tempdir().unwrap();
        let store = WorkflowStore::new(dir.path());
        assert!(matches!(
            store.save(None, &ReferenceTrace::empty()).await,
            Err(PersistenceError::EmptyTrace)
        ));
    }

    #[tokio::test]
    async fn directory_without_trace_loads_previews_only() {
        let dir = tempdir().unwrap();
        let workflow = dir.path().join("wf-1");
        std::fs::create_dir_all(&workflow).unwrap();
        std::fs::write(workflow.join("screenshot-5.jpg"), JPEG).unwrap();

        let loaded = WorkflowStore::new(dir.path()).load("wf-1").await.unwrap();
        assert!(loaded.trace.is_none());
        assert_eq!(loaded.previews.len(), 1);
        assert_eq!(loaded.previews[0].timestamp, 5);
    }

    #[tokio::test]
    async fn several_traces_are_reported() {
        let dir = tempdir().unwrap();
        let workflow = dir.path().join("wf-2");
        std::fs::create_dir_all(&workflow).unwrap();
        std::fs::write(workflow.join("a.jsonl"), "").unwrap();
        std::fs::write(workflow.join("b.jsonl"), "").unwrap();

        let err = WorkflowStore::new(dir.path()).load("wf-2").await.unwrap_err();
        assert!(matches!(err, PersistenceError::MultipleTraces { count: 2, .. }));
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let dir = tempdir().unwrap();
        let err = WorkflowStore::new(dir.path()).load("nope").await.unwrap_err();
        assert!(matches!(err, PersistenceError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn list_and_read_files() {
        let dir = tempdir().unwrap();
        let store = WorkflowStore::new(dir.path().join("missing-root"));
        assert!(store.list().await.unwrap().is_empty());

        let store = WorkflowStore::new(dir.path());
        let saved = store.save(Some("demo"), &sample_trace()).await.unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].files, vec!["demo.jsonl", "screenshot-1700.jpg"]);

        let bytes = store.read_file(&saved.id, "screenshot-1700.jpg").await.unwrap();
        assert_eq!(bytes, JPEG);
        assert!(matches!(
            store.read_file(&saved.id, "other.jpg").await,
            Err(PersistenceError::FileNotFound(_))
        ));
    }

    #[test]
    fn path_segments_are_validated() {
        for bad in ["", "..", "a/b", "a\\b", "x..y"] {
            assert!(validate_segment(bad).is_err(), "{bad:?}");
        }
        assert!(validate_segment("screenshot-1.jpg").is_ok());
    }
}
