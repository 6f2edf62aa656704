//! Scan Collaborator
//!
//! The cataloging engine is external. `ImageScanner` acquires a
//! `ScanSource` for an image reference; the source reports how many files
//! the image contains and which of them could not be classified.
//!
//! `CommandScanner` drives an external cataloger process (syft by default)
//! and decodes the `files` section of its JSON document.

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use tokio::process::Command;

use super::error::{BatchError, BatchResult};

/// Placeholder replaced by the image reference in scanner arguments
pub const IMAGE_PLACEHOLDER: &str = "{image}";

/// Placeholder replaced by the comma-joined provider list in scanner arguments
pub const PROVIDERS_PLACEHOLDER: &str = "{providers}";

pub const DEFAULT_SCANNER_COMMAND: &str = "syft";

pub fn default_scanner_args() -> Vec<String> {
    ["scan", IMAGE_PLACEHOLDER, "--from", PROVIDERS_PLACEHOLDER, "-o", "json", "-q"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Location of a file inside a scanned image
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileCoordinate {
    pub real_path: String,
    pub layer_id: Option<String>,
}

impl FileCoordinate {
    pub fn new(real_path: impl Into<String>) -> Self {
        Self {
            real_path: real_path.into(),
            layer_id: None,
        }
    }

    pub fn with_layer(real_path: impl Into<String>, layer_id: impl Into<String>) -> Self {
        Self {
            real_path: real_path.into(),
            layer_id: Some(layer_id.into()),
        }
    }
}

/// Unclassified files reported by one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub unknowns: HashMap<FileCoordinate, Vec<String>>,
}

/// An acquired, closeable handle on one image
#[async_trait]
pub trait ScanSource: Send {
    fn identifier(&self) -> &str;

    /// Number of files in the squashed image
    async fn file_count(&mut self) -> BatchResult<usize>;

    async fn scan(&mut self) -> BatchResult<ScanResult>;

    fn close(&mut self) -> BatchResult<()>;
}

/// Factory for scan sources
#[async_trait]
pub trait ImageScanner: Send + Sync {
    async fn acquire(&self, identifier: &str, providers: &[String]) -> BatchResult<Box<dyn ScanSource>>;
}

/// Closes the wrapped source when dropped, whatever the exit path
pub struct SourceGuard {
    source: Box<dyn ScanSource>,
    closed: bool,
}

impl SourceGuard {
    pub fn new(source: Box<dyn ScanSource>) -> Self {
        Self { source, closed: false }
    }

    pub fn source(&mut self) -> &mut (dyn ScanSource + 'static) {
        self.source.as_mut()
    }

    /// Close now, reporting the failure instead of logging it
    pub fn close(mut self) -> BatchResult<()> {
        self.closed = true;
        self.source.close()
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.source.close() {
            warn!("Failed to release source for {}: {}", self.source.identifier(), e);
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    location: FileLocation,
    #[serde(default)]
    unknowns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileLocation {
    path: String,
    #[serde(rename = "layerID", default)]
    layer_id: Option<String>,
}

/// Decoded cataloger output: file count and unknowns per file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedDocument {
    pub file_count: usize,
    pub result: ScanResult,
}

/// Decode a cataloger JSON document
pub fn decode_document(identifier: &str, body: &[u8]) -> BatchResult<DecodedDocument> {
    let document: CatalogDocument =
        serde_json::from_slice(body).map_err(|e| BatchError::scan(identifier, format!("invalid cataloger output: {e}")))?;

    let file_count = document.files.len();
    let mut unknowns: HashMap<FileCoordinate, Vec<String>> = HashMap::new();
    for entry in document.files {
        if entry.unknowns.is_empty() {
            continue;
        }
        let coordinate = FileCoordinate {
            real_path: entry.location.path,
            layer_id: entry.location.layer_id,
        };
        unknowns.entry(coordinate).or_default().extend(entry.unknowns);
    }

    Ok(DecodedDocument {
        file_count,
        result: ScanResult { unknowns },
    })
}

/// Scanner that shells out to an external cataloger
#[derive(Debug, Clone)]
pub struct CommandScanner {
    program: String,
    args: Vec<String>,
}

impl Default for CommandScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SCANNER_COMMAND, default_scanner_args())
    }
}

impl CommandScanner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, identifier: &str, providers: &[String]) -> Vec<String> {
        let providers = providers.join(",");
        self.args
            .iter()
            .map(|arg| {
                arg.replace(IMAGE_PLACEHOLDER, identifier)
                    .replace(PROVIDERS_PLACEHOLDER, &providers)
            })
            .collect()
    }
}

#[async_trait]
impl ImageScanner for CommandScanner {
    async fn acquire(&self, identifier: &str, providers: &[String]) -> BatchResult<Box<dyn ScanSource>> {
        let args = self.expand_args(identifier, providers);
        debug!("Running cataloger: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BatchError::acquire(identifier, format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim().lines().last().unwrap_or("no diagnostic output");
            return Err(BatchError::acquire(identifier, format!("{} exited with {}: {detail}", self.program, output.status)));
        }

        Ok(Box::new(CommandSource {
            identifier: identifier.to_string(),
            output: Some(output.stdout),
            decoded: None,
        }))
    }
}

/// Captured cataloger output for one image
struct CommandSource {
    identifier: String,
    output: Option<Vec<u8>>,
    decoded: Option<DecodedDocument>,
}

impl CommandSource {
    fn decoded(&mut self) -> BatchResult<&DecodedDocument> {
        if self.decoded.is_none() {
            let body = self
                .output
                .take()
                .ok_or_else(|| BatchError::scan(&self.identifier, "source already released"))?;
            self.decoded = Some(decode_document(&self.identifier, &body)?);
        }
        self.decoded
            .as_ref()
            .ok_or_else(|| BatchError::scan(&self.identifier, "cataloger output unavailable"))
    }
}

#[async_trait]
impl ScanSource for CommandSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn file_count(&mut self) -> BatchResult<usize> {
        Ok(self.decoded()?.file_count)
    }

    async fn scan(&mut self) -> BatchResult<ScanResult> {
        Ok(self.decoded()?.result.clone())
    }

    fn close(&mut self) -> BatchResult<()> {
        self.output = None;
        self.decoded = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const DOCUMENT: &str = r#"{
        "artifacts": [],
        "files": [
            {"id": "1", "location": {"path": "/bin/busybox", "layerID": "sha256:aa"}},
            {"id": "2", "location": {"path": "/usr/lib/libx.so"}, "unknowns": ["elf: unknown binary", "go: no symbols"]},
            {"id": "3", "location": {"path": "/opt/app.jar"}, "unknowns": ["java-archive-cataloger: not expanded"]}
        ]
    }"#;

    #[test]
    fn test_decode_document() {
        let decoded = decode_document("busybox:latest", DOCUMENT.as_bytes()).unwrap();
        assert_eq!(decoded.file_count, 3);
        assert_eq!(decoded.result.unknowns.len(), 2);
        assert_eq!(
            decoded.result.unknowns[&FileCoordinate::new("/usr/lib/libx.so")],
            vec!["elf: unknown binary".to_string(), "go: no symbols".to_string()]
        );
    }

    #[test]
    fn test_decode_document_rejects_garbage() {
        let err = decode_document("x", b"not json").unwrap_err();
        assert!(matches!(err, BatchError::Scan { .. }));

        let decoded = decode_document("x", b"{}").unwrap();
        assert_eq!(decoded.file_count, 0);
    }

    #[test]
    fn test_argument_expansion() {
        let scanner = CommandScanner::default();
        let args = scanner.expand_args("nginx:latest", &["registry".to_string(), "docker".to_string()]);
        assert_eq!(args, vec!["scan", "nginx:latest", "--from", "registry,docker", "-o", "json", "-q"]);
    }

    #[tokio::test]
    async fn test_command_scanner_decodes_output() {
        let script = r#"printf '%s' '{"files":[{"location":{"path":"/bin/{image}"},"unknowns":["t: m"]}]}'"#;
        let scanner = CommandScanner::new("sh", vec!["-c".to_string(), script.to_string()]);

        let mut source = scanner.acquire("busybox", &["registry".to_string()]).await.unwrap();
        assert_eq!(source.identifier(), "busybox");
        assert_eq!(source.file_count().await.unwrap(), 1);
        let result = source.scan().await.unwrap();
        assert_eq!(result.unknowns[&FileCoordinate::new("/bin/busybox")], vec!["t: m".to_string()]);
        source.close().unwrap();
    }

    #[tokio::test]
    async fn test_command_scanner_failure_is_acquire_error() {
        let scanner = CommandScanner::new("false", vec![]);
        let err = scanner.acquire("alpine:latest", &[]).await.err().unwrap();
        assert!(matches!(err, BatchError::Acquire { .. }));

        let scanner = CommandScanner::new("/definitely/not/a/cataloger", vec![]);
        assert!(scanner.acquire("alpine:latest", &[]).await.is_err());
    }

    struct CountingSource {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ScanSource for CountingSource {
        fn identifier(&self) -> &str {
            "counting"
        }
        async fn file_count(&mut self) -> BatchResult<usize> {
            Ok(0)
        }
        async fn scan(&mut self) -> BatchResult<ScanResult> {
            Ok(ScanResult::default())
        }
        fn close(&mut self) -> BatchResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_source_guard_closes_exactly_once() {
        let closes = Arc::new(AtomicUsize::new(0));

        let guard = SourceGuard::new(Box::new(CountingSource { closes: closes.clone() }));
        drop(guard);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let guard = SourceGuard::new(Box::new(CountingSource { closes: closes.clone() }));
        guard.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_source_guard_closes_on_panic() {
        let closes = Arc::new(AtomicUsize::new(0));
        let inner = closes.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = SourceGuard::new(Box::new(CountingSource { closes: inner }));
            panic!("scan blew up");
        });

        assert!(result.is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
