//! Shared fixtures for the batch integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use imgsweep::batch::{
    BatchError, BatchResult, CatalogSource, Cleanup, FileCoordinate, ImageScanner, Page, ScanResult, ScanSource,
};

/// Catalog served from memory, one `Vec` per page
pub struct MemoryCatalog {
    pages: Vec<Vec<String>>,
    fail_at: Option<usize>,
    pub fetches: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new(pages: &[&[&str]]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|page| page.iter().map(|name| name.to_string()).collect())
                .collect(),
            fail_at: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Names `image-000` .. in pages of `page_size`
    pub fn numbered(total: usize, page_size: usize) -> Self {
        let names: Vec<String> = (0..total).map(|i| format!("image-{:03}", i)).collect();
        Self {
            pages: names.chunks(page_size.max(1)).map(|chunk| chunk.to_vec()).collect(),
            fail_at: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Fetching page `page` fails
    pub fn failing_at(mut self, page: usize) -> Self {
        self.fail_at = Some(page);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    fn first_cursor(&self) -> String {
        "0".to_string()
    }

    async fn fetch_page(&self, cursor: &str) -> BatchResult<Page> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let page: usize = cursor
            .parse()
            .map_err(|_| BatchError::catalog(format!("bad cursor {cursor}")))?;
        if self.fail_at == Some(page) {
            return Err(BatchError::catalog(format!("page {page}: connection reset")));
        }
        let items = self.pages.get(page).cloned().unwrap_or_default();
        let next = (page + 1 < self.pages.len()).then(|| (page + 1).to_string());
        Ok(Page::new(items, next))
    }
}

/// What the scripted scanner does for one image
#[derive(Debug, Clone)]
pub enum Behaviour {
    Unknowns(Vec<(&'static str, Vec<&'static str>)>),
    FailAcquire,
    FailScan,
    PanicScan,
    Slow(Duration),
}

/// Scanner whose behaviour per image is fixed up front; unknown images scan clean
#[derive(Default)]
pub struct ScriptedScanner {
    behaviours: HashMap<String, Behaviour>,
    files_per_image: usize,
    pub acquired: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicUsize>,
}

impl ScriptedScanner {
    pub fn new(files_per_image: usize) -> Self {
        Self {
            files_per_image,
            ..Default::default()
        }
    }

    pub fn with(mut self, identifier: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(identifier.to_string(), behaviour);
        self
    }

    pub fn acquired(&self) -> Vec<String> {
        let mut acquired = self.acquired.lock().clone();
        acquired.sort();
        acquired
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageScanner for ScriptedScanner {
    async fn acquire(&self, identifier: &str, _providers: &[String]) -> BatchResult<Box<dyn ScanSource>> {
        self.acquired.lock().push(identifier.to_string());
        let behaviour = self.behaviours.get(identifier).cloned();
        if let Some(Behaviour::FailAcquire) = behaviour {
            return Err(BatchError::acquire(identifier, "manifest unknown"));
        }
        Ok(Box::new(ScriptedSource {
            identifier: identifier.to_string(),
            behaviour,
            files: self.files_per_image,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedSource {
    identifier: String,
    behaviour: Option<Behaviour>,
    files: usize,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl ScanSource for ScriptedSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn file_count(&mut self) -> BatchResult<usize> {
        Ok(self.files)
    }

    async fn scan(&mut self) -> BatchResult<ScanResult> {
        let mut result = ScanResult::default();
        match &self.behaviour {
            None | Some(Behaviour::FailAcquire) => {}
            Some(Behaviour::FailScan) => return Err(BatchError::scan(&self.identifier, "catalogers failed")),
            Some(Behaviour::PanicScan) => panic!("cataloger crashed on {}", self.identifier),
            Some(Behaviour::Slow(delay)) => tokio::time::sleep(*delay).await,
            Some(Behaviour::Unknowns(entries)) => {
                for (path, messages) in entries {
                    result.unknowns.insert(
                        FileCoordinate::new(*path),
                        messages.iter().map(|m| m.to_string()).collect(),
                    );
                }
            }
        }
        Ok(result)
    }

    fn close(&mut self) -> BatchResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every cleanup call; optionally fails them all
#[derive(Default)]
pub struct RecordingCleanup {
    pub calls: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingCleanup {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Cleanup for RecordingCleanup {
    async fn cleanup(&self, identifier: &str) -> BatchResult<()> {
        self.calls.lock().push(identifier.to_string());
        if self.fail {
            return Err(BatchError::cleanup(identifier, "daemon not running"));
        }
        Ok(())
    }
}
