//! In-memory document library used by the tool and server tests.

use crate::lazy::LazyLibrary;
use async_trait::async_trait;
use spbridge_core::{
    BackendError, BridgeError, Download, FileContent, FileMetadata, LibraryItem, Result,
};
use spbridge_sharepoint::DocumentLibrary;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LIBRARY_ROOT: &str = "/sites/team/Shared Documents";
const ORIGIN: &str = "https://contoso.sharepoint.com";

#[derive(Debug, Default)]
pub struct MemoryLibrary {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    listed: Mutex<Vec<String>>,
    downloads: Mutex<Vec<(String, Option<bool>)>>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        self
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn listed(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(String, Option<bool>)> {
        self.downloads.lock().unwrap().clone()
    }

    fn metadata(&self, path: &str, size: usize) -> FileMetadata {
        FileMetadata {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            size: size as u64,
            download_url: self.build_absolute_url(path),
        }
    }
}

#[async_trait]
impl DocumentLibrary for MemoryLibrary {
    fn default_library(&self) -> &str {
        LIBRARY_ROOT
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<LibraryItem>> {
        self.listed.lock().unwrap().push(folder.to_string());

        let prefix = format!("{}/", folder.trim_end_matches('/'));
        let files = self.files.lock().unwrap();
        let mut folders = Vec::new();
        let mut items = Vec::new();
        for (path, data) in files.iter() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    let child_path = format!("{}{}", prefix, child);
                    if !folders.iter().any(|f: &LibraryItem| f.path == child_path) {
                        folders.push(LibraryItem {
                            name: child.to_string(),
                            download_url: self.build_absolute_url(&child_path),
                            path: child_path,
                            is_folder: true,
                            size: 0,
                        });
                    }
                }
                None => {
                    let meta = self.metadata(path, data.len());
                    items.push(LibraryItem {
                        name: meta.name,
                        path: meta.path,
                        is_folder: false,
                        size: meta.size,
                        download_url: meta.download_url,
                    });
                }
            }
        }
        folders.extend(items);
        Ok(folders)
    }

    async fn download_file(&self, path: &str, as_text: Option<bool>) -> Result<Download> {
        self.downloads
            .lock()
            .unwrap()
            .push((path.to_string(), as_text));

        let data = self
            .file(path)
            .ok_or_else(|| BridgeError::Backend(BackendError::NotFound(path.to_string())))?;
        let file = self.metadata(path, data.len());
        let content = match as_text {
            Some(true) => FileContent::Text(String::from_utf8(data).map_err(|_| {
                BackendError::InvalidResponse(format!("{} is not valid UTF-8 text", path))
            })?),
            Some(false) => FileContent::Binary(data),
            None => match String::from_utf8(data) {
                Ok(text) => FileContent::Text(text),
                Err(err) => FileContent::Binary(err.into_bytes()),
            },
        };
        Ok(Download { file, content })
    }

    async fn upload_file(&self, folder: &str, name: &str, data: Vec<u8>) -> Result<FileMetadata> {
        let path = format!("{}/{}", folder.trim_end_matches('/'), name);
        let meta = self.metadata(&path, data.len());
        self.files.lock().unwrap().insert(path, data);
        Ok(meta)
    }

    fn build_absolute_url(&self, path: &str) -> String {
        format!("{}{}", ORIGIN, path.replace(' ', "%20"))
    }
}

/// A lazy handle over `library` that counts how many times it was built.
pub fn counting_library(library: Arc<MemoryLibrary>) -> (LazyLibrary, Arc<AtomicUsize>) {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let lazy = LazyLibrary::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        let library = Arc::clone(&library);
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let library: Arc<dyn DocumentLibrary> = library;
            Ok::<_, BridgeError>(library)
        }
    });
    (lazy, constructed)
}
