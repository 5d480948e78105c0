use async_trait::async_trait;
use spbridge_core::{Download, FileMetadata, LibraryItem, Result};

#[async_trait]
pub trait DocumentLibrary: Send + Sync + std::fmt::Debug {
    /// Server-relative path of the configured library root.
    fn default_library(&self) -> &str;

    /// Immediate children of `folder`, folders first.
    async fn list_folder(&self, folder: &str) -> Result<Vec<LibraryItem>>;

    /// Fetches a file. `Some(true)` forces a UTF-8 decode, `Some(false)`
    /// forces raw bytes and `None` lets the implementation decide.
    async fn download_file(&self, path: &str, as_text: Option<bool>) -> Result<Download>;

    async fn upload_file(&self, folder: &str, name: &str, data: Vec<u8>) -> Result<FileMetadata>;

    fn build_absolute_url(&self, path: &str) -> String;
}
