use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMPT: &str = "List the files available in our SharePoint document library.";

/// One chat request as assembled from the command line and environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub server_command: String,
    pub server_args: Vec<String>,
}

/// Joins prompt words with single spaces, falling back to [`DEFAULT_PROMPT`]
/// when no words were given.
pub fn ensure_prompt<S: AsRef<str>>(words: &[S]) -> String {
    if words.is_empty() {
        return DEFAULT_PROMPT.to_string();
    }
    words
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A folder or file returned by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    pub name: String,
    pub path: String,
    pub is_folder: bool,
    pub size: u64,
    pub download_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub size: u64,
    pub download_url: String,
}

impl From<LibraryItem> for FolderEntry {
    fn from(item: LibraryItem) -> Self {
        Self {
            name: item.name,
            path: item.path,
            kind: if item.is_folder {
                ItemKind::Folder
            } else {
                ItemKind::File
            },
            size: item.size,
            download_url: item.download_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    pub path: String,
    pub items: Vec<FolderEntry>,
}

/// File metadata; also the shape returned after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn len(&self) -> usize {
        match self {
            FileContent::Text(text) => text.len(),
            FileContent::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file: FileMetadata,
    pub content: FileContent,
}

/// Wire form of file content. The `content_type` tag always names the field
/// that carries the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "lowercase")]
pub enum EncodedContent {
    Text { text: String },
    Base64 { base64: String },
}

impl From<FileContent> for EncodedContent {
    fn from(content: FileContent) -> Self {
        match content {
            FileContent::Text(text) => EncodedContent::Text { text },
            FileContent::Binary(bytes) => EncodedContent::Base64 {
                base64: STANDARD.encode(bytes),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    #[serde(flatten)]
    pub file: FileMetadata,
    #[serde(flatten)]
    pub content: EncodedContent,
}

impl From<Download> for DownloadedFile {
    fn from(download: Download) -> Self {
        Self {
            file: download.file,
            content: download.content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrl {
    pub path: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    #[default]
    Auto,
    Text,
    Binary,
}

impl DownloadMode {
    /// The `as_text` hint handed to the document library; `None` leaves the
    /// choice to the library.
    pub fn as_text(self) -> Option<bool> {
        match self {
            DownloadMode::Auto => None,
            DownloadMode::Text => Some(true),
            DownloadMode::Binary => Some(false),
        }
    }
}
