use crate::lazy::LazyLibrary;
use crate::registry::ToolRegistry;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use spbridge_core::{
    BridgeError, DownloadMode, DownloadedFile, FileMetadata, FolderEntry, FolderListing, Result,
    ResolvedUrl, ToolDefinition,
};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListFolderArgs {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadFileArgs {
    pub path: String,
    #[serde(default)]
    pub mode: DownloadMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadFileArgs {
    #[serde(default)]
    pub folder: Option<String>,
    pub name: String,
    pub payload: String,
    #[serde(default)]
    pub is_base64: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveUrlArgs {
    pub path: String,
}

/// Registers `list_folder`, `download_file`, `upload_file` and
/// `resolve_download_url` against `library`.
pub fn sharepoint_registry(library: Arc<LazyLibrary>) -> ToolRegistry {
    let mut registry = ToolRegistry::new(library);

    registry.register(
        ToolDefinition {
            name: "list_folder".to_string(),
            description: "Return folders and files inside a SharePoint document library folder."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Server-relative folder path (defaults to configured library)"
                    }
                },
                "additionalProperties": false
            }),
        },
        list_folder,
    );

    registry.register(
        ToolDefinition {
            name: "download_file".to_string(),
            description: "Download a file from SharePoint and return its content.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Server-relative file path inside the SharePoint site"
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["auto", "text", "binary"],
                        "default": "auto",
                        "description": "Set to 'text' to force utf-8 decode, 'binary' to force base64 response"
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        },
        download_file,
    );

    registry.register(
        ToolDefinition {
            name: "upload_file".to_string(),
            description: "Upload a file to SharePoint.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "folder": {
                        "type": "string",
                        "description": "Destination folder; defaults to configured library"
                    },
                    "name": {
                        "type": "string",
                        "description": "Filename to create inside the folder"
                    },
                    "payload": {
                        "type": "string",
                        "description": "Either raw text or base64-encoded binary payload"
                    },
                    "is_base64": {
                        "type": "boolean",
                        "default": false,
                        "description": "Pass true when payload is base64 encoded"
                    }
                },
                "required": ["name", "payload"],
                "additionalProperties": false
            }),
        },
        upload_file,
    );

    registry.register(
        ToolDefinition {
            name: "resolve_download_url".to_string(),
            description: "Return the absolute SharePoint URL for a server-relative path."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Server-relative file or folder path"
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
        },
        resolve_download_url,
    );

    registry
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn list_folder(library: Arc<LazyLibrary>, args: ListFolderArgs) -> Result<FolderListing> {
    let svc = library.get().await?;
    let path = non_empty(args.path).unwrap_or_else(|| svc.default_library().to_string());

    let items = svc.list_folder(&path).await?;
    tracing::debug!(%path, count = items.len(), "list_folder");

    Ok(FolderListing {
        path,
        items: items.into_iter().map(FolderEntry::from).collect(),
    })
}

pub async fn download_file(
    library: Arc<LazyLibrary>,
    args: DownloadFileArgs,
) -> Result<DownloadedFile> {
    let svc = library.get().await?;
    let download = svc.download_file(&args.path, args.mode.as_text()).await?;
    tracing::debug!(path = %args.path, mode = ?args.mode, bytes = download.content.len(), "download_file");
    Ok(download.into())
}

pub async fn upload_file(library: Arc<LazyLibrary>, args: UploadFileArgs) -> Result<FileMetadata> {
    if args.name.trim().is_empty() {
        return Err(BridgeError::Payload("file name must not be empty".to_string()));
    }
    let data = decode_payload(&args.payload, args.is_base64)?;

    let svc = library.get().await?;
    let folder = non_empty(args.folder).unwrap_or_else(|| svc.default_library().to_string());

    tracing::info!(%folder, name = %args.name, bytes = data.len(), "upload_file");
    svc.upload_file(&folder, &args.name, data).await
}

pub async fn resolve_download_url(
    library: Arc<LazyLibrary>,
    args: ResolveUrlArgs,
) -> Result<ResolvedUrl> {
    let svc = library.get().await?;
    Ok(ResolvedUrl {
        download_url: svc.build_absolute_url(&args.path),
        path: args.path,
    })
}

/// Bytes to upload: strict base64 decoding (whitespace ignored) or the UTF-8
/// bytes of the text.
pub fn decode_payload(payload: &str, is_base64: bool) -> Result<Vec<u8>> {
    if !is_base64 {
        return Ok(payload.as_bytes().to_vec());
    }

    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| BridgeError::Payload(format!("payload is not valid base64: {}", e)))
}
