use crate::library::DocumentLibrary;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use spbridge_core::{
    BackendError, Credentials, Download, FileContent, FileMetadata, LibraryItem, Result,
    SharePointSettings,
};
use std::fmt;
use std::time::Duration;
use tokio::sync::OnceCell;

const ODATA_JSON: &str = "application/json;odata=nometadata";

/// Hidden folder every document library carries for its list forms.
const FORMS_FOLDER: &str = "Forms";

/// SharePoint REST client for a single site and document library.
#[derive(Debug)]
pub struct SharePointService {
    client: Client,
    site_url: Url,
    default_library: String,
    auth: TokenSource,
}

enum TokenSource {
    Static(String),
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        scope: String,
        token: OnceCell<String>,
    },
}

#[derive(Deserialize)]
struct ODataPage<T> {
    value: Vec<T>,
    #[serde(rename = "odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawFolder {
    name: String,
    server_relative_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawFile {
    name: String,
    server_relative_url: String,
    #[serde(deserialize_with = "int64")]
    length: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// SharePoint serializes `Edm.Int64` as a string; accept either form.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(u64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
            TokenSource::ClientCredentials {
                token_url,
                client_id,
                token,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("cached", &token.initialized())
                .finish_non_exhaustive(),
        }
    }
}

impl SharePointService {
    pub fn new(settings: &SharePointSettings) -> Result<Self> {
        let site_url = settings.site_url()?;
        let default_library = settings.default_library()?;

        let auth = match settings.credentials()? {
            Credentials::AccessToken(token) => TokenSource::Static(token),
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => TokenSource::ClientCredentials {
                token_url: format!(
                    "{}/{}/oauth2/v2.0/token",
                    settings.authority_url.trim_end_matches('/'),
                    tenant_id
                ),
                client_id,
                client_secret,
                scope: format!("{}/.default", site_url.origin().ascii_serialization()),
                token: OnceCell::new(),
            },
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        tracing::debug!(site = %site_url, library = %default_library, "created SharePoint client");

        Ok(Self {
            client,
            site_url,
            default_library,
            auth,
        })
    }

    fn api_url(&self, tail: &str) -> String {
        format!(
            "{}/_api/web/{}",
            self.site_url.as_str().trim_end_matches('/'),
            tail
        )
    }

    async fn access_token(&self) -> Result<String> {
        match &self.auth {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
                token,
            } => {
                let token = token
                    .get_or_try_init(|| {
                        self.fetch_token(token_url, client_id, client_secret, scope)
                    })
                    .await?;
                Ok(token.clone())
            }
        }
    }

    async fn fetch_token(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<String> {
        tracing::debug!(%token_url, "requesting SharePoint access token");

        let response = self
            .client
            .post(token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("scope", scope),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::AuthFailed(format!(
                "token endpoint returned HTTP {}: {}",
                status, body
            ))
            .into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::AuthFailed(format!("malformed token response: {}", e)))?;
        Ok(token.access_token)
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        check_status(response, path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, path: &str) -> Result<T> {
        let request = self.client.get(url).header(ACCEPT, ODATA_JSON);
        let response = self.send(request, path).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", url, e)).into())
    }

    /// Collects every page of an OData collection, following `odata.nextLink`.
    async fn get_all<T: DeserializeOwned>(&self, url: String, path: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: ODataPage<T> = self.get_json(&url, path).await?;
            items.extend(page.value);
            next = page.next_link;
        }
        Ok(items)
    }

    fn metadata(&self, raw: RawFile) -> FileMetadata {
        FileMetadata {
            download_url: self.build_absolute_url(&raw.server_relative_url),
            name: raw.name,
            path: raw.server_relative_url,
            size: raw.length,
        }
    }
}

#[async_trait]
impl DocumentLibrary for SharePointService {
    fn default_library(&self) -> &str {
        &self.default_library
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<LibraryItem>> {
        let folder_api = format!("GetFolderByServerRelativeUrl('{}')", odata_literal(folder));

        let folders: Vec<RawFolder> = self
            .get_all(self.api_url(&format!("{}/Folders", folder_api)), folder)
            .await?;
        let files: Vec<RawFile> = self
            .get_all(self.api_url(&format!("{}/Files", folder_api)), folder)
            .await?;

        tracing::debug!(
            %folder,
            folders = folders.len(),
            files = files.len(),
            "listed folder"
        );

        let folder_items = folders
            .into_iter()
            .filter(|raw| raw.name != FORMS_FOLDER)
            .map(|raw| LibraryItem {
                download_url: self.build_absolute_url(&raw.server_relative_url),
                name: raw.name,
                path: raw.server_relative_url,
                is_folder: true,
                size: 0,
            });
        let file_items = files.into_iter().map(|raw| {
            let meta = self.metadata(raw);
            LibraryItem {
                name: meta.name,
                path: meta.path,
                is_folder: false,
                size: meta.size,
                download_url: meta.download_url,
            }
        });

        Ok(folder_items.chain(file_items).collect())
    }

    async fn download_file(&self, path: &str, as_text: Option<bool>) -> Result<Download> {
        let file_api = self.api_url(&format!(
            "GetFileByServerRelativeUrl('{}')",
            odata_literal(path)
        ));

        let raw: RawFile = self.get_json(&file_api, path).await?;
        let response = self
            .send(self.client.get(format!("{}/$value", file_api)), path)
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        let bytes = response.bytes().await?.to_vec();

        let content = match as_text {
            Some(true) => FileContent::Text(String::from_utf8(bytes).map_err(|_| {
                BackendError::InvalidResponse(format!("{} is not valid UTF-8 text", path))
            })?),
            Some(false) => FileContent::Binary(bytes),
            None if content_type.as_deref().map_or(false, is_textual) => {
                match String::from_utf8(bytes) {
                    Ok(text) => FileContent::Text(text),
                    Err(err) => FileContent::Binary(err.into_bytes()),
                }
            }
            None => FileContent::Binary(bytes),
        };

        tracing::debug!(%path, bytes = content.len(), ?content_type, "downloaded file");

        Ok(Download {
            file: self.metadata(raw),
            content,
        })
    }

    async fn upload_file(&self, folder: &str, name: &str, data: Vec<u8>) -> Result<FileMetadata> {
        let url = self.api_url(&format!(
            "GetFolderByServerRelativeUrl('{}')/Files/add(url='{}',overwrite=true)",
            odata_literal(folder),
            odata_literal(name)
        ));
        let target = format!("{}/{}", folder.trim_end_matches('/'), name);
        let size = data.len();

        let request = self.client.post(&url).header(ACCEPT, ODATA_JSON).body(data);
        let response = self.send(request, &target).await?;
        let raw: RawFile = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", url, e)))?;

        tracing::info!(path = %raw.server_relative_url, bytes = size, "uploaded file");
        Ok(self.metadata(raw))
    }

    fn build_absolute_url(&self, path: &str) -> String {
        let mut url = self.site_url.clone();
        if path.starts_with('/') {
            url.set_path(path);
        } else {
            url.set_path(&format!("/{}", path));
        }
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let err = match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(path.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::PermissionDenied(path.to_string())
        }
        _ => BackendError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        },
    };
    tracing::debug!(%path, %status, "SharePoint request failed");
    Err(err.into())
}

/// Escapes a value for use inside a quoted OData string literal in a URL path.
fn odata_literal(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('#', "%23")
        .replace('?', "%3F")
        .replace('\'', "''")
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.starts_with("text/")
        || matches!(
            mime,
            "application/json" | "application/xml" | "application/javascript"
        )
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
}
