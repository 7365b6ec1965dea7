//! File download tool — fetch through Web Unlocker, save to disk, inspect.
//!
//! The result payload carries everything the model needs to verify the
//! download: size, content type, the filename the URL itself suggests, a
//! structural inspection, and for PDFs a first-pages text preview.

use crate::client::{BrightDataClient, DOWNLOAD_TIMEOUT};
use crate::inspect::{self, PREVIEW_TOTAL_CHARS};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use webhound_core::error::ToolError;
use webhound_core::tool::{Tool, ToolResult};

/// Extensions we refuse to accept an HTML response for.
const BINARY_EXTENSIONS: &[&str] = &[".pdf", ".xlsx", ".xls"];

pub struct DownloadFileTool {
    client: Arc<BrightDataClient>,
    download_dir: PathBuf,
}

impl DownloadFileTool {
    pub fn new(client: Arc<BrightDataClient>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for DownloadFileTool {
    fn name(&self) -> &str {
        "download_file"
    }

    fn description(&self) -> &str {
        "Download a file (PDF, XLSX, CSV, etc.) through Bright Data proxy and save it to \
         disk. Returns file metadata including size, content type, and the original \
         filename from the URL. After downloading, verify: (1) file size is reasonable \
         (PDFs >20KB, XLSX >5KB), (2) content_type matches expected format, \
         (3) url_filename is consistent with your intended document."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Direct download URL for the file."
                },
                "filename": {
                    "type": "string",
                    "description": "Local filename to save as. Use the original filename \
                                    from the URL whenever possible - do not invent or \
                                    rename files."
                }
            },
            "required": ["url", "filename"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let file_url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;
        let filename = arguments["filename"].as_str().unwrap_or_default();

        let requested_name = filename.trim();
        if requested_name.is_empty() {
            return Ok(failure(file_url, filename, "Filename is required."));
        }

        // Bare filenames only, never paths.
        if !is_bare_filename(requested_name) {
            return Ok(failure(
                file_url,
                filename,
                "Invalid filename. Provide a basename only, without directories.",
            ));
        }

        // The filename the URL itself suggests, for identity verification.
        let url_filename = url::Url::parse(file_url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .unwrap_or_default();

        let response = match self.client.unlock(file_url, DOWNLOAD_TIMEOUT).await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %file_url, error = %e, "Download failed");
                return Ok(failure(file_url, requested_name, e.to_string()));
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Auto-reject: HTML response when expecting a binary file.
        let lower_name = requested_name.to_lowercase();
        let is_binary_ext = BINARY_EXTENSIONS.iter().any(|e| lower_name.ends_with(e));
        if is_binary_ext && content_type.to_lowercase().contains("html") {
            return Ok(failure(
                file_url,
                requested_name,
                format!(
                    "URL returned HTML (content-type: {content_type}) instead of the expected \
                     file. This URL likely points to a web page, not a downloadable file. \
                     Try finding the direct download link."
                ),
            ));
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Ok(failure(file_url, requested_name, e.to_string())),
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.download_dir).await {
            return Ok(failure(file_url, requested_name, e.to_string()));
        }
        let filepath = self.download_dir.join(requested_name);
        if let Err(e) = tokio::fs::write(&filepath, &bytes).await {
            return Ok(failure(file_url, requested_name, e.to_string()));
        }

        let mut result = serde_json::json!({
            "url": file_url,
            "filename": requested_name,
            "path": filepath.to_string_lossy(),
            "size_bytes": bytes.len(),
            "content_type": content_type,
            "url_filename": url_filename,
            "success": true,
        });

        // Content inspection — verify the file is what it claims to be.
        if lower_name.ends_with(".pdf") {
            let inspection = inspect::inspect_pdf(&bytes);
            if !inspection.valid {
                result["warning"] = serde_json::json!(format!(
                    "File does not appear to be a valid PDF: {}",
                    inspection.error.as_deref().unwrap_or("invalid header")
                ));
            } else if let Some(text) = &inspection.first_pages_text {
                // Include a snippet so the model can verify document identity
                result["first_pages_preview"] =
                    serde_json::json!(inspect::truncate_chars(text, PREVIEW_TOTAL_CHARS));
                if let Some(pages) = inspection.pages {
                    result["page_count"] = serde_json::json!(pages);
                }
            }
            result["file_inspection"] = serde_json::to_value(&inspection).unwrap_or_default();
        } else if lower_name.ends_with(".xlsx") || lower_name.ends_with(".xls") {
            let inspection = if lower_name.ends_with(".xlsx") {
                inspect::inspect_xlsx(&bytes)
            } else {
                inspect::inspect_xls(&bytes)
            };
            if !inspection.valid {
                result["warning"] = serde_json::json!(format!(
                    "File does not appear to be a valid Excel file: {}",
                    inspection.error.as_deref().unwrap_or("invalid format")
                ));
            }
            result["file_inspection"] = serde_json::to_value(&inspection).unwrap_or_default();
        }

        Ok(ToolResult::ok(result))
    }
}

fn failure(url: &str, filename: &str, error: impl Into<String>) -> ToolResult {
    ToolResult::failed(serde_json::json!({
        "url": url,
        "filename": filename,
        "error": error.into(),
        "success": false,
    }))
}

/// True when `name` is a plain basename: no separators, no parent refs.
fn is_bare_filename(name: &str) -> bool {
    !name.contains('/')
        && !name.contains('\\')
        && Path::new(name)
            .file_name()
            .is_some_and(|f| f == std::ffi::OsStr::new(name))
}
