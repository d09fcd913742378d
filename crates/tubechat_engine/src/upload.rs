use std::path::Path;

use tubechat_core::StagedFile;

use crate::{ApiError, FailureKind};

/// MIME types the backend accepts for chat attachments.
pub const ALLOWED_UPLOAD_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/markdown",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub fn is_upload_type_allowed(mime_type: &str) -> bool {
    let mime = mime_type.split(';').next().unwrap_or(mime_type).trim();
    ALLOWED_UPLOAD_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(mime))
}

/// Best-effort MIME type from the file extension, for files staged from disk.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md" | "markdown") => "text/markdown",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// Reads a staged file after checking type and size.
pub(crate) async fn read_upload(file: &StagedFile, max_bytes: u64) -> Result<Vec<u8>, ApiError> {
    if !is_upload_type_allowed(&file.mime_type) {
        return Err(ApiError::new(
            FailureKind::Rejected,
            format!(
                "File type {} not allowed. Allowed types: {}",
                file.mime_type,
                ALLOWED_UPLOAD_TYPES.join(", ")
            ),
        ));
    }

    let metadata = tokio::fs::metadata(&file.path)
        .await
        .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", file.path.display())))?;
    if metadata.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|err| ApiError::new(FailureKind::Io, format!("{}: {err}", file.path.display())))?;
    // The file may have grown since the metadata call.
    if bytes.len() as u64 > max_bytes {
        return Err(too_large(max_bytes));
    }
    Ok(bytes)
}

fn too_large(max_bytes: u64) -> ApiError {
    ApiError::new(
        FailureKind::Rejected,
        format!(
            "File size too large. Maximum size is {}MB",
            max_bytes / (1024 * 1024)
        ),
    )
}
