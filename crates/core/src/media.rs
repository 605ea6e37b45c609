//! Media-type helpers for materialized artifacts.

/// Fallback MIME type when the extension is unrecognized.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Infer a MIME type from the artifact filename extension.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => DEFAULT_IMAGE_MIME,
    }
}

/// Build a `data:` URL from a MIME type and base64 payload.
pub fn data_url(mime_type: &str, base64_payload: &str) -> String {
    format!("data:{mime_type};base64,{base64_payload}")
}

/// Build a markdown image reference pointing at the backend view URL.
pub fn markdown_image(filename: &str, url: &str) -> String {
    format!("![{filename}]({url})")
}
