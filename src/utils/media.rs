use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const RECIPE_IMAGE_DIR: &str = "recipes/images";

/// Raster formats accepted for recipe images. Anything else, SVG included, is
/// rejected since stored files are served from our own origin.
const RASTER_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Turns the `image` field of a recipe payload into a public URL.
///
/// A `data:image/...;base64,` payload is decoded and stored under the media
/// root; a URL that already points into our media space is kept as it is, so a
/// client can echo back what it read.
pub async fn resolve_recipe_image(config: &Config, raw: &str) -> AppResult<String> {
    if raw.starts_with("data:") {
        let relative = store_data_url(Path::new(&config.media_root), RECIPE_IMAGE_DIR, raw).await?;
        return Ok(config.media_url_for(&relative));
    }

    let media_prefix = format!("{}/", config.media_url.trim_end_matches('/'));
    if raw.starts_with(&media_prefix) && !raw.contains("..") {
        return Ok(raw.to_string());
    }

    Err(AppError::Validation(
        "Image must be a base64 encoded data URL".to_string(),
    ))
}

/// Decodes `data:<mime>;base64,<payload>` and writes it to
/// `<media_root>/<dir>/<uuid>.<ext>`. Returns the path relative to the media root.
pub async fn store_data_url(media_root: &Path, dir: &str, data_url: &str) -> AppResult<String> {
    let (mime, payload) = parse_data_url(data_url)?;

    if !RASTER_IMAGE_TYPES.contains(&mime.essence_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported image type: {}",
            mime.essence_str()
        )));
    }

    let extension = image_extension(&mime)?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::Validation("Image is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Image is empty".to_string()));
    }
    if !has_image_signature(mime.essence_str(), &bytes) {
        return Err(AppError::Validation(format!(
            "Image content is not {}",
            mime.essence_str()
        )));
    }

    let file_name = format!("{}.{}", Uuid::new_v4(), extension);
    let target_dir = media_root.join(dir);
    tokio::fs::create_dir_all(&target_dir).await?;
    tokio::fs::write(target_dir.join(&file_name), &bytes).await?;

    tracing::debug!("Stored {} bytes of {} as {}/{}", bytes.len(), mime, dir, file_name);

    Ok(format!("{}/{}", dir, file_name))
}

fn parse_data_url(data_url: &str) -> AppResult<(mime::Mime, &str)> {
    let invalid = || AppError::Validation("Malformed data URL".to_string());

    let rest = data_url.strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let media_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    let mime: mime::Mime = media_type.parse().map_err(|_| invalid())?;

    Ok((mime, payload))
}

fn image_extension(mime: &mime::Mime) -> AppResult<&'static str> {
    let extensions = mime_guess::get_mime_extensions(mime).ok_or_else(|| {
        AppError::Validation(format!("Unsupported image type: {}", mime.essence_str()))
    })?;

    let preferred = match mime.subtype().as_str() {
        "jpeg" => "jpg",
        other => other,
    };

    extensions
        .iter()
        .copied()
        .find(|ext| *ext == preferred)
        .or_else(|| extensions.first().copied())
        .ok_or_else(|| {
            AppError::Validation(format!("Unsupported image type: {}", mime.essence_str()))
        })
}

/// Checks the leading bytes of the decoded file against its declared type.
fn has_image_signature(essence: &str, bytes: &[u8]) -> bool {
    match essence {
        "image/png" => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
        "image/jpeg" => bytes.starts_with(b"\xff\xd8\xff"),
        "image/gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        "image/webp" => bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WEBP"[..]),
        _ => false,
    }
}
