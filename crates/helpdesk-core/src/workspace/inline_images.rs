//! Pull inline `data:` images out of rich-text content so they are uploaded
//! as files instead of riding inside the message text.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};
use tracing::warn;

use crate::model::attachment::{
    AttachmentSource, LocalAttachment, MAX_ATTACHMENT_BYTES, PreviewKind, PreviewUrl,
    TempIdGenerator, extension_for_mime, unix_millis,
};

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img pattern is valid"));

static SRC_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("src pattern is valid")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InlineImageError {
    #[error("not a data URI")]
    NotDataUri,
    #[error("data URI has no payload separator")]
    MissingPayload,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("inline image is {0} bytes; each file must be less than 10MB")]
    TooLarge(u64),
}

/// Rewritten content plus the images taken out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub html: String,
    pub images: Vec<LocalAttachment>,
}

/// Replace each inline image's `src` with an `[IMAGE:name]` reference and
/// return the images as local attachments.
///
/// The attachment's preview is the original data URI. An image that cannot be
/// decoded is logged and left in place.
pub fn extract_inline_images(html: &str, ids: &mut TempIdGenerator) -> Extraction {
    let mut images = Vec::new();
    if !html.to_ascii_lowercase().contains("<img") {
        return Extraction {
            html: html.to_string(),
            images,
        };
    }

    let millis = unix_millis();
    let mut position = 0_usize;
    let rewritten = IMG_TAG.replace_all(html, |tag: &Captures<'_>| {
        let index = position;
        position += 1;
        let tag = &tag[0];

        let Some(src) = SRC_ATTR
            .captures(tag)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
        else {
            return tag.to_string();
        };
        if !src.trim_start().to_ascii_lowercase().starts_with("data:") {
            return tag.to_string();
        }

        match decode_data_uri(&src) {
            Ok((mime_type, bytes)) => {
                let name = format!(
                    "embedded-image-{millis}-{index}.{}",
                    extension_for_mime(&mime_type)
                );
                let reference = format!(
                    "src=\"[IMAGE:{name}]\" data-embedded-index=\"{}\"",
                    images.len()
                );
                images.push(LocalAttachment {
                    id: ids.next("embedded"),
                    size: bytes.len() as u64,
                    bytes: Arc::from(bytes),
                    preview_kind: PreviewKind::for_mime(&mime_type),
                    preview_url: PreviewUrl::new(src),
                    name,
                    mime_type,
                    source: AttachmentSource::Embedded,
                });
                SRC_ATTR.replace(tag, reference.as_str()).into_owned()
            }
            Err(error) => {
                warn!(index, %error, "skipping inline image");
                tag.to_string()
            }
        }
    });

    Extraction {
        html: rewritten.into_owned(),
        images,
    }
}

/// Decode `data:[<mime>][;base64],<payload>` into its MIME type and bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), InlineImageError> {
    let trimmed = uri.trim();
    let rest = trimmed
        .get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &trimmed[5..])
        .ok_or(InlineImageError::NotDataUri)?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or(InlineImageError::MissingPayload)?;

    let mut params = meta.split(';');
    let mime_type = params
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("image/png")
        .to_ascii_lowercase();
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| InlineImageError::Base64(e.to_string()))?
    } else {
        percent_decode(payload)
    };

    let size = bytes.len() as u64;
    if size > MAX_ATTACHMENT_BYTES {
        return Err(InlineImageError::TooLarge(size));
    }
    Ok((mime_type, bytes))
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok());
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_base64_and_percent_payloads() {
        let (mime, bytes) = decode_data_uri(&format!("data:image/png;base64,{PNG_1X1}")).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(&bytes[1..4], b"PNG");

        let (mime, bytes) =
            decode_data_uri("data:image/svg+xml;charset=utf-8,%3Csvg%2F%3E").unwrap();
        assert_eq!(mime, "image/svg+xml");
        assert_eq!(bytes, b"<svg/>");
    }

    #[test]
    fn rejects_bad_uris() {
        assert_eq!(
            decode_data_uri("http://x/y.png"),
            Err(InlineImageError::NotDataUri)
        );
        assert_eq!(
            decode_data_uri("data:image/png;base64"),
            Err(InlineImageError::MissingPayload)
        );
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@"),
            Err(InlineImageError::Base64(_))
        ));
    }

    #[test]
    fn extracts_each_inline_image() {
        let html = format!(
            "<p>see</p><p><img src=\"data:image/png;base64,{PNG_1X1}\"></p>\
             <img src='https://cdn.example/logo.png'>\
             <img alt=\"x\" src=\"data:image/jpeg;base64,{PNG_1X1}\">"
        );
        let mut ids = TempIdGenerator::new();
        let out = extract_inline_images(&html, &mut ids);

        assert_eq!(out.images.len(), 2);
        let first = &out.images[0];
        assert!(first.name.starts_with("embedded-image-"));
        assert!(first.name.ends_with("-0.png"));
        assert!(out.images[1].name.ends_with("-2.jpg"));
        assert_eq!(first.source, AttachmentSource::Embedded);
        assert_eq!(first.placeholder_caption(), "Embedded Image");
        assert!(first.preview_url.as_str().starts_with("data:image/png"));
        assert!(!first.preview_url.is_object_url());

        assert!(!out.html.contains("base64"));
        assert!(out.html.contains(&format!("src=\"[IMAGE:{}]\" data-embedded-index=\"0\"", first.name)));
        assert!(out.html.contains("data-embedded-index=\"1\""));
        assert!(out.html.contains("https://cdn.example/logo.png"));
    }

    #[test]
    fn broken_image_is_skipped_not_fatal() {
        let html = format!(
            "<img src=\"data:image/png;base64,%%%\"><img src=\"data:image/png;base64,{PNG_1X1}\">"
        );
        let mut ids = TempIdGenerator::new();
        let out = extract_inline_images(&html, &mut ids);
        assert_eq!(out.images.len(), 1);
        assert!(out.html.contains("data:image/png;base64,%%%"));
        assert!(out.images[0].name.ends_with("-1.png"));
    }

    #[test]
    fn text_without_images_is_untouched() {
        let mut ids = TempIdGenerator::new();
        let out = extract_inline_images("<p>plain</p>", &mut ids);
        assert_eq!(out.html, "<p>plain</p>");
        assert!(out.images.is_empty());
        assert_eq!(ids.issued(), 0);
    }
}
