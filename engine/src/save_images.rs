//! Writes the images of a generation response to disk.
//!
//! Files are named `<prefix>-<timestamp>-<index><ext>`. The timestamp is computed once per
//! [`Materializer`] so one batch shares it, and the 1-based index is zero padded to two digits.
//! Inline images are always written as `.png`; downloaded images get their extension from the
//! response's content type.

use std::path::{Path, PathBuf};

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;
use strum::Display;

use crate::{
    error::{Error, Result},
    image_model::{GenerationResult, ImageSource},
};

/// Standard alphabet, padding optional.
const INLINE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes inline image data, ignoring line breaks and other ASCII whitespace.
pub fn decode_inline(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(INLINE_BASE64.decode(compact)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ImageFormat {
    #[strum(to_string = ".png")]
    Png,
    #[strum(to_string = ".jpg")]
    Jpeg,
    #[strum(to_string = ".webp")]
    Webp,
}

impl ImageFormat {
    /// Unknown or missing content types fall back to PNG.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return Self::Png;
        };
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            "image/jpeg" => Self::Jpeg,
            "image/webp" => Self::Webp,
            _ => Self::Png,
        }
    }
}

/// Filesystem safe rendering of `now`, e.g. `2026-10-18T09-15-02-123Z`.
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

pub struct Materializer {
    client: Client,
    out_dir: PathBuf,
    prefix: String,
    stamp: String,
}

impl Materializer {
    pub fn new(client: Client, out_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self::with_stamp(client, out_dir, prefix, run_timestamp(Utc::now()))
    }

    pub fn with_stamp(
        client: Client,
        out_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        stamp: impl Into<String>,
    ) -> Self {
        Self {
            client,
            out_dir: out_dir.into(),
            prefix: prefix.into(),
            stamp: stamp.into(),
        }
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Saves every image of `response` in order and returns the written paths. Items with
    /// neither inline data nor a URL are skipped, so the result may be shorter than the input.
    pub async fn save_all(&self, response: &Value) -> Result<Vec<PathBuf>> {
        let result = GenerationResult::try_from(response)?;
        ensure_dir(&self.out_dir).await?;

        let mut saved = Vec::with_capacity(result.items.len());
        for (idx, item) in result.items.iter().enumerate() {
            let index = idx + 1;
            let path = match item.source() {
                Some(ImageSource::Inline(encoded)) => {
                    let bytes = decode_inline(encoded)?;
                    self.write(index, ImageFormat::Png, &bytes).await?
                }
                Some(ImageSource::Remote(url)) => {
                    let (format, bytes) = self.download(url).await?;
                    self.write(index, format, &bytes).await?
                }
                None => {
                    debug!("Item {index} has neither inline data nor a url, skipping");
                    continue;
                }
            };
            saved.push(path);
        }

        Ok(saved)
    }

    pub fn file_name(&self, index: usize, format: ImageFormat) -> String {
        format!("{}-{}-{index:02}{format}", self.prefix, self.stamp)
    }

    async fn download(&self, url: &str) -> Result<(ImageFormat, Vec<u8>)> {
        info!("Downloading {url}");
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Download {
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let format = ImageFormat::from_content_type(content_type);
        let bytes = resp.bytes().await?;
        Ok((format, bytes.to_vec()))
    }

    async fn write(&self, index: usize, format: ImageFormat, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.out_dir.join(self.file_name(index, format));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(Error::file_write(&path))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(Error::file_write(dir))
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    const STAMP: &str = "2026-10-18T09-15-02-123Z";

    fn materializer(dir: &Path) -> Materializer {
        Materializer::with_stamp(Client::new(), dir, "fox", STAMP)
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    async fn mount_image(server: &MockServer, route: &str, content_type: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_bytes(body.to_vec()),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_run_timestamp() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 18, 9, 15, 2)
            .unwrap()
            .checked_add_signed(chrono::TimeDelta::milliseconds(123))
            .unwrap();
        assert_eq!(run_timestamp(now), STAMP);
    }

    #[test]
    fn test_format_from_content_type() {
        let cases = [
            (Some("image/jpeg"), ".jpg"),
            (Some("image/png"), ".png"),
            (Some("image/webp"), ".webp"),
            (Some("Image/JPEG; charset=binary"), ".jpg"),
            (Some("image/gif"), ".png"),
            (Some(""), ".png"),
            (None, ".png"),
        ];
        for (content_type, ext) in cases {
            assert_eq!(
                ImageFormat::from_content_type(content_type).to_string(),
                ext,
                "{content_type:?}"
            );
        }
    }

    #[test]
    fn test_new_uses_filesystem_safe_stamp() {
        let m = Materializer::new(Client::new(), "out", "fox");
        assert!(!m.stamp().contains([':', '.']), "{}", m.stamp());
        assert!(m.stamp().ends_with('Z'));
        assert_eq!(
            m.file_name(1, ImageFormat::Png),
            format!("fox-{}-01.png", m.stamp())
        );
    }

    #[test]
    fn test_decode_inline_is_lenient_about_padding_and_whitespace() {
        let expected = b"png-bytes!".to_vec();
        let padded = STANDARD.encode(&expected);
        let unpadded = padded.trim_end_matches('=');
        let wrapped = format!("{}\n{}\r\n", &padded[..6], &padded[6..]);

        assert_eq!(decode_inline(&padded).unwrap(), expected);
        assert_eq!(decode_inline(unpadded).unwrap(), expected);
        assert_eq!(decode_inline(&wrapped).unwrap(), expected);
        assert!(matches!(decode_inline("a*b"), Err(Error::InvalidImageData(_))));
    }

    #[tokio::test]
    async fn test_inline_data_survives_odd_url_field() {
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [{"b64_json": STANDARD.encode(b"inline"), "url": 5}]});

        let saved = materializer(dir.path()).save_all(&response).await.unwrap();

        assert_eq!(saved.len(), 1);
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"inline");
    }

    #[test]
    fn test_index_padding_grows_past_two_digits() {
        let m = materializer(Path::new("out"));
        assert_eq!(m.file_name(1, ImageFormat::Png), format!("fox-{STAMP}-01.png"));
        assert_eq!(m.file_name(99, ImageFormat::Webp), format!("fox-{STAMP}-99.webp"));
        assert_eq!(m.file_name(100, ImageFormat::Jpeg), format!("fox-{STAMP}-100.jpg"));
    }

    #[tokio::test]
    async fn test_inline_images() {
        let dir = TempDir::new().unwrap();
        let first = b"\x89PNG first".to_vec();
        let second = b"\x89PNG second".to_vec();
        let response = json!({"data": [
            {"b64_json": STANDARD.encode(&first)},
            {"b64_json": STANDARD.encode(&second)},
        ]});

        let saved = materializer(dir.path()).save_all(&response).await.unwrap();

        assert_eq!(
            file_names(&saved),
            [format!("fox-{STAMP}-01.png"), format!("fox-{STAMP}-02.png")]
        );
        assert_eq!(std::fs::read(&saved[0]).unwrap(), first);
        assert_eq!(std::fs::read(&saved[1]).unwrap(), second);
    }

    #[tokio::test]
    async fn test_downloaded_webp() {
        let server = MockServer::start().await;
        mount_image(&server, "/img/1", "image/webp", b"RIFFwebp").await;
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [{"url": format!("{}/img/1", server.uri())}]});

        let saved = materializer(dir.path()).save_all(&response).await.unwrap();

        assert_eq!(file_names(&saved), [format!("fox-{STAMP}-01.webp")]);
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"RIFFwebp");
    }

    #[tokio::test]
    async fn test_mixed_sources_keep_order() {
        let server = MockServer::start().await;
        mount_image(&server, "/2", "image/jpeg", b"jpeg-2").await;
        mount_image(&server, "/4", "application/octet-stream", b"blob-4").await;
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [
            {"b64_json": STANDARD.encode(b"png-1")},
            {"url": format!("{}/2", server.uri())},
            {"b64_json": STANDARD.encode(b"png-3")},
            {"url": format!("{}/4", server.uri())},
        ]});

        let saved = materializer(dir.path()).save_all(&response).await.unwrap();

        assert_eq!(
            file_names(&saved),
            [
                format!("fox-{STAMP}-01.png"),
                format!("fox-{STAMP}-02.jpg"),
                format!("fox-{STAMP}-03.png"),
                format!("fox-{STAMP}-04.png"),
            ]
        );
        let contents: Vec<_> = saved.iter().map(|p| std::fs::read(p).unwrap()).collect();
        assert_eq!(
            contents,
            [b"png-1".to_vec(), b"jpeg-2".to_vec(), b"png-3".to_vec(), b"blob-4".to_vec()]
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[tokio::test]
    async fn test_items_without_source_are_skipped() {
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [
            {"revised_prompt": "nothing here"},
            {"b64_json": STANDARD.encode(b"png-2")},
        ]});

        let saved = materializer(dir.path()).save_all(&response).await.unwrap();

        // the index follows the response position, not the number of saved files
        assert_eq!(file_names(&saved), [format!("fox-{STAMP}-02.png")]);
    }

    #[tokio::test]
    async fn test_inline_wins_over_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [{
            "b64_json": STANDARD.encode(b"inline"),
            "url": format!("{}/unused", server.uri()),
        }]});

        let saved = materializer(dir.path()).save_all(&response).await.unwrap();

        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"inline");
    }

    #[tokio::test]
    async fn test_unexpected_format_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("never-created");

        let err = materializer(&out)
            .save_all(&json!({"foo": 1}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedFormat));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [{"url": format!("{}/gone", server.uri())}]});

        let err = materializer(dir.path()).save_all(&response).await.unwrap_err();

        assert!(matches!(err, Error::Download { status: 404 }));
        assert_eq!(err.to_string(), "Image download failed: 404");
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let dir = TempDir::new().unwrap();
        let response = json!({"data": [{"b64_json": "not base64!"}]});

        let err = materializer(dir.path()).save_all(&response).await.unwrap_err();

        assert!(matches!(err, Error::InvalidImageData(_)));
    }

    #[tokio::test]
    async fn test_creates_nested_out_dir_and_tolerates_existing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a").join("b");
        let response = json!({"data": [{"b64_json": STANDARD.encode(b"x")}]});

        materializer(&out).save_all(&response).await.unwrap();
        let again = Materializer::with_stamp(Client::new(), &out, "fox", "later")
            .save_all(&response)
            .await
            .unwrap();

        assert_eq!(file_names(&again), ["fox-later-01.png"]);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_file_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"in the way").unwrap();
        let response = json!({"data": [{"b64_json": STANDARD.encode(b"x")}]});

        let err = materializer(&blocker).save_all(&response).await.unwrap_err();

        assert!(matches!(err, Error::FileWrite { .. }));
    }
}
