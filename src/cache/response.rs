use std::io::{Read, Write};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

/// A complete cached HTTP response. Immutable once constructed and fully
/// determined by its stored fields, so instances are safe to share across
/// concurrent readers.
///
/// `body` holds the wire form: gzip bytes when `compressed`, the original
/// body otherwise. The uncompressed representation is recovered on demand
/// rather than stored twice.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedHttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    compressed: bool,
    uncompressed_len: u64,
}

impl CachedHttpResponse {
    /// Capture a response body, gzipping it once up front when `compress` is
    /// requested.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        compress: bool,
    ) -> Result<Self> {
        if compress {
            let mut encoder =
                GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
            encoder
                .write_all(&body)
                .context("failed to gzip response body")?;
            let compressed_bytes = encoder
                .finish()
                .context("failed to finish gzip stream")?;
            Ok(Self {
                status,
                headers,
                uncompressed_len: body.len() as u64,
                body: Bytes::from(compressed_bytes),
                compressed: true,
            })
        } else {
            Ok(Self {
                status,
                headers,
                uncompressed_len: body.len() as u64,
                body,
                compressed: false,
            })
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn compressed(&self) -> bool {
        self.compressed
    }

    /// The form meant for the wire: compressed bytes when `compressed`, the
    /// original body otherwise.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Byte length of whatever [`body`](Self::body) returns.
    pub fn len(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The original representation, gunzipping lazily if needed.
    pub fn uncompressed_body(&self) -> Result<Bytes> {
        if !self.compressed {
            return Ok(self.body.clone());
        }
        let mut decoder = GzDecoder::new(self.body.as_ref());
        let mut out = Vec::with_capacity(self.uncompressed_len as usize);
        decoder
            .read_to_end(&mut out)
            .context("failed to gunzip cached response body")?;
        Ok(Bytes::from(out))
    }

    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed_len
    }

    pub fn to_persisted(&self) -> Result<PersistedResponse> {
        let body = if self.compressed {
            BASE64.encode(&self.body)
        } else {
            std::str::from_utf8(&self.body)
                .map_err(|_| anyhow!("uncompressed response body is not valid UTF-8"))?
                .to_string()
        };
        Ok(PersistedResponse {
            status: self.status.as_u16(),
            headers: headermap_to_vec(&self.headers),
            body,
            compressed: self.compressed,
            uncompressed_length: self.compressed.then_some(self.uncompressed_len),
        })
    }

    pub fn from_persisted(persisted: &PersistedResponse) -> Result<Self> {
        let status = StatusCode::from_u16(persisted.status)
            .with_context(|| format!("invalid cached status {}", persisted.status))?;
        let headers = to_headermap(&persisted.headers);
        if persisted.compressed {
            let body = BASE64
                .decode(&persisted.body)
                .context("cached body is not valid base64")?;
            let uncompressed_len = persisted
                .uncompressed_length
                .ok_or_else(|| anyhow!("compressed cache entry is missing its original length"))?;
            Ok(Self {
                status,
                headers,
                body: Bytes::from(body),
                compressed: true,
                uncompressed_len,
            })
        } else {
            let body = Bytes::from(persisted.body.clone().into_bytes());
            Ok(Self {
                status,
                headers,
                uncompressed_len: body.len() as u64,
                body,
                compressed: false,
            })
        }
    }
}

/// Store-level shape of a cached response. Serialized with `serde_json`; the
/// body is base64 text when compressed so the payload stays safe in a
/// text-oriented store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub compressed: bool,
    #[serde(default)]
    pub uncompressed_length: Option<u64>,
}

fn to_headermap(items: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in items {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name.as_str()),
            http::HeaderValue::from_str(value),
        ) {
            map.append(name, value);
        }
    }
    map
}

fn headermap_to_vec(map: &HeaderMap) -> Vec<(String, String)> {
    let mut items = Vec::new();
    for (name, value) in map.iter() {
        if let Ok(value_str) = value.to_str() {
            items.push((name.as_str().to_string(), value_str.to_string()));
        }
    }
    items
}
