// Publish a generated document to a public file host and hand back a link.
// One attempt, fixed timeout; any failure degrades to a sentinel instead of an error.

use crate::error::{Error, Result};
use log::{info, warn};
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Outcome of an upload, printable as the link text sent to staff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadLink {
    Public(String),
    /// The host answered but did not accept the file.
    NotGenerated,
    /// The host could not be reached in time.
    Unavailable,
}

impl fmt::Display for UploadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadLink::Public(url) => f.write_str(url),
            UploadLink::NotGenerated => f.write_str("Link not generated"),
            UploadLink::Unavailable => f.write_str("Link unavailable (server busy)"),
        }
    }
}

pub trait Uploader {
    fn upload(&self, bytes: &[u8], file_name: &str) -> UploadLink;
}

#[derive(Deserialize)]
struct HostReply {
    status: String,
    data: Option<HostData>,
}

#[derive(Deserialize)]
struct HostData {
    url: String,
}

/// Interpret the host's JSON reply.
pub fn parse_upload_response(body: &str) -> UploadLink {
    match serde_json::from_str::<HostReply>(body) {
        Ok(HostReply { status, data: Some(data) }) if status == "success" => {
            UploadLink::Public(direct_link(&data.url))
        }
        Ok(_) => UploadLink::NotGenerated,
        Err(e) => {
            warn!("unexpected upload reply: {e}");
            UploadLink::Unavailable
        }
    }
}

/// The host's share page becomes a direct download link.
pub fn direct_link(url: &str) -> String {
    url.replacen("tmpfiles.org/", "tmpfiles.org/dl/", 1)
}

/// Multipart POST to a tmpfiles-style endpoint.
pub struct TmpFilesUploader {
    client: Client,
    endpoint: String,
}

impl TmpFilesUploader {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("build upload client: {e}")))?;
        Ok(Self { client, endpoint: endpoint.to_string() })
    }

    fn post(&self, bytes: &[u8], file_name: &str) -> Result<String> {
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = multipart::Form::new().part("file", part);
        let body = self.client.post(&self.endpoint).multipart(form).send()?.text()?;
        Ok(body)
    }
}

impl Uploader for TmpFilesUploader {
    fn upload(&self, bytes: &[u8], file_name: &str) -> UploadLink {
        match self.post(bytes, file_name) {
            Ok(body) => {
                let link = parse_upload_response(&body);
                info!("uploaded {file_name}: {link}");
                link
            }
            Err(e) => {
                warn!("upload of {file_name} failed: {e}");
                UploadLink::Unavailable
            }
        }
    }
}

/// Offline kiosks never publish.
pub struct NoUpload;

impl Uploader for NoUpload {
    fn upload(&self, _bytes: &[u8], file_name: &str) -> UploadLink {
        info!("upload disabled; {file_name} kept locally only");
        UploadLink::Unavailable
    }
}
