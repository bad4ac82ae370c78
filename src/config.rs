//! Command line + optional TOML file.

use crate::error::{Error, Result};
use crate::notify::EmailJsConfig;
use crate::raster::StrokeStyle;
use crate::types::Rgba8;
use clap::Parser;
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Registration kiosk: identity, photos, signature, signed contract.")]
pub struct Args {
    /// TOML config file (missing file means defaults).
    #[arg(short, long, default_value = "kiosk.toml")]
    pub config: PathBuf,
    /// Where generated PDFs are written.
    #[arg(short, long, default_value = "contracts")]
    pub output_dir: PathBuf,
    /// Session store used to resume an open session after restart.
    #[arg(long, default_value = "kiosk-session.json")]
    pub store: PathBuf,
    /// Camera index used for selfies; documents use --rear-camera.
    #[arg(long, default_value_t = 0)]
    pub camera_index: u32,
    #[arg(long, default_value_t = 0)]
    pub rear_camera: u32,
    #[arg(long, default_value_t = 960)]
    pub width: usize,
    #[arg(long, default_value_t = 720)]
    pub height: usize,
    /// Device pixel ratio of the signature surface.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,
    /// Never upload or send notifications.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct FileConfig {
    pub club_name: Option<String>,
    pub recipient_email: Option<String>,
    pub emailjs: Option<EmailJsSection>,
    pub upload: Option<UploadSection>,
    pub signature: Option<SignatureSection>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EmailJsSection {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct UploadSection {
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SignatureSection {
    pub color: Option<String>,
    pub width: Option<f32>,
    pub glow_blur: Option<f32>,
    pub glow_color: Option<String>,
}

/// Everything the kiosk needs after defaults are applied.
#[derive(Debug, Clone)]
pub struct KioskConfig {
    pub club_name: String,
    pub recipient_email: String,
    pub emailjs: Option<EmailJsConfig>,
    pub upload_endpoint: String,
    pub upload_timeout: Duration,
    pub stroke: StrokeStyle,
}

impl Default for KioskConfig {
    fn default() -> Self {
        FileConfig::default().resolve()
    }
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn resolve(self) -> KioskConfig {
        let upload = self.upload.unwrap_or_default();
        let sig = self.signature.unwrap_or_default();
        let defaults = StrokeStyle::default();
        let colour = |value: Option<String>, fallback: Rgba8| {
            value.as_deref().map_or(Some(fallback), Rgba8::from_hex).unwrap_or_else(|| {
                warn!("bad colour in [signature]; using default");
                fallback
            })
        };
        KioskConfig {
            club_name: self.club_name.unwrap_or_else(|| "SPACE TOWN CLUB".to_string()),
            recipient_email: self.recipient_email.unwrap_or_default(),
            emailjs: self.emailjs.map(|e| EmailJsConfig {
                service_id: e.service_id,
                template_id: e.template_id,
                public_key: e.public_key,
            }),
            upload_endpoint: upload
                .endpoint
                .unwrap_or_else(|| "https://tmpfiles.org/api/v1/upload".to_string()),
            upload_timeout: Duration::from_millis(upload.timeout_ms.unwrap_or(7000)),
            stroke: StrokeStyle {
                color: colour(sig.color, defaults.color),
                width: sig.width.filter(|w| *w > 0.0).unwrap_or(defaults.width),
                glow_blur: sig.glow_blur.filter(|b| *b >= 0.0).unwrap_or(defaults.glow_blur),
                glow_color: colour(sig.glow_color, defaults.glow_color),
            },
        }
    }
}

/// Load `path`; a missing file silently means defaults, a broken one warns and means defaults.
pub fn load(path: &Path) -> KioskConfig {
    match fs::read_to_string(path) {
        Ok(text) => match FileConfig::parse(&text) {
            Ok(cfg) => cfg.resolve(),
            Err(e) => {
                warn!("could not parse '{}' ({e}); using defaults", path.display());
                KioskConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => KioskConfig::default(),
        Err(e) => {
            warn!("could not read '{}' ({e}); using defaults", path.display());
            KioskConfig::default()
        }
    }
}
