//! Registration kiosk with a freehand signature surface.
//!
//! The heart of the crate is [`surface::SignatureSurface`]: pointer and touch input become
//! glowing ink strokes in a device-pixel buffer, exported as PNG only when something was
//! actually drawn. Around it sit the kiosk pieces that consume a signature: the form, camera
//! stills, the signed contract PDF, upload, staff notification and session persistence.

pub mod camera;
pub mod config;
pub mod document;
pub mod draw;
pub mod error;
pub mod form;
pub mod fx;
pub mod gamma;
pub mod input;
pub mod notify;
pub mod raster;
pub mod session;
pub mod store;
pub mod surface;
pub mod types;
pub mod ui;
pub mod upload;

pub use error::{Error, Result};
pub use surface::{SignatureImage, SignatureSurface};
