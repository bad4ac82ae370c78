// Opens a camera for one capture purpose and turns frames into screen pixels or PNG stills.
// Selfies are mirrored, both in the live preview and in the captured still.

use crate::error::{Error, Result};
use crate::types::FrameBuffer;
use image::{ImageEncoder, codecs::png::PngEncoder};
use log::{info, warn};

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

/// Anything that yields 0x00RRGGBB frames: the real camera, or a fake in tests.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<FrameBuffer>;
}

/// What the photo is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    Selfie,
    DocumentFront,
    DocumentBack,
}

impl CaptureTarget {
    pub const ALL: [CaptureTarget; 3] =
        [CaptureTarget::Selfie, CaptureTarget::DocumentFront, CaptureTarget::DocumentBack];

    /// Front-facing captures are shown and stored mirrored.
    pub fn mirrored(self) -> bool {
        matches!(self, CaptureTarget::Selfie)
    }

    pub fn file_name(self) -> &'static str {
        match self {
            CaptureTarget::Selfie => "selfie.png",
            CaptureTarget::DocumentFront => "document_front.png",
            CaptureTarget::DocumentBack => "document_back.png",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            CaptureTarget::Selfie => "TAKE A SELFIE",
            CaptureTarget::DocumentFront => "ID DOCUMENT (FRONT)",
            CaptureTarget::DocumentBack => "ID DOCUMENT (BACK)",
        }
    }
}

/// User-facing reason a camera could not be used. The user may retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    PermissionDenied,
    NoDevice,
    DeviceBusy,
    Other(String),
}

impl CaptureFailure {
    /// Sort a backend error into one of the cases the user can act on.
    pub fn classify(err: &Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
            CaptureFailure::PermissionDenied
        } else if lower.contains("busy") || lower.contains("in use") || lower.contains("resource temporarily") {
            CaptureFailure::DeviceBusy
        } else if lower.contains("not found")
            || lower.contains("no such")
            || lower.contains("no device")
            || lower.contains("invalid index")
        {
            CaptureFailure::NoDevice
        } else {
            CaptureFailure::Other(msg)
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            CaptureFailure::PermissionDenied => {
                "CAMERA PERMISSION DENIED. ENABLE IT IN SYSTEM SETTINGS.".to_string()
            }
            CaptureFailure::NoDevice => "NO CAMERA FOUND ON THIS DEVICE.".to_string(),
            CaptureFailure::DeviceBusy => {
                "CAMERA UNAVAILABLE. IT MAY BE IN USE BY ANOTHER APPLICATION.".to_string()
            }
            CaptureFailure::Other(detail) => format!("COULD NOT START THE CAMERA: {detail}"),
        }
    }
}

/// A captured still, ready to attach to a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub file_name: String,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Which device index serves which facing.
#[derive(Debug, Clone, Copy)]
pub struct CameraIndices {
    pub front: u32,
    pub rear: u32,
}

// A small wrapper around nokhwa::Camera so our main loop stays clean.
pub struct CameraCapture {
    cam: Camera,
}

impl CameraCapture {
    /// Open the camera facing the right way for `target`; fall back to the default device.
    pub fn open_for(target: CaptureTarget, indices: CameraIndices, width: u32, height: u32) -> Result<Self> {
        let preferred = if target.mirrored() { indices.front } else { indices.rear };
        match Self::new(preferred, width, height) {
            Ok(cam) => Ok(cam),
            Err(e) if preferred != 0 => {
                warn!("camera {preferred} failed ({e}); retrying with the default device");
                Self::new(0, width, height)
            }
            Err(e) => Err(e),
        }
    }

    /// Try to open camera `index` at a target resolution (falls back if not exact).
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,                // target FPS
        );

        // Ask for RGB frames, closest to our request.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();
        info!("camera {index} streaming at {}x{}", actual.width(), actual.height());

        Ok(Self { cam })
    }
}

impl FrameSource for CameraCapture {
    /// Grab one frame (blocks until ready) and pack it as 0x00RRGGBB.
    fn next_frame(&mut self) -> Result<FrameBuffer> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let (w, h) = rgb_img.dimensions();
        let pixels = rgb_img
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect();

        Ok(FrameBuffer { width: w as usize, height: h as usize, pixels })
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            warn!("stopping camera stream: {e}");
        }
    }
}

/// Encode a frame as PNG (RGB, lossless).
pub fn encode_frame_png(frame: &FrameBuffer) -> Result<Vec<u8>> {
    let mut rgb = Vec::with_capacity(frame.pixels.len() * 3);
    for px in &frame.pixels {
        rgb.extend_from_slice(&[(px >> 16) as u8, (px >> 8) as u8, *px as u8]);
    }
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        &rgb,
        frame.width as u32,
        frame.height as u32,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

/// Freeze the next frame as a still for `target`.
pub fn capture_still(source: &mut dyn FrameSource, target: CaptureTarget) -> Result<CapturedImage> {
    let mut frame = source.next_frame()?;
    if frame.width == 0 || frame.height == 0 {
        return Err(Error::CameraFrame("camera not ready (empty frame)".into()));
    }
    if target.mirrored() {
        frame.mirror_horizontal();
    }
    still_from_frame(&frame, target)
}

/// Wrap an already-grabbed (and already oriented) frame as a still.
pub fn still_from_frame(frame: &FrameBuffer, target: CaptureTarget) -> Result<CapturedImage> {
    Ok(CapturedImage {
        file_name: target.file_name().to_string(),
        png: encode_frame_png(frame)?,
        width: frame.width as u32,
        height: frame.height as u32,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Serves a fixed gradient frame.
    pub struct FakeCamera {
        pub width: usize,
        pub height: usize,
    }

    impl FrameSource for FakeCamera {
        fn next_frame(&mut self) -> Result<FrameBuffer> {
            let pixels = (0..self.width * self.height).map(|i| (i % self.width) as u32).collect();
            Ok(FrameBuffer { width: self.width, height: self.height, pixels })
        }
    }

    #[test]
    fn selfie_still_is_mirrored() {
        let mut cam = FakeCamera { width: 4, height: 2 };
        let still = capture_still(&mut cam, CaptureTarget::Selfie).unwrap();
        assert_eq!(still.file_name, "selfie.png");
        let img = image::load_from_memory(&still.png).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 3]);
        assert_eq!(img.get_pixel(3, 1).0, [0, 0, 0]);
    }

    #[test]
    fn document_still_is_not_mirrored() {
        let mut cam = FakeCamera { width: 4, height: 2 };
        let still = capture_still(&mut cam, CaptureTarget::DocumentBack).unwrap();
        assert_eq!(still.file_name, "document_back.png");
        let img = image::load_from_memory(&still.png).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!((still.width, still.height), (4, 2));
    }

    #[test]
    fn empty_frame_is_not_ready() {
        let mut cam = FakeCamera { width: 0, height: 0 };
        assert!(capture_still(&mut cam, CaptureTarget::Selfie).is_err());
    }

    #[test]
    fn classifies_backend_errors() {
        let denied = Error::CameraInit("Create camera: Permission denied (os error 13)".into());
        assert_eq!(CaptureFailure::classify(&denied), CaptureFailure::PermissionDenied);
        let busy = Error::CameraInit("Open stream: Device or resource busy".into());
        assert_eq!(CaptureFailure::classify(&busy), CaptureFailure::DeviceBusy);
        let missing = Error::CameraInit("Create camera: No such file or directory".into());
        assert_eq!(CaptureFailure::classify(&missing), CaptureFailure::NoDevice);
        let other = Error::CameraInit("weird".into());
        assert!(matches!(CaptureFailure::classify(&other), CaptureFailure::Other(_)));
        assert!(CaptureFailure::NoDevice.user_message().contains("NO CAMERA"));
    }
}
