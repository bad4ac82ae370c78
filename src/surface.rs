//! Freehand signature capture.
//!
//! A [`SignatureSurface`] owns an ink buffer sized to its displayed area times the device
//! pixel ratio. Strokes are painted incrementally as points arrive; the finished drawing is
//! exported as a PNG only when at least one pixel of ink was actually laid down.
//!
//! Resize policy: a resize (or any reconfiguration) wipes the buffer and drops the current path
//! position but keeps an active stroke alive. The next `extend` re-baselines at its point
//! without painting, and later moves paint normally.

use crate::input::{Contact, Gesture, InputEvent, to_local};
use crate::raster::{InkRaster, StrokeStyle};
use crate::types::{Point, Size};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, error, warn};

/// Exported drawing: lossless PNG plus its pixel dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl SignatureImage {
    /// `data:image/png;base64,...`
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

pub struct SignatureSurface {
    style: StrokeStyle,
    raster: Option<InkRaster>,
    size: Option<Size>,
    dpr: f32,
    drawing: bool,
    contact: Option<Contact>,
    cursor: Option<Point>,
    has_content: bool,
    on_draw_start: Box<dyn FnMut()>,
}

impl SignatureSurface {
    /// Create an unconfigured surface. `on_draw_start` fires once per stroke begin.
    /// Until [`configure`](Self::configure) succeeds every operation is a no-op.
    pub fn new(style: StrokeStyle, on_draw_start: impl FnMut() + 'static) -> Self {
        Self {
            style,
            raster: None,
            size: None,
            dpr: 1.0,
            drawing: false,
            contact: None,
            cursor: None,
            has_content: false,
            on_draw_start: Box::new(on_draw_start),
        }
    }

    /// Measure + scale: back the surface with `ceil(size * dpr)` device pixels.
    /// Prior ink is discarded, as resizing a raster context does.
    pub fn configure(&mut self, size: Size, dpr: f32) {
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        let device = |css: f32| {
            let px = (css * dpr).ceil();
            if px.is_finite() && px > 0.0 && px <= u32::MAX as f32 { px as u32 } else { 0 }
        };
        let (w, h) = (device(size.width), device(size.height));

        self.raster = InkRaster::new(w, h);
        if self.raster.is_none() {
            warn!("signature surface unavailable at {}x{} css @{dpr}", size.width, size.height);
        } else {
            debug!("signature surface configured {w}x{h} device px @{dpr}");
        }
        self.size = Some(size);
        self.dpr = dpr;
        self.cursor = None;
        self.has_content = false;
    }

    /// Start a stroke at `point` (surface-local CSS px).
    pub fn begin(&mut self, point: Point) {
        if self.raster.is_none() {
            return;
        }
        self.drawing = true;
        self.cursor = Some(point);
        (self.on_draw_start)();
    }

    /// Paint from the current path position to `point`. No-op outside a stroke.
    /// A zero-length segment paints nothing, so a click held still is not ink.
    pub fn extend(&mut self, point: Point) {
        if !self.drawing {
            return;
        }
        let Some(raster) = self.raster.as_mut() else {
            return;
        };
        if let Some(prev) = self.cursor.filter(|&prev| prev != point) {
            let scale = self.dpr;
            let a = Point::new(prev.x * scale, prev.y * scale);
            let b = Point::new(point.x * scale, point.y * scale);
            if raster.stroke_segment(a, b, &self.style, scale) {
                self.has_content = true;
            }
        }
        self.cursor = Some(point);
    }

    /// Finish the current stroke; later `extend`s wait for the next `begin`.
    pub fn end(&mut self) {
        self.drawing = false;
        self.contact = None;
        self.cursor = None;
    }

    /// Wipe the whole current buffer. An in-progress stroke stays active.
    pub fn clear(&mut self) {
        if let Some(raster) = self.raster.as_mut() {
            raster.clear();
        }
        self.has_content = false;
    }

    /// PNG of the current ink, or `None` when nothing visible has been drawn.
    pub fn export(&self) -> Option<SignatureImage> {
        let raster = self.raster.as_ref()?;
        if !self.has_content {
            return None;
        }
        match raster.encode_png() {
            Ok(png) => Some(SignatureImage { png, width: raster.width(), height: raster.height() }),
            Err(e) => {
                error!("{e}");
                None
            }
        }
    }

    /// Route a client-space event, `origin` being the surface's on-screen top-left.
    /// Only the primary contact drives a stroke; other contacts are ignored until it lifts.
    pub fn handle_event(&mut self, event: InputEvent, origin: Point) {
        match event.gesture() {
            Gesture::Down(contact, at) => {
                if self.drawing && self.contact.is_some_and(|c| c != contact) {
                    return;
                }
                self.contact = Some(contact);
                self.begin(to_local(at, origin, None));
            }
            Gesture::Move(contact, at) => {
                if self.contact == Some(contact) {
                    self.extend(to_local(at, origin, None));
                }
            }
            Gesture::Up(contact) => {
                if self.contact == Some(contact) {
                    self.end();
                }
            }
            Gesture::Resize(size, dpr) => self.configure(size, dpr),
        }
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    /// Whole-buffer check; agrees with [`has_content`](Self::has_content).
    pub fn scan_has_content(&self) -> bool {
        self.raster.as_ref().is_some_and(InkRaster::scan_has_content)
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn is_available(&self) -> bool {
        self.raster.is_some()
    }

    pub fn size(&self) -> Option<Size> {
        self.size
    }

    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn raster(&self) -> Option<&InkRaster> {
        self.raster.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use test_log::test;

    fn surface() -> (SignatureSurface, Rc<Cell<u32>>) {
        let starts = Rc::new(Cell::new(0));
        let counter = starts.clone();
        let mut s = SignatureSurface::new(StrokeStyle::default(), move || counter.set(counter.get() + 1));
        s.configure(Size::new(100.0, 40.0), 1.0);
        (s, starts)
    }

    #[test]
    fn draw_start_fires_on_every_begin() {
        let (mut s, starts) = surface();
        s.begin(Point::new(1.0, 1.0));
        s.end();
        s.begin(Point::new(2.0, 2.0));
        s.end();
        assert_eq!(starts.get(), 2);
    }

    #[test]
    fn begin_without_movement_is_not_content() {
        let (mut s, starts) = surface();
        s.begin(Point::new(10.0, 10.0));
        s.end();
        assert_eq!(starts.get(), 1);
        assert!(!s.has_content());
        assert!(s.export().is_none());
    }

    #[test]
    fn extend_to_the_same_point_is_not_content() {
        let (mut s, _) = surface();
        s.begin(Point::new(10.0, 10.0));
        s.extend(Point::new(10.0, 10.0));
        s.extend(Point::new(10.0, 10.0));
        s.end();
        assert!(!s.has_content());
        assert!(!s.scan_has_content());
        assert!(s.export().is_none());
    }

    #[test]
    fn incremental_flag_matches_the_scan() {
        let (mut s, _) = surface();
        assert_eq!(s.has_content(), s.scan_has_content());
        s.begin(Point::new(10.0, 10.0));
        s.extend(Point::new(30.0, 12.0));
        assert!(s.has_content());
        assert_eq!(s.has_content(), s.scan_has_content());
        s.clear();
        assert_eq!(s.has_content(), s.scan_has_content());
    }

    #[test]
    fn dpr_scales_the_backing_buffer() {
        let mut s = SignatureSurface::new(StrokeStyle::default(), || {});
        s.configure(Size::new(100.5, 40.0), 2.0);
        let r = s.raster().unwrap();
        assert_eq!((r.width(), r.height()), (201, 80));
    }

    #[test]
    fn detached_surface_ignores_everything() {
        let starts = Rc::new(Cell::new(0));
        let counter = starts.clone();
        let mut s = SignatureSurface::new(StrokeStyle::default(), move || counter.set(counter.get() + 1));
        s.configure(Size::new(0.0, 40.0), 1.0);
        assert!(!s.is_available());
        s.begin(Point::new(1.0, 1.0));
        s.extend(Point::new(20.0, 20.0));
        s.end();
        s.clear();
        assert_eq!(starts.get(), 0);
        assert!(s.export().is_none());
    }

    #[test]
    fn huge_css_size_times_dpr_leaves_the_surface_detached() {
        let (mut s, starts) = surface();
        s.configure(Size::new(10_000.0, 10_000.0), 4.0);
        assert!(!s.is_available());
        s.begin(Point::new(1.0, 1.0));
        s.extend(Point::new(20.0, 20.0));
        assert_eq!(starts.get(), 0);
        assert!(s.export().is_none());
    }

    #[test]
    fn resize_mid_stroke_rebaselines() {
        let (mut s, _) = surface();
        s.begin(Point::new(10.0, 10.0));
        s.extend(Point::new(20.0, 10.0));
        s.configure(Size::new(120.0, 50.0), 1.0);
        assert!(s.is_drawing());
        assert!(!s.has_content());
        // First move after the resize only sets the new baseline.
        s.extend(Point::new(60.0, 25.0));
        assert!(!s.scan_has_content());
        s.extend(Point::new(90.0, 25.0));
        assert!(s.has_content());
    }

    #[test]
    fn data_url_prefix() {
        let (mut s, _) = surface();
        s.begin(Point::new(10.0, 10.0));
        s.extend(Point::new(50.0, 10.0));
        let url = s.export().unwrap().to_data_url();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn second_touch_does_not_steal_the_stroke() {
        let (mut s, starts) = surface();
        let origin = Point::new(0.0, 0.0);
        s.handle_event(InputEvent::TouchStart { id: 1, at: Point::new(10.0, 10.0) }, origin);
        s.handle_event(InputEvent::TouchStart { id: 2, at: Point::new(80.0, 30.0) }, origin);
        s.handle_event(InputEvent::TouchMove { id: 2, at: Point::new(90.0, 30.0) }, origin);
        s.handle_event(InputEvent::TouchEnd { id: 2 }, origin);
        assert_eq!(starts.get(), 1);
        assert!(s.is_drawing());
        assert!(!s.has_content());
        s.handle_event(InputEvent::TouchMove { id: 1, at: Point::new(40.0, 10.0) }, origin);
        assert!(s.has_content());
        let r = s.raster().unwrap();
        assert_eq!(r.pixel(85, 30).unwrap(), [0, 0, 0, 0]);
    }
}
