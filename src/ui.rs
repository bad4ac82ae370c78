//! Kiosk screen: one window, one phase screen at a time.
//!
//! Mouse input over the signature box is routed to the [`SignatureSurface`] as pointer events;
//! everything else is keyboard driven. Rendering is pure software into a [`FrameBuffer`], so
//! the whole screen can be exercised without a window.

use crate::camera::{CaptureFailure, CaptureTarget, CapturedImage, FrameSource, still_from_frame};
use crate::draw::{
    Drawer, blit_scaled, draw_text_5x7, fill_rect, key_char, stroke_rect, text_width,
};
use crate::error::{Error, Result};
use crate::form::{Field, TermsGate};
use crate::fx::ParticleField;
use crate::gamma::GammaLut;
use crate::input::InputEvent;
use crate::notify::Notifier;
use crate::raster::StrokeStyle;
use crate::session::{Kiosk, Phase};
use crate::surface::SignatureSurface;
use crate::types::{FrameBuffer, Point, Size};
use crate::upload::Uploader;
use log::{debug, info};
use minifb::Key;
use std::time::{Duration, Instant};

const BG: u32 = 0x0009_090B;
const PANEL: u32 = 0x0018_181B;
const BORDER: u32 = 0x003F_3F46;
const TEXT: u32 = 0x00E4_E4E7;
const DIM: u32 = 0x0071_717A;
const ACCENT: u32 = 0x00FA_CC15;
const ALERT: u32 = 0x00F8_7171;
const OVERLAY: u32 = 0x0003_0305;

const TEXT_SCALE: i32 = 2;
const LINE_H: i32 = 20;
const PAD: i32 = 12;

const TERMS: [&str; 30] = [
    "TERMS AND CONDITIONS OF ENTRY",
    "",
    "1. ADMISSION",
    "THE CLUB RESERVES THE RIGHT OF ADMISSION",
    "ACCORDING TO ITS SECURITY PROTOCOLS.",
    "",
    "2. IDENTITY",
    "YOU DECLARE THAT THE DATA AND DOCUMENTS YOU",
    "PROVIDE ARE TRUE AND YOUR OWN.",
    "",
    "3. BIOMETRICS",
    "YOU AUTHORISE THE CAPTURE OF YOUR IMAGE AND",
    "OF YOUR IDENTITY DOCUMENT FOR ACCESS CONTROL.",
    "",
    "4. CONDUCT",
    "YOU ARE RESPONSIBLE FOR YOUR CONDUCT AND FOR",
    "MODERATE CONSUMPTION INSIDE THE PREMISES.",
    "",
    "5. RECORDS",
    "A SIGNED CONTRACT IS GENERATED FOR EVERY ENTRY",
    "AND SENT TO CLUB STAFF.",
    "",
    "6. EXIT",
    "YOU AGREE TO REPORT YOUR OFFICIAL EXIT SO THAT",
    "THIS RECORD CAN BE CLOSED.",
    "",
    "7. SIGNATURE",
    "YOUR HANDWRITTEN SIGNATURE ON THIS SCREEN HAS",
    "THE SAME VALUE AS ONE ON PAPER.",
    "- END OF TERMS -",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x as f32 && p.y >= self.y as f32 && p.x < (self.x + self.w) as f32 && p.y < (self.y + self.h) as f32
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x as f32, self.y as f32)
    }
}

/// Screen regions for a window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub terms_box: Rect,
    pub signature_box: Rect,
}

impl Layout {
    pub fn for_window(width: usize, height: usize) -> Self {
        let (w, h) = (width as i32, height as i32);
        let inner_w = (w - 80).max(1);
        let sig_h = (h / 4).clamp(60, 160);
        Self {
            width,
            height,
            terms_box: Rect { x: 40, y: 70, w: inner_w, h: (h - 150).max(LINE_H + PAD * 2) },
            signature_box: Rect { x: 40, y: (h - sig_h - 70).max(0), w: inner_w, h: sig_h },
        }
    }
}

/// Scroll gate for the terms text as laid out in a window of this size.
pub fn terms_gate_for(width: usize, height: usize) -> TermsGate {
    let layout = Layout::for_window(width, height);
    let content = (TERMS.len() as i32 * LINE_H) as f32;
    TermsGate::new(content, terms_viewport(&layout))
}

fn terms_viewport(layout: &Layout) -> f32 {
    (layout.terms_box.h - PAD * 2) as f32
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Notice {
    Info(String),
    Alert(String),
}

struct CameraView {
    target: CaptureTarget,
    source: Box<dyn FrameSource>,
    last: Option<FrameBuffer>,
    frozen: Option<(FrameBuffer, CapturedImage)>,
}

/// Blocking work queued behind one "processing" frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Submit,
    Finish,
}

/// Opens a frame source for a capture purpose.
pub type CameraOpener = Box<dyn FnMut(CaptureTarget) -> Result<Box<dyn FrameSource>>>;

pub struct KioskUi<U: Uploader, N: Notifier> {
    kiosk: Kiosk<U, N>,
    surface: SignatureSurface,
    dpr: f32,
    layout: Layout,
    field: Field,
    camera: Option<CameraView>,
    open_camera: CameraOpener,
    notice: Option<Notice>,
    confirm_finish: bool,
    pending: Option<Pending>,
    mouse_down: bool,
    last_pointer: Option<Point>,
    particles: ParticleField,
    lut: GammaLut,
}

impl<U: Uploader, N: Notifier> KioskUi<U, N> {
    pub fn new(
        kiosk: Kiosk<U, N>,
        style: StrokeStyle,
        dpr: f32,
        (width, height): (usize, usize),
        open_camera: CameraOpener,
    ) -> Self {
        let flag = kiosk.signed_flag();
        let surface = SignatureSurface::new(style, move || flag.set(true));
        let mut ui = Self {
            kiosk,
            surface,
            dpr,
            layout: Layout::for_window(width, height),
            field: Field::FullName,
            camera: None,
            open_camera,
            notice: None,
            confirm_finish: false,
            pending: None,
            mouse_down: false,
            last_pointer: None,
            particles: ParticleField::new(80, width, height, 0x5EED_1234),
            lut: GammaLut::new(),
        };
        ui.configure_surface();
        ui
    }

    fn configure_surface(&mut self) {
        let b = self.layout.signature_box;
        let event = InputEvent::Resize { size: Size::new(b.w as f32, b.h as f32), dpr: self.dpr };
        self.surface.handle_event(event, b.origin());
    }

    /// Window size changed: new layout, fresh signature buffer, terms gate re-measured.
    pub fn resize(&mut self, width: usize, height: usize) {
        let layout = Layout::for_window(width, height);
        if layout == self.layout {
            return;
        }
        self.layout = layout;
        self.particles.resize(width, height);
        self.configure_surface();
        if self.kiosk.phase() == Phase::Terms {
            self.kiosk.terms_mut().resize_viewport(terms_viewport(&layout));
        }
    }

    pub fn kiosk(&self) -> &Kiosk<U, N> {
        &self.kiosk
    }

    pub fn surface(&self) -> &SignatureSurface {
        &self.surface
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn camera_open(&self) -> bool {
        self.camera.is_some()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| match n {
            Notice::Info(s) | Notice::Alert(s) => s.as_str(),
        })
    }

    /// Text shown over the whole screen while a submit or exit report is running.
    pub fn processing_message(&self) -> Option<&'static str> {
        self.pending.map(|p| match p {
            Pending::Submit => "FORMALISING CONTRACT...",
            Pending::Finish => "GENERATING EXIT REPORT...",
        })
    }

    /// Mouse state for this frame, in window coordinates.
    /// Polling repeats the last position while the mouse is still; only real moves are sent.
    pub fn pointer(&mut self, pos: Option<(f32, f32)>, down: bool) {
        let was_down = std::mem::replace(&mut self.mouse_down, down);
        if self.kiosk.phase() != Phase::Form || self.camera.is_some() || self.pending.is_some() {
            if was_down && !down {
                self.last_pointer = None;
                self.surface.handle_event(InputEvent::PointerUp, self.layout.signature_box.origin());
            }
            return;
        }
        let origin = self.layout.signature_box.origin();
        let at = pos.map(|(x, y)| Point::new(x, y));
        let event = match (was_down, down, at) {
            (false, true, Some(p)) if self.layout.signature_box.contains(p) => {
                self.last_pointer = Some(p);
                InputEvent::PointerDown(p)
            }
            (true, true, Some(p)) if self.last_pointer != Some(p) => {
                self.last_pointer = Some(p);
                InputEvent::PointerMove(p)
            }
            (true, false, _) => {
                self.last_pointer = None;
                InputEvent::PointerUp
            }
            _ => return,
        };
        self.surface.handle_event(event, origin);
    }

    /// Wheel movement; positive is up.
    pub fn scroll(&mut self, dy: f32) {
        if self.kiosk.phase() == Phase::Terms && self.camera.is_none() {
            self.kiosk.terms_mut().scroll_by(-dy * LINE_H as f32);
        }
    }

    pub fn handle_key(&mut self, key: Key) {
        if self.pending.is_some() {
            return;
        }
        if self.camera.is_some() {
            self.camera_key(key);
            return;
        }
        match self.kiosk.phase() {
            Phase::Terms => self.terms_key(key),
            Phase::Form => self.form_key(key),
            Phase::Active => self.active_key(key),
            Phase::Finished => {
                if key == Key::Enter {
                    self.reset();
                }
            }
        }
    }

    fn reset(&mut self) {
        self.kiosk.reset_all(&mut self.surface);
        self.field = Field::FullName;
        self.confirm_finish = false;
        self.notice = None;
    }

    fn terms_key(&mut self, key: Key) {
        let page = terms_viewport(&self.layout);
        let terms = self.kiosk.terms_mut();
        match key {
            Key::Down => terms.scroll_by(LINE_H as f32),
            Key::Up => terms.scroll_by(-LINE_H as f32),
            Key::PageDown | Key::Space => terms.scroll_by(page),
            Key::PageUp => terms.scroll_by(-page),
            Key::End => terms.scroll_by(f32::MAX),
            Key::Home => terms.scroll_by(f32::MIN),
            Key::Enter => {
                if self.kiosk.accept_terms() {
                    info!("terms accepted");
                    self.notice = None;
                } else {
                    self.notice = Some(Notice::Alert("READ THE TERMS TO THE END FIRST".into()));
                }
            }
            _ => {}
        }
    }

    fn form_key(&mut self, key: Key) {
        match key {
            Key::Tab => self.field = self.field.next(),
            Key::F2 => {
                let reg = self.kiosk.registration_mut();
                reg.document_type = reg.document_type.next();
            }
            Key::F5 => self.start_camera(CaptureTarget::Selfie),
            Key::F6 => self.start_camera(CaptureTarget::DocumentFront),
            Key::F7 => self.start_camera(CaptureTarget::DocumentBack),
            Key::Backspace => self.kiosk.registration_mut().backspace(self.field),
            Key::Delete => {
                self.kiosk.clear_signature(&mut self.surface);
                self.notice = None;
            }
            Key::Enter => self.queue_submit(),
            Key::Escape => {
                self.reset();
                self.notice = Some(Notice::Info("REGISTRATION CANCELLED".into()));
            }
            other => {
                if let Some(ch) = key_char(other) {
                    self.kiosk.registration_mut().type_char(self.field, ch);
                }
            }
        }
    }

    /// Refuse straight away on invalid input; otherwise show the processing frame first.
    fn queue_submit(&mut self) {
        let signature = self.surface.export();
        match self.kiosk.registration().validate(signature.as_ref(), self.kiosk.is_signed()) {
            Ok(()) => {
                self.notice = None;
                self.pending = Some(Pending::Submit);
            }
            Err(e) => self.notice = Some(Notice::Alert(e.to_string().to_uppercase())),
        }
    }

    /// Run the queued blocking action, if any. Call after the processing frame is presented.
    pub fn run_pending(&mut self) {
        match self.pending.take() {
            Some(Pending::Submit) => self.submit(),
            Some(Pending::Finish) => self.finish(),
            None => {}
        }
    }

    fn submit(&mut self) {
        self.notice = Some(match self.kiosk.submit(&self.surface) {
            Ok(Some(published)) => Notice::Info(format!("CONTRACT SIGNED. LINK: {}", published.link)),
            Ok(None) => Notice::Alert("SESSION OPEN, BUT THE CONTRACT COULD NOT BE GENERATED".into()),
            Err(e) => Notice::Alert(e.to_string().to_uppercase()),
        });
    }

    fn active_key(&mut self, key: Key) {
        match key {
            Key::F10 => self.confirm_finish = true,
            Key::Y if self.confirm_finish => {
                self.confirm_finish = false;
                self.notice = None;
                self.pending = Some(Pending::Finish);
            }
            Key::N | Key::Escape => self.confirm_finish = false,
            _ => {}
        }
    }

    fn finish(&mut self) {
        self.notice = Some(match self.kiosk.finish() {
            Some(published) => Notice::Info(format!("EXIT REPORTED. LINK: {}", published.link)),
            None => Notice::Alert("EXIT RECORDED, BUT THE REPORT COULD NOT BE GENERATED".into()),
        });
    }

    fn start_camera(&mut self, target: CaptureTarget) {
        match (self.open_camera)(target) {
            Ok(source) => {
                info!("camera open for {target:?}");
                self.notice = None;
                self.camera = Some(CameraView { target, source, last: None, frozen: None });
            }
            Err(e) => self.camera_failed(&e),
        }
    }

    fn camera_failed(&mut self, err: &Error) {
        self.notice = Some(Notice::Alert(CaptureFailure::classify(err).user_message()));
        self.camera = None;
    }

    fn camera_key(&mut self, key: Key) {
        let Some(view) = self.camera.as_mut() else {
            return;
        };
        match key {
            Key::Space if view.frozen.is_none() => {
                let Some(mut frame) = view.last.clone() else {
                    return;
                };
                if view.target.mirrored() {
                    frame.mirror_horizontal();
                }
                match still_from_frame(&frame, view.target) {
                    Ok(still) => view.frozen = Some((frame, still)),
                    Err(e) => self.notice = Some(Notice::Alert(format!("CAPTURE FAILED: {e}"))),
                }
            }
            Key::Enter => {
                if let Some((_, still)) = view.frozen.take() {
                    let target = view.target;
                    self.kiosk.registration_mut().set_photo(target, still);
                    self.camera = None;
                    self.notice = Some(Notice::Info(format!("PHOTO SAVED: {}", target.title())));
                }
            }
            Key::R => view.frozen = None,
            Key::Escape => self.camera = None,
            _ => {}
        }
    }

    /// Pull a fresh preview frame while the camera is live.
    pub fn tick(&mut self) {
        let Some(view) = self.camera.as_mut() else {
            return;
        };
        if view.frozen.is_some() {
            return;
        }
        match view.source.next_frame() {
            Ok(frame) if frame.width > 0 && frame.height > 0 => view.last = Some(frame),
            Ok(_) => {}
            Err(e) => self.camera_failed(&e),
        }
    }

    /// Draw the whole screen into `fb`, which must match the current window size.
    pub fn render(&mut self, fb: &mut FrameBuffer) {
        fb.pixels.fill(BG);
        self.particles.update_and_render(fb);
        draw_text_5x7(fb, 40, 24, "GUEST REGISTRATION", TEXT, 3);

        match self.kiosk.phase() {
            Phase::Terms => self.render_terms(fb),
            Phase::Form => self.render_form(fb),
            Phase::Active => self.render_active(fb),
            Phase::Finished => {
                draw_text_5x7(fb, 40, 100, "EXIT REGISTERED. THANK YOU.", TEXT, 3);
                draw_text_5x7(fb, 40, 150, "ENTER: NEW REGISTRATION", DIM, TEXT_SCALE);
            }
        }
        if self.camera.is_some() {
            self.render_camera(fb);
        }
        if let Some(notice) = &self.notice {
            let (text, color) = match notice {
                Notice::Info(s) => (s.as_str(), ACCENT),
                Notice::Alert(s) => (s.as_str(), ALERT),
            };
            draw_text_5x7(fb, 40, fb.height as i32 - 30, text, color, TEXT_SCALE);
        }
        if let Some(message) = self.processing_message() {
            let (w, h) = (fb.width as i32, fb.height as i32);
            fill_rect(fb, 0, 0, w, h, OVERLAY);
            let x = ((w - text_width(message, 3)) / 2).max(0);
            draw_text_5x7(fb, x, h / 2 - 20, message, ACCENT, 3);
            draw_text_5x7(fb, x, h / 2 + 16, "PLEASE WAIT", DIM, TEXT_SCALE);
        }
    }

    fn render_terms(&self, fb: &mut FrameBuffer) {
        let b = self.layout.terms_box;
        fill_rect(fb, b.x, b.y, b.w, b.h, PANEL);
        stroke_rect(fb, b.x, b.y, b.w, b.h, BORDER);

        let offset = self.kiosk.terms().offset() as i32;
        let (top, bottom) = (b.y + PAD, b.y + b.h - PAD);
        for (i, line) in TERMS.iter().enumerate() {
            let y = top + i as i32 * LINE_H - offset;
            if y >= top && y + 7 * TEXT_SCALE <= bottom {
                draw_text_5x7(fb, b.x + PAD, y, line, TEXT, TEXT_SCALE);
            }
        }

        let (hint, color) = if self.kiosk.terms().can_accept() {
            ("ENTER: I ACCEPT THE TERMS", ACCENT)
        } else {
            ("SCROLL TO THE END (WHEEL / ARROWS)", DIM)
        };
        draw_text_5x7(fb, b.x, b.y + b.h + 10, hint, color, TEXT_SCALE);
    }

    fn render_form(&self, fb: &mut FrameBuffer) {
        let reg = self.kiosk.registration();
        let mut y = 70;
        for field in [Field::FullName, Field::ArtisticName, Field::DocumentNumber] {
            let active = field == self.field;
            draw_text_5x7(fb, 40, y, field.label(), DIM, TEXT_SCALE);
            let box_w = (self.layout.width as i32 - 80).max(1);
            fill_rect(fb, 40, y + 18, box_w, 26, PANEL);
            stroke_rect(fb, 40, y + 18, box_w, 26, if active { ACCENT } else { BORDER });
            let mut value = reg.field(field).to_string();
            if active {
                value.push('_');
            }
            draw_text_5x7(fb, 48, y + 24, &value, TEXT, TEXT_SCALE);
            y += 56;
        }

        let doc_line = format!("DOCUMENT TYPE (F2): {}", reg.document_type.label());
        draw_text_5x7(fb, 40, y, &doc_line, TEXT, TEXT_SCALE);
        y += LINE_H + 4;

        let mut x = 40;
        for (key, target) in ["F5", "F6", "F7"].into_iter().zip(CaptureTarget::ALL) {
            let taken = reg.photo(target).is_some();
            let label = format!("{key} {}: {}", target.title(), if taken { "OK" } else { "-" });
            draw_text_5x7(fb, x, y, &label, if taken { ACCENT } else { DIM }, 1);
            x += text_width(&label, 1) + 18;
        }

        let b = self.layout.signature_box;
        fill_rect(fb, b.x, b.y, b.w, b.h, PANEL);
        stroke_rect(fb, b.x, b.y, b.w, b.h, if self.surface.is_drawing() { ACCENT } else { BORDER });
        draw_text_5x7(fb, b.x, b.y - 18, "SIGN HERE (DELETE: CLEAR)", DIM, TEXT_SCALE);
        if let Some(raster) = self.surface.raster() {
            raster.composite_onto(fb, b.x, b.y, self.surface.dpr(), &self.lut);
        }
        draw_text_5x7(fb, b.x, b.y + b.h + 10, "TAB: NEXT FIELD  ENTER: SUBMIT  ESC: CANCEL", DIM, 1);
    }

    fn render_active(&self, fb: &mut FrameBuffer) {
        let reg = self.kiosk.registration();
        draw_text_5x7(fb, 40, 90, "SESSION ACTIVE", ACCENT, 3);
        let rows = [
            format!("GUEST: {}", reg.full_name),
            format!("ALIAS: {}", reg.artistic_name_or("-")),
            format!("{}: {}", reg.document_type.label(), reg.document_number),
        ];
        for (i, row) in rows.iter().enumerate() {
            draw_text_5x7(fb, 40, 140 + i as i32 * LINE_H * 2, row, TEXT, TEXT_SCALE);
        }
        if self.confirm_finish {
            draw_text_5x7(fb, 40, 300, "CONFIRM EXIT?  Y: YES   N: NO", ACCENT, TEXT_SCALE);
        } else {
            draw_text_5x7(fb, 40, 300, "F10: REPORT EXIT", DIM, TEXT_SCALE);
        }
    }

    fn render_camera(&self, fb: &mut FrameBuffer) {
        let Some(view) = &self.camera else {
            return;
        };
        let (w, h) = (fb.width as i32, fb.height as i32);
        fill_rect(fb, 0, 0, w, h, BG);
        draw_text_5x7(fb, 40, 24, view.target.title(), TEXT, 3);

        let shown = match (&view.frozen, &view.last) {
            (Some((frame, _)), _) => Some(frame.clone()),
            (None, Some(frame)) => {
                let mut frame = frame.clone();
                if view.target.mirrored() {
                    frame.mirror_horizontal();
                }
                Some(frame)
            }
            (None, None) => None,
        };
        let (area_w, area_h) = ((w - 80).max(1), (h - 140).max(1));
        match shown {
            Some(frame) if frame.width > 0 && frame.height > 0 => {
                let fit = (area_w as f32 / frame.width as f32).min(area_h as f32 / frame.height as f32);
                let (dw, dh) = ((frame.width as f32 * fit) as i32, (frame.height as f32 * fit) as i32);
                let (dx, dy) = (40 + (area_w - dw) / 2, 70 + (area_h - dh) / 2);
                blit_scaled(fb, &frame, dx, dy, dw, dh);
                stroke_rect(fb, dx, dy, dw, dh, if view.frozen.is_some() { ACCENT } else { BORDER });
            }
            _ => draw_text_5x7(fb, 40, 100, "STARTING CAMERA...", DIM, TEXT_SCALE),
        }

        let hint = if view.frozen.is_some() {
            "ENTER: USE PHOTO   R: RETAKE   ESC: CANCEL"
        } else {
            "SPACE: CAPTURE   ESC: CANCEL"
        };
        draw_text_5x7(fb, 40, h - 60, hint, TEXT, TEXT_SCALE);
    }
}

/// Main loop: poll input, advance, draw, present. Returns when the window is closed.
pub fn run<U: Uploader, N: Notifier>(drawer: &mut Drawer, ui: &mut KioskUi<U, N>) -> Result<()> {
    let (mut w, mut h) = drawer.size();
    let mut screen = FrameBuffer::filled(w, h, BG);

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;

    while drawer.is_open() {
        let (nw, nh) = drawer.size();
        if (nw, nh) != (w, h) && nw > 0 && nh > 0 {
            (w, h) = (nw, nh);
            screen = FrameBuffer::filled(w, h, BG);
            ui.resize(w, h);
        }

        ui.pointer(drawer.mouse_pos(), drawer.left_mouse_down());
        if let Some(dy) = drawer.scroll() {
            ui.scroll(dy);
        }
        for key in drawer.keys_pressed() {
            ui.handle_key(key);
        }
        ui.tick();
        ui.render(&mut screen);
        drawer.present(&screen)?;
        ui.run_pending();

        frames_this_second += 1;
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            debug!("FPS: {:.1}", frames_this_second as f32 / secs);
            frames_this_second = 0;
            last_fps_time = now;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::tests::FakeCamera;
    use crate::notify::NoNotify;
    use crate::session::SessionSettings;
    use crate::store::{KvStore, SessionStore};
    use crate::upload::NoUpload;
    use test_log::test;

    const W: usize = 640;
    const H: usize = 400;

    fn ui_with(dir: &tempfile::TempDir, opener: CameraOpener) -> KioskUi<NoUpload, NoNotify> {
        let settings = SessionSettings {
            club_name: "TEST CLUB".into(),
            recipient_email: String::new(),
            output_dir: dir.path().join("out"),
            folio_seed: 9,
        };
        let store = SessionStore::new(KvStore::new(dir.path().join("store.json")));
        let kiosk = Kiosk::new(settings, store, terms_gate_for(W, H), NoUpload, NoNotify);
        KioskUi::new(kiosk, StrokeStyle::default(), 1.0, (W, H), opener)
    }

    fn fake_opener() -> CameraOpener {
        Box::new(|_| Ok(Box::new(FakeCamera { width: 16, height: 12 }) as Box<dyn FrameSource>))
    }

    fn type_text(ui: &mut KioskUi<NoUpload, NoNotify>, keys: &[Key]) {
        for &k in keys {
            ui.handle_key(k);
        }
    }

    fn to_form(ui: &mut KioskUi<NoUpload, NoNotify>) {
        ui.handle_key(Key::End);
        ui.handle_key(Key::Enter);
        assert_eq!(ui.kiosk().phase(), Phase::Form);
    }

    fn draw_signature(ui: &mut KioskUi<NoUpload, NoNotify>) {
        let b = ui.layout().signature_box;
        let (x, y) = (b.x as f32 + 20.0, b.y as f32 + 20.0);
        ui.pointer(Some((x, y)), true);
        ui.pointer(Some((x + 80.0, y + 30.0)), true);
        ui.pointer(Some((x + 80.0, y + 30.0)), false);
    }

    #[test]
    fn terms_must_be_scrolled_before_accepting() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        ui.handle_key(Key::Enter);
        assert_eq!(ui.kiosk().phase(), Phase::Terms);
        assert_eq!(ui.notice(), Some("READ THE TERMS TO THE END FIRST"));
        to_form(&mut ui);
        assert_eq!(ui.notice(), None);
    }

    #[test]
    fn mouse_signs_inside_the_box_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        to_form(&mut ui);

        // Press outside the box, drag across it: nothing drawn.
        ui.pointer(Some((5.0, 5.0)), true);
        let b = ui.layout().signature_box;
        ui.pointer(Some((b.x as f32 + 50.0, b.y as f32 + 30.0)), true);
        ui.pointer(None, false);
        assert!(ui.surface().export().is_none());
        assert!(!ui.kiosk().is_signed());

        draw_signature(&mut ui);
        assert!(ui.kiosk().is_signed());
        assert!(ui.surface().has_content());

        let mut fb = FrameBuffer::filled(W, H, 0);
        ui.render(&mut fb);
        let inked = (b.y + 20..b.y + 50)
            .flat_map(|y| (b.x + 20..b.x + 100).map(move |x| (x, y)))
            .any(|(x, y)| fb.pixels[y as usize * W + x as usize] != PANEL);
        assert!(inked);

        ui.handle_key(Key::Delete);
        assert!(!ui.kiosk().is_signed());
        assert!(ui.surface().export().is_none());
    }

    #[test]
    fn camera_capture_flow() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        to_form(&mut ui);

        ui.handle_key(Key::F5);
        assert!(ui.camera_open());
        ui.handle_key(Key::Space); // no frame yet: ignored
        ui.tick();
        ui.handle_key(Key::Space);
        ui.handle_key(Key::R);
        ui.tick();
        ui.handle_key(Key::Space);
        ui.handle_key(Key::Enter);
        assert!(!ui.camera_open());
        let selfie = ui.kiosk().registration().selfie.as_ref().unwrap();
        assert_eq!((selfie.width, selfie.height), (16, 12));
        assert_eq!(ui.notice(), Some("PHOTO SAVED: TAKE A SELFIE"));

        ui.handle_key(Key::F6);
        ui.handle_key(Key::Escape);
        assert!(!ui.camera_open());
        assert!(ui.kiosk().registration().document_front.is_none());
    }

    #[test]
    fn camera_errors_are_shown_inline() {
        let dir = tempfile::tempdir().unwrap();
        let opener: CameraOpener = Box::new(|_| Err(Error::CameraInit("Permission denied by user".into())));
        let mut ui = ui_with(&dir, opener);
        to_form(&mut ui);
        ui.handle_key(Key::F5);
        assert!(!ui.camera_open());
        assert_eq!(ui.notice(), Some("CAMERA PERMISSION DENIED. ENABLE IT IN SYSTEM SETTINGS."));
        assert_eq!(ui.kiosk().phase(), Phase::Form);
    }

    #[test]
    fn keyboard_registration_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        to_form(&mut ui);

        type_text(&mut ui, &[Key::A, Key::N, Key::A, Key::Space, Key::R, Key::U, Key::I, Key::Z]);
        ui.handle_key(Key::Tab);
        ui.handle_key(Key::Tab);
        type_text(&mut ui, &[Key::X, Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Backspace]);
        ui.handle_key(Key::F2);

        ui.handle_key(Key::Enter);
        assert_eq!(ui.notice(), Some("A SELFIE IS REQUIRED"));

        ui.handle_key(Key::F5);
        ui.tick();
        ui.handle_key(Key::Space);
        ui.handle_key(Key::Enter);
        ui.handle_key(Key::Enter);
        assert_eq!(ui.notice(), Some("NO SIGNATURE PROVIDED"));

        draw_signature(&mut ui);
        ui.handle_key(Key::Enter);
        assert_eq!(ui.processing_message(), Some("FORMALISING CONTRACT..."));
        ui.run_pending();
        assert_eq!(ui.kiosk().phase(), Phase::Active);
        assert_eq!(ui.notice(), Some("CONTRACT SIGNED. LINK: Link unavailable (server busy)"));
        let reg = ui.kiosk().registration();
        assert_eq!(reg.full_name, "ANA RUIZ");
        assert_eq!(reg.document_number, "X123");
        assert!(dir.path().join("out").join("CONTRACT_X123.pdf").exists());

        ui.handle_key(Key::Y); // not confirmed yet
        assert_eq!(ui.kiosk().phase(), Phase::Active);
        ui.handle_key(Key::F10);
        ui.handle_key(Key::Y);
        assert_eq!(ui.kiosk().phase(), Phase::Active);
        ui.run_pending();
        assert_eq!(ui.kiosk().phase(), Phase::Finished);
        assert!(dir.path().join("out").join("EXIT_X123.pdf").exists());

        ui.handle_key(Key::Enter);
        assert_eq!(ui.kiosk().phase(), Phase::Terms);
        assert_eq!(ui.kiosk().registration().full_name, "");
    }

    #[test]
    fn resize_rebuilds_the_signature_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        to_form(&mut ui);
        draw_signature(&mut ui);
        ui.resize(800, 600);
        let b = ui.layout().signature_box;
        assert_eq!(ui.surface().size(), Some(Size::new(b.w as f32, b.h as f32)));
        assert_eq!(ui.surface().raster().map(|r| (r.width(), r.height())), Some((b.w as u32, b.h as u32)));
        assert!(ui.surface().export().is_none());

        let mut fb = FrameBuffer::filled(800, 600, 0);
        ui.render(&mut fb);
    }

    fn fill_form_with_selfie(ui: &mut KioskUi<NoUpload, NoNotify>) {
        type_text(ui, &[Key::A, Key::N, Key::A]);
        ui.handle_key(Key::Tab);
        ui.handle_key(Key::Tab);
        type_text(ui, &[Key::X, Key::Key9]);
        ui.handle_key(Key::F5);
        ui.tick();
        ui.handle_key(Key::Space);
        ui.handle_key(Key::Enter);
    }

    #[test]
    fn click_held_still_is_not_a_signature() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        to_form(&mut ui);
        fill_form_with_selfie(&mut ui);

        let b = ui.layout().signature_box;
        let at = (b.x as f32 + 30.0, b.y as f32 + 20.0);
        ui.pointer(Some(at), true);
        ui.pointer(Some(at), true);
        ui.pointer(Some(at), true);
        ui.pointer(Some(at), false);
        assert!(!ui.surface().has_content());
        assert!(ui.surface().export().is_none());

        ui.handle_key(Key::Enter);
        assert_eq!(ui.processing_message(), None);
        assert_eq!(ui.notice(), Some("NO SIGNATURE PROVIDED"));
        assert_eq!(ui.kiosk().phase(), Phase::Form);
    }

    #[test]
    fn submit_shows_a_processing_frame_before_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        to_form(&mut ui);
        fill_form_with_selfie(&mut ui);
        draw_signature(&mut ui);

        ui.handle_key(Key::Enter);
        assert_eq!(ui.kiosk().phase(), Phase::Form);
        assert_eq!(ui.processing_message(), Some("FORMALISING CONTRACT..."));
        let mut fb = FrameBuffer::filled(W, H, 0);
        ui.render(&mut fb);
        assert_eq!(fb.pixels[W + 1], OVERLAY);
        assert_eq!(fb.pixels[(H - 2) * W + W - 2], OVERLAY);

        // Input is held back until the queued work has run.
        ui.handle_key(Key::Escape);
        assert_eq!(ui.kiosk().registration().full_name, "ANA");

        ui.run_pending();
        assert_eq!(ui.kiosk().phase(), Phase::Active);
        assert_eq!(ui.processing_message(), None);
        ui.render(&mut fb);
        assert_ne!(fb.pixels[W + 1], OVERLAY);
    }

    #[test]
    fn taller_window_can_reveal_the_end_of_the_terms() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = ui_with(&dir, fake_opener());
        ui.handle_key(Key::Enter);
        assert_eq!(ui.kiosk().phase(), Phase::Terms);

        ui.resize(W, 1200);
        assert!(ui.kiosk().terms().can_accept());
        ui.handle_key(Key::Enter);
        assert_eq!(ui.kiosk().phase(), Phase::Form);
    }
}
