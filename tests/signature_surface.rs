use signing_kiosk::input::InputEvent;
use signing_kiosk::raster::StrokeStyle;
use signing_kiosk::surface::SignatureSurface;
use signing_kiosk::types::{Point, Size};
use test_log::test;

fn surface(width: f32, height: f32) -> SignatureSurface {
    let mut s = SignatureSurface::new(StrokeStyle::default(), || {});
    s.configure(Size::new(width, height), 1.0);
    s
}

fn stroke(s: &mut SignatureSurface, from: (f32, f32), to: (f32, f32)) {
    s.begin(Point::new(from.0, from.1));
    s.extend(Point::new(to.0, to.1));
    s.end();
}

fn alpha_at(png: &[u8], x: u32, y: u32) -> u8 {
    let img = image::load_from_memory(png).unwrap().to_rgba8();
    img.get_pixel(x, y).0[3]
}

#[test]
fn mouse_line_exports_then_clears() {
    let mut s = surface(200.0, 60.0);
    let origin = Point::new(0.0, 0.0);
    s.handle_event(InputEvent::PointerDown(Point::new(10.0, 10.0)), origin);
    s.handle_event(InputEvent::PointerMove(Point::new(50.0, 10.0)), origin);
    s.handle_event(InputEvent::PointerUp, origin);

    let image = s.export().expect("a signature");
    assert_eq!((image.width, image.height), (200, 60));
    for x in [12, 30, 48] {
        assert_eq!(alpha_at(&image.png, x, 10), 255, "ink at x={x}");
    }
    assert_eq!(alpha_at(&image.png, 30, 40), 0);
    assert_eq!(alpha_at(&image.png, 120, 10), 0);

    s.clear();
    assert!(s.export().is_none());
}

#[test]
fn fresh_surface_has_no_signature() {
    let s = surface(100.0, 40.0);
    assert!(s.export().is_none());
    assert!(!s.scan_has_content());
}

#[test]
fn extends_outside_a_stroke_leave_the_buffer_alone() {
    let mut s = surface(100.0, 40.0);
    s.extend(Point::new(10.0, 10.0));
    s.extend(Point::new(90.0, 30.0));
    assert!(!s.scan_has_content());

    stroke(&mut s, (10.0, 10.0), (40.0, 10.0));
    let before = s.export().unwrap();
    s.extend(Point::new(90.0, 35.0));
    s.extend(Point::new(10.0, 35.0));
    assert_eq!(s.export().unwrap(), before);
}

#[test]
fn clear_after_resize_wipes_the_new_area() {
    let mut s = surface(80.0, 40.0);
    stroke(&mut s, (10.0, 10.0), (70.0, 10.0));
    s.configure(Size::new(160.0, 80.0), 1.0);
    stroke(&mut s, (100.0, 60.0), (150.0, 70.0));
    let raster = s.raster().unwrap();
    assert_eq!((raster.width(), raster.height()), (160, 80));
    assert!(s.has_content());

    s.clear();
    assert!(!s.scan_has_content());
    assert!(s.export().is_none());
}

#[test]
fn touch_cancel_keeps_what_was_painted() {
    let mut s = surface(100.0, 40.0);
    let origin = Point::new(0.0, 0.0);
    s.handle_event(InputEvent::TouchStart { id: 7, at: Point::new(10.0, 20.0) }, origin);
    s.handle_event(InputEvent::TouchMove { id: 7, at: Point::new(60.0, 20.0) }, origin);
    let painted = s.export().unwrap();

    s.handle_event(InputEvent::TouchCancel { id: 7 }, origin);
    assert!(!s.is_drawing());
    assert_eq!(s.export().unwrap(), painted);

    // Later moves of the cancelled contact do nothing.
    s.handle_event(InputEvent::TouchMove { id: 7, at: Point::new(90.0, 5.0) }, origin);
    assert_eq!(s.export().unwrap(), painted);
}

#[test]
fn consecutive_strokes_accumulate() {
    let mut s = surface(100.0, 60.0);
    stroke(&mut s, (10.0, 10.0), (90.0, 10.0));
    stroke(&mut s, (10.0, 45.0), (90.0, 45.0));
    let png = s.export().unwrap().png;
    assert_eq!(alpha_at(&png, 50, 10), 255);
    assert_eq!(alpha_at(&png, 50, 45), 255);
    assert_eq!(alpha_at(&png, 50, 28), 0);
}

#[test]
fn client_coordinates_are_offset_by_the_surface_origin() {
    let mut s = surface(100.0, 40.0);
    let origin = Point::new(300.0, 200.0);
    s.handle_event(InputEvent::PointerDown(Point::new(310.0, 220.0)), origin);
    s.handle_event(InputEvent::PointerMove(Point::new(390.0, 220.0)), origin);
    s.handle_event(InputEvent::PointerUp, origin);
    let raster = s.raster().unwrap();
    assert_eq!(raster.pixel(50, 20).unwrap()[3], 255);
    assert_eq!(raster.pixel(50, 2).unwrap()[3], 0);
}
