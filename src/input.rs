//! Raw input as delivered by the windowing layer, before it reaches a surface.
//!
//! Pointer and touch input are folded into one contact model so the surface sees the same
//! begin/extend/end sequence for both. Coordinates arrive in client (window) space and are
//! mapped to surface-local space by subtracting the surface origin.

use crate::types::{Point, Size};

/// Which physical contact produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Pointer,
    Touch(u64),
}

/// One discrete input event in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    TouchStart { id: u64, at: Point },
    TouchMove { id: u64, at: Point },
    TouchEnd { id: u64 },
    /// System gesture took over; handled exactly like a release.
    TouchCancel { id: u64 },
    /// The surface's displayed size or pixel density changed.
    Resize { size: Size, dpr: f32 },
}

/// The contact-level meaning of an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Down(Contact, Point),
    Move(Contact, Point),
    Up(Contact),
    Resize(Size, f32),
}

impl InputEvent {
    /// Normalise to a gesture, with positions still in client space.
    pub fn gesture(self) -> Gesture {
        match self {
            InputEvent::PointerDown(p) => Gesture::Down(Contact::Pointer, p),
            InputEvent::PointerMove(p) => Gesture::Move(Contact::Pointer, p),
            InputEvent::PointerUp => Gesture::Up(Contact::Pointer),
            InputEvent::TouchStart { id, at } => Gesture::Down(Contact::Touch(id), at),
            InputEvent::TouchMove { id, at } => Gesture::Move(Contact::Touch(id), at),
            InputEvent::TouchEnd { id } | InputEvent::TouchCancel { id } => Gesture::Up(Contact::Touch(id)),
            InputEvent::Resize { size, dpr } => Gesture::Resize(size, dpr),
        }
    }
}

/// Client → surface-local. `mirror_width` flips horizontally across a surface of that width
/// (front-camera previews); the signature surface passes `None`.
pub fn to_local(client: Point, origin: Point, mirror_width: Option<f32>) -> Point {
    let local = Point::new(client.x - origin.x, client.y - origin.y);
    match mirror_width {
        Some(w) => Point::new(w - local.x, local.y),
        None => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracts_the_origin() {
        let p = to_local(Point::new(110.0, 45.0), Point::new(100.0, 40.0), None);
        assert_eq!(p, Point::new(10.0, 5.0));
    }

    #[test]
    fn mirrors_across_the_width() {
        let p = to_local(Point::new(110.0, 45.0), Point::new(100.0, 40.0), Some(64.0));
        assert_eq!(p, Point::new(54.0, 5.0));
    }

    #[test]
    fn cancel_is_a_release() {
        assert_eq!(InputEvent::TouchCancel { id: 3 }.gesture(), Gesture::Up(Contact::Touch(3)));
        assert_eq!(InputEvent::TouchEnd { id: 3 }.gesture(), Gesture::Up(Contact::Touch(3)));
    }
}
