// Software ink rasteriser for the signature surface.
// A stroke segment is painted as a capsule (line with round ends) with a soft glow
// underneath, both composited source-over into a straight-alpha RGBA buffer.
use crate::error::{Error, Result};
use crate::gamma::GammaLut;
use crate::types::{FrameBuffer, Point, Rgba8};
use image::{ImageEncoder, Rgba, RgbaImage, codecs::png::PngEncoder};

/// How ink looks: colour, width (CSS px), rounded ends, glow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba8,
    pub width: f32,
    pub glow_blur: f32,
    pub glow_color: Rgba8,
}

impl Default for StrokeStyle {
    /// Platinum ink with a faint white glow.
    fn default() -> Self {
        Self {
            color: Rgba8::rgb(0xe4, 0xe4, 0xe7),
            width: 2.5,
            glow_blur: 4.0,
            glow_color: Rgba8::rgba(255, 255, 255, 51),
        }
    }
}

/// Owned ink buffer in device pixels. Fully transparent means "no ink".
pub struct InkRaster {
    image: RgbaImage,
}

impl InkRaster {
    /// Largest backing buffer, in device pixels (1 GiB of RGBA).
    pub const MAX_PIXELS: u64 = 268_435_456;

    /// None when the buffer cannot be backed (zero area or above [`MAX_PIXELS`](Self::MAX_PIXELS)).
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || width as u64 * height as u64 > Self::MAX_PIXELS {
            return None;
        }
        (width as usize).checked_mul(height as usize)?.checked_mul(4)?;
        Some(Self { image: RgbaImage::new(width, height) })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    /// Full scan: true iff any pixel has a non-zero channel.
    pub fn scan_has_content(&self) -> bool {
        self.image.as_raw().iter().any(|&b| b != 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.width() && y < self.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    /// Paint the segment a→b (device pixels). Returns true if any pixel ended non-zero.
    pub fn stroke_segment(&mut self, a: Point, b: Point, style: &StrokeStyle, scale: f32) -> bool {
        let radius = (style.width * scale * 0.5).max(0.0);
        let sigma = style.glow_blur * scale * 0.5;
        let glow_alpha = style.glow_color.a as f32 / 255.0;
        let glow_on = sigma > 0.0 && glow_alpha > 0.0;
        // 3 sigma past the ink edge is where the glow falls below one 8-bit step.
        let reach = radius + 0.5 + if glow_on { 3.0 * sigma } else { 0.0 };

        let (w, h) = (self.width() as i32, self.height() as i32);
        let x0 = ((a.x.min(b.x) - reach).floor() as i32).max(0);
        let y0 = ((a.y.min(b.y) - reach).floor() as i32).max(0);
        let x1 = ((a.x.max(b.x) + reach).ceil() as i32).min(w - 1);
        let y1 = ((a.y.max(b.y) + reach).ceil() as i32).min(h - 1);

        let ink_alpha = style.color.a as f32 / 255.0;
        let mut painted = false;
        for py in y0..=y1 {
            for px in x0..=x1 {
                let p = Point::new(px as f32 + 0.5, py as f32 + 0.5);
                let d = distance_to_segment(p, a, b);
                if d > reach {
                    continue;
                }
                let pixel = self.image.get_pixel_mut(px as u32, py as u32);

                if glow_on {
                    let beyond = (d - radius).max(0.0);
                    let g = glow_alpha * (-(beyond * beyond) / (2.0 * sigma * sigma)).exp();
                    source_over(&mut pixel.0, style.glow_color, g);
                }

                let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    source_over(&mut pixel.0, style.color, coverage * ink_alpha);
                }

                if pixel.0 != [0, 0, 0, 0] {
                    painted = true;
                }
            }
        }
        painted
    }

    /// Lossless PNG of the whole buffer.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                self.image.as_raw(),
                self.width(),
                self.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| Error::Encode(format!("signature PNG: {e}")))?;
        Ok(out)
    }

    /// Draw the ink on top of a screen buffer at (ox, oy) screen pixels.
    /// `scale` maps one screen pixel to `scale` device pixels of this buffer.
    pub fn composite_onto(&self, fb: &mut FrameBuffer, ox: i32, oy: i32, scale: f32, lut: &GammaLut) {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let vis_w = (self.width() as f32 / scale) as i32;
        let vis_h = (self.height() as f32 / scale) as i32;
        for sy in 0..vis_h {
            let y = oy + sy;
            if y < 0 || y >= fb.height as i32 {
                continue;
            }
            for sx in 0..vis_w {
                let x = ox + sx;
                if x < 0 || x >= fb.width as i32 {
                    continue;
                }
                let rx = ((sx as f32 * scale) as u32).min(self.width() - 1);
                let ry = ((sy as f32 * scale) as u32).min(self.height() - 1);
                let [r, g, b, a] = self.image.get_pixel(rx, ry).0;
                if a == 0 {
                    continue;
                }
                let idx = y as usize * fb.width + x as usize;
                let src = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
                fb.pixels[idx] = lut.mix(fb.pixels[idx], src, a as f32 / 255.0);
            }
        }
    }
}

/// Euclidean distance from p to the closed segment a–b.
fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Straight-alpha source-over of `color` at opacity `alpha` onto `dst`.
fn source_over(dst: &mut [u8; 4], color: Rgba8, alpha: f32) {
    let sa = alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let out_a8 = (out_a * 255.0).round() as u8;
    if out_a8 == 0 {
        return;
    }
    let blend = |s: u8, d: u8| {
        let c = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    *dst = [
        blend(color.r, dst[0]),
        blend(color.g, dst[1]),
        blend(color.b, dst[2]),
        out_a8,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_ink() -> StrokeStyle {
        StrokeStyle { glow_blur: 0.0, ..StrokeStyle::default() }
    }

    #[test]
    fn zero_area_cannot_be_backed() {
        assert!(InkRaster::new(0, 10).is_none());
        assert!(InkRaster::new(10, 0).is_none());
        assert!(InkRaster::new(1, 1).is_some());
    }

    #[test]
    fn oversized_area_is_refused_without_allocating() {
        assert!(InkRaster::new(20_000, 20_000).is_none());
        assert!(InkRaster::new(u32::MAX, 2).is_none());
    }

    #[test]
    fn segment_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert_eq!(distance_to_segment(Point::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(distance_to_segment(Point::new(-4.0, 3.0), a, b), 5.0);
        assert_eq!(distance_to_segment(Point::new(2.0, 0.0), a, a), 2.0);
    }

    #[test]
    fn horizontal_segment_inks_its_row_only() {
        let mut r = InkRaster::new(60, 20).unwrap();
        let painted = r.stroke_segment(Point::new(10.0, 10.0), Point::new(50.0, 10.0), &plain_ink(), 1.0);
        assert!(painted);
        assert_eq!(r.pixel(30, 9).unwrap()[3], 255);
        assert_eq!(r.pixel(30, 10).unwrap()[3], 255);
        assert_eq!(r.pixel(30, 2).unwrap(), [0, 0, 0, 0]);
        assert_eq!(r.pixel(58, 10).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn glow_reaches_past_the_ink() {
        let mut r = InkRaster::new(60, 30).unwrap();
        r.stroke_segment(Point::new(10.0, 15.0), Point::new(50.0, 15.0), &StrokeStyle::default(), 1.0);
        let halo = r.pixel(30, 18).unwrap();
        assert!(halo[3] > 0 && halo[3] < 60, "glow alpha {}", halo[3]);
    }

    #[test]
    fn segment_outside_the_buffer_paints_nothing() {
        let mut r = InkRaster::new(20, 20).unwrap();
        let painted = r.stroke_segment(Point::new(100.0, 100.0), Point::new(120.0, 100.0), &plain_ink(), 1.0);
        assert!(!painted);
        assert!(!r.scan_has_content());
    }

    #[test]
    fn clear_wipes_everything() {
        let mut r = InkRaster::new(20, 20).unwrap();
        r.stroke_segment(Point::new(2.0, 2.0), Point::new(18.0, 18.0), &plain_ink(), 1.0);
        assert!(r.scan_has_content());
        r.clear();
        assert!(!r.scan_has_content());
    }

    #[test]
    fn png_has_the_signature_header() {
        let r = InkRaster::new(4, 4).unwrap();
        let png = r.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn composite_draws_ink_over_the_screen() {
        let lut = GammaLut::new();
        let mut r = InkRaster::new(20, 20).unwrap();
        r.stroke_segment(Point::new(0.0, 10.0), Point::new(20.0, 10.0), &plain_ink(), 1.0);
        let mut fb = FrameBuffer::filled(40, 40, 0);
        r.composite_onto(&mut fb, 5, 5, 1.0, &lut);
        assert_eq!(fb.pixels[15 * 40 + 15], plain_ink().color.to_u32());
        assert_eq!(fb.pixels[0], 0);
    }
}
