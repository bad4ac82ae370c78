// Ambient background: faint white particles drifting and gently pulsing behind the kiosk UI.

use crate::types::FrameBuffer;

/// Deterministic xorshift32 RNG for lightweight randomness (particles, folio numbers).
#[derive(Clone)]
pub struct Rng32 {
    state: u32,
}

impl Rng32 {
    pub fn from_seed(seed: u32) -> Self {
        Self { state: seed | 1 }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform [0,1)
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / ((1u32 << 24) as f32)
    }

    #[inline]
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }

    /// Uniform integer in [lo, hi].
    pub fn range_u32(&mut self, lo: u32, hi: u32) -> u32 {
        lo + self.next_u32() % (hi - lo + 1)
    }
}

/// Additive blend one grey level at (x,y) with saturation to 255.
#[inline]
fn add_grey_saturating(fb: &mut FrameBuffer, x: i32, y: i32, v: u8) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    let old = fb.pixels[idx];
    let add = |shift: u32| (((old >> shift) & 0xFF) + v as u32).min(255) << shift;
    fb.pixels[idx] = add(16) | add(8) | add(0);
}

/// Soft round dot of light, brightness scaled by `strength` in [0,1].
fn draw_dot(fb: &mut FrameBuffer, cx: f32, cy: f32, radius: f32, strength: f32) {
    let r = radius.ceil() as i32 + 1;
    let (icx, icy) = (cx as i32, cy as i32);
    for y in (icy - r)..=(icy + r) {
        for x in (icx - r)..=(icx + r) {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let cover = (radius + 0.5 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
            if cover > 0.0 {
                add_grey_saturating(fb, x, y, (255.0 * strength * cover) as u8);
            }
        }
    }
}

struct Particle {
    x: f32,
    y: f32,
    vx: f32,      // px per frame
    vy: f32,
    base_radius: f32,
    phase: f32,   // pulse angle
    alpha: f32,
}

/// Background particle field sized to the window; particles bounce off the edges.
pub struct ParticleField {
    particles: Vec<Particle>,
    width: f32,
    height: f32,
}

impl ParticleField {
    pub fn new(count: usize, width: usize, height: usize, seed: u32) -> Self {
        let mut rng = Rng32::from_seed(seed);
        let (w, h) = (width as f32, height as f32);
        let particles = (0..count)
            .map(|_| Particle {
                x: rng.range(0.0, w),
                y: rng.range(0.0, h),
                vx: rng.range(-0.2, 0.2),
                vy: rng.range(-0.2, 0.2),
                base_radius: rng.range(0.5, 2.0),
                phase: rng.range(0.0, std::f32::consts::TAU),
                alpha: rng.range(0.1, 0.5),
            })
            .collect();
        Self { particles, width: w, height: h }
    }

    /// Follow a window resize; particles outside are pulled back in.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width as f32;
        self.height = height as f32;
        for p in &mut self.particles {
            p.x = p.x.min(self.width);
            p.y = p.y.min(self.height);
        }
    }

    /// Advance one frame and draw on top of `fb`.
    pub fn update_and_render(&mut self, fb: &mut FrameBuffer) {
        for p in &mut self.particles {
            p.x += p.vx;
            p.y += p.vy;
            p.phase += 0.02;
            let radius = p.base_radius + p.phase.sin() * 0.3;

            if p.x - radius < 0.0 || p.x + radius > self.width {
                p.vx = -p.vx;
            }
            if p.y - radius < 0.0 || p.y + radius > self.height {
                p.vy = -p.vy;
            }

            draw_dot(fb, p.x, p.y, radius, p.alpha);
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
