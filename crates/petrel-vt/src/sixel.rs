//! Streaming DECSIXEL decoder (VT340 semantics).
//!
//! Each data byte in `0x3F..=0x7E` encodes six vertically stacked pixels.
//! `$` returns to column 0 within the current six-row band, `-` opens the
//! next band. `"` introduces raster attributes, `!` a repeat count, `#` a
//! palette select/define. The raster grows on demand up to the configured
//! maxima; the background mode decides whether unset pixels are
//! transparent or filled with the terminal background.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SixelState {
    /// Normal data bytes, `$`, `-`, and sub-state introducers.
    Decsixel,
    /// `"` Pan;Pad;Ph;Pv: raster attributes.
    Decgra,
    /// `!` Pn: repeat introducer.
    Decgri,
    /// `#` Pc[;Pu;Px;Py;Pz]: color introducer.
    Decgci,
}

/// Streaming sixel decoder; pixels are premultiplied-style 0xAARRGGBB.
#[derive(Debug)]
pub struct SixelDecoder {
    state: SixelState,

    /// Current pixel column and top row of the current band.
    x: usize,
    y: usize,

    color: u32,
    palette: Vec<u32>,

    data: Vec<u32>,
    width: usize,
    height: usize,

    /// Extent actually written (image dimensions at finish).
    max_col: usize,
    max_row: usize,
    /// Minimum dimensions requested by raster attributes.
    raster_w: usize,
    raster_h: usize,

    params: [u32; 5],
    param_idx: usize,
    repeat: u32,

    fill: u32,
    max_width: usize,
    max_height: usize,
}

/// VT340 default palette, percent triplets scaled to 8-bit.
const DEFAULT_PALETTE: [(u32, u32, u32); 16] = [
    (0, 0, 0),
    (20, 20, 80),
    (80, 13, 13),
    (20, 80, 20),
    (80, 20, 80),
    (20, 80, 80),
    (80, 80, 20),
    (53, 53, 53),
    (26, 26, 26),
    (33, 33, 60),
    (60, 26, 26),
    (33, 60, 33),
    (60, 33, 60),
    (33, 60, 60),
    (60, 60, 33),
    (80, 80, 80),
];

fn pct_rgb(r: u32, g: u32, b: u32) -> u32 {
    0xff00_0000 | ((r * 255 / 100) << 16) | ((g * 255 / 100) << 8) | (b * 255 / 100)
}

impl SixelDecoder {
    #[must_use]
    pub fn new(
        transparent: bool,
        bg: u32,
        max_width: usize,
        max_height: usize,
        palette_size: usize,
    ) -> Self {
        let palette_size = palette_size.clamp(2, 65536);
        let mut palette = vec![0xff00_0000; palette_size];
        for (i, &(r, g, b)) in DEFAULT_PALETTE.iter().enumerate() {
            if i < palette.len() {
                palette[i] = pct_rgb(r, g, b);
            }
        }
        let fill = if transparent {
            0
        } else {
            0xff00_0000 | (bg & 0x00ff_ffff)
        };
        Self {
            state: SixelState::Decsixel,
            x: 0,
            y: 0,
            color: palette[0],
            palette,
            data: Vec::new(),
            width: 0,
            height: 0,
            max_col: 0,
            max_row: 0,
            raster_w: 0,
            raster_h: 0,
            params: [0; 5],
            param_idx: 0,
            repeat: 1,
            fill,
            max_width: max_width.max(1),
            max_height: max_height.max(1),
        }
    }

    /// Consume one passthrough byte.
    pub fn put(&mut self, byte: u8) {
        match self.state {
            SixelState::Decsixel => self.data_byte(byte),
            SixelState::Decgra => {
                if !self.collect_param(byte) {
                    self.apply_raster_attributes();
                    self.state = SixelState::Decsixel;
                    self.data_byte(byte);
                }
            }
            SixelState::Decgri => {
                if !self.collect_param(byte) {
                    self.repeat = self.params[0].max(1);
                    self.state = SixelState::Decsixel;
                    self.data_byte(byte);
                }
            }
            SixelState::Decgci => {
                if !self.collect_param(byte) {
                    self.apply_color();
                    self.state = SixelState::Decsixel;
                    self.data_byte(byte);
                }
            }
        }
    }

    fn data_byte(&mut self, byte: u8) {
        match byte {
            b'"' => self.enter_params(SixelState::Decgra),
            b'!' => self.enter_params(SixelState::Decgri),
            b'#' => self.enter_params(SixelState::Decgci),
            b'$' => self.x = 0,
            b'-' => {
                self.x = 0;
                self.y += 6;
            }
            0x3f..=0x7e => {
                let bits = byte - 0x3f;
                let repeat = std::mem::replace(&mut self.repeat, 1) as usize;
                self.render(bits, repeat);
            }
            _ => {}
        }
    }

    fn enter_params(&mut self, state: SixelState) {
        self.params = [0; 5];
        self.param_idx = 0;
        self.state = state;
    }

    /// Accumulate digits/`;` into `params`; false ends parameter mode.
    fn collect_param(&mut self, byte: u8) -> bool {
        match byte {
            b'0'..=b'9' => {
                let slot = &mut self.params[self.param_idx.min(4)];
                *slot = slot
                    .saturating_mul(10)
                    .saturating_add(u32::from(byte - b'0'));
                true
            }
            b';' => {
                self.param_idx = (self.param_idx + 1).min(4);
                true
            }
            _ => false,
        }
    }

    fn apply_raster_attributes(&mut self) {
        // " Pan ; Pad ; Ph ; Pv. The aspect ratio is ignored; Ph/Pv pre-size the
        // raster.
        let ph = (self.params[2] as usize).min(self.max_width);
        let pv = (self.params[3] as usize).min(self.max_height);
        if ph > 0 && pv > 0 {
            self.raster_w = ph;
            self.raster_h = pv;
            self.ensure(ph, pv);
        }
    }

    fn apply_color(&mut self) {
        let index = self.params[0] as usize % self.palette.len();
        if self.param_idx >= 4 {
            let rgb = match self.params[1] {
                1 => {
                    hls_to_rgb(self.params[2] % 361, self.params[3].min(100), self.params[4].min(100))
                }
                2 => pct_rgb(
                    self.params[2].min(100),
                    self.params[3].min(100),
                    self.params[4].min(100),
                ),
                u => {
                    debug!(coordinate_system = u, "unrecognized sixel color space");
                    self.palette[index]
                }
            };
            self.palette[index] = rgb;
        }
        self.color = self.palette[index];
    }

    /// Grow the raster (geometrically, clamped to the maxima) so that
    /// `(w, h)` fits; newly exposed pixels take the background fill.
    fn ensure(&mut self, w: usize, h: usize) {
        let w = w.min(self.max_width);
        let h = h.min(self.max_height);
        if w <= self.width && h <= self.height {
            return;
        }
        let new_w = w.max(self.width).max(1).next_power_of_two().min(self.max_width).max(w);
        let new_h = h.max(self.height).max(6).next_power_of_two().min(self.max_height).max(h);
        let mut new_data = vec![self.fill; new_w * new_h];
        for row in 0..self.height {
            let src = row * self.width;
            let dst = row * new_w;
            new_data[dst..dst + self.width]
                .copy_from_slice(&self.data[src..src + self.width]);
        }
        self.data = new_data;
        self.width = new_w;
        self.height = new_h;
    }

    fn render(&mut self, bits: u8, repeat: usize) {
        if self.x >= self.max_width || self.y >= self.max_height {
            self.x = self.x.saturating_add(repeat);
            return;
        }
        let repeat = repeat.min(self.max_width - self.x);
        if repeat == 0 {
            return;
        }
        self.ensure(self.x + repeat, self.y + 6);

        if bits != 0 {
            for bit in 0..6 {
                if bits & (1 << bit) == 0 {
                    continue;
                }
                let row = self.y + bit;
                if row >= self.height {
                    break;
                }
                let start = row * self.width + self.x;
                for px in &mut self.data[start..start + repeat] {
                    *px = self.color;
                }
            }
            self.max_row = self.max_row.max((self.y + 6).min(self.max_height));
        }
        self.x += repeat;
        self.max_col = self.max_col.max(self.x.min(self.max_width));
    }

    /// Finalize: trim the working raster to the written/declared extent.
    /// Returns `(pixels, width, height)`.
    #[must_use]
    pub fn finish(self) -> (Vec<u32>, usize, usize) {
        let width = self.max_col.max(self.raster_w).min(self.width);
        let height = self.max_row.max(self.raster_h).min(self.height);
        if width == 0 || height == 0 {
            return (Vec::new(), 0, 0);
        }
        let mut out = Vec::with_capacity(width * height);
        for row in 0..height {
            let start = row * self.width;
            out.extend_from_slice(&self.data[start..start + width]);
        }
        (out, width, height)
    }
}

/// DEC HLS (hue 0 = blue) to packed opaque RGB.
fn hls_to_rgb(h: u32, l: u32, s: u32) -> u32 {
    let h = f64::from((h + 240) % 360);
    let l = f64::from(l) / 100.0;
    let s = f64::from(s) / 100.0;

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to8 = |v: f64| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u32;
    0xff00_0000 | (to8(r) << 16) | (to8(g) << 8) | to8(b)
}
