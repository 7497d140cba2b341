//! Frame description shared by the renderer, the touch hit-test and the display drivers.
//!
//! A [`Frame`] is a plain list of draw primitives sized to the logical screen geometry.
//! It carries no pixels; [`raster`] turns it into an RGB565 buffer for the LCD.

pub mod layout;
pub mod raster;

pub use layout::Layout;
pub use raster::{FrameBuffer, rasterize};

/// 24-bit colour; drivers reduce it to their native depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Minimalist dark theme.
pub mod palette {
    use super::Color;

    pub const BACKGROUND: Color = Color::rgb(20, 20, 25);
    pub const SURFACE: Color = Color::rgb(35, 35, 45);
    pub const SURFACE_LIGHT: Color = Color::rgb(50, 50, 65);
    pub const PRIMARY: Color = Color::rgb(0, 150, 255);
    pub const SECONDARY: Color = Color::rgb(100, 255, 150);
    pub const ACCENT: Color = Color::rgb(255, 100, 100);
    pub const TEXT: Color = Color::rgb(255, 255, 255);
    pub const TEXT_DIM: Color = Color::rgb(150, 150, 160);
    pub const BORDER: Color = Color::rgb(80, 80, 100);
    pub const SLIDER_TRACK: Color = Color::rgb(60, 60, 80);
    pub const SLIDER_FILL: Color = Color::rgb(0, 150, 255);
}

/// Axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && py >= self.y
            && px < self.x + self.width as i32
            && py < self.y + self.height as i32
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextSize {
    /// 6x10 glyphs
    Small,
    /// 8x13 glyphs
    Normal,
    /// 10x20 glyphs
    Large,
}

impl TextSize {
    pub fn char_width(&self) -> u32 {
        match self {
            TextSize::Small => 6,
            TextSize::Normal => 8,
            TextSize::Large => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One drawing operation. Text is positioned by its vertical middle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    Clear(Color),
    FillRect {
        rect: Rect,
        color: Color,
        radius: u32,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        radius: u32,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        size: TextSize,
        color: Color,
        align: Align,
    },
    SliderThumb {
        center_x: i32,
        center_y: i32,
        radius: u32,
        color: Color,
        outline: Color,
    },
}

/// A complete screen refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub primitives: Vec<Primitive>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            primitives: Vec::new(),
        }
    }

    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    /// All text content, in draw order. Handy for assertions and debug logs.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
