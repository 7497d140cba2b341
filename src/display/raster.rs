use super::{Align, Color, Frame, Primitive, Rect, TextSize};
use embedded_graphics::prelude::Primitive as _;
use embedded_graphics::{
    mono_font::{
        MonoFont, MonoTextStyle,
        ascii::{FONT_6X10, FONT_8X13, FONT_10X20},
    },
    pixelcolor::{IntoStorage, Rgb565, Rgb888},
    prelude::*,
    primitives::{
        Circle, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, RoundedRectangle,
    },
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use std::convert::Infallible;

/// In-memory RGB565 canvas the size of the logical screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgb565>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb565::BLACK; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb565> {
        (x < self.width && y < self.height).then(|| self.pixels[(y * self.width + x) as usize])
    }

    /// Row-major big-endian RGB565, the layout ILI9341 expects after `RAMWR`.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 2);
        for color in &self.pixels {
            bytes.extend_from_slice(&color.into_storage().to_be_bytes());
        }
        bytes
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if let Ok((x, y)) = <(u32, u32)>::try_from(coord) {
                if x < self.width && y < self.height {
                    self.pixels[(y * self.width + x) as usize] = color;
                }
            }
        }
        Ok(())
    }
}

pub fn to_rgb565(color: Color) -> Rgb565 {
    Rgb565::from(Rgb888::new(color.r, color.g, color.b))
}

fn font(size: TextSize) -> &'static MonoFont<'static> {
    match size {
        TextSize::Small => &FONT_6X10,
        TextSize::Normal => &FONT_8X13,
        TextSize::Large => &FONT_10X20,
    }
}

fn rectangle(rect: &Rect) -> Rectangle {
    Rectangle::new(Point::new(rect.x, rect.y), Size::new(rect.width, rect.height))
}

/// Draw every primitive of `frame` onto any RGB565 target.
pub fn rasterize_into<D>(frame: &Frame, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    for primitive in &frame.primitives {
        match primitive {
            Primitive::Clear(color) => target.clear(to_rgb565(*color))?,
            Primitive::FillRect {
                rect,
                color,
                radius,
            } => {
                let style = PrimitiveStyle::with_fill(to_rgb565(*color));
                if *radius == 0 {
                    rectangle(rect).into_styled(style).draw(target)?;
                } else {
                    RoundedRectangle::with_equal_corners(rectangle(rect), Size::new(*radius, *radius))
                        .into_styled(style)
                        .draw(target)?;
                }
            }
            Primitive::StrokeRect {
                rect,
                color,
                radius,
            } => {
                let style = PrimitiveStyle::with_stroke(to_rgb565(*color), 1);
                if *radius == 0 {
                    rectangle(rect).into_styled(style).draw(target)?;
                } else {
                    RoundedRectangle::with_equal_corners(rectangle(rect), Size::new(*radius, *radius))
                        .into_styled(style)
                        .draw(target)?;
                }
            }
            Primitive::Text {
                x,
                y,
                text,
                size,
                color,
                align,
            } => {
                let character_style = MonoTextStyle::new(font(*size), to_rgb565(*color));
                let alignment = match align {
                    Align::Left => Alignment::Left,
                    Align::Center => Alignment::Center,
                    Align::Right => Alignment::Right,
                };
                let text_style = TextStyleBuilder::new()
                    .alignment(alignment)
                    .baseline(Baseline::Middle)
                    .build();
                Text::with_text_style(text, Point::new(*x, *y), character_style, text_style)
                    .draw(target)?;
            }
            Primitive::SliderThumb {
                center_x,
                center_y,
                radius,
                color,
                outline,
            } => {
                let style = PrimitiveStyleBuilder::new()
                    .fill_color(to_rgb565(*color))
                    .stroke_color(to_rgb565(*outline))
                    .stroke_width(1)
                    .build();
                Circle::with_center(Point::new(*center_x, *center_y), radius * 2 + 1)
                    .into_styled(style)
                    .draw(target)?;
            }
        }
    }
    Ok(())
}

/// Rasterize a frame into a fresh buffer of the frame's size.
pub fn rasterize(frame: &Frame) -> FrameBuffer {
    let mut buffer = FrameBuffer::new(frame.width, frame.height);
    match rasterize_into(frame, &mut buffer) {
        Ok(()) => buffer,
        Err(never) => match never {},
    }
}
