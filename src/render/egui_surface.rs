use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Rounding, Stroke};

use super::{Color, PixelRect, Surface};

impl From<Color> for Color32 {
    fn from(color: Color) -> Self {
        Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
    }
}

/// Paints onto an egui layer, offset by the grid's on-screen origin.
pub struct EguiSurface<'a> {
    painter: &'a Painter,
    origin: Pos2,
}

impl<'a> EguiSurface<'a> {
    pub fn new(painter: &'a Painter, origin: Pos2) -> Self {
        Self { painter, origin }
    }

    fn to_screen(&self, rect: PixelRect) -> Rect {
        Rect::from_min_size(
            self.origin + egui::vec2(rect.x, rect.y),
            egui::vec2(rect.width, rect.height),
        )
    }
}

impl Surface for EguiSurface<'_> {
    fn clear(&mut self, color: Color) {
        // every egui frame starts blank
        if color.a > 0 {
            self.painter
                .rect_filled(self.painter.clip_rect(), Rounding::ZERO, Color32::from(color));
        }
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        self.painter
            .rect_filled(self.to_screen(rect), Rounding::same(2.0), Color32::from(color));
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Color) {
        self.painter.rect_stroke(
            self.to_screen(rect),
            Rounding::ZERO,
            Stroke::new(1.0, Color32::from(color)),
        );
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, size: f32, color: Color) {
        self.painter.text(
            self.origin + egui::vec2(x, y),
            Align2::LEFT_CENTER,
            text,
            FontId::proportional(size),
            Color32::from(color),
        );
    }
}
