//! Two-layer renderer for the note grid.
//!
//! Each layer is a list of draw commands rebuilt from scratch when its input
//! changes and replayed onto a [`Surface`] with a clear first. The grid layer
//! depends only on the grid extent, the notes layer only on the store
//! revision.

#[cfg(feature = "gui")]
pub mod egui_surface;

use crate::sequencer::geometry::GridGeometry;
use crate::sequencer::interaction::InteractionController;
use crate::sequencer::NoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect { rect: PixelRect, color: Color },
    StrokeRect { rect: PixelRect, color: Color },
    /// Text anchored at its left edge, vertically centred on `y`.
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        color: Color,
    },
}

/// Immediate-mode drawing target. Keeps nothing between frames.
pub trait Surface {
    fn clear(&mut self, color: Color);
    fn fill_rect(&mut self, rect: PixelRect, color: Color);
    fn stroke_rect(&mut self, rect: PixelRect, color: Color);
    fn draw_text(&mut self, x: f32, y: f32, text: &str, size: f32, color: Color);
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color,
    pub grid_line: Color,
    pub note_fill: Color,
    pub note_selected_fill: Color,
    pub note_label: Color,
    pub note_selected_label: Color,
    pub key_white: Color,
    pub key_black: Color,
    pub key_active: Color,
    pub playhead: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            background: Color::rgb(20, 21, 24),
            grid_line: Color::rgb(50, 52, 58),
            note_fill: Color::rgb(80, 180, 250),
            note_selected_fill: Color::rgb(250, 170, 60),
            note_label: Color::rgb(16, 24, 32),
            note_selected_label: Color::rgb(32, 20, 8),
            key_white: Color::rgb(207, 209, 213),
            key_black: Color::rgb(60, 61, 65),
            key_active: Color::rgb(120, 170, 250),
            playhead: Color::rgb(240, 90, 90),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Layer {
    commands: Vec<DrawCommand>,
}

impl Layer {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Clears the surface and draws every command.
    pub fn replay(&self, surface: &mut dyn Surface, background: Color) {
        surface.clear(background);
        for command in &self.commands {
            match command {
                DrawCommand::FillRect { rect, color } => surface.fill_rect(*rect, *color),
                DrawCommand::StrokeRect { rect, color } => surface.stroke_rect(*rect, *color),
                DrawCommand::Text {
                    x,
                    y,
                    text,
                    size,
                    color,
                } => surface.draw_text(*x, *y, text, *size, *color),
            }
        }
    }
}

/// Which layers an [`RenderPipeline::update`] rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rebuilt {
    pub grid: bool,
    pub notes: bool,
}

pub struct RenderPipeline {
    theme: Theme,
    grid: Layer,
    notes: Layer,
    grid_key: Option<(usize, u32)>,
    notes_key: Option<u64>,
}

impl RenderPipeline {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            grid: Layer::default(),
            notes: Layer::default(),
            grid_key: None,
            notes_key: None,
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn grid_layer(&self) -> &Layer {
        &self.grid
    }

    pub fn notes_layer(&self) -> &Layer {
        &self.notes
    }

    /// Rebuilds whichever layers are stale.
    pub fn update(&mut self, controller: &InteractionController) -> Rebuilt {
        let geometry = controller.geometry();
        let store = controller.store();
        let mut rebuilt = Rebuilt::default();

        let grid_key = (geometry.rows(), geometry.columns());
        if self.grid_key != Some(grid_key) {
            self.grid = build_grid_layer(geometry, &self.theme);
            self.grid_key = Some(grid_key);
            rebuilt.grid = true;
        }
        if self.notes_key != Some(store.revision()) {
            self.notes = build_notes_layer(store, geometry, &self.theme);
            self.notes_key = Some(store.revision());
            rebuilt.notes = true;
        }
        rebuilt
    }

    pub fn paint_grid(&self, surface: &mut dyn Surface) {
        self.grid.replay(surface, self.theme.background);
    }

    pub fn paint_notes(&self, surface: &mut dyn Surface) {
        self.notes.replay(surface, Color::TRANSPARENT);
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(Theme::default())
    }
}

pub fn build_grid_layer(geometry: &GridGeometry, theme: &Theme) -> Layer {
    let cell = geometry.cell_size();
    let mut commands = Vec::with_capacity(geometry.rows() * geometry.columns() as usize);
    for row in 0..geometry.rows() {
        for col in 0..geometry.columns() {
            let (x, y) = geometry.cell_to_pixel(row, col);
            commands.push(DrawCommand::StrokeRect {
                rect: PixelRect::new(x, y, cell, cell),
                color: theme.grid_line,
            });
        }
    }
    Layer { commands }
}

pub fn build_notes_layer(store: &NoteStore, geometry: &GridGeometry, theme: &Theme) -> Layer {
    let cell = geometry.cell_size();
    let mut commands = Vec::with_capacity(store.len() * 2);
    for note in store.notes() {
        let (x, y) = geometry.cell_to_pixel(note.row_index(), note.col_index());
        let (fill, label) = if note.is_selected() {
            (theme.note_selected_fill, theme.note_selected_label)
        } else {
            (theme.note_fill, theme.note_label)
        };
        commands.push(DrawCommand::FillRect {
            rect: PixelRect::new(x, y, note.duration_columns() as f32 * cell, cell),
            color: fill,
        });
        commands.push(DrawCommand::Text {
            x: x + 3.0,
            y: y + cell / 2.0,
            text: note.pitch().to_string(),
            size: (cell * 0.45).max(6.0),
            color: label,
        });
    }
    Layer { commands }
}
