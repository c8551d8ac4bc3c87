#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use notegrid::{
    render::egui_surface::EguiSurface, AudioEngine, EditorConfig, InteractionController,
    MidiEngine, MidiOutputDevice, PlayOutcome, PlaybackScheduler, Redraw, RenderPipeline,
    SynthEngine,
};

#[cfg(feature = "gui")]
const KEY_WIDTH: f32 = 56.0;

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = EditorConfig::load_or_default();
    let app = match NoteGridApp::new(&config) {
        Ok(app) => app,
        Err(err) => {
            tracing::warn!(%err, "falling back to default editor settings");
            NoteGridApp::with_controller(
                InteractionController::default(),
                PlaybackScheduler::default(),
            )
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_title("notegrid"),
        ..Default::default()
    };

    eframe::run_native("notegrid", options, Box::new(|_cc| Ok(Box::new(app))))
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

/// Synth and MIDI engines; `use_midi` picks the active one.
#[cfg(feature = "gui")]
struct Outputs {
    synth: SynthEngine,
    midi: MidiEngine,
    use_midi: bool,
}

#[cfg(feature = "gui")]
impl Outputs {
    fn engine(&mut self) -> &mut dyn AudioEngine {
        if self.use_midi {
            &mut self.midi
        } else {
            &mut self.synth
        }
    }

    /// Opens the active output. Must run from inside a user gesture.
    fn ensure_resumed(&mut self) {
        let engine = self.engine();
        if engine.is_ready() {
            return;
        }
        if let Err(err) = engine.resume() {
            tracing::warn!(%err, "audio output unavailable");
        }
    }
}

#[cfg(feature = "gui")]
struct NoteGridApp {
    controller: InteractionController,
    scheduler: PlaybackScheduler,
    pipeline: RenderPipeline,
    outputs: Outputs,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    held_key: Option<String>,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl NoteGridApp {
    fn new(config: &EditorConfig) -> Result<Self, notegrid::ConfigError> {
        Ok(Self::with_controller(config.controller()?, config.scheduler()))
    }

    fn with_controller(controller: InteractionController, scheduler: PlaybackScheduler) -> Self {
        Self {
            controller,
            scheduler,
            pipeline: RenderPipeline::default(),
            outputs: Outputs {
                synth: SynthEngine::default(),
                midi: MidiEngine::new(MidiOutputDevice::new()),
                use_midi: false,
            },
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            held_key: None,
            status: None,
        }
    }

    fn start_playback(&mut self) {
        self.outputs.ensure_resumed();
        match self
            .scheduler
            .play(self.controller.store(), self.outputs.engine())
        {
            Ok(PlayOutcome::Started {
                notes,
                total_seconds,
            }) => {
                self.status = Some(format!("Playing {notes} note(s), {total_seconds:.2}s"));
            }
            Ok(PlayOutcome::NothingToPlay) => {
                self.status = Some("Nothing to play".into());
            }
            Ok(PlayOutcome::AlreadyPlaying) => {}
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn stop_playback(&mut self) {
        if self.scheduler.stop(self.outputs.engine()) {
            // release_all silenced previews and held keys too
            self.controller.clear_active_pitches();
            self.held_key = None;
        }
        self.status = None;
    }

    fn switch_output(&mut self, use_midi: bool) {
        if self.outputs.use_midi == use_midi {
            return;
        }
        self.stop_playback();
        if let Err(err) = self.outputs.engine().release_all() {
            tracing::debug!(%err, "release on output switch dropped");
        }
        self.controller.clear_active_pitches();
        self.held_key = None;
        self.outputs.use_midi = use_midi;
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) -> Redraw {
        let (delete, longer, shorter) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                i.key_pressed(egui::Key::CloseBracket),
                i.key_pressed(egui::Key::OpenBracket),
            )
        });
        let mut redraw = Redraw::NONE;
        if delete {
            redraw = redraw.merge(self.controller.delete_selected());
        }
        if longer {
            redraw = redraw.merge(self.controller.resize_selected(1));
        }
        if shorter {
            redraw = redraw.merge(self.controller.resize_selected(-1));
        }
        redraw
    }

    fn piano_strip(&mut self, ui: &mut egui::Ui) {
        let geometry = self.controller.geometry();
        let cell = geometry.cell_size();
        let (response, painter) = ui.allocate_painter(
            egui::vec2(KEY_WIDTH, geometry.height()),
            egui::Sense::click_and_drag(),
        );
        let origin = response.rect.min;
        let theme = self.pipeline.theme().clone();

        let (pressed, released) =
            ui.input(|i| (i.pointer.primary_pressed(), i.pointer.primary_released()));
        if pressed && response.hovered() {
            if let Some(pos) = response.interact_pointer_pos() {
                let row = ((pos.y - origin.y) / cell).floor();
                let pitch = (row >= 0.0)
                    .then(|| self.controller.store().lattice().get(row as usize))
                    .flatten()
                    .map(str::to_string);
                if let Some(pitch) = pitch {
                    self.outputs.ensure_resumed();
                    self.controller.press_key(&pitch, self.outputs.engine());
                    self.held_key = Some(pitch);
                }
            }
        }
        if released {
            if let Some(pitch) = self.held_key.take() {
                self.controller.release_key(&pitch, self.outputs.engine());
            }
        }

        let active = self.controller.active_pitches();
        for (row, pitch) in self.controller.store().lattice().iter().enumerate() {
            let rect = egui::Rect::from_min_size(
                origin + egui::vec2(0.0, row as f32 * cell),
                egui::vec2(KEY_WIDTH, cell),
            );
            let (fill, text) = if active.contains(pitch) {
                (theme.key_active, theme.note_label)
            } else if pitch.contains('#') {
                (theme.key_black, theme.key_white)
            } else {
                (theme.key_white, theme.key_black)
            };
            painter.rect_filled(rect.shrink(0.5), egui::Rounding::same(2.0), fill);
            painter.text(
                rect.left_center() + egui::vec2(4.0, 0.0),
                egui::Align2::LEFT_CENTER,
                pitch,
                egui::FontId::proportional((cell * 0.45).max(6.0)),
                egui::Color32::from(text),
            );
        }
    }

    fn note_grid(&mut self, ui: &mut egui::Ui) -> Redraw {
        let geometry = self.controller.geometry();
        let (response, painter) = ui.allocate_painter(
            egui::vec2(geometry.width(), geometry.height()),
            egui::Sense::click_and_drag(),
        );
        let origin = response.rect.min;
        let mut redraw = Redraw::NONE;

        let (pressed, released, hover) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.hover_pos(),
            )
        });
        let local = |pos: egui::Pos2| (pos.x - origin.x, pos.y - origin.y);

        if pressed && response.hovered() {
            self.outputs.ensure_resumed();
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = local(pos);
                redraw = redraw.merge(self.controller.on_pointer_down(x, y));
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = local(pos);
                redraw = redraw.merge(self.controller.on_pointer_move(x, y));
            }
        }
        if released {
            redraw = redraw.merge(self.controller.on_pointer_up());
        }
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = local(pos);
                redraw = redraw.merge(self.controller.on_click(x, y, self.outputs.engine()));
            }
        }
        let outside = hover.map_or(true, |pos| !response.rect.contains(pos));
        if self.controller.is_dragging() && outside {
            redraw = redraw.merge(self.controller.on_pointer_leave());
        }

        self.pipeline.update(&self.controller);
        let mut surface = EguiSurface::new(&painter, origin);
        self.pipeline.paint_grid(&mut surface);
        self.pipeline.paint_notes(&mut surface);

        if self.scheduler.is_playing() {
            let now = self.outputs.engine().transport().now() as f32;
            let cell = self.controller.geometry().cell_size();
            let x = origin.x + now / self.scheduler.seconds_per_cell() as f32 * cell;
            painter.vline(
                x,
                response.rect.y_range(),
                egui::Stroke::new(2.0, egui::Color32::from(self.pipeline.theme().playhead)),
            );
        }
        redraw
    }
}

#[cfg(feature = "gui")]
impl eframe::App for NoteGridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.outputs.engine().poll();
        self.controller
            .release_expired_previews(std::time::Instant::now(), self.outputs.engine());

        let mut redraw = self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("transport").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.heading("notegrid");
                ui.add_space(20.0);

                if self.scheduler.is_playing() {
                    if ui.button("⏹ Stop").clicked() {
                        self.stop_playback();
                    }
                } else if ui.button("▶ Play").clicked() {
                    self.start_playback();
                }

                ui.add_space(20.0);

                // Output selection
                let mut use_midi = self.outputs.use_midi;
                ui.selectable_value(&mut use_midi, false, "Synth");
                ui.selectable_value(&mut use_midi, true, "MIDI");
                self.switch_output(use_midi);

                if self.outputs.use_midi {
                    let mut selected_port_changed = None;
                    if self.available_midi_ports.is_empty() {
                        ui.label("No MIDI ports available");
                    } else {
                        egui::ComboBox::from_id_source("midi_port")
                            .selected_text(
                                self.selected_port
                                    .and_then(|i| self.available_midi_ports.get(i))
                                    .map(String::as_str)
                                    .unwrap_or("Select port..."),
                            )
                            .show_ui(ui, |ui| {
                                for (i, port_name) in self.available_midi_ports.iter().enumerate()
                                {
                                    if ui
                                        .selectable_label(self.selected_port == Some(i), port_name)
                                        .clicked()
                                    {
                                        selected_port_changed = Some(i);
                                    }
                                }
                            });
                    }
                    if let Some(port_idx) = selected_port_changed {
                        match self.outputs.midi.sink_mut().connect(port_idx) {
                            Ok(()) => self.selected_port = Some(port_idx),
                            Err(err) => self.status = Some(err.to_string()),
                        }
                    }
                }
            });

            ui.horizontal(|ui| {
                ui.label("Click to place, drag to move, Delete to remove, [ and ] to resize");
                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status);
                }
                if !self.outputs.engine().is_ready() {
                    ui.separator();
                    ui.colored_label(egui::Color32::YELLOW, "⚠ Audio output not started");
                }
            });
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                ui.horizontal_top(|ui| {
                    ui.spacing_mut().item_spacing.x = 0.0;
                    self.piano_strip(ui);
                    redraw = redraw.merge(self.note_grid(ui));
                });
            });
        });

        let animating =
            self.scheduler.is_playing() || !self.controller.active_pitches().is_empty();
        if redraw.any() || animating {
            ctx.request_repaint();
        }
    }
}
