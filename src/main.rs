use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::Parser;
use eframe::egui;
use sketch_edit::generate::{parse_generation_response, GenerationRequest};
use sketch_edit::loader::{ImageLoader, ImageSource, LoadRequest, LoadTarget, LoadTicket};
use sketch_edit::render::render_viewport;
use sketch_edit::{
    Color4, DrawMode, EditorConfig, EditorEvent, EditorSession, OptionsChange, PointerButton,
    ScreenPoint, ToolbarAction,
};
use tiny_skia::Pixmap;

const DEFAULT_CONFIG: &str = "sketch-edit.toml";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

// ── App ─────────────────────────────────────────────────────────────────────

struct SketchApp {
    session: EditorSession,
    loader: ImageLoader,

    // display canvas, re-rendered only when the session revision moves
    frame: Option<Pixmap>,
    texture: Option<egui::TextureHandle>,
    rendered_revision: Option<u64>,

    image_path: Option<PathBuf>,
    pending_path: Option<(LoadTicket, PathBuf)>,

    color: [f32; 3],
    prompt: String,
    status: String,
}

impl SketchApp {
    fn new(ctx: &egui::Context, config: EditorConfig, image: Option<PathBuf>) -> anyhow::Result<Self> {
        let repaint = ctx.clone();
        let loader = ImageLoader::spawn(move || repaint.request_repaint())?;
        let c = config.drawing.color;

        let mut app = Self {
            session: EditorSession::new(config),
            loader,
            frame: None,
            texture: None,
            rendered_revision: None,
            image_path: None,
            pending_path: None,
            color: [c.r, c.g, c.b],
            prompt: String::new(),
            status: String::new(),
        };
        if let Some(path) = image {
            app.open_image(ImageSource::Path(path));
        }
        Ok(app)
    }

    fn open_image(&mut self, source: ImageSource) {
        let ticket = self.session.request_base_load();
        self.pending_path = match &source {
            ImageSource::Path(path) => Some((ticket, path.clone())),
            ImageSource::Bytes(_) => None,
        };
        self.status = format!("Loading {}…", source.describe());
        self.submit(ticket, LoadTarget::Base, source);
    }

    fn add_object(&mut self, path: PathBuf) {
        let ticket = self.session.request_object_load();
        self.submit(ticket, LoadTarget::Object, ImageSource::Path(path));
    }

    fn submit(&mut self, ticket: LoadTicket, target: LoadTarget, source: ImageSource) {
        if let Err(e) = self.loader.submit(LoadRequest { ticket, target, source }) {
            tracing::error!("{e}");
            self.status = e.to_string();
        }
    }

    fn drain_loader(&mut self) {
        while let Some(outcome) = self.loader.try_recv() {
            let ticket = outcome.ticket;
            let failure = outcome.result.as_ref().err().map(|e| e.to_string());
            let applied = self.session.finish_load(outcome);

            if let Some(e) = failure {
                self.status = format!("Could not load image: {e}");
            } else if applied && self.session.base().is_some_and(|b| b.ticket() == ticket) {
                if let Some((_, path)) = self.pending_path.take().filter(|(t, _)| *t == ticket) {
                    self.image_path = Some(path);
                }
                self.status.clear();
            }
        }
    }

    fn send(&mut self, event: EditorEvent) {
        self.session.dispatch(event);
    }

    fn output_stem(&self) -> String {
        self.image_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("sketch")
            .to_string()
    }

    /// Write the combined image, the mask (if any) and the request payload
    /// into `dir`.
    fn export_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let Some(image) = self.session.combined_image()? else {
            bail!("no image loaded");
        };
        let mask = self.session.mask()?;
        let stem = self.output_stem();

        std::fs::write(dir.join(format!("{stem}_combined.png")), &image)?;
        if let Some(mask) = &mask {
            std::fs::write(dir.join(format!("{stem}_mask.png")), mask)?;
        }
        let request = GenerationRequest::new(&self.prompt, &image, mask.as_deref());
        let request_path = dir.join(format!("{stem}_request.json"));
        std::fs::write(&request_path, request.to_json()?)?;
        tracing::info!("exported to {}", dir.display());
        Ok(request_path)
    }

    fn load_result(&mut self, path: &Path) -> anyhow::Result<()> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let variants = parse_generation_response(&body)?;
        let source = variants
            .iter()
            .find_map(|v| v.image_source())
            .context("no result image can be loaded locally")?;
        if let Some(text) = variants.first().and_then(|v| v.text.as_deref()) {
            tracing::info!("result: {text}");
        }
        self.open_image(source);
        Ok(())
    }

    fn refresh_frame(&mut self, ctx: &egui::Context) {
        let revision = self.session.revision();
        if self.rendered_revision == Some(revision) {
            return;
        }
        self.rendered_revision = Some(revision);

        let Some(geometry) = self.session.geometry() else {
            self.texture = None;
            return;
        };
        let (w, h) = geometry.display_size_px();
        let mut frame = match self.frame.take() {
            Some(f) if f.width() == w && f.height() == h => f,
            _ => match Pixmap::new(w, h) {
                Some(f) => f,
                None => return,
            },
        };
        render_viewport(&self.session, &mut frame);

        // Background is opaque, so premultiplied and straight alpha agree.
        let image = egui::ColorImage::from_rgba_premultiplied([w as usize, h as usize], frame.data());
        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("viewport", image, egui::TextureOptions::LINEAR));
            }
        }
        self.frame = Some(frame);
    }

    fn canvas_rect(&self) -> Option<egui::Rect> {
        self.session.geometry().map(|g| {
            egui::Rect::from_min_size(
                egui::pos2(g.origin.x, g.origin.y),
                egui::vec2(g.display_width, g.display_height),
            )
        })
    }

    /// Translate this frame's raw egui input into editor events.
    fn pointer_events(&self, ctx: &egui::Context, response: &egui::Response) -> Vec<EditorEvent> {
        let canvas = self.canvas_rect();
        let hovered = response.hovered();
        let on_canvas = |pos: egui::Pos2| canvas.is_some_and(|c| c.contains(pos));

        ctx.input(|i| {
            let mut events = Vec::new();
            for event in &i.events {
                match event {
                    egui::Event::PointerButton {
                        pos,
                        button,
                        pressed,
                        ..
                    } => {
                        let button = match button {
                            egui::PointerButton::Primary => PointerButton::Primary,
                            egui::PointerButton::Secondary => PointerButton::Secondary,
                            egui::PointerButton::Middle => PointerButton::Middle,
                            _ => continue,
                        };
                        let p = ScreenPoint::new(pos.x, pos.y);
                        if !*pressed {
                            events.push(EditorEvent::PointerUp { pos: p });
                        } else if hovered && on_canvas(*pos) {
                            events.push(EditorEvent::PointerDown { pos: p, button });
                        }
                    }
                    egui::Event::PointerMoved(pos) => {
                        if on_canvas(*pos) {
                            events.push(EditorEvent::PointerMove {
                                pos: ScreenPoint::new(pos.x, pos.y),
                            });
                        } else {
                            events.push(EditorEvent::PointerLeave);
                        }
                    }
                    egui::Event::PointerGone => events.push(EditorEvent::PointerLeave),
                    _ => {}
                }
            }

            let scroll = i.raw_scroll_delta.y;
            if hovered && scroll != 0.0 {
                if let Some(pos) = i.pointer.hover_pos() {
                    events.push(EditorEvent::Wheel {
                        pos: ScreenPoint::new(pos.x, pos.y),
                        delta: scroll,
                    });
                }
            }
            events
        })
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file()
                {
                    self.open_image(ImageSource::Path(path));
                }
            }
            let has_image = self.session.base().is_some();
            if ui.add_enabled(has_image, egui::Button::new("Add object…")).clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file()
                {
                    self.add_object(path);
                }
            }
            let has_selection = self.session.objects().selected().is_some();
            if ui.add_enabled(has_selection, egui::Button::new("Remove object")).clicked() {
                self.send(EditorEvent::Toolbar(ToolbarAction::RemoveSelected));
            }
            ui.separator();

            let current = self.session.options().mode;
            let mut mode = current;
            for m in DrawMode::ALL {
                ui.selectable_value(&mut mode, m, m.label());
            }
            if mode != current {
                self.send(EditorEvent::Toolbar(ToolbarAction::Options(OptionsChange {
                    mode: Some(mode),
                    ..Default::default()
                })));
            }
            ui.separator();

            ui.label("Color:");
            if ui.color_edit_button_rgb(&mut self.color).changed() {
                let [r, g, b] = self.color;
                self.send(EditorEvent::Toolbar(ToolbarAction::Options(OptionsChange {
                    color: Some(Color4 { r, g, b, a: 1.0 }),
                    ..Default::default()
                })));
            }
            ui.label("Size:");
            let mut size = self.session.options().stroke_width;
            if ui.add(egui::Slider::new(&mut size, 1.0..=50.0)).changed() {
                self.send(EditorEvent::Toolbar(ToolbarAction::Options(OptionsChange {
                    size: Some(size),
                    ..Default::default()
                })));
            }
            ui.separator();

            if ui.button("Undo").clicked() {
                self.send(EditorEvent::Toolbar(ToolbarAction::Undo));
            }
            if ui.button("Clear").clicked() {
                self.send(EditorEvent::Toolbar(ToolbarAction::Clear));
            }
            ui.separator();
            if ui.button("−").clicked() {
                self.send(EditorEvent::Toolbar(ToolbarAction::ZoomOut));
            }
            if ui.button("+").clicked() {
                self.send(EditorEvent::Toolbar(ToolbarAction::ZoomIn));
            }
            if ui.button("Reset").clicked() {
                self.send(EditorEvent::Toolbar(ToolbarAction::ResetZoom));
            }
            ui.label(format!("Zoom: {:.0}%", self.session.view().scale * 100.0));
        });

        ui.horizontal(|ui| {
            ui.label("Prompt:");
            ui.add(egui::TextEdit::singleline(&mut self.prompt).desired_width(400.0));
            if ui.button("Export…").clicked() {
                if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                    self.status = match self.export_to(&dir) {
                        Ok(path) => format!("Wrote {}", path.display()),
                        Err(e) => format!("Export failed: {e:#}"),
                    };
                }
            }
            if ui.button("Load result…").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Generation reply", &["json"])
                    .pick_file()
                {
                    if let Err(e) = self.load_result(&path) {
                        self.status = format!("{e:#}");
                    }
                }
            }
            if self.session.is_loading() {
                ui.spinner();
            }
            ui.label(&self.status);
        });
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for SketchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_loader();

        // Keyboard shortcuts
        if !ctx.wants_keyboard_input() {
            let (undo, remove) = ctx.input_mut(|i| {
                (
                    i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z),
                    i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                )
            });
            if undo {
                self.send(EditorEvent::Toolbar(ToolbarAction::Undo));
            }
            if remove {
                self.send(EditorEvent::Toolbar(ToolbarAction::RemoveSelected));
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let area = response.rect;
            self.session.set_canvas_area(
                ScreenPoint::new(area.min.x, area.min.y),
                area.width(),
                area.height(),
            );

            for event in self.pointer_events(ctx, &response) {
                self.send(event);
            }
            self.refresh_frame(ctx);

            let [r, g, b, _] = self.session.config().background;
            painter.rect_filled(area, 0.0, egui::Color32::from_rgb(r, g, b));

            match (&self.texture, self.canvas_rect()) {
                (Some(texture), Some(canvas)) => {
                    painter.image(
                        texture.id(),
                        canvas,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
                _ => {
                    painter.text(
                        area.center(),
                        egui::Align2::CENTER_CENTER,
                        "Open an image to start",
                        egui::FontId::proportional(18.0),
                        egui::Color32::GRAY,
                    );
                }
            }
        });
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sketch-edit", about = "Sketch over a photo and export it for image generation")]
#[command(version)]
struct Args {
    /// Image to open on start
    image: Option<PathBuf>,

    /// Editor config (defaults to ./sketch-edit.toml when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn check_args(args: &Args) -> anyhow::Result<()> {
    if let Some(image) = &args.image {
        if !image.exists() {
            bail!("File not found: {}", image.display());
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EditorConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => return Ok(EditorConfig::default()),
    };
    EditorConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    check_args(&args)?;
    let config = load_config(args.config.as_deref())?;

    let title = match &args.image {
        Some(path) => format!(
            "sketch-edit — {}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("")
        ),
        None => "sketch-edit".to_string(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    let image = args.image;
    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            let app = SketchApp::new(&cc.egui_ctx, config, image)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
