//! hoverterm: GPU-rendered terminal emulator with hover-to-open links.
//!
//! Hold the command key (control on other platforms) while the pointer is
//! over a URL printed in the terminal: the URL is underlined and the cursor
//! becomes a pointing hand. Clicking then opens it in the system's default
//! handler. Without the modifier, every mouse and keyboard event reaches
//! the shell exactly as any terminal would deliver it.
//!
//! Uses vello/wgpu for rendering, winit for windowing, and
//! alacritty_terminal for the emulation core.

mod config;
mod config_watcher;
mod font;
mod links;
mod logging;
mod overlay;
mod paths;
mod state_machine;
mod tabs;
mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use vello::peniko::FontData;
use vello::util::{RenderContext, RenderSurface};
use vello::{AaConfig, Renderer, RendererOptions, Scene};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, ModifiersState};
use winit::window::{CursorIcon, Window};

use vello::wgpu;

use config::Config;
use links::SystemOpener;
use overlay::LinkOverlay;
use tabs::TabManager;
use terminal::SCROLL_LINES_PER_NOTCH;

/// hoverterm
#[derive(Parser, Debug)]
#[command(name = "hoverterm", version, about = "Terminal emulator with hover-to-open links")]
struct Args {
    /// Run this command instead of the configured shell (program then args)
    #[arg(short = 'e', long = "execute", num_args = 1.., value_name = "CMD")]
    execute: Vec<String>,

    /// Working directory for the first tab
    #[arg(short = 'd', long)]
    working_dir: Option<String>,

    /// Config file path (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Events delivered to the winit loop from background threads.
#[derive(Debug)]
enum UserEvent {
    ConfigReloaded(Config),
}

/// The key that arms link hovering and drives app shortcuts.
#[cfg(target_os = "macos")]
fn hover_modifier_held(mods: ModifiersState) -> bool {
    mods.super_key()
}
#[cfg(not(target_os = "macos"))]
fn hover_modifier_held(mods: ModifiersState) -> bool {
    mods.control_key()
}

/// App shortcut chord (Cmd on macOS, Ctrl+Shift elsewhere so plain Ctrl
/// still reaches the shell).
#[cfg(target_os = "macos")]
fn shortcut_chord(mods: ModifiersState) -> bool {
    mods.super_key()
}
#[cfg(not(target_os = "macos"))]
fn shortcut_chord(mods: ModifiersState) -> bool {
    mods.control_key() && mods.shift_key()
}

#[derive(Debug)]
enum RenderState {
    Active {
        surface: Box<RenderSurface<'static>>,
        valid_surface: bool,
        window: Arc<Window>,
    },
    Suspended(Option<Arc<Window>>),
}

struct App {
    context: RenderContext,
    renderers: Vec<Option<Renderer>>,
    state: RenderState,
    scene: Scene,
    config: Config,
    /// Keeps the hot-reload thread alive for the process lifetime.
    _config_watcher: Option<config_watcher::ConfigFileWatcher>,
    font: FontData,
    tabs: Option<TabManager>,
    overlay: LinkOverlay,
    modifiers: ModifiersState,
    cursor_pos: (f64, f64),
    last_title: Option<String>,
    /// Command and working dir for the first tab (from the CLI).
    first_command: Option<Vec<String>>,
    first_working_dir: Option<String>,
}

impl App {
    fn window_size(&self) -> (f64, f64) {
        match &self.state {
            RenderState::Active { surface, .. } => {
                (surface.config.width as f64, surface.config.height as f64)
            }
            RenderState::Suspended(_) => (0.0, 0.0),
        }
    }

    fn handle_shortcut(&mut self, key: &Key, event_loop: &ActiveEventLoop) {
        let (width, height) = self.window_size();
        let Some(tabs) = self.tabs.as_mut() else {
            return;
        };
        let Key::Character(c) = key else { return };
        match c.to_lowercase().as_str() {
            "t" => tabs.open_tab(&self.config, width, height),
            "w" => {
                if !tabs.close_active(width, height) {
                    event_loop.exit();
                }
            }
            "q" => event_loop.exit(),
            "v" => {
                if let Some(pane) = tabs.active_pane_mut() {
                    paste_clipboard(pane);
                }
            }
            "=" | "+" => {
                if let Some(pane) = tabs.active_pane_mut() {
                    pane.increase_font_size();
                }
            }
            "-" => {
                if let Some(pane) = tabs.active_pane_mut() {
                    pane.decrease_font_size();
                }
            }
            "0" => {
                if let Some(pane) = tabs.active_pane_mut() {
                    pane.reset_font_size();
                }
            }
            "]" => tabs.next_tab(),
            "[" => tabs.prev_tab(),
            digit @ ("1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9") => {
                if let Ok(n) = digit.parse::<usize>() {
                    tabs.select(n - 1);
                }
            }
            _ => {}
        }
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let RenderState::Suspended(cached_window) = &mut self.state else {
            return;
        };

        let window = cached_window
            .take()
            .unwrap_or_else(|| create_window(event_loop));

        let size = window.inner_size();
        let surface_future = self.context.create_surface(
            window.clone(),
            size.width,
            size.height,
            wgpu::PresentMode::AutoVsync,
        );
        let surface = pollster::block_on(surface_future).expect("Error creating surface");

        self.renderers
            .resize_with(self.context.devices.len(), || None);
        self.renderers[surface.dev_id]
            .get_or_insert_with(|| create_renderer(&self.context, &surface));

        if self.tabs.is_none() {
            let command = self.first_command.take();
            let working_dir = self.first_working_dir.take();
            match TabManager::new(
                &self.config,
                self.font.clone(),
                size.width as f64,
                size.height as f64,
                command.as_deref(),
                working_dir.as_deref(),
            ) {
                Ok(tabs) => self.tabs = Some(tabs),
                Err(e) => {
                    error!("failed to start shell: {e:#}");
                    event_loop.exit();
                    return;
                }
            }
        }

        self.state = RenderState::Active {
            surface: Box::new(surface),
            valid_surface: true,
            window,
        };
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let RenderState::Active { window, .. } = &self.state {
            self.state = RenderState::Suspended(Some(window.clone()));
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ConfigReloaded(new_config) => {
                info!("config reloaded");
                let font_changed = new_config.font.file != self.config.font.file;
                self.config = new_config;
                if font_changed {
                    match font::load_terminal_font(&self.config.font.file) {
                        Ok(f) => {
                            self.font = f.clone();
                            if let Some(tabs) = &mut self.tabs {
                                tabs.set_font_all(f);
                            }
                        }
                        Err(e) => warn!("font reload failed: {e:#}"),
                    }
                }
                if let Some(tabs) = &mut self.tabs {
                    tabs.apply_config_all(&self.config);
                }
                if let RenderState::Active { window, .. } = &self.state {
                    window.request_redraw();
                }
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Deferred tab focus lands here, after the event that requested the
        // switch has fully unwound.
        if let Some(tabs) = &mut self.tabs
            && tabs.commit_pending_select()
            && let RenderState::Active { window, .. } = &self.state
        {
            window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let (surface, valid_surface, window) = match &mut self.state {
            RenderState::Active {
                surface,
                valid_surface,
                window,
            } if window.id() == window_id => (surface, valid_surface, window.clone()),
            _ => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::ModifiersChanged(new_mods) => {
                let mods = new_mods.state();
                let was_held = hover_modifier_held(self.modifiers);
                let now_held = hover_modifier_held(mods);
                self.modifiers = mods;
                if was_held != now_held
                    && let Some(tabs) = &self.tabs
                    && let Some(pane) = tabs.active_pane()
                {
                    self.overlay.modifier_changed(now_held, pane);
                    window.set_cursor(self.overlay.cursor_icon());
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if shortcut_chord(self.modifiers) {
                    // Unmatched chords are swallowed rather than typed.
                    self.handle_shortcut(&logical_key, event_loop);
                } else if let Some(pane) = self.tabs.as_mut().and_then(|t| t.active_pane_mut()) {
                    let consumed = pane.write_key(&logical_key, self.modifiers.control_key());
                    if consumed {
                        // Typing snaps the view back to the live screen.
                        pane.scroll_to_bottom();
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_pos = (position.x, position.y);
                if let Some(tabs) = &self.tabs
                    && let Some(pane) = tabs.active_pane()
                {
                    self.overlay.pointer_moved((position.x, position.y), pane);
                    window.set_cursor(self.overlay.cursor_icon());
                }
            }

            WindowEvent::CursorLeft { .. } => {
                self.overlay.pointer_left();
                window.set_cursor(CursorIcon::Default);
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let (width, _) = self.window_size();
                let Some(tabs) = self.tabs.as_mut() else {
                    return;
                };
                let (cx, cy) = self.cursor_pos;

                // Tab strip clicks.
                if state == ElementState::Pressed
                    && button == MouseButton::Left
                    && let Some(index) = tabs.tab_at(cx, cy, width)
                {
                    tabs.select(index);
                    return;
                }

                // The overlay decides per press whether a highlighted link
                // claims the click; everything else belongs to the terminal.
                if state == ElementState::Pressed && button == MouseButton::Left {
                    let claimed = match tabs.active_pane() {
                        Some(pane) => self.overlay.mouse_pressed(pane),
                        None => false,
                    };
                    window.set_cursor(self.overlay.cursor_icon());
                    if claimed {
                        return;
                    }
                }

                // Forward to programs that asked for mouse reporting.
                if let Some(pane) = tabs.active_pane_mut()
                    && pane.mouse_reporting_active()
                    && let Some((col, row)) = pane.cell_at((cx, cy))
                {
                    let code = match button {
                        MouseButton::Left => 0,
                        MouseButton::Middle => 1,
                        MouseButton::Right => 2,
                        _ => return,
                    };
                    pane.report_mouse_button(code, col, row, state == ElementState::Pressed);
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let Some(pane) = self.tabs.as_mut().and_then(|t| t.active_pane_mut()) else {
                    return;
                };
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => (y * SCROLL_LINES_PER_NOTCH as f32) as i32,
                    MouseScrollDelta::PixelDelta(pos) => {
                        (pos.y / pane.cell_height.max(1.0) as f64) as i32
                    }
                };
                if lines == 0 {
                    return;
                }
                if pane.mouse_reporting_active() {
                    if let Some((col, row)) = pane.cell_at(self.cursor_pos) {
                        let code = if lines > 0 { 64 } else { 65 };
                        for _ in 0..lines.unsigned_abs().min(32) {
                            pane.report_mouse_button(code, col, row, true);
                        }
                    }
                } else {
                    pane.scroll(lines);
                }
            }

            WindowEvent::Resized(size) => {
                if size.width != 0 && size.height != 0 {
                    self.context
                        .resize_surface(surface, size.width, size.height);
                    *valid_surface = true;
                    if let Some(tabs) = &mut self.tabs {
                        tabs.layout(size.width as f64, size.height as f64);
                    }
                } else {
                    *valid_surface = false;
                }
            }

            WindowEvent::RedrawRequested => {
                if !*valid_surface {
                    return;
                }

                self.scene.reset();

                let width = surface.config.width as f64;
                let height = surface.config.height as f64;

                if let Some(tabs) = &mut self.tabs {
                    tabs.drain_all_output();

                    let highlight = self.overlay.highlight().cloned();
                    tabs.render_into_scene(&mut self.scene, width, height, highlight.as_ref());

                    // Mirror the shell's title escape into the window title.
                    let title = tabs
                        .active_pane()
                        .and_then(|p| p.title())
                        .unwrap_or("hoverterm");
                    if self.last_title.as_deref() != Some(title) {
                        window.set_title(title);
                        self.last_title = Some(title.to_string());
                    }
                }

                let device_handle = &self.context.devices[surface.dev_id];

                self.renderers[surface.dev_id]
                    .as_mut()
                    .unwrap()
                    .render_to_texture(
                        &device_handle.device,
                        &device_handle.queue,
                        &self.scene,
                        &surface.target_view,
                        &vello::RenderParams {
                            base_color: self.config.bg_color(),
                            width: surface.config.width,
                            height: surface.config.height,
                            antialiasing_method: AaConfig::Msaa16,
                        },
                    )
                    .expect("failed to render to surface");

                let surface_texture = surface
                    .surface
                    .get_current_texture()
                    .expect("failed to get surface texture");

                let mut encoder =
                    device_handle
                        .device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("Surface Blit"),
                        });
                surface.blitter.copy(
                    &device_handle.device,
                    &mut encoder,
                    &surface.target_view,
                    &surface_texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default()),
                );
                device_handle.queue.submit([encoder.finish()]);
                surface_texture.present();
                device_handle.device.poll(wgpu::PollType::Poll).unwrap();

                // Request another frame so PTY output keeps flowing in.
                window.request_redraw();
            }

            _ => {}
        }
    }
}

fn paste_clipboard(pane: &mut terminal::TerminalPane) {
    match arboard::Clipboard::new().and_then(|mut c| c.get_text()) {
        Ok(text) if !text.is_empty() => pane.paste(&text),
        Ok(_) => {}
        Err(e) => warn!("clipboard read failed: {e}"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => match paths::AppPaths::resolve() {
            Some(app_paths) => {
                if let Err(e) = app_paths.ensure() {
                    warn!("could not create app directories: {e}");
                }
                app_paths.config_file()
            }
            None => PathBuf::from("hoverterm.toml"),
        },
    };

    let config = Config::load(&config_path);
    let font = font::load_terminal_font(&config.font.file)?;

    let event_loop = EventLoop::<UserEvent>::with_user_event().build()?;
    let proxy = event_loop.create_proxy();
    let watcher = match config_watcher::ConfigFileWatcher::start(config_path.clone(), move |cfg| {
        let _ = proxy.send_event(UserEvent::ConfigReloaded(cfg));
    }) {
        Ok(w) => {
            info!(path = %config_path.display(), "watching config for changes");
            Some(w)
        }
        Err(e) => {
            warn!("config watcher unavailable: {e}");
            None
        }
    };

    let mut app = App {
        context: RenderContext::new(),
        renderers: vec![],
        state: RenderState::Suspended(None),
        scene: Scene::new(),
        config,
        _config_watcher: watcher,
        font,
        tabs: None,
        overlay: LinkOverlay::new(Box::new(SystemOpener)),
        modifiers: ModifiersState::default(),
        cursor_pos: (0.0, 0.0),
        last_title: None,
        first_command: (!args.execute.is_empty()).then(|| args.execute.clone()),
        first_working_dir: args.working_dir.clone(),
    };

    event_loop
        .run_app(&mut app)
        .expect("Couldn't run event loop");

    Ok(())
}

fn create_window(event_loop: &ActiveEventLoop) -> Arc<Window> {
    let attr = Window::default_attributes()
        .with_title("hoverterm")
        .with_inner_size(winit::dpi::LogicalSize::new(1024, 720));

    Arc::new(event_loop.create_window(attr).unwrap())
}

fn create_renderer(render_cx: &RenderContext, surface: &RenderSurface<'_>) -> Renderer {
    Renderer::new(
        &render_cx.devices[surface.dev_id].device,
        RendererOptions::default(),
    )
    .expect("Couldn't create renderer")
}
