//! Terminal pane for hoverterm.
//!
//! Provides `TerminalPane` — a struct that:
//!   - Spawns the user's shell on a local PTY
//!   - Feeds output to `alacritty_terminal::Term` via a tokio mpsc channel
//!   - Exposes `render_into_scene()` to draw the cell grid using vello
//!   - Routes keyboard input from winit to the PTY writer
//!   - Answers the grid queries the link-hover overlay needs
//!
//! Architecture (data flows):
//!
//! ```text
//! [local PTY]
//!       │ byte stream (read)
//!       ▼
//! [reader thread] ──mpsc──► [main thread: drain_output()]
//!                                      │
//!                                      ▼
//!                          alacritty_terminal::Term
//!                                      │
//!                                      ▼
//!                          render_into_scene() → vello Scene
//! ```
//!
//! Key input:
//! ```text
//! winit KeyEvent ──► key_event_to_pty_bytes() ──► PTY writer (sync write)
//! ```

use std::io::Write;

use alacritty_terminal::Term;
use alacritty_terminal::event::{Event as TermEvent, EventListener};
use alacritty_terminal::grid::{Dimensions, Scroll};
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config as TermConfig, TermMode};
use alacritty_terminal::vte::ansi::{Color as AlaColor, CursorShape, NamedColor, Processor, Rgb};
use anyhow::Context;
use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use tokio::sync::mpsc as tokio_mpsc;
use vello::Glyph;
use vello::Scene;
use vello::kurbo::{Affine, Rect};
use vello::peniko::{Color, Fill, FontData};
use winit::keyboard::{Key, NamedKey};

use crate::config::Config;
use crate::font;
use crate::links::UrlMatch;
use crate::overlay::TerminalHost;

/// Horizontal padding (one cell width on each side).
const TERM_PAD_CELLS: usize = 1;

/// Scroll lines per wheel notch.
pub const SCROLL_LINES_PER_NOTCH: i32 = 3;

// --- Theme ------------------------------------------------------------------

/// Resolved terminal colors, derived from the user config once per load.
#[derive(Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub cursor: Color,
    pub ansi: [Color; 16],
}

impl Theme {
    pub fn from_config(config: &Config) -> Self {
        let mut ansi = [config.fg_color(); 16];
        for (i, slot) in ansi.iter_mut().enumerate() {
            *slot = config.ansi_color(i);
        }
        Self {
            bg: config.bg_color(),
            fg: config.fg_color(),
            cursor: config.cursor_color(),
            ansi,
        }
    }
}

// --- TermSize helper --------------------------------------------------------

struct TermSize {
    columns: usize,
    screen_lines: usize,
}

impl TermSize {
    fn new(columns: usize, screen_lines: usize) -> Self {
        Self { columns, screen_lines }
    }
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.screen_lines
    }
    fn screen_lines(&self) -> usize {
        self.screen_lines
    }
    fn columns(&self) -> usize {
        self.columns
    }
}

// --- Channel EventListener --------------------------------------------------

/// Forwards terminal events to the main thread.
///
/// The emulator answers queries (cursor position reports, device status)
/// by emitting `PtyWrite` events; dropping them would hang programs that
/// wait for the reply, so they are queued here and serviced from
/// `drain_output()`.
#[derive(Clone)]
struct ChannelListener {
    tx: tokio_mpsc::UnboundedSender<TermEvent>,
}

impl EventListener for ChannelListener {
    fn send_event(&self, event: TermEvent) {
        let _ = self.tx.send(event);
    }
}

// --- TerminalPane -----------------------------------------------------------

/// A terminal pane that renders into a vello `Scene` and backs the
/// link-hover overlay's grid queries.
pub struct TerminalPane {
    /// The terminal state machine (cell grid + cursor + SGR state).
    /// Single-owner: the reader thread only forwards raw bytes over the
    /// channel, so every access to the grid happens on the main thread.
    term: Term<ChannelListener>,

    /// VTE ANSI parser (drives `Term` with bytes from the PTY).
    /// Owned by drain_output() on the main thread.
    processor: Processor,

    /// Buffered PTY output bytes from the reader thread.
    rx: tokio_mpsc::UnboundedReceiver<Vec<u8>>,

    /// Terminal events emitted while processing output.
    events_rx: tokio_mpsc::UnboundedReceiver<TermEvent>,

    /// Write handle to the PTY (sends input to the shell).
    pty_writer: Box<dyn Write + Send>,

    /// Resize handle for the PTY.
    pty_master: Box<dyn portable_pty::MasterPty + Send>,

    /// Shell child process; killed when the pane is dropped.
    child: Box<dyn portable_pty::Child + Send + Sync>,

    /// Active monospace font data.
    font: FontData,

    /// Current font size in pixels.
    pub font_size: f32,

    /// Font size Cmd+0 returns to (the configured size).
    default_font_size: f32,

    /// Computed cell dimensions (pixels) at current font_size.
    pub cell_width: f32,
    pub cell_height: f32,

    /// Current pixel dimensions (for resize after font change).
    pixel_width: f64,
    pixel_height: f64,

    /// Window-space position of the text area's top-left corner, recorded
    /// on each render so pointer positions can be mapped into the grid.
    origin: (f64, f64),

    /// Current terminal dimensions.
    pub cols: usize,
    pub rows: usize,

    /// Window title requested by the running program (OSC 0/2).
    title: Option<String>,

    /// Resolved colors.
    theme: Theme,
}

impl TerminalPane {
    /// Spawn a new terminal pane running the configured shell, or
    /// `command` when given (program and arguments).
    ///
    /// `width` and `height` are the pixel dimensions of the terminal area.
    pub fn spawn(
        config: &Config,
        font_data: FontData,
        width: f64,
        height: f64,
        command: Option<&[String]>,
        working_dir: Option<&str>,
    ) -> anyhow::Result<Self> {
        let font_size = font::clamp_font_size(config.font.size);
        let (cell_width, cell_height) = font::cell_geometry(&font_data, font_size)
            .unwrap_or_else(|| font::fallback_geometry(font_size));

        let pad_px = cell_width as f64 * TERM_PAD_CELLS as f64;
        let usable_width = (width - pad_px * 2.0).max(0.0);
        let cols = ((usable_width / cell_width as f64).floor() as usize).max(2);
        let rows = ((height / cell_height as f64).floor() as usize).max(1);

        // Open a PTY pair.
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: rows as u16,
                cols: cols as u16,
                pixel_width: width as u16,
                pixel_height: height as u16,
            })
            .context("failed to open PTY")?;

        let cmd = build_command(config, command, working_dir);
        let child = pair
            .slave
            .spawn_command(cmd)
            .context("failed to spawn shell")?;
        // Drop our copy of the slave fd. The child inherited it during
        // spawn; keeping ours would suppress EOF on the master when the
        // child exits.
        drop(pair.slave);

        // Get read/write handles from the master.
        let reader = pair
            .master
            .try_clone_reader()
            .context("failed to clone PTY reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("failed to take PTY writer")?;

        // Spawn the PTY reader thread.
        let (tx, rx) = tokio_mpsc::unbounded_channel::<Vec<u8>>();
        std::thread::spawn(move || {
            let mut reader = reader;
            let mut buf = [0u8; 4096];
            loop {
                match std::io::Read::read(&mut reader, &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("PTY reader thread exited");
        });

        // Build the alacritty_terminal Term.
        let (events_tx, events_rx) = tokio_mpsc::unbounded_channel::<TermEvent>();
        let term_config = TermConfig {
            scrolling_history: config.terminal.scrollback,
            ..TermConfig::default()
        };
        let size = TermSize::new(cols, rows);
        let term = Term::new(term_config, &size, ChannelListener { tx: events_tx });

        Ok(Self {
            term,
            processor: Processor::new(),
            rx,
            events_rx,
            pty_writer: writer,
            pty_master: pair.master,
            child,
            font: font_data,
            font_size,
            default_font_size: font_size,
            cell_width,
            cell_height,
            pixel_width: width,
            pixel_height: height,
            origin: (pad_px, 0.0),
            cols,
            rows,
            title: None,
            theme: Theme::from_config(config),
        })
    }

    /// Drain all pending PTY output bytes from the channel, feed them to
    /// the terminal state machine, and service the events that processing
    /// produced (query replies written back to the PTY, title changes).
    ///
    /// Must be called from the main thread (render loop) before each frame.
    pub fn drain_output(&mut self) {
        while let Ok(chunk) = self.rx.try_recv() {
            self.processor.advance(&mut self.term, &chunk);
        }

        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                TermEvent::PtyWrite(text) => {
                    let _ = self.pty_writer.write_all(text.as_bytes());
                    let _ = self.pty_writer.flush();
                }
                TermEvent::Title(title) => self.title = Some(title),
                TermEvent::ResetTitle => self.title = None,
                _ => {}
            }
        }
    }

    /// Title requested by the running program, if any.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Resize the terminal to fit the given pixel area.
    ///
    /// Called when the window is resized or the pane becomes active.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.pixel_width = width;
        self.pixel_height = height;

        let pad_px = self.cell_width as f64 * TERM_PAD_CELLS as f64;
        let usable_width = (width - pad_px * 2.0).max(0.0);
        let new_cols = ((usable_width / self.cell_width as f64).floor() as usize).max(2);
        let new_rows = ((height / self.cell_height as f64).floor() as usize).max(1);

        if new_cols == self.cols && new_rows == self.rows {
            return;
        }

        self.cols = new_cols;
        self.rows = new_rows;

        // Resize the PTY (delivers SIGWINCH to the child).
        let _ = self.pty_master.resize(PtySize {
            rows: new_rows as u16,
            cols: new_cols as u16,
            pixel_width: width as u16,
            pixel_height: height as u16,
        });

        // Resize the terminal grid.
        let new_size = TermSize::new(new_cols, new_rows);
        self.term.resize(new_size);
    }

    /// Write a key event to the PTY.
    ///
    /// Returns `true` if the key was consumed (written to the PTY).
    pub fn write_key(&mut self, key: &Key, ctrl_held: bool) -> bool {
        let bytes = key_event_to_pty_bytes(key, ctrl_held);
        if bytes.is_empty() {
            return false;
        }
        let _ = self.pty_writer.write_all(&bytes);
        let _ = self.pty_writer.flush();
        true
    }

    /// Write pasted text to the PTY, bracketed when the running program
    /// has requested bracketed-paste mode.
    pub fn paste(&mut self, text: &str) {
        let bracketed = self.term.mode().contains(TermMode::BRACKETED_PASTE);
        if bracketed {
            let _ = self.pty_writer.write_all(b"\x1b[200~");
            let _ = self.pty_writer.write_all(text.as_bytes());
            let _ = self.pty_writer.write_all(b"\x1b[201~");
        } else {
            // Line endings are normalised to CR, which is what the line
            // discipline expects from interactive input.
            let converted = text.replace("\r\n", "\r").replace('\n', "\r");
            let _ = self.pty_writer.write_all(converted.as_bytes());
        }
        let _ = self.pty_writer.flush();
    }

    /// Scroll the viewport by `delta` lines (positive = into history).
    pub fn scroll(&mut self, delta: i32) {
        self.term.scroll_display(Scroll::Delta(delta));
    }

    /// Snap the viewport back to the live screen.
    pub fn scroll_to_bottom(&mut self) {
        self.term.scroll_display(Scroll::Bottom);
    }

    /// Whether the running program has enabled mouse reporting.
    pub fn mouse_reporting_active(&self) -> bool {
        self.term.mode().intersects(TermMode::MOUSE_MODE)
    }

    /// Report a mouse button event at a grid cell to the running program.
    ///
    /// `button` follows xterm encoding (0 left, 1 middle, 2 right,
    /// 64/65 wheel). SGR encoding is used when negotiated; otherwise the
    /// legacy X10 bytes, whose coordinates saturate at their format limit.
    pub fn report_mouse_button(&mut self, button: u8, col: usize, row: usize, pressed: bool) {
        let sgr = self.term.mode().contains(TermMode::SGR_MOUSE);
        if sgr {
            let suffix = if pressed { 'M' } else { 'm' };
            let seq = format!("\x1b[<{};{};{}{}", button, col + 1, row + 1, suffix);
            let _ = self.pty_writer.write_all(seq.as_bytes());
        } else {
            let code = if pressed { button } else { 3 };
            let cb = 32 + code;
            let cx = (32 + col + 1).min(255) as u8;
            let cy = (32 + row + 1).min(255) as u8;
            let _ = self.pty_writer.write_all(&[0x1b, b'[', b'M', cb, cx, cy]);
        }
        let _ = self.pty_writer.flush();
    }

    /// Grid cell under a window-space point, if inside the text area.
    pub fn cell_at(&self, window_pos: (f64, f64)) -> Option<(usize, usize)> {
        let (lx, ly) = self.to_local(window_pos);
        if lx < 0.0 || ly < 0.0 {
            return None;
        }
        let col = (lx / self.cell_width as f64).floor() as usize;
        let row = (ly / self.cell_height as f64).floor() as usize;
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some((col, row))
    }

    /// Increase font size by one step (Cmd+=).
    pub fn increase_font_size(&mut self) {
        self.set_font_size(self.font_size + font::FONT_SIZE_STEP);
    }

    /// Decrease font size by one step (Cmd+-).
    pub fn decrease_font_size(&mut self) {
        self.set_font_size(self.font_size - font::FONT_SIZE_STEP);
    }

    /// Reset font size to the configured default (Cmd+0).
    pub fn reset_font_size(&mut self) {
        self.set_font_size(self.default_font_size);
    }

    /// Apply reloaded settings: colors immediately, font size via the
    /// zoom path so the grid follows.
    pub fn apply_config(&mut self, config: &Config) {
        self.theme = Theme::from_config(config);
        self.default_font_size = font::clamp_font_size(config.font.size);
        self.set_font_size(self.default_font_size);
    }

    /// Replace the font (config reload with a different font file).
    pub fn set_font(&mut self, font_data: FontData) {
        self.font = font_data;
        let (cw, ch) = font::cell_geometry(&self.font, self.font_size)
            .unwrap_or_else(|| font::fallback_geometry(self.font_size));
        self.cell_width = cw;
        self.cell_height = ch;
        self.resize(self.pixel_width, self.pixel_height);
    }

    /// Set font size, recompute cell dimensions, and resize the terminal grid.
    fn set_font_size(&mut self, size: f32) {
        let size = font::clamp_font_size(size);
        if (size - self.font_size).abs() < 0.01 {
            return;
        }
        self.font_size = size;
        let (cw, ch) = font::cell_geometry(&self.font, size)
            .unwrap_or_else(|| font::fallback_geometry(size));
        self.cell_width = cw;
        self.cell_height = ch;
        // Re-derive cols/rows from stored pixel dimensions and trigger PTY + grid resize.
        self.resize(self.pixel_width, self.pixel_height);
    }

    /// Render the terminal cell grid into a vello `Scene`.
    ///
    /// `offset_x` and `offset_y` are the top-left pixel position of the
    /// terminal area within the window. `underline` is the link the hover
    /// overlay wants decorated, if any; at most one is drawn.
    pub fn render_into_scene(
        &mut self,
        scene: &mut Scene,
        offset_x: f64,
        offset_y: f64,
        width: f64,
        height: f64,
        underline: Option<&UrlMatch>,
    ) {
        // Background fill.
        let bg_rect = Rect::new(offset_x, offset_y, offset_x + width, offset_y + height);
        scene.fill(Fill::NonZero, Affine::IDENTITY, self.theme.bg, None, &bg_rect);

        let cw = self.cell_width as f64;
        let ch = self.cell_height as f64;

        // Horizontal padding (one cell width on each side).
        let pad_px = cw * TERM_PAD_CELLS as f64;
        let offset_x = offset_x + pad_px;
        self.origin = (offset_x, offset_y);

        let content = self.term.renderable_content();
        let colors = content.colors;
        let display_offset = content.display_offset as i32;

        // Accumulate glyphs per color so each color group is one draw call.
        let mut fg_glyphs: Vec<(Color, Vec<Glyph>)> = Vec::new();

        for cell in content.display_iter {
            let col = cell.point.column.0;
            // Grid lines go negative into scrollback history; shift by the
            // display offset so row 0 is the top of the viewport.
            let viewport_row = cell.point.line.0 + display_offset;
            if viewport_row < 0 {
                continue;
            }
            let row = viewport_row as usize;

            // Skip cells outside the viewport.
            if col >= self.cols || row >= self.rows {
                continue;
            }

            let cell_x = offset_x + col as f64 * cw;
            let cell_y = offset_y + row as f64 * ch;

            // Compute background and foreground colors.
            let (bg_color, fg_color) = resolve_cell_colors(&cell.cell, colors, &self.theme);

            // Draw background if not the default terminal bg.
            if bg_color != self.theme.bg {
                let rect = Rect::new(cell_x, cell_y, cell_x + cw, cell_y + ch);
                scene.fill(Fill::NonZero, Affine::IDENTITY, bg_color, None, &rect);
            }

            // Skip wide-char spacers and empty cells.
            let ch_val = cell.cell.c;
            if ch_val == ' ' || ch_val == '\0' || cell.cell.flags.contains(Flags::WIDE_CHAR_SPACER) {
                continue;
            }

            // Resolve glyph ID.
            let font_ref = skrifa::FontRef::from_index(self.font.data.as_ref(), self.font.index);
            if let Ok(font_ref) = font_ref {
                use skrifa::MetadataProvider;
                let charmap = font_ref.charmap();
                let gid = charmap.map(ch_val).unwrap_or_default();
                let baseline_y = cell_y + ch * 0.8;
                let glyph = Glyph {
                    id: gid.to_u32(),
                    x: cell_x as f32,
                    y: baseline_y as f32,
                };
                // Batch with existing glyphs of the same color, or start new batch.
                if let Some(batch) = fg_glyphs.iter_mut().find(|(c, _)| *c == fg_color) {
                    batch.1.push(glyph);
                } else {
                    fg_glyphs.push((fg_color, vec![glyph]));
                }
            }
        }

        // Flush all glyph batches.
        for (color, glyphs) in fg_glyphs {
            scene
                .draw_glyphs(&self.font)
                .font_size(self.font_size)
                .brush(&color)
                .draw(Fill::NonZero, glyphs.into_iter());
        }

        // Underline decoration for the hovered link.
        if let Some(m) = underline {
            if m.row < self.rows {
                let start = m.start_col.min(self.cols);
                let end = m.end_col.min(self.cols);
                if start < end {
                    let x0 = offset_x + start as f64 * cw;
                    let x1 = offset_x + end as f64 * cw;
                    let y = offset_y + m.row as f64 * ch + ch * 0.8 + 2.0;
                    let rect = Rect::new(x0, y, x1, y + 1.5);
                    scene.fill(Fill::NonZero, Affine::IDENTITY, self.theme.fg, None, &rect);
                }
            }
        }

        // Draw cursor. SHOW_CURSOR tracks DECTCEM; full-screen programs
        // hide the cursor with it during redraws.
        if content.mode.contains(TermMode::SHOW_CURSOR) {
            let cursor = content.cursor;
            if cursor.shape != CursorShape::Hidden {
                let col = cursor.point.column.0;
                // cursor.point.line is relative to the scroll history; convert
                // to a viewport row via display_offset.
                let viewport_row = cursor.point.line.0 + display_offset;
                if viewport_row >= 0 && viewport_row < self.rows as i32 && col < self.cols {
                    let row = viewport_row as usize;
                    let cx = offset_x + col as f64 * cw;
                    let cy = offset_y + row as f64 * ch;
                    let cursor_rect = Rect::new(cx, cy, cx + cw, cy + ch);
                    scene.fill(
                        Fill::NonZero,
                        Affine::IDENTITY,
                        self.theme.cursor,
                        None,
                        &cursor_rect,
                    );
                }
            }
        }
    }
}

impl Drop for TerminalPane {
    fn drop(&mut self) {
        // The child gets SIGHUP from PTY closure, but an explicit kill is
        // surer for programs that detach from the controlling terminal.
        let _ = self.child.kill();
    }
}

// ---------------------------------------------------------------------------
// Grid queries for the link-hover overlay
// ---------------------------------------------------------------------------

impl TerminalHost for TerminalPane {
    fn row_count(&self) -> usize {
        self.rows
    }

    /// Text of one visible row, rebuilt from the live grid on every call.
    ///
    /// Wide-char spacers and empty cells read as spaces so column indices
    /// stay aligned with the rendered grid.
    fn row_text(&self, row: usize) -> String {
        if row >= self.rows {
            return String::new();
        }
        let content = self.term.renderable_content();
        let display_offset = content.display_offset as i32;

        let mut chars = vec![' '; self.cols];
        for cell in content.display_iter {
            let viewport_row = cell.point.line.0 + display_offset;
            if viewport_row != row as i32 {
                continue;
            }
            let col = cell.point.column.0;
            if col >= self.cols {
                continue;
            }
            let c = cell.cell.c;
            chars[col] = if c == '\0' || cell.cell.flags.contains(Flags::WIDE_CHAR_SPACER) {
                ' '
            } else {
                c
            };
        }
        chars.into_iter().collect()
    }

    fn cell_geometry(&self) -> Option<(f32, f32)> {
        font::cell_geometry(&self.font, self.font_size)
    }

    fn view_size(&self) -> (f32, f32) {
        (
            self.cols as f32 * self.cell_width,
            self.rows as f32 * self.cell_height,
        )
    }

    fn to_local(&self, window_pos: (f64, f64)) -> (f64, f64) {
        (window_pos.0 - self.origin.0, window_pos.1 - self.origin.1)
    }
}

// ---------------------------------------------------------------------------
// Shell command construction
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
const FALLBACK_SHELL: &str = "/bin/zsh";
#[cfg(not(target_os = "macos"))]
const FALLBACK_SHELL: &str = "/bin/bash";

/// Build the child command: program, arguments, environment, working dir.
fn build_command(config: &Config, command: Option<&[String]>, working_dir: Option<&str>) -> CommandBuilder {
    let (program, args): (String, Vec<String>) = match command {
        Some([program, args @ ..]) => (program.clone(), args.to_vec()),
        _ => {
            let program = if !config.shell.program.is_empty() {
                config.shell.program.clone()
            } else {
                std::env::var("SHELL").unwrap_or_else(|_| FALLBACK_SHELL.to_string())
            };
            (program, config.shell.args.clone())
        }
    };

    let mut cmd = CommandBuilder::new(&program);
    for arg in &args {
        cmd.arg(arg);
    }
    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    cmd.env("TERM_PROGRAM", "hoverterm");
    // A stale multiplexer variable inherited from the parent session
    // confuses tools that probe for it inside the new shell.
    cmd.env_remove("TMUX");
    cmd.env_remove("STY");
    for (k, v) in &config.shell.env {
        cmd.env(k, v);
    }

    let cwd = working_dir
        .map(str::to_string)
        .or_else(|| {
            (!config.shell.working_dir.is_empty()).then(|| config.shell.working_dir.clone())
        })
        .or_else(|| std::env::var("HOME").ok());
    if let Some(dir) = cwd {
        cmd.cwd(dir);
    }

    cmd
}

// ---------------------------------------------------------------------------
// Color resolution
// ---------------------------------------------------------------------------

/// Resolve terminal cell fg/bg colors to vello `Color` values.
///
/// Handles `Named`, `Indexed`, and `Spec` (true-color) variants.
/// Falls back to theme defaults for colors not present in the palette.
fn resolve_cell_colors(
    cell: &alacritty_terminal::term::cell::Cell,
    colors: &alacritty_terminal::term::color::Colors,
    theme: &Theme,
) -> (Color, Color) {
    let flags = cell.flags;
    let inverted = flags.contains(Flags::INVERSE);

    let mut fg = resolve_color(&cell.fg, colors, theme, /* is_fg */ true);
    let mut bg = resolve_color(&cell.bg, colors, theme, /* is_fg */ false);

    if inverted {
        std::mem::swap(&mut fg, &mut bg);
    }

    (bg, fg)
}

fn resolve_color(
    color: &AlaColor,
    colors: &alacritty_terminal::term::color::Colors,
    theme: &Theme,
    is_fg: bool,
) -> Color {
    match color {
        AlaColor::Spec(rgb) => rgb_to_color(*rgb),
        AlaColor::Named(named) => {
            // Try the runtime palette first (programs can redefine entries
            // with OSC 4); fall back to the configured theme.
            if let Some(rgb) = colors[*named] {
                return rgb_to_color(rgb);
            }
            named_color_fallback(*named, theme, is_fg)
        }
        AlaColor::Indexed(idx) => {
            if let Some(rgb) = colors[*idx as usize] {
                return rgb_to_color(rgb);
            }
            if (*idx as usize) < 16 {
                return theme.ansi[*idx as usize];
            }
            // 256-color palette fallback.
            indexed_color_fallback(*idx, theme)
        }
    }
}

fn rgb_to_color(rgb: Rgb) -> Color {
    Color::new([
        rgb.r as f32 / 255.0,
        rgb.g as f32 / 255.0,
        rgb.b as f32 / 255.0,
        1.0,
    ])
}

/// Map the 16 ANSI names onto the configured palette.
fn named_color_fallback(named: NamedColor, theme: &Theme, is_fg: bool) -> Color {
    match named {
        NamedColor::Black => theme.ansi[0],
        NamedColor::Red => theme.ansi[1],
        NamedColor::Green => theme.ansi[2],
        NamedColor::Yellow => theme.ansi[3],
        NamedColor::Blue => theme.ansi[4],
        NamedColor::Magenta => theme.ansi[5],
        NamedColor::Cyan => theme.ansi[6],
        NamedColor::White => theme.ansi[7],
        NamedColor::BrightBlack => theme.ansi[8],
        NamedColor::BrightRed => theme.ansi[9],
        NamedColor::BrightGreen => theme.ansi[10],
        NamedColor::BrightYellow => theme.ansi[11],
        NamedColor::BrightBlue => theme.ansi[12],
        NamedColor::BrightMagenta => theme.ansi[13],
        NamedColor::BrightCyan => theme.ansi[14],
        NamedColor::BrightWhite => theme.ansi[15],
        NamedColor::Foreground => theme.fg,
        NamedColor::Background => theme.bg,
        NamedColor::Cursor => theme.cursor,
        _ => if is_fg { theme.fg } else { theme.bg },
    }
}

/// Generate a color from the xterm 256-color cube for indices 16..=255.
fn indexed_color_fallback(idx: u8, theme: &Theme) -> Color {
    if idx < 16 {
        // Named colors range — handled by the caller normally.
        return theme.fg;
    }
    if idx < 232 {
        // 6x6x6 color cube: indices 16..=231
        let idx = (idx - 16) as u32;
        let b = idx % 6;
        let g = (idx / 6) % 6;
        let r = idx / 36;
        let to_f = |v: u32| -> f32 { if v == 0 { 0.0 } else { (55 + v * 40) as f32 / 255.0 } };
        return Color::new([to_f(r), to_f(g), to_f(b), 1.0]);
    }
    // Grayscale ramp: indices 232..=255
    let level = (idx - 232) as f32;
    let v = (8.0 + level * 10.0) / 255.0;
    Color::new([v, v, v, 1.0])
}

// ---------------------------------------------------------------------------
// Key → PTY bytes
// ---------------------------------------------------------------------------

/// Convert a winit keyboard event to the byte sequence to send to the PTY.
///
/// Returns an empty `Vec` if the key has no terminal meaning.
pub fn key_event_to_pty_bytes(key: &Key, ctrl_held: bool) -> Vec<u8> {
    match key {
        Key::Character(c) => {
            let s = c.as_str();
            if ctrl_held {
                // Control characters: Ctrl+A..Z → \x01..\x1a
                if let Some(ch) = s.chars().next() {
                    let ch = ch.to_ascii_lowercase();
                    if ch >= 'a' && ch <= 'z' {
                        return vec![ch as u8 - b'a' + 1];
                    }
                    // Special ctrl sequences
                    match ch {
                        '[' => return vec![0x1b],     // Ctrl+[ = ESC
                        '\\' => return vec![0x1c],
                        ']' => return vec![0x1d],
                        '^' => return vec![0x1e],
                        '_' => return vec![0x1f],
                        ' ' => return vec![0x00],     // Ctrl+Space = NUL
                        _ => {}
                    }
                }
            }
            s.as_bytes().to_vec()
        }
        Key::Named(named) => match named {
            NamedKey::Enter => vec![b'\r'],
            NamedKey::Backspace => vec![0x7f],
            NamedKey::Tab => vec![b'\t'],
            NamedKey::Escape => vec![0x1b],
            NamedKey::Delete => b"\x1b[3~".to_vec(),
            // Arrow keys (normal cursor mode).
            NamedKey::ArrowUp => b"\x1b[A".to_vec(),
            NamedKey::ArrowDown => b"\x1b[B".to_vec(),
            NamedKey::ArrowRight => b"\x1b[C".to_vec(),
            NamedKey::ArrowLeft => b"\x1b[D".to_vec(),
            // Navigation keys.
            NamedKey::Home => b"\x1b[H".to_vec(),
            NamedKey::End => b"\x1b[F".to_vec(),
            NamedKey::PageUp => b"\x1b[5~".to_vec(),
            NamedKey::PageDown => b"\x1b[6~".to_vec(),
            // Space (winit may emit space as Named(Space) instead of Character(" ")).
            NamedKey::Space => vec![b' '],
            // Insert key.
            NamedKey::Insert => b"\x1b[2~".to_vec(),
            // Function keys F1-F12 (standard xterm sequences).
            NamedKey::F1 => b"\x1bOP".to_vec(),
            NamedKey::F2 => b"\x1bOQ".to_vec(),
            NamedKey::F3 => b"\x1bOR".to_vec(),
            NamedKey::F4 => b"\x1bOS".to_vec(),
            NamedKey::F5 => b"\x1b[15~".to_vec(),
            NamedKey::F6 => b"\x1b[17~".to_vec(),
            NamedKey::F7 => b"\x1b[18~".to_vec(),
            NamedKey::F8 => b"\x1b[19~".to_vec(),
            NamedKey::F9 => b"\x1b[20~".to_vec(),
            NamedKey::F10 => b"\x1b[21~".to_vec(),
            NamedKey::F11 => b"\x1b[23~".to_vec(),
            NamedKey::F12 => b"\x1b[24~".to_vec(),
            _ => vec![],
        },
        _ => vec![],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_chords_map_to_control_bytes() {
        assert_eq!(
            key_event_to_pty_bytes(&Key::Character("c".into()), true),
            vec![0x03]
        );
        assert_eq!(
            key_event_to_pty_bytes(&Key::Character("a".into()), true),
            vec![0x01]
        );
        assert_eq!(
            key_event_to_pty_bytes(&Key::Character("[".into()), true),
            vec![0x1b]
        );
    }

    #[test]
    fn plain_characters_pass_through() {
        assert_eq!(
            key_event_to_pty_bytes(&Key::Character("l".into()), false),
            b"l".to_vec()
        );
        assert_eq!(
            key_event_to_pty_bytes(&Key::Character("é".into()), false),
            "é".as_bytes().to_vec()
        );
    }

    #[test]
    fn named_keys_encode_standard_sequences() {
        assert_eq!(
            key_event_to_pty_bytes(&Key::Named(NamedKey::Enter), false),
            vec![b'\r']
        );
        assert_eq!(
            key_event_to_pty_bytes(&Key::Named(NamedKey::ArrowUp), false),
            b"\x1b[A".to_vec()
        );
        assert_eq!(
            key_event_to_pty_bytes(&Key::Named(NamedKey::F5), false),
            b"\x1b[15~".to_vec()
        );
        assert!(key_event_to_pty_bytes(&Key::Named(NamedKey::CapsLock), false).is_empty());
    }

    #[test]
    fn theme_resolves_all_palette_slots() {
        let theme = Theme::from_config(&Config::default());
        // Named and low-indexed colors come from the configured palette.
        let named = named_color_fallback(NamedColor::Red, &theme, true);
        assert_eq!(named, theme.ansi[1]);
        let bright = named_color_fallback(NamedColor::BrightWhite, &theme, true);
        assert_eq!(bright, theme.ansi[15]);
    }

    #[test]
    fn color_cube_endpoints() {
        let theme = Theme::from_config(&Config::default());
        // Index 16 is cube origin: black.
        let c = indexed_color_fallback(16, &theme);
        assert_eq!(c.components[0], 0.0);
        assert_eq!(c.components[1], 0.0);
        assert_eq!(c.components[2], 0.0);
        // Index 231 is cube max: white-ish (255).
        let c = indexed_color_fallback(231, &theme);
        assert!((c.components[0] - 1.0).abs() < 0.01);
        // Grayscale ramp end.
        let c = indexed_color_fallback(255, &theme);
        assert!((c.components[0] - (8.0 + 23.0 * 10.0) / 255.0).abs() < 0.001);
    }

    #[test]
    fn drained_output_lands_in_the_grid() {
        let font_data = font::load_terminal_font("").expect("discoverable monospace font");
        let cmd: Vec<String> = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "printf output-ok".to_string(),
        ];
        let mut pane =
            TerminalPane::spawn(&Config::default(), font_data, 800.0, 480.0, Some(cmd.as_slice()), None)
                .expect("spawn pane");

        // The reader thread delivers asynchronously; poll with a deadline.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            pane.drain_output();
            if pane.row_text(0).trim_end() == "output-ok" {
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "shell output never reached the grid; row 0 = {:?}",
                pane.row_text(0)
            );
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }
}
