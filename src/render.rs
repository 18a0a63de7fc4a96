use crate::config::SLOT_COUNT;
use crate::stream::FrameBuffer;
use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use std::fmt::Write as _;
use std::io::Write;

pub const GRID_ROWS: usize = 2;
pub const GRID_COLS: usize = 2;

const BRIGHTNESS_RAMP: &[u8] = b" .:-=+*#%@";

const MIN_SLOT_PIXEL_WIDTH: usize = 96;
const MIN_SLOT_PIXEL_HEIGHT: usize = 54;
const MAX_SLOT_PIXEL_WIDTH: usize = 960;
const MAX_SLOT_PIXEL_HEIGHT: usize = 540;

/// Decode target for one slot, in pixels. Broadcast to the stream workers
/// through a watch channel; workers cap it at the source frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGeometry {
    pub width: usize,
    pub height: usize,
}

impl Default for SlotGeometry {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
        }
    }
}

/// Paints decoded frames into the 2x2 grid. With kitty graphics support the
/// frames go out as positioned RGB images after each ratatui draw; without it
/// the slots fall back to ASCII cells rendered inside the grid panels.
pub struct GridRenderer {
    kitty_enabled: bool,
    images_drawn: bool,
    surfaces: Vec<SlotSurface>,
}

#[derive(Default)]
struct SlotSurface {
    frame: Option<FrameBuffer>,
    encoded_seq: u64,
    encoded_payload: String,
    control_buf: String,
    row: u32,
    col: u32,
    cell_cols: u16,
    cell_rows: u16,
}

impl GridRenderer {
    pub fn new(kitty_enabled: bool) -> Self {
        Self {
            kitty_enabled,
            images_drawn: false,
            surfaces: (0..SLOT_COUNT).map(|_| SlotSurface::default()).collect(),
        }
    }

    pub fn kitty_enabled(&self) -> bool {
        self.kitty_enabled
    }

    /// Stores the newest frame for a slot. The replaced frame's buffer comes
    /// back so the caller can route it to the stream manager for reuse.
    pub fn update(&mut self, slot: usize, frame: FrameBuffer) -> Option<FrameBuffer> {
        let surface = self.surfaces.get_mut(slot)?;
        surface.frame.replace(frame)
    }

    /// Sequence number of the frame currently held for a slot; zero when the
    /// slot has never shown one.
    pub fn frame_seq(&self, slot: usize) -> u64 {
        self.surfaces
            .get(slot)
            .and_then(|surface| surface.frame.as_ref())
            .map_or(0, |frame| frame.seq)
    }

    /// ASCII rendition of the slot's current frame, sized to the panel.
    pub fn ascii_frame(&self, slot: usize, cols: usize, rows: usize) -> Option<String> {
        let frame = self.surfaces.get(slot)?.frame.as_ref()?;
        Some(rgb_to_ascii(
            &frame.rgb,
            frame.width,
            frame.height,
            cols,
            rows,
        ))
    }

    /// Uploads every slot whose frame or placement changed since the last
    /// flush, as one batched write. Placement comes from `grid`, so this must
    /// run after the surrounding panels were drawn for the same rects.
    pub fn flush_graphics(&mut self, out: &mut impl Write, grid: &[Rect]) -> Result<()> {
        if !self.kitty_enabled {
            return Ok(());
        }

        let mut batch = Vec::with_capacity(16 * 1024);
        for idx in 0..self.surfaces.len() {
            if idx >= grid.len() {
                break;
            }
            let surface = &mut self.surfaces[idx];

            let inner = inner_cell(grid[idx]);
            if inner.width < 2 || inner.height < 2 {
                continue;
            }
            let Some(frame) = surface.frame.as_ref() else {
                continue;
            };
            if frame.rgb.is_empty() || frame.width == 0 || frame.height == 0 {
                continue;
            }

            let row = u32::from(inner.y) + 1;
            let col = u32::from(inner.x) + 1;
            let cell_cols = inner.width.max(1);
            let cell_rows = inner.height.max(1);

            let frame_changed = surface.encoded_seq != frame.seq;
            let placement_changed = surface.row != row
                || surface.col != col
                || surface.cell_cols != cell_cols
                || surface.cell_rows != cell_rows;
            if !frame_changed && !placement_changed {
                continue;
            }

            surface.encoded_payload.clear();
            BASE64_ENGINE.encode_string(frame.rgb.as_slice(), &mut surface.encoded_payload);
            surface.control_buf.clear();
            let _ = write!(
                &mut surface.control_buf,
                "a=T,f=24,s={},v={},i={},p=1,c={},r={},C=1,z=-1,q=2",
                frame.width,
                frame.height,
                idx + 1,
                cell_cols,
                cell_rows
            );

            let _ = write!(&mut batch, "\x1b[{row};{col}H");
            push_kitty_chunked_bytes(&mut batch, &surface.control_buf, &surface.encoded_payload);

            surface.encoded_seq = frame.seq;
            surface.row = row;
            surface.col = col;
            surface.cell_cols = cell_cols;
            surface.cell_rows = cell_rows;
        }

        if !batch.is_empty() {
            out.write_all(&batch)
                .context("failed writing batched kitty graphics")?;
            out.flush().context("failed flushing kitty graphics")?;
            self.images_drawn = true;
        }
        Ok(())
    }

    /// Deletes every placed image. No-op until something was drawn.
    pub fn clear_images(&mut self, out: &mut impl Write) -> Result<()> {
        if !self.images_drawn {
            return Ok(());
        }
        out.write_all(b"\x1b_Ga=d,d=A,q=2;\x1b\\")
            .context("failed clearing kitty images")?;
        out.flush().context("failed flushing kitty clear")?;
        self.images_drawn = false;
        Ok(())
    }

    /// Drops all held frames and upload state, forcing full uploads after the
    /// next round of streams starts.
    pub fn reset(&mut self) {
        for surface in &mut self.surfaces {
            *surface = SlotSurface::default();
        }
    }
}

/// Splits the terminal into the config bar, the stream grid, and the key
/// hint footer.
pub fn view_layout(area: Rect) -> (Rect, Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(area);
    (chunks[0], chunks[1], chunks[2])
}

/// The four slot rects, row-major, each quadrant letterboxed to the video
/// aspect so frames are not stretched.
pub fn grid_rects(area: Rect) -> Vec<Rect> {
    let (aspect_w, aspect_h) = tile_cell_aspect();
    let row_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Fill(1); GRID_ROWS])
        .split(area);

    let mut rects = Vec::with_capacity(GRID_ROWS * GRID_COLS);
    for row_area in row_chunks.iter().copied() {
        let col_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Fill(1); GRID_COLS])
            .split(row_area);
        for col_area in col_chunks.iter().copied() {
            rects.push(fit_rect_to_aspect(col_area, aspect_w, aspect_h));
        }
    }

    rects
}

/// 16:9 video expressed in character cells, correcting for cells being
/// roughly twice as tall as they are wide.
fn tile_cell_aspect() -> (u32, u32) {
    let default = (32_u32, 9_u32);
    let Ok(window) = crossterm::terminal::window_size() else {
        return default;
    };

    if window.columns == 0 || window.rows == 0 || window.width == 0 || window.height == 0 {
        return default;
    }

    // PixelAspect = (cols/rows) * (cell_width/cell_height), so:
    // cols/rows target = (video_w/video_h) * (cell_height/cell_width)
    // Use integer math: w:h = 16*height*columns : 9*rows*width
    let numer = 16_u64
        .saturating_mul(u64::from(window.height))
        .saturating_mul(u64::from(window.columns));
    let denom = 9_u64
        .saturating_mul(u64::from(window.rows))
        .saturating_mul(u64::from(window.width));
    if numer == 0 || denom == 0 {
        return default;
    }

    let gcd = gcd_u64(numer, denom).max(1);
    let reduced_w = (numer / gcd).min(u64::from(u32::MAX));
    let reduced_h = (denom / gcd).min(u64::from(u32::MAX));
    (
        u32::try_from(reduced_w).unwrap_or(default.0).max(1),
        u32::try_from(reduced_h).unwrap_or(default.1).max(1),
    )
}

fn gcd_u64(mut left: u64, mut right: u64) -> u64 {
    while right != 0 {
        let rem = left % right;
        left = right;
        right = rem;
    }
    left
}

fn fit_rect_to_aspect(area: Rect, aspect_w: u32, aspect_h: u32) -> Rect {
    if area.width == 0 || area.height == 0 || aspect_w == 0 || aspect_h == 0 {
        return area;
    }

    let area_w = u32::from(area.width);
    let area_h = u32::from(area.height);

    let (target_w, target_h) = if area_w.saturating_mul(aspect_h) > area_h.saturating_mul(aspect_w)
    {
        let h = area_h;
        let w = (h.saturating_mul(aspect_w) / aspect_h).max(1);
        (w, h)
    } else {
        let w = area_w;
        let h = (w.saturating_mul(aspect_h) / aspect_w).max(1);
        (w, h)
    };

    let target_w = u16::try_from(target_w.min(u32::from(area.width))).unwrap_or(area.width);
    let target_h = u16::try_from(target_h.min(u32::from(area.height))).unwrap_or(area.height);
    let offset_x = (area.width.saturating_sub(target_w)) / 2;
    let offset_y = (area.height.saturating_sub(target_h)) / 2;

    Rect {
        x: area.x.saturating_add(offset_x),
        y: area.y.saturating_add(offset_y),
        width: target_w,
        height: target_h,
    }
}

pub fn inner_cell(cell: Rect) -> Rect {
    Rect {
        x: cell.x.saturating_add(1),
        y: cell.y.saturating_add(1),
        width: cell.width.saturating_sub(2),
        height: cell.height.saturating_sub(2),
    }
}

/// Pixel decode target for a slot drawn inside `inner`.
pub fn slot_pixel_geometry(inner: Rect) -> SlotGeometry {
    let cell_px = terminal_cell_pixel_size().unwrap_or((8, 16));
    slot_pixel_geometry_for_cell(inner, cell_px)
}

fn slot_pixel_geometry_for_cell(
    inner: Rect,
    (cell_px_w, cell_px_h): (usize, usize),
) -> SlotGeometry {
    let cols = usize::from(inner.width.max(2));
    let rows = usize::from(inner.height.max(2));

    SlotGeometry {
        width: even_clamp(
            cols.saturating_mul(cell_px_w),
            MIN_SLOT_PIXEL_WIDTH,
            MAX_SLOT_PIXEL_WIDTH,
        ),
        height: even_clamp(
            rows.saturating_mul(cell_px_h),
            MIN_SLOT_PIXEL_HEIGHT,
            MAX_SLOT_PIXEL_HEIGHT,
        ),
    }
}

fn terminal_cell_pixel_size() -> Option<(usize, usize)> {
    let window = crossterm::terminal::window_size().ok()?;
    if window.columns == 0 || window.rows == 0 {
        return None;
    }

    let cell_px_w = usize::from((window.width / window.columns).max(1));
    let cell_px_h = usize::from((window.height / window.rows).max(1));
    Some((cell_px_w, cell_px_h))
}

fn even_clamp(value: usize, min: usize, max: usize) -> usize {
    let clamped = value.clamp(min, max);
    let even = clamped & !1;
    even.max(2)
}

/// Downsampled ASCII rendition of an RGB frame, one ramp glyph per cell.
pub fn rgb_to_ascii(
    rgb: &[u8],
    src_width: usize,
    src_height: usize,
    target_cols: usize,
    target_rows: usize,
) -> String {
    if rgb.is_empty() || src_width == 0 || src_height == 0 || target_cols == 0 || target_rows == 0 {
        return "no frame".to_owned();
    }

    let mut out = String::with_capacity(target_cols.saturating_mul(target_rows + 1));
    for ty in 0..target_rows {
        let sy = (ty.saturating_mul(src_height) / target_rows).min(src_height.saturating_sub(1));
        for tx in 0..target_cols {
            let sx = (tx.saturating_mul(src_width) / target_cols).min(src_width.saturating_sub(1));
            let idx = sy
                .saturating_mul(src_width)
                .saturating_add(sx)
                .saturating_mul(3);
            let (r, g, b) = match (rgb.get(idx), rgb.get(idx + 1), rgb.get(idx + 2)) {
                (Some(r), Some(g), Some(b)) => (u32::from(*r), u32::from(*g), u32::from(*b)),
                _ => (0, 0, 0),
            };
            // Integer BT.601 luma.
            let lum = ((77 * r + 150 * g + 29 * b) >> 8).min(255) as usize;
            let ramp_index = lum.saturating_mul(BRIGHTNESS_RAMP.len().saturating_sub(1)) / 255;
            out.push(char::from(BRIGHTNESS_RAMP[ramp_index]));
        }
        if ty + 1 < target_rows {
            out.push('\n');
        }
    }

    out
}

fn push_kitty_chunked_bytes(out: &mut Vec<u8>, control: &str, payload: &str) {
    const CHUNK: usize = 4_096;

    let mut offset = 0_usize;
    let payload_len = payload.len();

    while offset < payload_len {
        let next = (offset + CHUNK).min(payload_len);
        let chunk = &payload[offset..next];
        let more = if next < payload_len { b'1' } else { b'0' };

        out.extend_from_slice(b"\x1b_G");
        if offset == 0 {
            out.extend_from_slice(control.as_bytes());
            out.extend_from_slice(b",m=");
        } else {
            out.extend_from_slice(b"m=");
        }
        out.push(more);
        out.extend_from_slice(b";");
        out.extend_from_slice(chunk.as_bytes());
        out.extend_from_slice(b"\x1b\\");
        offset = next;
    }

    if payload_len == 0 {
        out.extend_from_slice(b"\x1b_G");
        out.extend_from_slice(control.as_bytes());
        out.extend_from_slice(b",m=0;\x1b\\");
    }
}

pub fn detect_kitty_graphics_support() -> bool {
    if let Some(explicit) = parse_bool_env("XVR_GRID_KITTY") {
        return explicit;
    }

    let term = std::env::var("TERM").unwrap_or_default().to_lowercase();
    let term_program = std::env::var("TERM_PROGRAM")
        .unwrap_or_default()
        .to_lowercase();

    // TERM and TERM_PROGRAM cover known values used by terminals that implement Kitty graphics.
    if term_or_program_indicates_kitty_graphics(&term, &term_program) {
        return true;
    }

    // Additional environment markers for terminals that often keep TERM as xterm-256color.
    [
        "KITTY_WINDOW_ID",
        "KITTY_PID",
        "WEZTERM_EXECUTABLE",
        "WEZTERM_PANE",
        "GHOSTTY_RESOURCES_DIR",
        "KONSOLE_VERSION",
        "KONSOLE_PROFILE_NAME",
    ]
    .into_iter()
    .any(|name| std::env::var_os(name).is_some())
}

fn term_or_program_indicates_kitty_graphics(term: &str, term_program: &str) -> bool {
    let term = term.to_ascii_lowercase();
    let term_program = term_program.to_ascii_lowercase();

    [
        "kitty",
        "ghostty",
        "wezterm",
        "foot",
        "foot-extra",
        "konsole",
    ]
    .into_iter()
    .any(|hint| term.contains(hint))
        || ["ghostty", "wezterm", "konsole"]
            .into_iter()
            .any(|hint| term_program.contains(hint))
}

fn parse_bool_env(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    parse_bool_value(&value)
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enable" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disable" | "disabled" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BASE64_ENGINE, GridRenderer, SlotGeometry, even_clamp, fit_rect_to_aspect,
        parse_bool_value, push_kitty_chunked_bytes, rgb_to_ascii, slot_pixel_geometry_for_cell,
        term_or_program_indicates_kitty_graphics,
    };
    use crate::stream::FrameBuffer;
    use base64::Engine as _;
    use ratatui::layout::Rect;

    fn test_frame(seq: u64) -> FrameBuffer {
        FrameBuffer {
            seq,
            width: 2,
            height: 2,
            rgb: vec![seq as u8; 12],
        }
    }

    #[test]
    fn kitty_term_hints_are_detected() {
        assert!(term_or_program_indicates_kitty_graphics(
            "xterm-kitty",
            "unknown"
        ));
        assert!(term_or_program_indicates_kitty_graphics(
            "wezterm", "unknown"
        ));
        assert!(term_or_program_indicates_kitty_graphics(
            "xterm-ghostty",
            "unknown"
        ));
        assert!(term_or_program_indicates_kitty_graphics("foot", "unknown"));
        assert!(term_or_program_indicates_kitty_graphics(
            "konsole", "unknown"
        ));
    }

    #[test]
    fn kitty_term_program_hints_are_detected() {
        assert!(term_or_program_indicates_kitty_graphics(
            "xterm-256color",
            "WezTerm"
        ));
        assert!(term_or_program_indicates_kitty_graphics(
            "xterm-256color",
            "Ghostty"
        ));
        assert!(!term_or_program_indicates_kitty_graphics(
            "xterm-256color",
            "Apple_Terminal"
        ));
    }

    #[test]
    fn bool_values_parse_as_expected() {
        assert_eq!(parse_bool_value("1"), Some(true));
        assert_eq!(parse_bool_value(" enabled "), Some(true));
        assert_eq!(parse_bool_value("0"), Some(false));
        assert_eq!(parse_bool_value("disabled"), Some(false));
        assert_eq!(parse_bool_value("maybe"), None);
    }

    #[test]
    fn chunked_payload_splits_at_chunk_size() {
        let payload = "A".repeat(5_000);
        let mut out = Vec::new();
        push_kitty_chunked_bytes(&mut out, "a=T,f=24", &payload);

        let text = String::from_utf8(out).expect("escape frames are ASCII");
        let mut frames = text.split("\x1b\\").filter(|part| !part.is_empty());

        let first = frames.next().expect("first chunk");
        assert!(first.starts_with("\x1b_Ga=T,f=24,m=1;"));
        assert_eq!(first.len(), "\x1b_Ga=T,f=24,m=1;".len() + 4_096);

        let second = frames.next().expect("second chunk");
        assert!(second.starts_with("\x1b_Gm=0;"));
        assert_eq!(second.len(), "\x1b_Gm=0;".len() + 904);

        assert!(frames.next().is_none());
    }

    #[test]
    fn empty_payload_still_emits_a_control_frame() {
        let mut out = Vec::new();
        push_kitty_chunked_bytes(&mut out, "a=d", "");
        assert_eq!(out, b"\x1b_Ga=d,m=0;\x1b\\");
    }

    #[test]
    fn even_clamp_bounds_and_rounds_down() {
        assert_eq!(even_clamp(319, 96, 960), 318);
        assert_eq!(even_clamp(10, 96, 960), 96);
        assert_eq!(even_clamp(4_000, 96, 960), 960);
        assert_eq!(even_clamp(0, 1, 1), 2);
    }

    #[test]
    fn wide_areas_letterbox_to_the_requested_aspect() {
        let area = Rect::new(0, 0, 100, 9);
        let fitted = fit_rect_to_aspect(area, 32, 9);
        assert_eq!(fitted.height, 9);
        assert_eq!(fitted.width, 32);
        assert_eq!(fitted.x, 34, "horizontal letterbox is centered");
    }

    #[test]
    fn tall_areas_letterbox_to_the_requested_aspect() {
        let area = Rect::new(0, 0, 32, 40);
        let fitted = fit_rect_to_aspect(area, 32, 9);
        assert_eq!(fitted.width, 32);
        assert_eq!(fitted.height, 9);
        assert_eq!(fitted.y, 15, "vertical letterbox is centered");
    }

    #[test]
    fn slot_pixel_geometry_respects_floor_and_cap() {
        let tiny = slot_pixel_geometry_for_cell(Rect::new(0, 0, 4, 2), (8, 16));
        assert_eq!(
            tiny,
            SlotGeometry {
                width: 96,
                height: 54
            }
        );

        let huge = slot_pixel_geometry_for_cell(Rect::new(0, 0, 400, 100), (8, 16));
        assert_eq!(
            huge,
            SlotGeometry {
                width: 960,
                height: 540
            }
        );

        let typical = slot_pixel_geometry_for_cell(Rect::new(0, 0, 40, 12), (8, 16));
        assert_eq!(
            typical,
            SlotGeometry {
                width: 320,
                height: 192
            }
        );
    }

    #[test]
    fn ascii_frames_map_luma_onto_the_ramp() {
        let black = vec![0_u8; 12];
        assert_eq!(rgb_to_ascii(&black, 2, 2, 2, 2), "  \n  ");

        let white = vec![255_u8; 12];
        assert_eq!(rgb_to_ascii(&white, 2, 2, 2, 2), "@@\n@@");

        assert_eq!(rgb_to_ascii(&[], 0, 0, 2, 2), "no frame");
    }

    #[test]
    fn update_returns_the_replaced_frame_for_recycling() {
        let mut renderer = GridRenderer::new(true);

        assert!(renderer.update(0, test_frame(1)).is_none());
        let replaced = renderer.update(0, test_frame(2)).expect("previous frame");
        assert_eq!(replaced.seq, 1);
        assert_eq!(renderer.frame_seq(0), 2);
        assert_eq!(renderer.frame_seq(1), 0);
    }

    #[test]
    fn flush_uploads_changed_slots_once() {
        let mut renderer = GridRenderer::new(true);
        renderer.update(0, test_frame(1));
        let grid = vec![
            Rect::new(0, 0, 20, 10),
            Rect::new(20, 0, 20, 10),
            Rect::new(0, 10, 20, 10),
            Rect::new(20, 10, 20, 10),
        ];

        let mut out = Vec::new();
        renderer.flush_graphics(&mut out, &grid).expect("flush");
        let text = String::from_utf8(out).expect("ASCII escape stream");
        assert!(text.starts_with("\x1b[2;2H"), "cursor moves into slot 0");
        assert!(text.contains("a=T,f=24,s=2,v=2,i=1,p=1,c=18,r=8,C=1,z=-1,q=2"));
        assert!(text.contains(&BASE64_ENGINE.encode(vec![1_u8; 12])));

        // Same frame, same placement: nothing to write.
        let mut out = Vec::new();
        renderer.flush_graphics(&mut out, &grid).expect("flush");
        assert!(out.is_empty());

        renderer.update(0, test_frame(2));
        let mut out = Vec::new();
        renderer.flush_graphics(&mut out, &grid).expect("flush");
        assert!(!out.is_empty(), "new frame re-uploads");
    }

    #[test]
    fn flush_writes_nothing_without_kitty_support() {
        let mut renderer = GridRenderer::new(false);
        renderer.update(0, test_frame(1));

        let mut out = Vec::new();
        renderer
            .flush_graphics(&mut out, &[Rect::new(0, 0, 20, 10)])
            .expect("flush");
        assert!(out.is_empty());
    }

    #[test]
    fn clear_images_only_fires_after_a_draw() {
        let mut renderer = GridRenderer::new(true);

        let mut out = Vec::new();
        renderer.clear_images(&mut out).expect("clear");
        assert!(out.is_empty(), "nothing drawn, nothing to delete");

        renderer.update(0, test_frame(1));
        let mut drawn = Vec::new();
        renderer
            .flush_graphics(&mut drawn, &[Rect::new(0, 0, 20, 10)])
            .expect("flush");
        assert!(!drawn.is_empty());

        let mut out = Vec::new();
        renderer.clear_images(&mut out).expect("clear");
        assert_eq!(out, b"\x1b_Ga=d,d=A,q=2;\x1b\\");
    }
}
