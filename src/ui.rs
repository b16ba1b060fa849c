use crate::geometry::Point;
use crate::model::Rgba;
use crate::render::Surface;
use crate::session::Session;
use ratatui::prelude::*;
use ratatui::symbols::Marker;
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine, Points};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Pixel footprint of one terminal cell on the drawing surface.
pub const CELL_WIDTH_PX: f64 = 8.0;
pub const CELL_HEIGHT_PX: f64 = 16.0;
/// Braille dots are a quarter cell high and half a cell wide: 4px either way.
const DOT_PX: f64 = 4.0;

const APP_TITLE: &str = "tracktrail";

#[derive(Clone, Copy)]
struct PanelColors {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
}

fn panel_colors(background: Rgba, played: Rgba) -> PanelColors {
    let bg = to_color(background, background);
    PanelColors {
        bg,
        panel_bg: Color::Rgb(
            background.r.saturating_add(8),
            background.g.saturating_add(8),
            background.b.saturating_add(10),
        ),
        border: Color::Rgb(104, 125, 142),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(150, 160, 172),
        accent: to_color(Rgba { a: 1.0, ..played }, background),
        alert: Color::Rgb(249, 174, 88),
    }
}

fn to_color(color: Rgba, background: Rgba) -> Color {
    let (r, g, b) = color.over(background);
    Color::Rgb(r, g, b)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PathOp {
    MoveTo(Point),
    LineTo(Point),
    Arc(Point, f64),
}

/// What a frame left on the surface, in surface pixels with the translation
/// already applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Line {
        from: Point,
        to: Point,
        width: f64,
        color: Rgba,
    },
    Ring {
        center: Point,
        radius: f64,
        color: Rgba,
    },
    Disc {
        center: Point,
        radius: f64,
        color: Rgba,
    },
}

/// Retained recording of canvas-style calls, painted onto a ratatui
/// braille canvas each terminal frame.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    width: f64,
    height: f64,
    offset: Point,
    path: Vec<PathOp>,
    line_width: f64,
    stroke_color: Rgba,
    fill_color: Rgba,
    shapes: Vec<Shape>,
}

impl CanvasSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            offset: Point::default(),
            path: Vec::new(),
            line_width: 1.0,
            stroke_color: Rgba::opaque(0, 0, 0),
            fill_color: Rgba::opaque(0, 0, 0),
            shapes: Vec::new(),
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    fn shift(&self, p: Point) -> Point {
        p.offset(self.offset.x, self.offset.y)
    }
}

impl Surface for CanvasSurface {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.clear();
    }

    fn clear(&mut self) {
        self.offset = Point::default();
        self.path.clear();
        self.shapes.clear();
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.offset = self.offset.offset(dx, dy);
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, p: Point) {
        let p = self.shift(p);
        self.path.push(PathOp::MoveTo(p));
    }

    fn line_to(&mut self, p: Point) {
        let p = self.shift(p);
        self.path.push(PathOp::LineTo(p));
    }

    fn arc(&mut self, center: Point, radius: f64) {
        let center = self.shift(center);
        self.path.push(PathOp::Arc(center, radius));
    }

    fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    fn set_stroke_color(&mut self, color: Rgba) {
        self.stroke_color = color;
    }

    fn set_fill_color(&mut self, color: Rgba) {
        self.fill_color = color;
    }

    fn stroke(&mut self) {
        let mut pen: Option<Point> = None;
        for op in &self.path {
            match *op {
                PathOp::MoveTo(p) => pen = Some(p),
                PathOp::LineTo(p) => {
                    if let Some(from) = pen {
                        self.shapes.push(Shape::Line {
                            from,
                            to: p,
                            width: self.line_width,
                            color: self.stroke_color,
                        });
                    }
                    pen = Some(p);
                }
                PathOp::Arc(center, radius) => {
                    self.shapes.push(Shape::Ring {
                        center,
                        radius,
                        color: self.stroke_color,
                    });
                    pen = Some(center.offset(radius, 0.0));
                }
            }
        }
    }

    // Only arcs enclose an area worth filling here.
    fn fill(&mut self) {
        for op in &self.path {
            if let PathOp::Arc(center, radius) = *op {
                self.shapes.push(Shape::Disc {
                    center,
                    radius,
                    color: self.fill_color,
                });
            }
        }
    }
}

pub fn area_pixels(area: Rect) -> (f64, f64) {
    (
        f64::from(area.width) * CELL_WIDTH_PX,
        f64::from(area.height) * CELL_HEIGHT_PX,
    )
}

/// Center of the cell under the pointer, in surface pixels. `None` outside
/// `area`.
pub fn cell_to_pixel(area: Rect, column: u16, row: u16) -> Option<Point> {
    if !area.contains(Position::new(column, row)) {
        return None;
    }
    Some(Point::new(
        (f64::from(column - area.x) + 0.5) * CELL_WIDTH_PX,
        (f64::from(row - area.y) + 0.5) * CELL_HEIGHT_PX,
    ))
}

fn pixel_to_cell(area: Rect, p: Point) -> Option<Position> {
    let column = (p.x / CELL_WIDTH_PX).floor();
    let row = (p.y / CELL_HEIGHT_PX).floor();
    if column < 0.0 || row < 0.0 {
        return None;
    }
    let (column, row) = (column as u16, row as u16);
    (column < area.width && row < area.height)
        .then(|| Position::new(area.x + column, area.y + row))
}

fn layout(area: Rect) -> [Rect; 3] {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(area);
    [vertical[0], vertical[1], vertical[2]]
}

/// Terminal area the drawing surface occupies.
pub fn canvas_rect(area: Rect) -> Rect {
    layout(area)[1]
}

pub fn draw(frame: &mut Frame, session: &Session, surface: &CanvasSurface) {
    let settings = session.settings();
    let background = settings.colors.background;
    let colors = panel_colors(background, settings.colors.played);
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let [header, body, status] = layout(frame.area());
    draw_header(frame, session, header, &colors);
    draw_canvas(frame, surface, background, body);

    if session.is_ready() {
        draw_tooltip(frame, session, body, &colors);
    } else {
        let message = Paragraph::new(Span::styled(
            "Loading track metadata...",
            Style::default().fg(colors.muted),
        ))
        .alignment(Alignment::Center);
        let middle = Rect {
            y: body.y + body.height / 2,
            height: 1.min(body.height),
            ..body
        };
        frame.render_widget(message, middle);
    }

    let status_color = if session.status().starts_with("playback error") {
        colors.alert
    } else {
        colors.muted
    };
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(format!(" {} ", session.status()), Style::default().fg(status_color)),
            Span::styled(
                "  space play/pause  1-9,0 volume  s animation  q quit",
                Style::default().fg(colors.muted),
            ),
        ])),
        status,
    );
}

fn draw_header(frame: &mut Frame, session: &Session, area: Rect, colors: &PanelColors) {
    frame.render_widget(
        panel_block(APP_TITLE, colors.panel_bg, colors.text, colors.border),
        area,
    );
    let inner = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(20),
            Constraint::Length(14),
            Constraint::Length(24),
        ])
        .split(inner);

    let now_playing = session.now_playing();
    let info = if now_playing.title.is_empty() {
        Line::from(Span::styled("Nothing playing", Style::default().fg(colors.muted)))
    } else {
        Line::from(vec![
            Span::styled(
                now_playing.title.clone(),
                Style::default()
                    .fg(colors.text)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}  ", now_playing.artist),
                Style::default().fg(colors.muted),
            ),
            Span::styled(now_playing.time.clone(), Style::default().fg(colors.accent)),
        ])
    };
    frame.render_widget(Paragraph::new(info), chunks[0]);

    frame.render_widget(
        Paragraph::new(Span::styled(
            format!("FPS {}", session.render_loop().fps_text()),
            Style::default().fg(colors.muted),
        ))
        .alignment(Alignment::Right),
        chunks[1],
    );

    let bars = session.volume_bars();
    let mut spans = vec![Span::styled(" vol ", Style::default().fg(colors.muted))];
    spans.extend((0..bars.levels()).map(|index| {
        let color = if bars.is_on(index) {
            colors.accent
        } else {
            colors.border
        };
        Span::styled(bar_glyph(index, bars.levels()), Style::default().fg(color))
    }));
    frame.render_widget(Paragraph::new(Line::from(spans)), chunks[2]);
}

fn bar_glyph(index: u8, levels: u8) -> &'static str {
    const GLYPHS: [&str; 8] = ["▁", "▂", "▃", "▄", "▅", "▆", "▇", "█"];
    let step = usize::from(index) * GLYPHS.len() / usize::from(levels.max(1));
    GLYPHS[step.min(GLYPHS.len() - 1)]
}

fn draw_canvas(frame: &mut Frame, surface: &CanvasSurface, background: Rgba, area: Rect) {
    let (width, height) = surface.size();
    let canvas = Canvas::default()
        .background_color(to_color(background, background))
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            // Canvas y grows upwards.
            let flip = |p: Point| (p.x, height - p.y);
            for shape in surface.shapes() {
                match *shape {
                    Shape::Line {
                        from,
                        to,
                        width,
                        color,
                    } => {
                        let color = to_color(color, background);
                        for (dx, dy) in thickness_offsets(from, to, width) {
                            let (x1, y1) = flip(from.offset(dx, dy));
                            let (x2, y2) = flip(to.offset(dx, dy));
                            ctx.draw(&CanvasLine::new(x1, y1, x2, y2, color));
                        }
                    }
                    Shape::Ring {
                        center,
                        radius,
                        color,
                    } => {
                        let (x, y) = flip(center);
                        ctx.draw(&Circle {
                            x,
                            y,
                            radius,
                            color: to_color(color, background),
                        });
                    }
                    Shape::Disc {
                        center,
                        radius,
                        color,
                    } => {
                        let (x, y) = flip(center);
                        let color = to_color(color, background);
                        let mut r = radius;
                        while r > 0.0 {
                            ctx.draw(&Circle { x, y, radius: r, color });
                            r -= DOT_PX / 2.0;
                        }
                        ctx.draw(&Points {
                            coords: &[(x, y)],
                            color,
                        });
                    }
                }
            }
        });
    frame.render_widget(canvas, area);
}

/// Perpendicular offsets that fake a stroke `width` px wide out of one-dot
/// braille lines.
fn thickness_offsets(from: Point, to: Point, width: f64) -> Vec<(f64, f64)> {
    let length = from.distance(to);
    let copies = (width / DOT_PX).round().max(1.0) as usize;
    if copies == 1 || length == 0.0 {
        return vec![(0.0, 0.0)];
    }
    let (nx, ny) = (-(to.y - from.y) / length, (to.x - from.x) / length);
    let span = DOT_PX * (copies - 1) as f64;
    (0..copies)
        .map(|i| {
            let shift = i as f64 * DOT_PX - span / 2.0;
            (nx * shift, ny * shift)
        })
        .collect()
}

fn draw_tooltip(frame: &mut Frame, session: &Session, body: Rect, colors: &PanelColors) {
    let tooltip = session.tooltip();
    if !tooltip.visible {
        return;
    }
    let Some(anchor) = pixel_to_cell(body, tooltip.position) else {
        return;
    };
    let width = (tooltip.title.chars().count().max(tooltip.artist.chars().count()) + 4) as u16;
    let popup = Rect {
        x: anchor.x,
        y: anchor.y,
        width,
        height: 4,
    }
    .intersection(body);
    if popup.is_empty() {
        return;
    }
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                tooltip.title.as_str(),
                Style::default()
                    .fg(colors.text)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                tooltip.artist.as_str(),
                Style::default().fg(colors.muted),
            )),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.border))
                .style(Style::default().bg(colors.panel_bg)),
        ),
        popup,
    );
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}
