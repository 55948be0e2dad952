//! Charts, bar rows, tables and the quick-access code, drawn onto a [`Canvas`].

use anyhow::Result;
use tracing::warn;

use crate::canvas::{Canvas, Color, DocumentSink, TextStyle};
use crate::quick_access::QuickAccessEncoder;
use crate::trend::TrendPoint;

const FLAT_PADDING: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueScale {
    /// Fit the domain to the series.
    Auto,
    /// Fixed 0..=100 domain, values clamped.
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearScale {
    min: f64,
    max: f64,
    clamp: bool,
}

impl LinearScale {
    fn fit(values: &[f64], scale: ValueScale) -> Self {
        if scale == ValueScale::Percent {
            return Self {
                min: 0.0,
                max: 100.0,
                clamp: true,
            };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return Self {
                min: 0.0,
                max: FLAT_PADDING,
                clamp: false,
            };
        }
        if max - min < f64::EPSILON {
            return Self {
                min: min - FLAT_PADDING,
                max: max + FLAT_PADDING,
                clamp: false,
            };
        }
        Self {
            min,
            max,
            clamp: false,
        }
    }

    /// Map `value` into `[top, top + height]`, larger values higher on the page.
    fn map(&self, value: f64, top: f64, height: f64) -> f64 {
        let value = if self.clamp {
            value.clamp(self.min, self.max)
        } else {
            value
        };
        let ratio = (value - self.min) / (self.max - self.min);
        top + height - ratio * height
    }
}

fn bounding_box<S: DocumentSink>(canvas: &mut Canvas<S>, area: ChartArea) -> Result<()> {
    let (left, top) = (area.x, area.y);
    let (right, bottom) = (area.x + area.width, area.y + area.height);
    canvas.line(left, top, right, top, Color::GREY)?;
    canvas.line(right, top, right, bottom, Color::GREY)?;
    canvas.line(right, bottom, left, bottom, Color::GREY)?;
    canvas.line(left, bottom, left, top, Color::GREY)?;
    Ok(())
}

/// Draw a line chart of `points` inside `area`.
///
/// Fewer than two points draw the bounding box only. Returns the number of
/// segments drawn.
#[allow(clippy::cast_precision_loss)]
pub fn line_chart<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    area: ChartArea,
    points: &[TrendPoint],
    scale: ValueScale,
    color: Color,
) -> Result<usize> {
    bounding_box(canvas, area)?;
    if points.len() < 2 {
        return Ok(0);
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let y_scale = LinearScale::fit(&values, scale);
    let x_step = area.width / (points.len() - 1).max(1) as f64;

    let coords: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            (
                area.x + i as f64 * x_step,
                y_scale.map(*v, area.y, area.height),
            )
        })
        .collect();
    for pair in coords.windows(2) {
        canvas.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, color)?;
    }

    let label_y = area.y + area.height + 4.0;
    canvas.text(&points[0].label(), area.x, label_y, TextStyle::Small)?;
    if let Some(last) = points.last() {
        canvas.text(&last.label(), area.x + area.width - 7.0, label_y, TextStyle::Small)?;
    }
    canvas.text(
        &format!("{:.0}", y_scale.max),
        area.x - 9.0,
        area.y + 2.5,
        TextStyle::Small,
    )?;
    canvas.text(
        &format!("{:.0}", y_scale.min),
        area.x - 9.0,
        area.y + area.height,
        TextStyle::Small,
    )?;

    Ok(coords.len() - 1)
}

/// Draw a single horizontal percentage bar: grey track plus a fill clamped
/// to 0..=100. Returns the fill width.
pub fn horizontal_bar<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    x: f64,
    y: f64,
    max_width: f64,
    height: f64,
    percent: f64,
    color: Color,
) -> Result<f64> {
    let percent = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    canvas.rect(x, y, max_width, height, Color::LIGHT_GREY)?;
    let width = percent / 100.0 * max_width;
    if width > 0.0 {
        canvas.rect(x, y, width, height, color)?;
    }
    Ok(width)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarRow {
    pub label: String,
    pub percent: f64,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarLayout {
    pub label_width: f64,
    pub bar_width: f64,
    pub row_height: f64,
}

impl Default for BarLayout {
    fn default() -> Self {
        Self {
            label_width: 32.0,
            bar_width: 110.0,
            row_height: 7.0,
        }
    }
}

/// Labelled percentage bars, one per row, flowing from the cursor.
pub fn bar_chart<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    rows: &[BarRow],
    layout: BarLayout,
) -> Result<()> {
    let left = canvas.geometry().margin_side;
    let bar_height = layout.row_height * 0.6;
    for row in rows {
        canvas.ensure_space(layout.row_height)?;
        let top = canvas.cursor().y;
        let baseline = canvas.baseline(layout.row_height);
        canvas.text(&row.label, left, baseline, TextStyle::Body)?;
        let bar_x = left + layout.label_width;
        let bar_y = top + (layout.row_height - bar_height) / 2.0;
        horizontal_bar(
            canvas,
            bar_x,
            bar_y,
            layout.bar_width,
            bar_height,
            row.percent,
            row.color,
        )?;
        canvas.text(
            &format!("{:.0}%", row.percent.clamp(0.0, 100.0)),
            bar_x + layout.bar_width + 3.0,
            baseline,
            TextStyle::Body,
        )?;
        canvas.advance(layout.row_height);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub header: &'static str,
    /// Distance from the left margin.
    pub offset: f64,
}

fn table_header<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    columns: &[Column],
    row_height: f64,
) -> Result<()> {
    let left = canvas.geometry().margin_side;
    let right = left + canvas.geometry().content_width();
    let baseline = canvas.baseline(row_height);
    for column in columns {
        canvas.text(column.header, left + column.offset, baseline, TextStyle::Bold)?;
    }
    let rule = canvas.cursor().y + row_height;
    canvas.line(left, rule, right, rule, Color::GREY)?;
    canvas.advance(row_height);
    Ok(())
}

/// Paginated table. The header is repeated at the top of every continuation
/// page. Cells beyond the number of columns are ignored.
pub fn table<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    columns: &[Column],
    rows: &[Vec<String>],
    row_height: f64,
) -> Result<()> {
    let left = canvas.geometry().margin_side;
    canvas.ensure_space(row_height * 2.0)?;
    table_header(canvas, columns, row_height)?;
    for row in rows {
        if canvas.ensure_space(row_height)? {
            table_header(canvas, columns, row_height)?;
        }
        let baseline = canvas.baseline(row_height);
        for (column, cell) in columns.iter().zip(row) {
            canvas.text(cell, left + column.offset, baseline, TextStyle::Body)?;
        }
        canvas.advance(row_height);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickAccess {
    Embedded,
    TextLink,
}

/// Draw a scannable code for `link`, or write the link as text when no
/// encoder is available or encoding fails.
#[allow(clippy::cast_precision_loss)]
pub fn quick_access<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    link: &str,
    encoder: Option<&dyn QuickAccessEncoder>,
    size: f64,
) -> Result<QuickAccess> {
    let matrix = match encoder.map(|e| e.encode(link)) {
        Some(Ok(matrix)) if matrix.width > 0 => matrix,
        Some(Ok(_)) => {
            warn!("quick-access encoder returned an empty matrix, writing link as text");
            return text_link(canvas, link);
        }
        Some(Err(e)) => {
            warn!(error = %e, "quick-access code unavailable, writing link as text");
            return text_link(canvas, link);
        }
        None => return text_link(canvas, link),
    };

    let caption_height = 6.0;
    canvas.ensure_space(size + caption_height)?;
    let left = canvas.geometry().margin_side;
    let top = canvas.cursor().y;
    // One light module of quiet zone on each side.
    let module = size / (matrix.width + 2) as f64;
    for (row, col) in matrix.dark_modules() {
        canvas.rect(
            left + (col + 1) as f64 * module,
            top + (row + 1) as f64 * module,
            module,
            module,
            Color::BLACK,
        )?;
    }
    canvas.advance(size);
    canvas.write_line(link, TextStyle::Small, caption_height)?;
    Ok(QuickAccess::Embedded)
}

fn text_link<S: DocumentSink>(canvas: &mut Canvas<S>, link: &str) -> Result<QuickAccess> {
    canvas.write_line(&format!("Access online: {link}"), TextStyle::Body, 6.0)?;
    Ok(QuickAccess::TextLink)
}
