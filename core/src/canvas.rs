//! Paginated drawing surface.
//!
//! Coordinates are millimetres from the top-left corner of the page, y growing
//! downward. The canvas owns the cursor and decides where pages break; the
//! actual encoding is delegated to a [`DocumentSink`].

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const GREY: Self = Self::rgb(120, 120, 120);
    pub const LIGHT_GREY: Self = Self::rgb(225, 225, 225);
    pub const ROSE: Self = Self::rgb(196, 69, 105);
    pub const TEAL: Self = Self::rgb(38, 139, 150);
    pub const AMBER: Self = Self::rgb(222, 151, 38);
    pub const GREEN: Self = Self::rgb(76, 153, 84);
    pub const BLUE: Self = Self::rgb(52, 101, 178);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
    Bold,
    Small,
}

impl TextStyle {
    /// Font size in points.
    #[must_use]
    pub fn size(self) -> f64 {
        match self {
            Self::Title => 15.0,
            Self::Heading => 11.5,
            Self::Body | Self::Bold => 9.0,
            Self::Small => 7.0,
        }
    }

    #[must_use]
    pub fn is_bold(self) -> bool {
        matches!(self, Self::Title | Self::Heading | Self::Bold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Text {
        text: String,
        x: f64,
        y: f64,
        style: TextStyle,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Color,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: Color,
    },
    PageBreak,
}

/// Output backend the canvas draws through.
pub trait DocumentSink {
    type Output;

    fn text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) -> Result<()>;
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: Color) -> Result<()>;
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) -> Result<()>;
    fn page_break(&mut self) -> Result<()>;
    fn finish(self) -> Result<Self::Output>;
}

/// Sink that keeps every command in order. Used to test layout.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<DrawCommand>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentSink for RecordingSink {
    type Output = Vec<DrawCommand>;

    fn text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) -> Result<()> {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            style,
        });
        Ok(())
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: Color) -> Result<()> {
        self.commands.push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
            fill,
        });
        Ok(())
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) -> Result<()> {
        self.commands.push(DrawCommand::Line {
            x1,
            y1,
            x2,
            y2,
            color,
        });
        Ok(())
    }

    fn page_break(&mut self) -> Result<()> {
        self.commands.push(DrawCommand::PageBreak);
        Ok(())
    }

    fn finish(self) -> Result<Self::Output> {
        Ok(self.commands)
    }
}

/// Split a recorded command stream into pages.
#[must_use]
pub fn split_pages(commands: &[DrawCommand]) -> Vec<&[DrawCommand]> {
    commands
        .split(|c| matches!(c, DrawCommand::PageBreak))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_side: f64,
}

impl Default for PageGeometry {
    /// A4 portrait.
    fn default() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            margin_side: 18.0,
        }
    }
}

impl PageGeometry {
    #[must_use]
    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin_side
    }

    #[must_use]
    pub fn content_height(&self) -> f64 {
        self.height - self.margin_top - self.margin_bottom
    }

    #[must_use]
    pub fn content_bottom(&self) -> f64 {
        self.height - self.margin_bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub page: usize,
    pub x: f64,
    pub y: f64,
}

pub struct Canvas<S: DocumentSink> {
    sink: S,
    geometry: PageGeometry,
    cursor: PageCursor,
    footer: Option<String>,
}

impl<S: DocumentSink> Canvas<S> {
    pub fn new(sink: S, geometry: PageGeometry) -> Self {
        Self {
            sink,
            cursor: PageCursor {
                page: 0,
                x: geometry.margin_side,
                y: geometry.margin_top,
            },
            geometry,
            footer: None,
        }
    }

    /// Print `footer` and the page number at the bottom of every page.
    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn page_count(&self) -> usize {
        self.cursor.page + 1
    }

    /// Vertical space left on the current page.
    pub fn remaining(&self) -> f64 {
        self.geometry.content_bottom() - self.cursor.y
    }

    pub fn text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) -> Result<()> {
        self.sink.text(text, x, y, style)
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: Color) -> Result<()> {
        self.sink.rect(x, y, width, height, fill)
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: Color) -> Result<()> {
        self.sink.line(x1, y1, x2, y2, color)
    }

    /// Start a new page if `required` does not fit below the cursor.
    ///
    /// Returns `true` when a page break was emitted. A block taller than a
    /// whole page is drawn where it is once the cursor sits at the top of a
    /// page, so this never emits an empty page.
    pub fn ensure_space(&mut self, required: f64) -> Result<bool> {
        let overflows = self.cursor.y + required > self.geometry.content_bottom();
        let at_top = self.cursor.y <= self.geometry.margin_top;
        if !overflows || at_top {
            return Ok(false);
        }
        self.draw_footer()?;
        self.sink.page_break()?;
        self.cursor.page += 1;
        self.cursor.y = self.geometry.margin_top;
        tracing::trace!(page = self.cursor.page, "page break");
        Ok(true)
    }

    pub fn advance(&mut self, dy: f64) {
        self.cursor.y += dy;
    }

    /// Write one line of text at the cursor and move below it.
    pub fn write_line(&mut self, text: &str, style: TextStyle, line_height: f64) -> Result<()> {
        self.write_line_at(self.geometry.margin_side, text, style, line_height)
    }

    /// Like [`Canvas::write_line`] with an explicit left edge.
    pub fn write_line_at(
        &mut self,
        x: f64,
        text: &str,
        style: TextStyle,
        line_height: f64,
    ) -> Result<()> {
        self.ensure_space(line_height)?;
        let baseline = self.baseline(line_height);
        self.sink.text(text, x, baseline, style)?;
        self.advance(line_height);
        Ok(())
    }

    /// Baseline for text in a band of `line_height` starting at the cursor.
    pub fn baseline(&self, line_height: f64) -> f64 {
        self.cursor.y + line_height * 0.75
    }

    fn draw_footer(&mut self) -> Result<()> {
        if let Some(footer) = &self.footer {
            let text = format!("{footer} - page {}", self.cursor.page + 1);
            let y = self.geometry.height - self.geometry.margin_bottom / 2.0;
            self.sink
                .text(&text, self.geometry.margin_side, y, TextStyle::Small)?;
        }
        Ok(())
    }

    /// Close the last page and hand back the sink's output.
    pub fn finish(mut self) -> Result<S::Output> {
        self.draw_footer()?;
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 100mm of content height per page.
    fn small_page() -> PageGeometry {
        PageGeometry {
            width: 100.0,
            height: 140.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            margin_side: 10.0,
        }
    }

    fn texts(page: &[DrawCommand]) -> Vec<String> {
        page.iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn ensure_space_without_overflow_keeps_page() {
        let mut canvas = Canvas::new(RecordingSink::new(), small_page());
        canvas.advance(50.0);
        assert!(!canvas.ensure_space(50.0).unwrap());
        assert_eq!(canvas.page_count(), 1);
        let commands = canvas.finish().unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn ensure_space_breaks_and_resets_cursor() {
        let mut canvas = Canvas::new(RecordingSink::new(), small_page());
        canvas.advance(95.0);
        let x_before = canvas.cursor().x;
        assert!(canvas.ensure_space(10.0).unwrap());
        let cursor = canvas.cursor();
        assert_eq!(cursor.page, 1);
        assert!((cursor.y - 20.0).abs() < f64::EPSILON);
        assert!((cursor.x - x_before).abs() < f64::EPSILON);
        let commands = canvas.finish().unwrap();
        assert_eq!(commands, vec![DrawCommand::PageBreak]);
    }

    #[test]
    fn oversized_block_at_top_does_not_emit_empty_page() {
        let mut canvas = Canvas::new(RecordingSink::new(), small_page());
        assert!(!canvas.ensure_space(500.0).unwrap());
        assert_eq!(canvas.page_count(), 1);
    }

    #[test]
    fn rows_paginate_in_order_without_loss() {
        let row_height = 10.0;
        let available = small_page().content_height();
        for n in [1_usize, 9, 10, 11, 25, 30, 47] {
            let mut canvas = Canvas::new(RecordingSink::new(), small_page());
            for i in 0..n {
                canvas
                    .write_line(&format!("row {i}"), TextStyle::Body, row_height)
                    .unwrap();
            }
            let page_count = canvas.page_count();
            let commands = canvas.finish().unwrap();
            let pages = split_pages(&commands);

            #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
            let expected = ((n as f64 * row_height) / available).ceil() as usize;
            assert_eq!(pages.len(), expected, "n = {n}");
            assert_eq!(page_count, expected, "n = {n}");

            let written: Vec<String> = pages.iter().flat_map(|p| texts(p)).collect();
            let wanted: Vec<String> = (0..n).map(|i| format!("row {i}")).collect();
            assert_eq!(written, wanted, "n = {n}");
        }
    }

    #[test]
    fn rows_stay_inside_content_area() {
        let geometry = small_page();
        let mut canvas = Canvas::new(RecordingSink::new(), geometry);
        for i in 0..23 {
            canvas
                .write_line(&format!("row {i}"), TextStyle::Body, 7.0)
                .unwrap();
        }
        let commands = canvas.finish().unwrap();
        for command in &commands {
            if let DrawCommand::Text { y, .. } = command {
                assert!(*y > geometry.margin_top);
                assert!(*y < geometry.content_bottom());
            }
        }
    }

    #[test]
    fn footer_is_written_on_every_page() {
        let mut canvas = Canvas::new(RecordingSink::new(), small_page()).with_footer("Report");
        for i in 0..15 {
            canvas
                .write_line(&format!("row {i}"), TextStyle::Body, 10.0)
                .unwrap();
        }
        let commands = canvas.finish().unwrap();
        let pages = split_pages(&commands);
        assert_eq!(pages.len(), 2);
        assert_eq!(texts(pages[0]).last().unwrap(), "Report - page 1");
        assert_eq!(texts(pages[1]).last().unwrap(), "Report - page 2");
    }
}
