//! PDF backend for the canvas, built on `printpdf` with the built-in
//! Helvetica fonts. Built-in fonts are WinAnsi encoded, so text drawn here
//! should stay within Latin-1.

use std::io::BufWriter;

use anyhow::{Result, anyhow};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::*;

use crate::canvas::{Color as CanvasColor, DocumentSink, PageGeometry, TextStyle};

const LAYER: &str = "Layer 1";

pub struct PdfSink {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    width: f64,
    height: f64,
    pages: usize,
}

fn rgb(color: CanvasColor) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(color.r) / 255.0,
        f32::from(color.g) / 255.0,
        f32::from(color.b) / 255.0,
        None,
    ))
}

impl PdfSink {
    pub fn new(title: &str, geometry: &PageGeometry) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(
            title,
            Mm(geometry.width as f32),
            Mm(geometry.height as f32),
            LAYER,
        );
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("PDF font error: {e}"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("PDF font error: {e}"))?;
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            width: geometry.width,
            height: geometry.height,
            pages: 1,
        })
    }

    /// Pages started so far.
    pub fn page_count(&self) -> usize {
        self.pages
    }

    fn point(&self, x: f64, y: f64) -> Point {
        Point::new(Mm(x as f32), Mm((self.height - y) as f32))
    }
}

impl DocumentSink for PdfSink {
    type Output = Vec<u8>;

    fn text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) -> Result<()> {
        let font = if style.is_bold() {
            &self.bold
        } else {
            &self.regular
        };
        self.layer.set_fill_color(rgb(CanvasColor::BLACK));
        self.layer.use_text(
            text,
            style.size() as f32,
            Mm(x as f32),
            Mm((self.height - y) as f32),
            font,
        );
        Ok(())
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: CanvasColor) -> Result<()> {
        let ring = vec![
            (self.point(x, y), false),
            (self.point(x + width, y), false),
            (self.point(x + width, y + height), false),
            (self.point(x, y + height), false),
        ];
        self.layer.set_fill_color(rgb(fill));
        self.layer.add_polygon(Polygon {
            rings: vec![ring],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
        Ok(())
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, color: CanvasColor) -> Result<()> {
        self.layer.set_outline_color(rgb(color));
        self.layer.set_outline_thickness(0.6);
        self.layer.add_line(Line {
            points: vec![(self.point(x1, y1), false), (self.point(x2, y2), false)],
            is_closed: false,
        });
        Ok(())
    }

    fn page_break(&mut self) -> Result<()> {
        let (page, layer) = self
            .doc
            .add_page(Mm(self.width as f32), Mm(self.height as f32), LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.pages += 1;
        Ok(())
    }

    fn finish(self) -> Result<Self::Output> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| anyhow!("PDF save error: {e}"))?;
        buf.into_inner()
            .map_err(|e| anyhow!("PDF buffer error: {e}"))
    }
}
