//! Clinical report compiler.
//!
//! A report goes through four stages: validate the request, collect the raw
//! rows with one range query per kind, derive per-day aggregates, then compose
//! the document onto a [`Canvas`]. Any failure aborts the whole report; the
//! only recovered failure is the quick-access code, which degrades to a text
//! link inside [`chart::quick_access`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adequacy::{average_adequacy, average_summary};
use crate::aggregation::{self, AboveTarget};
use crate::canvas::{Canvas, Color, DocumentSink, PageGeometry, TextStyle};
use crate::chart::{self, BarLayout, BarRow, ChartArea, Column, ValueScale};
use crate::error::ReportError;
use crate::models::{
    AdequacyTargets, DailyIntake, DateRange, GlycemicStatistics, GlycemicTargets,
    MeasurementRecord, Nutrient, Owner, ReportKind, ReportRequest,
};
use crate::pdf::PdfSink;
use crate::quick_access::QuickAccessEncoder;
use crate::store::{MeasurementStore, OwnerDirectory};
use crate::trend::{AdequacySeries, TrendPoint, adequacy_series, glycemic_trend};

pub const DEFAULT_PORTAL_URL: &str = "https://portal.gestar.app/records";
pub const DEFAULT_MAX_DAYS: usize = 366;

const TITLE_HEIGHT: f64 = 9.0;
const HEADING_HEIGHT: f64 = 9.0;
const LINE_HEIGHT: f64 = 5.5;
const ROW_HEIGHT: f64 = 6.0;
const CHART_HEIGHT: f64 = 45.0;
const SECTION_GAP: f64 = 4.0;
const QR_SIZE: f64 = 32.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub targets: AdequacyTargets,
    pub glycemic_targets: GlycemicTargets,
    /// Base URL of the online record, used for the quick-access code.
    pub portal_url: String,
    /// Rows in the recent readings table.
    pub recent_records_limit: usize,
    /// Longest period, in days, a single report may cover.
    pub max_days: usize,
    #[serde(skip)]
    pub geometry: PageGeometry,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            targets: AdequacyTargets::default(),
            glycemic_targets: GlycemicTargets::default(),
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            recent_records_limit: 20,
            max_days: DEFAULT_MAX_DAYS,
            geometry: PageGeometry::default(),
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.targets.validate()?;
        let glycemic = [
            ("fasting_max", self.glycemic_targets.fasting_max),
            ("post_meal_max", self.glycemic_targets.post_meal_max),
        ];
        for (name, value) in glycemic {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("Glycemic target {name} must be greater than 0 (got {value})");
            }
        }
        if self.portal_url.trim().is_empty() {
            anyhow::bail!("portal_url must not be empty");
        }
        if self.max_days == 0 {
            anyhow::bail!("max_days must be at least 1");
        }
        Ok(())
    }

    /// Link to the owner's online record for the reported period.
    #[must_use]
    pub fn portal_link(&self, owner_id: &str, range: DateRange) -> String {
        format!(
            "{}/{owner_id}?start={}&end={}",
            self.portal_url.trim_end_matches('/'),
            range.start(),
            range.end()
        )
    }
}

/// Everything a report shows, derived before any drawing starts.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub owner: Owner,
    pub range: DateRange,
    pub records: Vec<MeasurementRecord>,
    pub statistics: GlycemicStatistics,
    pub above_target: AboveTarget,
    pub glycemic_trend: Vec<TrendPoint>,
    /// Empty for reports without nutrition sections.
    pub days: Vec<DailyIntake>,
    pub adequacy_series: AdequacySeries,
    pub average_adequacy: Vec<(Nutrient, u8)>,
}

#[derive(Debug, Clone)]
pub struct CompiledReport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub filename: String,
    pub generated_at: DateTime<Utc>,
}

pub struct ReportCompiler<'a> {
    directory: &'a dyn OwnerDirectory,
    store: &'a dyn MeasurementStore,
    config: &'a ReportConfig,
    encoder: Option<&'a dyn QuickAccessEncoder>,
}

impl<'a> ReportCompiler<'a> {
    pub fn new(
        directory: &'a dyn OwnerDirectory,
        store: &'a dyn MeasurementStore,
        config: &'a ReportConfig,
    ) -> Self {
        Self {
            directory,
            store,
            config,
            encoder: None,
        }
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: &'a dyn QuickAccessEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Compile `request` into a PDF.
    pub fn compile(&self, request: &ReportRequest) -> Result<CompiledReport, ReportError> {
        let generated_at = Utc::now();
        let sink = PdfSink::new(request.kind.title(), &self.config.geometry)?;
        let (bytes, page_count) = self.compile_to(request, sink, generated_at)?;
        let filename = request
            .kind
            .filename(&request.owner_id, generated_at.timestamp_millis());
        info!(
            owner = %request.owner_id,
            kind = ?request.kind,
            pages = page_count,
            bytes = bytes.len(),
            "report compiled"
        );
        Ok(CompiledReport {
            bytes,
            page_count,
            filename,
            generated_at,
        })
    }

    /// Compile `request` through an arbitrary sink. Returns the sink's output
    /// and the number of pages drawn.
    pub fn compile_to<S: DocumentSink>(
        &self,
        request: &ReportRequest,
        sink: S,
        generated_at: DateTime<Utc>,
    ) -> Result<(S::Output, usize), ReportError> {
        let data = self.gather(request)?;
        debug!(owner = %request.owner_id, "composing report");
        let footer = format!("{} - {}", request.kind.title(), data.owner.name);
        let mut canvas = Canvas::new(sink, self.config.geometry).with_footer(footer);
        compose(
            &mut canvas,
            &data,
            request.kind,
            self.config,
            self.encoder,
            generated_at,
        )?;
        let page_count = canvas.page_count();
        let output = canvas.finish()?;
        Ok((output, page_count))
    }

    /// Validate the request, collect its rows and derive the aggregates.
    pub fn gather(&self, request: &ReportRequest) -> Result<ReportData, ReportError> {
        let range = DateRange::new(request.start, request.end)?;
        if range.len() > self.config.max_days {
            return Err(ReportError::RangeTooLong {
                days: range.len(),
                max: self.config.max_days,
            });
        }
        let owner = self
            .directory
            .get_owner(&request.owner_id)?
            .ok_or_else(|| ReportError::NotFound(request.owner_id.clone()))?;
        info!(
            owner = %owner.id,
            kind = ?request.kind,
            days = range.len(),
            "compiling report"
        );

        debug!(owner = %owner.id, "collecting records");
        let records = self.store.glycemic_records(&owner.id, Some(range))?;
        let statistics = self.store.glycemic_statistics(&owner.id, Some(range))?;
        let days = if request.kind.includes_nutrition() {
            let servings = self.store.logged_servings(&owner.id, range)?;
            let hydration = self.store.hydration_entries(&owner.id, range)?;
            aggregation::daily_intake(range, &servings, &hydration, &self.config.targets)
        } else {
            Vec::new()
        };

        debug!(owner = %owner.id, records = records.len(), "deriving series");
        Ok(ReportData {
            above_target: aggregation::readings_above_target(
                &records,
                &self.config.glycemic_targets,
            ),
            glycemic_trend: glycemic_trend(&records),
            adequacy_series: adequacy_series(&days),
            average_adequacy: average_adequacy(&days),
            owner,
            range,
            records,
            statistics,
            days,
        })
    }
}

fn nutrient_color(nutrient: Nutrient) -> Color {
    match nutrient {
        Nutrient::Iron => Color::ROSE,
        Nutrient::Folate => Color::GREEN,
        Nutrient::Calcium => Color::AMBER,
        Nutrient::Hydration => Color::BLUE,
    }
}

fn compose<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    data: &ReportData,
    kind: ReportKind,
    config: &ReportConfig,
    encoder: Option<&dyn QuickAccessEncoder>,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    header(canvas, data, kind, generated_at)?;
    glycemic_summary(canvas, data, &config.glycemic_targets)?;
    if kind.includes_nutrition() {
        adequacy_summary(canvas, data, &config.targets)?;
    }
    trend_chart(
        canvas,
        "Glycemic trend (daily mean, mg/dL)",
        &data.glycemic_trend,
        ValueScale::Auto,
        Color::ROSE,
    )?;
    if kind.includes_nutrition() {
        section(canvas, "Average adequacy by nutrient", ROW_HEIGHT * 4.0)?;
        let rows: Vec<BarRow> = data
            .average_adequacy
            .iter()
            .map(|(nutrient, pct)| BarRow {
                label: nutrient.label().to_string(),
                percent: f64::from(*pct),
                color: nutrient_color(*nutrient),
            })
            .collect();
        chart::bar_chart(canvas, &rows, BarLayout::default())?;
        canvas.advance(SECTION_GAP);

        trend_chart(
            canvas,
            "Hydration trend (% of daily target)",
            data.adequacy_series.get(Nutrient::Hydration),
            ValueScale::Percent,
            nutrient_color(Nutrient::Hydration),
        )?;
        daily_adequacy_rows(canvas, &data.days)?;
    }
    recent_records(canvas, data, config)?;

    section(canvas, "Online access", QR_SIZE)?;
    let link = config.portal_link(&data.owner.id, data.range);
    chart::quick_access(canvas, &link, encoder, QR_SIZE)?;
    Ok(())
}

/// Section heading, keeping at least `first_block` of content on the same page.
fn section<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    title: &str,
    first_block: f64,
) -> anyhow::Result<()> {
    canvas.ensure_space(HEADING_HEIGHT + first_block)?;
    canvas.write_line(title, TextStyle::Heading, HEADING_HEIGHT)
}

fn body<S: DocumentSink>(canvas: &mut Canvas<S>, text: &str) -> anyhow::Result<()> {
    canvas.write_line(text, TextStyle::Body, LINE_HEIGHT)
}

fn header<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    data: &ReportData,
    kind: ReportKind,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    canvas.write_line(kind.title(), TextStyle::Title, TITLE_HEIGHT)?;
    body(
        canvas,
        &format!("Patient: {} (id {})", data.owner.name, data.owner.id),
    )?;
    if let Some(due) = data.owner.due_date {
        body(canvas, &format!("Expected due date: {}", due.format("%d/%m/%Y")))?;
    }
    body(
        canvas,
        &format!(
            "Period: {} to {} ({} days)",
            data.range.start().format("%d/%m/%Y"),
            data.range.end().format("%d/%m/%Y"),
            data.range.len()
        ),
    )?;
    body(
        canvas,
        &format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M UTC")),
    )?;
    let left = canvas.geometry().margin_side;
    let right = left + canvas.geometry().content_width();
    let y = canvas.cursor().y + 2.0;
    canvas.line(left, y, right, y, Color::GREY)?;
    canvas.advance(SECTION_GAP + 2.0);
    Ok(())
}

fn glycemic_summary<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    data: &ReportData,
    targets: &GlycemicTargets,
) -> anyhow::Result<()> {
    let stats = &data.statistics;
    section(canvas, "Glycemic summary", LINE_HEIGHT * 4.0)?;
    if stats.count == 0 {
        body(canvas, "No glucose readings in this period.")?;
    } else {
        body(
            canvas,
            &format!(
                "Readings: {}   Mean: {:.1} mg/dL   Min: {:.0}   Max: {:.0}",
                stats.count, stats.mean, stats.min, stats.max
            ),
        )?;
    }
    let fasting = stats.fasting;
    body(
        canvas,
        &format!(
            "Fasting: {} readings, mean {:.1} mg/dL, {} above {:.0} mg/dL",
            fasting.count, fasting.mean, data.above_target.fasting, targets.fasting_max
        ),
    )?;
    let post_meal = stats.post_meal;
    body(
        canvas,
        &format!(
            "Post-meal: {} readings, mean {:.1} mg/dL, {} above {:.0} mg/dL",
            post_meal.count, post_meal.mean, data.above_target.post_meal, targets.post_meal_max
        ),
    )?;
    canvas.advance(SECTION_GAP);
    Ok(())
}

fn adequacy_summary<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    data: &ReportData,
    targets: &AdequacyTargets,
) -> anyhow::Result<()> {
    let (average, hydration_ml) = average_summary(&data.days);
    section(canvas, "Nutrition and hydration (daily average)", LINE_HEIGHT * 5.0)?;
    body(
        canvas,
        &format!(
            "Energy: {:.0} kcal   Protein: {:.1} g   Fat: {:.1} g   Carbohydrate: {:.1} g",
            average.energy_kcal, average.protein_g, average.fat_g, average.carbohydrate_g
        ),
    )?;
    for (nutrient, pct) in &data.average_adequacy {
        let value = match nutrient {
            Nutrient::Iron => average.iron_mg,
            Nutrient::Folate => average.folate_mcg,
            Nutrient::Calcium => average.calcium_mg,
            Nutrient::Hydration => hydration_ml,
        };
        body(
            canvas,
            &format!(
                "{}: {value:.1} of {:.0} {} ({pct}% of target)",
                nutrient.label(),
                targets.target(*nutrient),
                nutrient.unit()
            ),
        )?;
    }
    canvas.advance(SECTION_GAP);
    Ok(())
}

fn trend_chart<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    title: &str,
    points: &[TrendPoint],
    scale: ValueScale,
    color: Color,
) -> anyhow::Result<()> {
    // Room for the date labels under the box.
    let label_band = 6.0;
    section(canvas, title, CHART_HEIGHT + label_band)?;
    let geometry = *canvas.geometry();
    let area = ChartArea {
        x: geometry.margin_side + 10.0,
        y: canvas.cursor().y,
        width: geometry.content_width() - 12.0,
        height: CHART_HEIGHT,
    };
    let segments = chart::line_chart(canvas, area, points, scale, color)?;
    debug!(title, points = points.len(), segments, "trend chart drawn");
    canvas.advance(CHART_HEIGHT + label_band + SECTION_GAP);
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn daily_adequacy_header<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    date_width: f64,
    step: f64,
) -> anyhow::Result<()> {
    let left = canvas.geometry().margin_side;
    let baseline = canvas.baseline(ROW_HEIGHT);
    canvas.text("Date", left, baseline, TextStyle::Bold)?;
    for (i, nutrient) in Nutrient::ALL.iter().enumerate() {
        let x = left + date_width + step * i as f64;
        canvas.text(nutrient.label(), x, baseline, TextStyle::Bold)?;
    }
    canvas.advance(ROW_HEIGHT);
    Ok(())
}

/// One row per day with a small bar per nutrient.
#[allow(clippy::cast_precision_loss)]
fn daily_adequacy_rows<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    days: &[DailyIntake],
) -> anyhow::Result<()> {
    let date_width = 20.0;
    let step = 38.0;
    let bar_width = 26.0;
    let bar_height = ROW_HEIGHT * 0.55;

    section(canvas, "Daily adequacy (% of target)", ROW_HEIGHT * 2.0)?;
    daily_adequacy_header(canvas, date_width, step)?;
    let left = canvas.geometry().margin_side;
    for day in days {
        if canvas.ensure_space(ROW_HEIGHT)? {
            daily_adequacy_header(canvas, date_width, step)?;
        }
        let top = canvas.cursor().y;
        let baseline = canvas.baseline(ROW_HEIGHT);
        canvas.text(
            &day.date().format("%d/%m").to_string(),
            left,
            baseline,
            TextStyle::Body,
        )?;
        for (i, nutrient) in Nutrient::ALL.iter().enumerate() {
            let x = left + date_width + step * i as f64;
            let pct = day.adequacy.get(*nutrient);
            chart::horizontal_bar(
                canvas,
                x,
                top + (ROW_HEIGHT - bar_height) / 2.0,
                bar_width,
                bar_height,
                f64::from(pct),
                nutrient_color(*nutrient),
            )?;
            canvas.text(&format!("{pct}%"), x + bar_width + 1.5, baseline, TextStyle::Small)?;
        }
        canvas.advance(ROW_HEIGHT);
    }
    canvas.advance(SECTION_GAP);
    Ok(())
}

const RECORD_COLUMNS: [Column; 6] = [
    Column {
        header: "Date",
        offset: 0.0,
    },
    Column {
        header: "Time",
        offset: 24.0,
    },
    Column {
        header: "Category",
        offset: 40.0,
    },
    Column {
        header: "mg/dL",
        offset: 64.0,
    },
    Column {
        header: "Status",
        offset: 82.0,
    },
    Column {
        header: "Note",
        offset: 112.0,
    },
];

fn recent_records<S: DocumentSink>(
    canvas: &mut Canvas<S>,
    data: &ReportData,
    config: &ReportConfig,
) -> anyhow::Result<()> {
    section(canvas, "Recent glucose readings", ROW_HEIGHT * 2.0)?;
    if data.records.is_empty() {
        body(canvas, "No glucose readings in this period.")?;
        canvas.advance(SECTION_GAP);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = data
        .records
        .iter()
        .rev()
        .take(config.recent_records_limit)
        .map(|r| {
            let status = if aggregation::is_above_target(r, &config.glycemic_targets) {
                "above target"
            } else {
                "within target"
            };
            let note: String = r.note.as_deref().unwrap_or("").chars().take(32).collect();
            vec![
                r.date.format("%d/%m/%Y").to_string(),
                r.time.format("%H:%M").to_string(),
                r.category.label().to_string(),
                format!("{:.0}", r.value),
                status.to_string(),
                note,
            ]
        })
        .collect();
    chart::table(canvas, &RECORD_COLUMNS, &rows, ROW_HEIGHT)?;
    canvas.advance(SECTION_GAP);
    Ok(())
}
