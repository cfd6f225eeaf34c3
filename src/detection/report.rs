//! Downloadable PDF detection report

use chrono::DateTime;
use chrono_tz::Tz;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use thiserror::Error;

use crate::clock;
use crate::models::detection::DetectionWithUser;

const HUMAN_FORMAT: &str = "%B %d, %Y at %I:%M %p";

// A4 portrait
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const VALUE_X: f32 = 70.0;
const LINE_HEIGHT: f32 = 7.0;
const WRAP_CHARS: usize = 85;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF generation failed: {0}")]
    Pdf(#[from] printpdf::Error),
}

/// `detection_report_<id>_<YYYYmmdd>.pdf`
pub fn report_filename(detection_id: i64, now: &DateTime<Tz>) -> String {
    format!("detection_report_{}_{}.pdf", detection_id, now.format("%Y%m%d"))
}

/// One titled block of the report: a label/value table and optional prose
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub rows: Vec<(&'static str, String)>,
    pub text: Option<String>,
}

impl Section {
    fn table(title: &'static str, rows: Vec<(&'static str, String)>) -> Self {
        Self { title, rows, text: None }
    }

    fn prose(title: &'static str, text: String) -> Self {
        Self { title, rows: Vec::new(), text: Some(text) }
    }
}

/// Report contents in page order
pub fn sections(entry: &DetectionWithUser, generated_at: &DateTime<Tz>) -> Vec<Section> {
    let detection = &entry.detection;
    let healthy = detection.is_healthy();

    let detected_at = clock::parse_timestamp(&detection.detected_at)
        .map(|ts| ts.format(HUMAN_FORMAT).to_string())
        .unwrap_or_else(|| detection.detected_at.clone());
    let location = detection
        .location
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Not specified".to_string());
    let severity = detection
        .severity
        .clone()
        .filter(|s| s != "None")
        .unwrap_or_else(|| "N/A".to_string());

    let mut sections = vec![
        Section::table(
            "Report Details",
            vec![
                ("Detection ID:", detection.id.to_string()),
                ("Date & Time:", detected_at),
                ("User:", entry.user_name.clone()),
                ("Location:", location),
            ],
        ),
        Section::table(
            "Detection Results",
            vec![
                (
                    "Disease Status:",
                    if healthy { "HEALTHY" } else { "DISEASE DETECTED" }.to_string(),
                ),
                ("Disease Name:", detection.disease_name.clone().unwrap_or_default()),
                (
                    "Confidence Score:",
                    format!("{:.2}%", detection.confidence.unwrap_or(0.0)),
                ),
                ("Severity:", severity),
            ],
        ),
    ];

    if let Some(treatment) = detection.recommendation.clone().filter(|_| !healthy) {
        sections.push(Section::prose("Treatment Recommendations", treatment));
    }

    sections.push(Section::prose(
        "About This Report",
        format!(
            "This is an automated report generated by Adike Mitra AI System. Report Generated: {}",
            generated_at.format(HUMAN_FORMAT)
        ),
    ));
    sections
}

/// Break prose into lines of at most `width` characters on word boundaries
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cursor over the pages of a document, adding pages as text runs off the bottom
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ReportError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn advance(&mut self, height: f32) {
        self.y -= height;
        if self.y < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN - height;
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn line(&mut self, text: &str, size: f32, bold: bool) {
        self.advance(LINE_HEIGHT);
        self.text(text, size, MARGIN, bold);
    }

    fn row(&mut self, label: &str, value: &str) {
        self.advance(LINE_HEIGHT);
        self.text(label, 11.0, MARGIN, true);
        self.text(value, 11.0, VALUE_X, false);
    }

    fn finish(self) -> Result<Vec<u8>, ReportError> {
        Ok(self.doc.save_to_bytes()?)
    }
}

/// Render the report as a PDF document
pub fn render_pdf(entry: &DetectionWithUser, generated_at: &DateTime<Tz>) -> Result<Vec<u8>, ReportError> {
    let title = format!("Detection Report {}", entry.detection.id);
    let mut pdf = PageWriter::new(&title)?;

    pdf.line("Adike Mitra - Disease Detection Report", 18.0, true);
    pdf.advance(LINE_HEIGHT);

    for section in sections(entry, generated_at) {
        pdf.line(section.title, 13.0, true);
        for (label, value) in &section.rows {
            pdf.row(label, value);
        }
        if let Some(text) = &section.text {
            for line in wrap(text, WRAP_CHARS) {
                pdf.line(&line, 10.0, false);
            }
        }
        pdf.advance(LINE_HEIGHT / 2.0);
    }

    pdf.finish()
}
