// DOCX Export Service
// Lays out a test as a printable question paper and packs it with docx-rs

use docx_rs::{
    AlignmentType, BreakType, Docx, Hyperlink, HyperlinkType, PageMargin, Paragraph, Run,
    RunFonts, Tab, TabValueType,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::editing::BLANK_MARKER;
use super::error::ExportError;
use super::model::{Question, SubQuestion, Test};
use super::rich_text::{
    parse_inline, parse_rich_text, plain_text, strip_outer_paragraph, Block, Inline, RunStyle,
};

/// Share of the printable width the option grid may use.
const USABLE_WIDTH_RATIO: f64 = 0.9;

/// Average glyph width of a 12pt character, in twips.
const TWIPS_PER_CHAR_AT_12PT: f64 = 120.0;

const LINK_COLOR: &str = "0563C1";

// ============================================================================
// Configuration
// ============================================================================

/// Page geometry and base font. All lengths are twips, font size is half-points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxExportConfig {
    pub page_width: u32,
    pub page_height: u32,
    pub margin_top: i32,
    pub margin_bottom: i32,
    pub margin_left: i32,
    pub margin_right: i32,
    pub font_family: String,
    pub font_size: usize,
}

impl Default for DocxExportConfig {
    fn default() -> Self {
        Self {
            page_width: 11906,
            page_height: 16838,
            margin_top: 259,
            margin_bottom: 878,
            margin_left: 490,
            margin_right: 562,
            font_family: "Times New Roman".to_string(),
            font_size: 24,
        }
    }
}

impl DocxExportConfig {
    /// Width available to option rows.
    pub fn usable_width(&self) -> f64 {
        (self.page_width as f64 - self.margin_left as f64 - self.margin_right as f64)
            * USABLE_WIDTH_RATIO
    }
}

// ============================================================================
// Export Progress
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportProgress {
    pub current: usize,
    pub total: usize,
    pub phase: String,
}

// ============================================================================
// Document Model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocRun {
    Text { text: String, style: RunStyle },
    Link { text: String, href: String, style: RunStyle },
    Tab,
    Break,
}

impl DocRun {
    fn plain(text: impl Into<String>) -> Self {
        DocRun::Text {
            text: text.into(),
            style: RunStyle::default(),
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        DocRun::Text {
            text: text.into(),
            style: RunStyle::bold(),
        }
    }
}

impl From<Inline> for DocRun {
    fn from(inline: Inline) -> Self {
        match inline {
            Inline::Text { text, style } => DocRun::Text { text, style },
            Inline::Link { text, href, style } => DocRun::Link { text, href, style },
            Inline::LineBreak => DocRun::Break,
        }
    }
}

/// One output paragraph before conversion to docx-rs types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocParagraph {
    pub runs: Vec<DocRun>,
    pub centered: bool,
    /// Left-aligned tab stop positions in twips.
    pub tab_stops: Vec<usize>,
}

impl DocParagraph {
    fn new(runs: Vec<DocRun>) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    /// Visible text, with tabs as `\t` and breaks as `\n`.
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|run| match run {
                DocRun::Text { text, .. } | DocRun::Link { text, .. } => text.as_str(),
                DocRun::Tab => "\t",
                DocRun::Break => "\n",
            })
            .collect()
    }
}

// ============================================================================
// Option Layout
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionLayout {
    /// All options on one line in equal columns.
    SingleRow { columns: usize },
    /// Four options as two rows of two.
    TwoByTwo,
    OnePerLine,
}

/// Rough rendered width of `text`: a fixed average character width scaled
/// by the font size, counted in UTF-16 units.
pub fn estimate_text_width_twips(text: &str, font_size: usize) -> f64 {
    let points = font_size as f64 / 2.0;
    text.encode_utf16().count() as f64 * (points / 12.0) * TWIPS_PER_CHAR_AT_12PT
}

/// `A`, `B`, `C`, ... for option positions.
pub fn option_label(index: usize) -> String {
    u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_add(u32::from(b'A')))
        .and_then(char::from_u32)
        .map(String::from)
        .unwrap_or_default()
}

fn labeled_option_widths(options: &[String], font_size: usize) -> Vec<f64> {
    options
        .iter()
        .enumerate()
        .map(|(i, text)| {
            estimate_text_width_twips(&format!("{}. {}", option_label(i), text), font_size)
        })
        .collect()
}

pub fn choose_option_layout(options: &[String], config: &DocxExportConfig) -> OptionLayout {
    let widths = labeled_option_widths(options, config.font_size);
    let usable = config.usable_width();
    let fits = |column: f64| widths.iter().all(|w| *w < column);

    let layout = match options.len() {
        4 if fits(usable / 4.0) => OptionLayout::SingleRow { columns: 4 },
        4 if fits(usable / 2.0) => OptionLayout::TwoByTwo,
        n @ (2 | 3) if fits(usable / n as f64) => OptionLayout::SingleRow { columns: n },
        _ => OptionLayout::OnePerLine,
    };

    tracing::debug!("Option layout for {} options: {:?}", options.len(), layout);
    layout
}

fn tab_stops(columns: usize, column_width: f64) -> Vec<usize> {
    (1..columns)
        .map(|k| (column_width * k as f64).floor() as usize)
        .collect()
}

/// Runs for options sharing a line, tab separated.
fn option_row(options: &[String], first_index: usize) -> Vec<DocRun> {
    let mut runs = Vec::new();
    for (i, text) in options.iter().enumerate() {
        if i > 0 {
            runs.push(DocRun::Tab);
        }
        runs.push(DocRun::bold(format!("{}. ", option_label(first_index + i))));
        runs.push(DocRun::plain(text.clone()));
    }
    runs
}

/// Paragraphs for a question's options according to the layout heuristic.
pub fn format_options(options: &[String], config: &DocxExportConfig) -> Vec<DocParagraph> {
    let usable = config.usable_width();

    match choose_option_layout(options, config) {
        OptionLayout::SingleRow { columns } => vec![DocParagraph {
            runs: option_row(options, 0),
            centered: false,
            tab_stops: tab_stops(columns, usable / columns as f64),
        }],
        OptionLayout::TwoByTwo => options
            .chunks(2)
            .enumerate()
            .map(|(row, pair)| DocParagraph {
                runs: option_row(pair, row * 2),
                centered: false,
                tab_stops: tab_stops(2, usable / 2.0),
            })
            .collect(),
        OptionLayout::OnePerLine => options
            .iter()
            .enumerate()
            .map(|(i, text)| DocParagraph::new(option_row(std::slice::from_ref(text), i)))
            .collect(),
    }
}

// ============================================================================
// Question Layout
// ============================================================================

fn question_label(number: usize) -> DocRun {
    DocRun::bold(format!("Question {}: ", number))
}

/// Replaces each blank marker left to right with a bold numbered gap.
fn number_blanks(passage: &str, first: usize) -> String {
    let mut out = String::with_capacity(passage.len());
    let mut next = first;
    let mut rest = passage;

    while let Some(pos) = rest.find(BLANK_MARKER) {
        out.push_str(&rest[..pos]);
        out.push_str(&format!("<b>({}) _________</b>", next));
        next += 1;
        rest = &rest[pos + BLANK_MARKER.len()..];
    }
    out.push_str(rest);
    out
}

struct DocumentBuilder<'a> {
    config: &'a DocxExportConfig,
    paragraphs: Vec<DocParagraph>,
    question_number: usize,
}

impl<'a> DocumentBuilder<'a> {
    fn new(config: &'a DocxExportConfig) -> Self {
        Self {
            config,
            paragraphs: Vec::new(),
            question_number: 0,
        }
    }

    fn next_number(&mut self) -> usize {
        self.question_number += 1;
        self.question_number
    }

    fn push_instruction(&mut self, instruction: &str) {
        self.paragraphs.push(DocParagraph::new(vec![DocRun::Text {
            text: instruction.to_string(),
            style: RunStyle {
                bold: true,
                italic: true,
                underline: false,
            },
        }]));
    }

    fn push_title(&mut self, title: Option<&str>) {
        let text = match title.map(plain_text) {
            Some(text) if !text.is_empty() => text,
            _ => return,
        };
        self.paragraphs.push(DocParagraph {
            runs: vec![DocRun::bold(text)],
            centered: true,
            tab_stops: Vec::new(),
        });
    }

    /// Top-level paragraphs stay paragraphs; loose runs between them are
    /// gathered into one.
    fn push_rich_text(&mut self, html: &str) -> Result<(), ExportError> {
        let mut loose: Vec<DocRun> = Vec::new();

        for block in parse_rich_text(html)? {
            match block {
                Block::Paragraph(runs) => {
                    if !loose.is_empty() {
                        self.paragraphs
                            .push(DocParagraph::new(std::mem::take(&mut loose)));
                    }
                    self.paragraphs
                        .push(DocParagraph::new(runs.into_iter().map(DocRun::from).collect()));
                }
                Block::Inline(run) => loose.push(run.into()),
            }
        }

        if !loose.is_empty() {
            self.paragraphs.push(DocParagraph::new(loose));
        }
        Ok(())
    }

    /// "Question N: " followed by the content, inline when the content is a
    /// single paragraph, otherwise on the following lines.
    fn push_labeled(&mut self, html: &str) -> Result<(), ExportError> {
        let number = self.next_number();
        let stripped = strip_outer_paragraph(html);

        if stripped.has_inner_paragraph {
            self.paragraphs
                .push(DocParagraph::new(vec![question_label(number)]));
            return self.push_rich_text(stripped.html);
        }

        let mut runs = vec![question_label(number)];
        runs.extend(parse_inline(stripped.html)?.into_iter().map(DocRun::from));
        self.paragraphs.push(DocParagraph::new(runs));
        Ok(())
    }

    fn push_options(&mut self, options: &[String]) {
        let paragraphs = format_options(options, self.config);
        self.paragraphs.extend(paragraphs);
    }

    fn push_sub_question(&mut self, sub: &SubQuestion) -> Result<(), ExportError> {
        self.push_labeled(&sub.text)?;
        self.push_options(&sub.options);
        Ok(())
    }

    fn push_question(&mut self, question: &Question) -> Result<(), ExportError> {
        match question {
            Question::Mcq(q) => {
                self.push_labeled(&q.text)?;
                self.push_options(&q.options);
            }
            Question::Reading(q) => {
                self.push_title(q.title.as_deref());
                if !q.passage.is_empty() {
                    self.push_rich_text(&q.passage)?;
                }
                for sub in &q.questions {
                    self.push_sub_question(sub)?;
                }
            }
            Question::FillInTheBlank(q) => {
                self.push_title(q.title.as_deref());
                if !q.passage.is_empty() {
                    let passage = number_blanks(&q.passage, self.question_number + 1);
                    self.push_rich_text(&passage)?;
                }
                // Sub-question text is not printed, only its options.
                for sub in &q.questions {
                    let number = self.next_number();
                    self.paragraphs
                        .push(DocParagraph::new(vec![question_label(number)]));
                    self.push_options(&sub.options);
                }
            }
            Question::Writing(q) => {
                self.push_labeled(&q.text)?;
            }
            Question::Unsupported(_) => {
                tracing::debug!("Skipping unsupported question in DOCX export");
            }
        }
        Ok(())
    }
}

/// Lays out the whole test as paragraphs, numbering questions across
/// top-level and nested sub-questions.
pub fn build_paragraphs(
    test: &Test,
    config: &DocxExportConfig,
) -> Result<Vec<DocParagraph>, ExportError> {
    build_paragraphs_with_progress(test, config, &|_| {})
}

fn build_paragraphs_with_progress(
    test: &Test,
    config: &DocxExportConfig,
    progress_callback: &dyn Fn(ExportProgress),
) -> Result<Vec<DocParagraph>, ExportError> {
    let mut builder = DocumentBuilder::new(config);
    let total = test.questions.len();

    if let Some(instruction) = test.instruction.as_deref().filter(|s| !s.is_empty()) {
        builder.push_instruction(instruction);
    }

    for (i, question) in test.questions.iter().enumerate() {
        builder.push_question(question)?;
        progress_callback(ExportProgress {
            current: i + 1,
            total,
            phase: "Processing questions".to_string(),
        });
    }

    Ok(builder.paragraphs)
}

// ============================================================================
// docx-rs Conversion
// ============================================================================

fn styled_run(text: &str, style: RunStyle) -> Run {
    let mut run = Run::new().add_text(text);
    if style.bold {
        run = run.bold();
    }
    if style.italic {
        run = run.italic();
    }
    if style.underline {
        run = run.underline("single");
    }
    run
}

fn to_docx_paragraph(paragraph: &DocParagraph) -> Paragraph {
    let mut para = Paragraph::new();
    if paragraph.centered {
        para = para.align(AlignmentType::Center);
    }
    for pos in &paragraph.tab_stops {
        para = para.add_tab(Tab::new().val(TabValueType::Left).pos(*pos));
    }

    for run in &paragraph.runs {
        para = match run {
            DocRun::Text { text, style } => para.add_run(styled_run(text, *style)),
            DocRun::Link { text, href, style } if !href.is_empty() => {
                let run = styled_run(text, *style)
                    .color(LINK_COLOR)
                    .underline("single");
                para.add_hyperlink(Hyperlink::new(href, HyperlinkType::External).add_run(run))
            }
            DocRun::Link { text, style, .. } => para.add_run(styled_run(text, *style)),
            DocRun::Tab => para.add_run(Run::new().add_tab()),
            DocRun::Break => para.add_run(Run::new().add_break(BreakType::TextWrapping)),
        };
    }

    para
}

fn base_fonts(family: &str) -> RunFonts {
    RunFonts::new()
        .ascii(family)
        .hi_ansi(family)
        .east_asia(family)
        .cs(family)
}

/// Converts a test to DOCX bytes. Nothing is returned unless the whole
/// document was built.
pub fn test_to_docx<F>(
    test: &Test,
    config: &DocxExportConfig,
    progress_callback: F,
) -> Result<Vec<u8>, ExportError>
where
    F: Fn(ExportProgress),
{
    let total = test.questions.len();

    progress_callback(ExportProgress {
        current: 0,
        total,
        phase: "Processing questions".to_string(),
    });

    let paragraphs = build_paragraphs_with_progress(test, config, &progress_callback)?;

    progress_callback(ExportProgress {
        current: total,
        total,
        phase: "Building document".to_string(),
    });

    let mut docx = Docx::new()
        .page_size(config.page_width, config.page_height)
        .page_margin(
            PageMargin::new()
                .top(config.margin_top)
                .bottom(config.margin_bottom)
                .left(config.margin_left)
                .right(config.margin_right),
        )
        .default_fonts(base_fonts(&config.font_family))
        .default_size(config.font_size);

    for paragraph in &paragraphs {
        docx = docx.add_paragraph(to_docx_paragraph(paragraph));
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ExportError::Docx(e.to_string()))?;

    progress_callback(ExportProgress {
        current: total,
        total,
        phase: "Complete".to_string(),
    });

    tracing::info!(
        "Exported test {} to DOCX ({} questions, {} paragraphs)",
        test.id,
        total,
        paragraphs.len()
    );

    Ok(buffer.into_inner())
}
