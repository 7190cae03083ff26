// XLSX Export Service
// Answer key workbook: one column per test, one row per flattened question

use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::error::ExportError;
use super::model::{Question, QuestionKind, Test};

pub const SHEET_NAME: &str = "Answers";

// ============================================================================
// Flattening
// ============================================================================

/// One answerable entry after nested sub-questions are lifted to the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatQuestion<'a> {
    /// An option-based entry; `kind` is the parent's kind for sub-questions.
    Choice { kind: QuestionKind, correct_answer: i32 },
    Writing { answer: &'a str },
    Unsupported,
}

impl FlatQuestion<'_> {
    pub fn kind(&self) -> QuestionKind {
        match self {
            FlatQuestion::Choice { kind, .. } => *kind,
            FlatQuestion::Writing { .. } => QuestionKind::Writing,
            FlatQuestion::Unsupported => QuestionKind::Unsupported,
        }
    }

    /// The answer key cell: a letter for choices, the reference text for
    /// writing, empty otherwise.
    pub fn answer(&self) -> String {
        match self {
            FlatQuestion::Choice { correct_answer, .. } => answer_letter(*correct_answer),
            FlatQuestion::Writing { answer } => answer.to_string(),
            FlatQuestion::Unsupported => String::new(),
        }
    }
}

/// `'A' + index`. An unmarked answer (-1) comes out as `@`.
pub fn answer_letter(correct_answer: i32) -> String {
    u32::try_from(i64::from(b'A') + i64::from(correct_answer))
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
        .unwrap_or_default()
}

/// Reading and fill-in-the-blank questions are replaced in place by their
/// sub-questions.
pub fn flatten_questions(questions: &[Question]) -> Vec<FlatQuestion<'_>> {
    let mut flat = Vec::new();
    for question in questions {
        match question {
            Question::Mcq(q) => flat.push(FlatQuestion::Choice {
                kind: QuestionKind::Mcq,
                correct_answer: q.correct_answer,
            }),
            Question::Reading(_) | Question::FillInTheBlank(_) => {
                let kind = question.kind();
                flat.extend(question.sub_questions().iter().map(|sub| FlatQuestion::Choice {
                    kind,
                    correct_answer: sub.correct_answer,
                }));
            }
            Question::Writing(q) => flat.push(FlatQuestion::Writing { answer: &q.answer }),
            Question::Unsupported(_) => flat.push(FlatQuestion::Unsupported),
        }
    }
    flat
}

// ============================================================================
// Answer Matrix
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerMatrix {
    pub headers: Vec<String>,
    /// Row-major; every row has `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

/// `None` when there are no tests.
pub fn build_answer_matrix(tests: &[Test]) -> Option<AnswerMatrix> {
    if tests.is_empty() {
        return None;
    }

    let headers = tests.iter().map(|t| t.name.clone()).collect();
    let columns: Vec<Vec<FlatQuestion>> =
        tests.iter().map(|t| flatten_questions(&t.questions)).collect();
    let height = columns.iter().map(Vec::len).max().unwrap_or(0);

    let rows = (0..height)
        .map(|i| {
            columns
                .iter()
                .map(|column| column.get(i).map(FlatQuestion::answer).unwrap_or_default())
                .collect()
        })
        .collect();

    Some(AnswerMatrix { headers, rows })
}

// ============================================================================
// Workbook Writer
// ============================================================================

/// Spreadsheet column name for a zero-based index: A..Z, AA..
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Drops characters XML 1.0 cannot carry, such as the vertical tabs Word
/// leaves in pasted text.
fn xml_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| match *c {
            '\t' | '\n' | '\r' => true,
            '\u{0}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}' => false,
            _ => true,
        })
        .collect()
}

fn push_row(xml: &mut String, row_number: usize, cells: &[String]) {
    xml.push_str(&format!("<row r=\"{}\">", row_number));
    for (col, value) in cells.iter().enumerate() {
        xml.push_str(&format!(
            "<c r=\"{}{}\" s=\"1\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            column_name(col),
            row_number,
            escape(xml_safe(value).as_str())
        ));
    }
    xml.push_str("</row>");
}

fn build_sheet_xml(matrix: &AnswerMatrix) -> String {
    let mut rows = String::new();
    push_row(&mut rows, 1, &matrix.headers);
    for (i, row) in matrix.rows.iter().enumerate() {
        push_row(&mut rows, i + 2, row);
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
        rows
    )
}

fn write_part(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    content: &str,
    options: SimpleFileOptions,
) -> Result<(), ExportError> {
    zip.start_file(name, options)?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

/// Answer key workbook bytes, or `None` when there is nothing to export.
pub fn tests_to_xlsx(tests: &[Test]) -> Result<Option<Vec<u8>>, ExportError> {
    let matrix = match build_answer_matrix(tests) {
        Some(matrix) => matrix,
        None => return Ok(None),
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    write_part(&mut zip, "[Content_Types].xml", CONTENT_TYPES_XML, options)?;
    write_part(&mut zip, "_rels/.rels", RELS_XML, options)?;
    write_part(&mut zip, "xl/workbook.xml", WORKBOOK_XML, options)?;
    write_part(&mut zip, "xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML, options)?;
    write_part(&mut zip, "xl/styles.xml", STYLES_XML, options)?;
    write_part(
        &mut zip,
        "xl/worksheets/sheet1.xml",
        &build_sheet_xml(&matrix),
        options,
    )?;

    let bytes = zip.finish()?.into_inner();

    tracing::info!(
        "Exported answer key for {} tests ({} rows)",
        matrix.headers.len(),
        matrix.rows.len()
    );

    Ok(Some(bytes))
}

// ============================================================================
// OOXML Templates
// ============================================================================

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Answers" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

// Style 1 is the left/top aligned cell format every cell uses.
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment horizontal="left" vertical="top"/></xf>
  </cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;
