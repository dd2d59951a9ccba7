//! Local text extraction for uploaded documents, chosen by file extension.
//!
//! Supported: `.pdf`, `.docx`, `.csv`, `.json`, `.txt`, `.md`.

use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Maximum decompressed bytes to read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Extract plain UTF-8 text from a document.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "csv" => Ok(extract_csv(&String::from_utf8(bytes.to_vec())?)),
        "json" => extract_json(bytes),
        "txt" | "md" => Ok(String::from_utf8(bytes.to_vec())?),
        "" => Err(ExtractError::UnsupportedFormat(filename.to_string())),
        other => Err(ExtractError::UnsupportedFormat(format!(".{other}"))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    docx_paragraphs(&xml)
}

/// Collect `w:t` runs, one line per `w:p` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

/// Render each CSV record as `header: value` lines, records separated by blank lines.
fn extract_csv(text: &str) -> String {
    let mut records = csv_records(text).into_iter();
    let Some(headers) = records.next() else {
        return String::new();
    };

    records
        .map(|record| {
            record
                .into_iter()
                .enumerate()
                .map(|(i, value)| match headers.get(i) {
                    Some(h) => format!("{h}: {value}"),
                    None => value,
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split CSV text into records. Quoted fields may contain commas, escaped
/// quotes and line breaks; blank records are dropped.
fn csv_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => record.push(std::mem::take(&mut field).trim().to_string()),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => end_record(&mut records, &mut record, &mut field),
            _ => field.push(c),
        }
    }
    end_record(&mut records, &mut record, &mut field);
    records
}

fn end_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    record.push(std::mem::take(field).trim().to_string());
    let record = std::mem::take(record);
    if record.iter().any(|f| !f.is_empty()) {
        records.push(record);
    }
}

fn extract_json(bytes: &[u8]) -> Result<String, ExtractError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
