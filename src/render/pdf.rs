//! Minimal PDF writer
//!
//! Uses the standard Helvetica faces so no font files are needed, and writes
//! no timestamps or random identifiers: equal input gives equal bytes.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use super::RenderError;
use super::template::RenderedLine;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;

const HEADING_SIZE: i64 = 18;
const HEADING_LEADING: i64 = 28;
const HEADING_WRAP: usize = 48;

const BODY_SIZE: i64 = 11;
const BODY_LEADING: i64 = 16;
const BODY_WRAP: usize = 92;

/// Lay out lines top to bottom, starting a new page when one fills up
pub fn write_pdf(title: &str, lines: &[RenderedLine]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in paginate(lines) {
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(title)),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    Ok(buffer)
}

/// Content stream operations per page; always at least one page
fn paginate(lines: &[RenderedLine]) -> Vec<Vec<Operation>> {
    let mut pages = Vec::new();
    let mut operations = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        let (font, size, leading, width) = if line.heading {
            ("F2", HEADING_SIZE, HEADING_LEADING, HEADING_WRAP)
        } else {
            ("F1", BODY_SIZE, BODY_LEADING, BODY_WRAP)
        };

        for fragment in wrap(&line.text, width) {
            if y - leading < MARGIN {
                pages.push(std::mem::take(&mut operations));
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= leading;

            if fragment.is_empty() {
                continue;
            }
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec![font.into(), size.into()]));
            operations.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(win_ansi(&fragment))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
    }

    pages.push(operations);
    pages
}

/// Greedy word wrap on character count; blank input yields one empty line
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Latin-1 bytes for the WinAnsi base fonts; anything outside becomes '?'
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
