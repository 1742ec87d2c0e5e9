//! Minimal SpreadsheetML writer: one worksheet, a merged title row, a header
//! row, and bordered data rows, packaged as an `.xlsx` zip archive.

use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::sync::LazyLock;

use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::Result;

pub const FONT_NAME: &str = "DFKai-SB";
const MAX_SHEET_NAME: usize = 31;
const FALLBACK_SHEET_NAME: &str = "Sheet1";
/// Excel keeps this name for its own change-history sheet.
const RESERVED_SHEET_NAME: &str = "History";

static ILLEGAL_SHEET_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]:*?/\\]").expect("valid sheet-name pattern"));

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

// cellXfs indices in styles.xml
const STYLE_TITLE: u32 = 1;
const STYLE_HEADER: u32 = 2;
const STYLE_CENTER: u32 = 3;
const STYLE_LEFT: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Center,
    Left,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub header: &'static str,
    pub width: f64,
    pub align: Align,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub sheet_name: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

/// Render the table as an `.xlsx` package.
pub fn write_workbook(table: &Table) -> Result<Vec<u8>> {
    let sheet_name = sanitize_sheet_name(&table.sheet_name);

    let parts = [
        ("[Content_Types].xml", content_types()),
        ("_rels/.rels", root_rels()),
        ("xl/workbook.xml", workbook(&sheet_name)),
        ("xl/_rels/workbook.xml.rels", workbook_rels()),
        ("xl/styles.xml", styles()),
        ("xl/worksheets/sheet1.xml", worksheet(table)),
    ];

    let buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(buffer);

    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (path, content) in parts {
        zip.start_file(path, options)?;
        zip.write_all(content.as_bytes())?;
    }

    let result = zip.finish()?;
    Ok(result.into_inner())
}

/// Spreadsheet column letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// Drop characters a worksheet name may not contain and cap it at 31 chars.
///
/// The result never starts or ends with `'` and is never the reserved
/// `History` name; both would make Excel repair the workbook on open.
pub fn sanitize_sheet_name(name: &str) -> String {
    let truncated: String = ILLEGAL_SHEET_CHARS
        .replace_all(name, "")
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = truncated.trim_matches('\'');

    if cleaned.trim().is_empty() || cleaned.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        FALLBACK_SHEET_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Escape XML markup and drop characters XML 1.0 cannot carry.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

fn content_types() -> String {
    format!(
        concat!(
            "{}",
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
            r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
            r#"</Types>"#
        ),
        XML_DECL
    )
}

fn root_rels() -> String {
    format!(
        concat!(
            "{}",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
            r#"</Relationships>"#
        ),
        XML_DECL
    )
}

fn workbook_rels() -> String {
    format!(
        concat!(
            "{}",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
            r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            r#"</Relationships>"#
        ),
        XML_DECL
    )
}

fn workbook(sheet_name: &str) -> String {
    // Rows 1-2 repeat on every printed page.
    let print_titles = format!("'{}'!$1:$2", sheet_name.replace('\'', "''"));
    format!(
        r#"{}<workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets><definedNames><definedName name="_xlnm.Print_Titles" localSheetId="0">{}</definedName></definedNames></workbook>"#,
        XML_DECL,
        NS_MAIN,
        NS_REL,
        escape_xml(sheet_name),
        escape_xml(&print_titles)
    )
}

fn styles() -> String {
    let alignment = |horizontal: &str| {
        format!(
            r#"<alignment horizontal="{}" vertical="center" wrapText="1"/>"#,
            horizontal
        )
    };
    let thin = r#"style="thin"><color auto="1"/>"#;

    let mut xml = String::from(XML_DECL);
    let _ = write!(xml, r#"<styleSheet xmlns="{}">"#, NS_MAIN);
    let _ = write!(
        xml,
        r#"<fonts count="2"><font><sz val="13"/><name val="{f}"/></font><font><sz val="16"/><name val="{f}"/></font></fonts>"#,
        f = FONT_NAME
    );
    xml.push_str(concat!(
        r#"<fills count="3">"#,
        r#"<fill><patternFill patternType="none"/></fill>"#,
        r#"<fill><patternFill patternType="gray125"/></fill>"#,
        r#"<fill><patternFill patternType="solid"><fgColor rgb="FFD3D3D3"/><bgColor indexed="64"/></patternFill></fill>"#,
        r#"</fills>"#
    ));
    let _ = write!(
        xml,
        r#"<borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left {t}</left><right {t}</right><top {t}</top><bottom {t}</bottom><diagonal/></border></borders>"#,
        t = thin
    );
    xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);
    let _ = write!(
        xml,
        concat!(
            r#"<cellXfs count="5">"#,
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment horizontal="center"/></xf>"#,
            r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="1" xfId="0" applyFont="1" applyBorder="1" applyAlignment="1">{c}</xf>"#,
            r#"<xf numFmtId="0" fontId="0" fillId="2" borderId="1" xfId="0" applyFill="1" applyBorder="1" applyAlignment="1">{c}</xf>"#,
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1" applyAlignment="1">{c}</xf>"#,
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1" applyAlignment="1">{l}</xf>"#,
            r#"</cellXfs>"#
        ),
        c = alignment("center"),
        l = alignment("left")
    );
    xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
    xml.push_str("</styleSheet>");
    xml
}

fn push_cell(xml: &mut String, reference: &str, style: u32, value: &str) {
    if value.is_empty() {
        let _ = write!(xml, r#"<c r="{}" s="{}"/>"#, reference, style);
    } else {
        let _ = write!(
            xml,
            r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            reference,
            style,
            escape_xml(value)
        );
    }
}

fn worksheet(table: &Table) -> String {
    let width = table.columns.len().max(1);
    let last_col = column_name(width - 1);
    let last_row = table.rows.len() + 2;

    let mut xml = String::from(XML_DECL);
    let _ = write!(xml, r#"<worksheet xmlns="{}" xmlns:r="{}">"#, NS_MAIN, NS_REL);
    xml.push_str(r#"<sheetPr><pageSetUpPr fitToPage="1"/></sheetPr>"#);
    let _ = write!(xml, r#"<dimension ref="A1:{}{}"/>"#, last_col, last_row);
    xml.push_str(r#"<sheetFormatPr defaultRowHeight="16.5"/>"#);

    if !table.columns.is_empty() {
        xml.push_str("<cols>");
        for (i, col) in table.columns.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                n = i + 1,
                w = col.width
            );
        }
        xml.push_str("</cols>");
    }

    xml.push_str("<sheetData>");

    xml.push_str(r#"<row r="1">"#);
    for i in 0..width {
        let value = if i == 0 { table.title.as_str() } else { "" };
        push_cell(&mut xml, &format!("{}1", column_name(i)), STYLE_TITLE, value);
    }
    xml.push_str("</row>");

    xml.push_str(r#"<row r="2">"#);
    for (i, col) in table.columns.iter().enumerate() {
        push_cell(&mut xml, &format!("{}2", column_name(i)), STYLE_HEADER, col.header);
    }
    xml.push_str("</row>");

    for (offset, row) in table.rows.iter().enumerate() {
        let r = offset + 3;
        let _ = write!(xml, r#"<row r="{}">"#, r);
        for (i, col) in table.columns.iter().enumerate() {
            let style = match col.align {
                Align::Center => STYLE_CENTER,
                Align::Left => STYLE_LEFT,
            };
            let value = row.get(i).map(String::as_str).unwrap_or("");
            push_cell(&mut xml, &format!("{}{}", column_name(i), r), style, value);
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if width > 1 {
        let _ = write!(
            xml,
            r#"<mergeCells count="1"><mergeCell ref="A1:{}1"/></mergeCells>"#,
            last_col
        );
    }

    xml.push_str(r#"<pageMargins left="0.2" right="0.2" top="0.2" bottom="0.2" header="0.2" footer="0.04"/>"#);
    xml.push_str(r#"<pageSetup paperSize="9" orientation="landscape" fitToWidth="1" fitToHeight="0"/>"#);
    xml.push_str(r#"<headerFooter><oddFooter>&amp;CPage &amp;P of &amp;N</oddFooter></headerFooter>"#);
    xml.push_str("</worksheet>");
    xml
}
