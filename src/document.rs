//! Contract and exit-report PDFs.
//!
//! Layout is written in millimetres from the top-left corner of an A4 page and converted to
//! PDF points at emit time. Pages use the three standard Helvetica faces with WinAnsi
//! encoding, so text is transcoded to Latin-1.

use crate::error::{Error, Result};
use crate::form::Registration;
use crate::surface::SignatureImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::fs;
use std::path::{Path, PathBuf};

const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const PT_PER_MM: f32 = 72.0 / 25.4;
const MARGIN_MM: f32 = 20.0;
// Average Helvetica advance, in ems. Good enough for alignment and wrapping.
const AVG_ADVANCE_EM: f32 = 0.5;

const CLAUSES: [&str; 4] = [
    "01. ADMISSION: The club reserves the right of admission according to its security protocols.",
    "02. BIOMETRICS: The guest authorises capture of their image for access control purposes.",
    "03. RESPONSIBILITY: The guest is responsible for their conduct and moderate consumption.",
    "04. EXIT: The guest agrees to report their official exit to close this record.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
    Italic,
}

impl Face {
    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Italic => "F3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Per-document header data: when it was generated and its folio number.
#[derive(Debug, Clone)]
pub struct Stamp {
    pub timestamp: String,
    pub folio: u32,
}

/// Text as WinAnsi bytes; characters outside Latin-1 become '?'.
pub fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' }).collect()
}

/// Estimated rendered width in mm.
pub fn text_width_mm(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * AVG_ADVANCE_EM / PT_PER_MM
}

/// Greedy word wrap to `max_mm`. A single over-long word gets its own line.
pub fn wrap_text(text: &str, max_mm: f32, size_pt: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() { word.to_string() } else { format!("{line} {word}") };
        if !line.is_empty() && text_width_mm(&candidate, size_pt) > max_mm {
            lines.push(std::mem::take(&mut line));
            line = word.to_string();
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Raster image queued for embedding, keyed by its resource name.
struct PendingImage {
    name: String,
    png: Vec<u8>,
}

/// Drawing operations for one page, in mm.
pub struct PageBuilder {
    ops: Vec<Operation>,
    images: Vec<PendingImage>,
    font_size: f32,
    face: Face,
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PageBuilder {
    pub fn new() -> Self {
        Self { ops: Vec::new(), images: Vec::new(), font_size: 10.0, face: Face::Regular }
    }

    pub fn font(&mut self, face: Face, size_pt: f32) {
        self.face = face;
        self.font_size = size_pt;
    }

    /// Text fill colour (also used by filled rectangles).
    pub fn fill_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.ops.push(Operation::new("rg", vec![unit(r), unit(g), unit(b)]));
    }

    pub fn stroke_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.ops.push(Operation::new("RG", vec![unit(r), unit(g), unit(b)]));
    }

    pub fn line_width(&mut self, mm: f32) {
        self.ops.push(Operation::new("w", vec![(mm * PT_PER_MM).into()]));
    }

    /// Text with its baseline at `y`.
    pub fn text(&mut self, x: f32, y: f32, text: &str, align: Align) {
        let width = text_width_mm(text, self.font_size);
        let x = match align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
            Align::Right => x - width,
        };
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("Tf", vec![self.face.resource().into(), self.font_size.into()]));
        self.ops.push(Operation::new("Td", vec![pt_x(x), pt_y(y)]));
        self.ops.push(Operation::new("Tj", vec![Object::String(latin1(text), StringFormat::Literal)]));
        self.ops.push(Operation::new("ET", vec![]));
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.ops.push(Operation::new("m", vec![pt_x(x1), pt_y(y1)]));
        self.ops.push(Operation::new("l", vec![pt_x(x2), pt_y(y2)]));
        self.ops.push(Operation::new("S", vec![]));
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, filled: bool) {
        self.ops.push(Operation::new(
            "re",
            vec![pt_x(x), pt_y(y + h), (w * PT_PER_MM).into(), (h * PT_PER_MM).into()],
        ));
        self.ops.push(Operation::new(if filled { "f" } else { "S" }, vec![]));
    }

    /// Place a PNG in the box (x, y, w, h).
    pub fn image(&mut self, png: &[u8], x: f32, y: f32, w: f32, h: f32) {
        let name = format!("Im{}", self.images.len());
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                (w * PT_PER_MM).into(),
                0.0f32.into(),
                0.0f32.into(),
                (h * PT_PER_MM).into(),
                pt_x(x),
                pt_y(y + h),
            ],
        ));
        self.ops.push(Operation::new("Do", vec![name.as_str().into()]));
        self.ops.push(Operation::new("Q", vec![]));
        self.images.push(PendingImage { name, png: png.to_vec() });
    }

    /// Every string shown on the page, in drawing order.
    pub fn texts(&self) -> Vec<String> {
        self.ops
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.iter().map(|&b| b as char).collect()),
                _ => None,
            })
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Serialise this page as a complete single-page PDF.
    pub fn into_pdf(self) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        doc.trailer.set("Creator", Object::string_literal("signing-kiosk"));
        let pages_id = doc.new_object_id();

        let face = |base: &str| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base,
                "Encoding" => "WinAnsiEncoding",
            }
        };
        let mut resources = dictionary! {
            "Font" => dictionary! {
                "F1" => face("Helvetica"),
                "F2" => face("Helvetica-Bold"),
                "F3" => face("Helvetica-Oblique"),
            },
        };

        let mut xobjects = Dictionary::new();
        for pending in &self.images {
            let id = embed_png(&mut doc, &pending.png)?;
            xobjects.set(pending.name.as_str(), id);
        }
        if !self.images.is_empty() {
            resources.set("XObject", xobjects);
        }

        let content = Content { operations: self.ops };
        let encoded = content.encode().map_err(|e| Error::Document(format!("encode content: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
            "MediaBox" => vec![0.0f32.into(), 0.0f32.into(), (PAGE_W_MM * PT_PER_MM).into(), (PAGE_H_MM * PT_PER_MM).into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    }
}

fn unit(c: u8) -> Object {
    (c as f32 / 255.0).into()
}

fn pt_x(mm: f32) -> Object {
    (mm * PT_PER_MM).into()
}

fn pt_y(mm: f32) -> Object {
    ((PAGE_H_MM - mm) * PT_PER_MM).into()
}

/// Decode a PNG and add it as an RGB image XObject, with its alpha as a soft mask.
fn embed_png(doc: &mut Document, png: &[u8]) -> Result<ObjectId> {
    let img = image::load_from_memory(png)?.to_rgba8();
    let (w, h) = img.dimensions();
    let mut rgb = Vec::with_capacity((w * h * 3) as usize);
    let mut alpha = Vec::with_capacity((w * h) as usize);
    for px in img.pixels() {
        rgb.extend_from_slice(&px.0[..3]);
        alpha.push(px.0[3]);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => w as i64,
        "Height" => h as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if alpha.iter().any(|&a| a != 255) {
        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        dict.set("SMask", smask_id);
    }
    Ok(doc.add_object(Stream::new(dict, rgb)))
}

/// Builds the kiosk's documents for one club.
pub struct DocumentGenerator {
    club_name: String,
}

impl DocumentGenerator {
    pub fn new(club_name: &str) -> Self {
        Self { club_name: club_name.to_string() }
    }

    /// Border, header band, ids, footer. Returns the y where body content starts.
    fn legal_template(&self, page: &mut PageBuilder, doc_number: &str, stamp: &Stamp) -> f32 {
        let (w, h, m) = (PAGE_W_MM, PAGE_H_MM, MARGIN_MM);

        page.stroke_rgb(40, 40, 40);
        page.line_width(0.1);
        page.rect(10.0, 10.0, w - 20.0, h - 20.0, false);

        page.fill_rgb(240, 240, 245);
        page.rect(m, m, w - m * 2.0, 25.0, true);

        page.fill_rgb(0, 0, 0);
        page.font(Face::Bold, 14.0);
        page.text(m + 5.0, m + 12.0, &self.club_name, Align::Left);
        page.font(Face::Regular, 7.0);
        page.text(m + 5.0, m + 18.0, "SINGLE ACCESS AND CIVIL LIABILITY RECORD", Align::Left);

        page.fill_rgb(100, 100, 100);
        page.font(Face::Regular, 8.0);
        let id = if doc_number.is_empty() { "N/A" } else { doc_number };
        page.text(w - m - 5.0, m + 10.0, &format!("DOC ID: {id}"), Align::Right);
        page.text(w - m - 5.0, m + 15.0, &format!("FOLIO: {}", stamp.folio), Align::Right);

        page.font(Face::Regular, 7.0);
        page.text(w / 2.0, h - 15.0, "Digitally generated document - PAGE 1", Align::Center);
        page.text(w / 2.0, h - 12.0, &format!("Timestamp: {}", stamp.timestamp), Align::Center);

        page.fill_rgb(0, 0, 0);
        m + 40.0
    }

    fn section(page: &mut PageBuilder, y: f32, title: &str, rule: bool) {
        page.font(Face::Bold, page.font_size);
        page.text(20.0, y, title, Align::Left);
        if rule {
            page.line(20.0, y + 2.0, 190.0, y + 2.0);
        }
    }

    /// Page content of the signed entry contract.
    pub fn entry_page(&self, reg: &Registration, signature: &SignatureImage, stamp: &Stamp) -> PageBuilder {
        let mut page = PageBuilder::new();
        let mut y = self.legal_template(&mut page, &reg.document_number, stamp);

        page.font(Face::Bold, 10.0);
        Self::section(&mut page, y, "1. HOLDER IDENTIFICATION", true);
        y += 10.0;

        let alias = reg.artistic_name_or("NONE");
        let rows = [
            ("FULL NAME:", reg.full_name.as_str()),
            ("ARTISTIC NAME:", alias.as_str()),
            ("DOCUMENT TYPE:", reg.document_type.label()),
            ("ID NUMBER:", reg.document_number.as_str()),
            ("REGISTRATION DATE:", stamp.timestamp.as_str()),
        ];
        for (label, value) in rows {
            page.font(Face::Bold, 10.0);
            page.text(25.0, y, label, Align::Left);
            page.font(Face::Regular, 10.0);
            page.text(80.0, y, value, Align::Left);
            y += 7.0;
        }

        y += 5.0;
        page.font(Face::Bold, 10.0);
        Self::section(&mut page, y, "2. SECURITY PHOTO RECORD", false);
        y += 8.0;
        if let Some(selfie) = &reg.selfie {
            page.image(&selfie.png, 25.0, y, 40.0, 40.0);
        }
        if let Some(front) = &reg.document_front {
            page.image(&front.png, 75.0, y, 55.0, 35.0);
        }

        y += 50.0;
        page.font(Face::Bold, 9.0);
        Self::section(&mut page, y, "3. INTERNAL RULES", true);
        y += 10.0;

        page.font(Face::Regular, 8.0);
        for clause in CLAUSES {
            page.text(25.0, y, clause, Align::Left);
            y += 6.0;
        }

        y += 5.0;
        Self::section(&mut page, y, "4. ACCEPTANCE AND DIGITAL SIGNATURE", false);
        y += 8.0;

        let declaration = format!(
            "I, {}, holder of {} No. {}, declare under oath that I freely accept the terms and \
             conditions described above for entry to {}.",
            reg.full_name,
            reg.document_type.label(),
            reg.document_number,
            self.club_name
        );
        page.font(Face::Italic, 8.0);
        let lines = wrap_text(&declaration, 160.0, 8.0);
        for (i, line) in lines.iter().enumerate() {
            page.text(25.0, y + i as f32 * 5.0, line, Align::Left);
        }

        y += lines.len() as f32 * 5.0 + 5.0;
        page.image(&signature.png, 25.0, y, 50.0, 20.0);
        y += 25.0;
        page.font(Face::Regular, 8.0);
        page.text(25.0, y, "__________________________", Align::Left);
        page.text(25.0, y + 5.0, "SIGNATURE OF GUEST", Align::Left);
        page
    }

    /// Page content of the exit report.
    pub fn exit_page(&self, reg: &Registration, stamp: &Stamp) -> PageBuilder {
        let mut page = PageBuilder::new();
        let mut y = self.legal_template(&mut page, &reg.document_number, stamp);
        page.font(Face::Bold, 10.0);
        page.text(20.0, y, "OFFICIAL EXIT REPORT", Align::Left);
        y += 15.0;
        page.text(25.0, y, &format!("GUEST: {}", reg.full_name), Align::Left);
        page.text(120.0, y, &format!("TIME: {}", stamp.timestamp), Align::Left);
        page
    }

    pub fn entry_contract(&self, reg: &Registration, signature: &SignatureImage, stamp: &Stamp) -> Result<Vec<u8>> {
        self.entry_page(reg, signature, stamp).into_pdf()
    }

    pub fn exit_report(&self, reg: &Registration, stamp: &Stamp) -> Result<Vec<u8>> {
        self.exit_page(reg, stamp).into_pdf()
    }
}

fn file_safe(doc_number: &str) -> String {
    let s: String = doc_number
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if s.is_empty() { "UNKNOWN".to_string() } else { s }
}

pub fn contract_file_name(doc_number: &str) -> String {
    format!("CONTRACT_{}.pdf", file_safe(doc_number))
}

pub fn exit_file_name(doc_number: &str) -> String {
    format!("EXIT_{}.pdf", file_safe(doc_number))
}

/// Write a document into `dir`, creating it if needed.
pub fn save_to_dir(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)?;
    Ok(path)
}
