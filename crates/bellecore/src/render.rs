//! Certificate rendering.
//!
//! [`PdfCertificateRenderer`] lays out a single-page landscape A4 PDF with
//! printpdf. DejaVu Sans is embedded into every file, so Cyrillic names and
//! course titles keep their glyphs.

use chrono::NaiveDate;
use printpdf::{Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rgb};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::core::error::{AppError, AppResult};
use crate::storage::catalog::Course;
use crate::storage::users::User;

static FONT_REGULAR: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static FONT_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Everything printed on a certificate.
#[derive(Debug, Clone, Copy)]
pub struct CertificateContent<'a> {
    pub user: &'a User,
    pub course: &'a Course,
    pub serial: &'a str,
    pub issued_on: NaiveDate,
}

/// Produces the certificate file at `output_path` and returns the written path.
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, content: &CertificateContent<'_>, output_path: &Path) -> AppResult<PathBuf>;
}

/// Landscape A4
const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;
const MM_PER_PT: f32 = 0.352_778;

const PINK: (f32, f32, f32) = (0.914, 0.118, 0.388);
const DARK: (f32, f32, f32) = (0.2, 0.2, 0.2);
const GREY: (f32, f32, f32) = (0.4, 0.4, 0.4);
const LIGHT: (f32, f32, f32) = (0.6, 0.6, 0.6);

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfCertificateRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weight {
    Regular,
    Bold,
}

struct Line {
    text: String,
    weight: Weight,
    size_pt: f32,
    color: (f32, f32, f32),
    y_mm: f32,
}

fn lines(content: &CertificateContent<'_>) -> Vec<Line> {
    vec![
        Line {
            text: "СЕРТИФИКАТ".into(),
            weight: Weight::Bold,
            size_pt: 36.0,
            color: PINK,
            y_mm: 168.0,
        },
        Line {
            text: "Настоящим подтверждается, что".into(),
            weight: Weight::Regular,
            size_pt: 16.0,
            color: GREY,
            y_mm: 144.0,
        },
        Line {
            text: content.user.full_name.clone(),
            weight: Weight::Bold,
            size_pt: 28.0,
            color: DARK,
            y_mm: 126.0,
        },
        Line {
            text: "успешно завершил(а) курс".into(),
            weight: Weight::Regular,
            size_pt: 16.0,
            color: GREY,
            y_mm: 108.0,
        },
        Line {
            text: format!("«{}»", content.course.title),
            weight: Weight::Bold,
            size_pt: 26.0,
            color: DARK,
            y_mm: 90.0,
        },
        Line {
            text: format!("Дата выдачи: {}", content.issued_on.format("%d.%m.%Y")),
            weight: Weight::Regular,
            size_pt: 16.0,
            color: GREY,
            y_mm: 62.0,
        },
        Line {
            text: format!("Сертификат № {}", content.serial),
            weight: Weight::Regular,
            size_pt: 12.0,
            color: LIGHT,
            y_mm: 38.0,
        },
    ]
}

/// Left edge that roughly centres `text`. DejaVu Sans averages a little over
/// half an em per glyph.
fn centered_x(text: &str, size_pt: f32) -> f32 {
    let width = text.chars().count() as f32 * size_pt * 0.55 * MM_PER_PT;
    ((PAGE_WIDTH_MM - width) / 2.0).max(12.0)
}

fn write_line(layer: &PdfLayerReference, font: &IndirectFontRef, line: &Line) {
    let (r, g, b) = line.color;
    layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    layer.use_text(
        line.text.as_str(),
        line.size_pt,
        Mm(centered_x(&line.text, line.size_pt)),
        Mm(line.y_mm),
        font,
    );
}

impl CertificateRenderer for PdfCertificateRenderer {
    fn render(&self, content: &CertificateContent<'_>, output_path: &Path) -> AppResult<PathBuf> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let (doc, page, layer) = PdfDocument::new(
            format!("Сертификат {}", content.serial),
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "certificate".to_string(),
        );
        let regular = doc
            .add_external_font(FONT_REGULAR)
            .map_err(|e| AppError::Render(format!("cannot load font: {}", e)))?;
        let bold = doc
            .add_external_font(FONT_BOLD)
            .map_err(|e| AppError::Render(format!("cannot load font: {}", e)))?;

        let layer = doc.get_page(page).get_layer(layer);
        for line in lines(content) {
            let font = match line.weight {
                Weight::Regular => &regular,
                Weight::Bold => &bold,
            };
            write_line(&layer, font, &line);
        }

        let file = fs_err::File::create(output_path)?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| AppError::Render(format!("cannot write {}: {}", output_path.display(), e)))?;
        log::info!("Rendered certificate {} to {}", content.serial, output_path.display());
        Ok(output_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(full_name: &str, course_title: &str) -> (User, Course) {
        let user = User {
            id: 7,
            telegram_id: 700,
            username: None,
            full_name: full_name.to_string(),
            phone: None,
            city: None,
            is_active: true,
            points: 0,
            created_at: "2026-01-01 00:00:00".to_string(),
        };
        let course = Course {
            id: 3,
            title: course_title.to_string(),
            description: String::new(),
            category: "manicure".to_string(),
            is_active: true,
            is_top: false,
        };
        (user, course)
    }

    /// Text of every ToUnicode CMap in the file, lowercased.
    fn unicode_maps(path: &Path) -> String {
        let doc = lopdf::Document::load(path).unwrap();
        let mut maps = String::new();
        for object in doc.objects.values() {
            if let lopdf::Object::Stream(stream) = object {
                let bytes = stream.decompressed_content().unwrap_or_else(|_| stream.content.clone());
                let text = String::from_utf8_lossy(&bytes);
                if text.contains("beginbfchar") || text.contains("beginbfrange") {
                    maps.push_str(&text.to_lowercase());
                }
            }
        }
        maps
    }

    #[test]
    fn test_centered_x_stays_on_page() {
        assert!(centered_x("short", 16.0) > 100.0);
        assert_eq!(centered_x(&"x".repeat(500), 28.0), 12.0);
    }

    #[test]
    fn renders_a_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let (user, course) = sample("Anna Petrova", "Gel polish");
        let path = dir.path().join("nested").join("CERT-00007-003-20260101.pdf");
        let content = CertificateContent {
            user: &user,
            course: &course,
            serial: "CERT-00007-003-20260101",
            issued_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };

        let written = PdfCertificateRenderer.render(&content, &path).unwrap();
        assert_eq!(written, path);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let doc = lopdf::Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn cyrillic_name_keeps_its_glyphs() {
        let dir = tempfile::tempdir().unwrap();
        let (user, course) = sample("Анна Петрова", "Маникюр");
        let path = dir.path().join("CERT-00007-003-20260101.pdf");
        let content = CertificateContent {
            user: &user,
            course: &course,
            serial: "CERT-00007-003-20260101",
            issued_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        };
        PdfCertificateRenderer.render(&content, &path).unwrap();

        let maps = unicode_maps(&path);
        assert!(!maps.is_empty(), "embedded font has no ToUnicode map");
        for c in "Анна Петрова".chars().filter(|c| !c.is_whitespace()) {
            let code = format!("{:04x}", c as u32);
            assert!(maps.contains(&code), "no glyph mapped to {:?} (U+{})", c, code);
        }
    }
}
