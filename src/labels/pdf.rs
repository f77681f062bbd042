//! Label page layout with genpdf.
//!
//! Every page is 60 × 30 mm. Layout top to bottom: item name (up to three
//! centered lines, bottom-aligned so the block grows upward), code string,
//! barcode image.

use genpdf::elements::{Break, Image as PdfImage, PageBreak, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::Style;
use genpdf::{Alignment, Document, Element, SimplePageDecorator, Size};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::labels::barcode;
use crate::labels::parse::{wrap, LabelItem};
use crate::labels::RenderError;

const PAGE_WIDTH_MM: f64 = 60.0;
const PAGE_HEIGHT_MM: f64 = 30.0;
const PAGE_MARGIN_MM: i32 = 2;

/// Characters per wrapped name line.
const NAME_WRAP_WIDTH: usize = 28;
const MAX_NAME_LINES: usize = 3;

const TITLE_FONT_SIZE: u8 = 12;
const NAME_FONT_SIZE: u8 = 6;
const CODE_FONT_SIZE: u8 = 7;

/// File name used when labels belong to several shops.
const DEFAULT_FILE_NAME: &str = "labels.pdf";

/// One page of the label document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Title(String),
    Label { code: String, name_lines: Vec<String> },
}

/// Pages and file name for a set of items, before any drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPlan {
    pub file_name: String,
    pub pages: Vec<Page>,
}

pub fn plan(items: &[LabelItem]) -> Result<LabelPlan, RenderError> {
    if items.is_empty() {
        return Err(RenderError::EmptyInput);
    }

    let shops: BTreeSet<&str> = items.iter().map(|i| i.shop.as_str()).collect();
    let single_shop = match shops.len() {
        1 => shops.into_iter().next(),
        _ => None,
    };

    let mut pages = Vec::with_capacity(items.len() + 1);
    if let Some(shop) = single_shop {
        pages.push(Page::Title(shop.to_string()));
    }
    for item in items {
        let mut name_lines = wrap(&item.name, NAME_WRAP_WIDTH);
        name_lines.truncate(MAX_NAME_LINES);
        pages.push(Page::Label { code: item.code.clone(), name_lines });
    }

    let file_name = single_shop
        .map(|shop| format!("{}.pdf", file_stem(shop)))
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    Ok(LabelPlan { file_name, pages })
}

/// Shop names go into a file name; keep path separators out of it.
fn file_stem(shop: &str) -> String {
    shop.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

/// A rendered PDF ready to send.
#[derive(Debug, Clone)]
pub struct LabelDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct LabelRenderer {
    fonts: FontFamily<FontData>,
}

impl LabelRenderer {
    /// Load `{family}-Regular.ttf`, `-Bold`, `-Italic` and `-BoldItalic` from `dir`.
    pub fn load(dir: &Path, family: &str) -> Result<Self, RenderError> {
        let fonts = genpdf::fonts::from_files(dir, family, None)
            .map_err(|e| RenderError::Font(format!("{} in {}: {}", family, dir.display(), e)))?;
        Ok(Self { fonts })
    }

    pub fn render(&self, items: &[LabelItem]) -> Result<LabelDocument, RenderError> {
        let plan = plan(items)?;
        let mut doc = self.document(&plan.file_name);

        // Barcode PNGs must outlive the render; dropping them deletes the files
        // on every exit path.
        let mut temp_files: Vec<NamedTempFile> = Vec::new();

        for (idx, page) in plan.pages.iter().enumerate() {
            if idx > 0 {
                doc.push(PageBreak::new());
            }
            match page {
                Page::Title(shop) => push_title(&mut doc, shop),
                Page::Label { code, name_lines } => {
                    let (tmp, dpi) = barcode::to_temp_png(code)?;
                    let mut image = PdfImage::from_path(tmp.path())
                        .map_err(|e| RenderError::Pdf(format!("barcode {}: {}", code, e)))?;
                    image.set_dpi(dpi);
                    image.set_alignment(Alignment::Center);
                    temp_files.push(tmp);
                    push_label(&mut doc, code, name_lines, image);
                }
            }
        }

        let mut bytes = Vec::new();
        doc.render(&mut bytes).map_err(|e| RenderError::Pdf(e.to_string()))?;
        drop(temp_files);

        debug!("Rendered {} ({} bytes)", plan.file_name, bytes.len());
        Ok(LabelDocument { file_name: plan.file_name, bytes })
    }

    fn document(&self, title: &str) -> Document {
        let mut doc = Document::new(self.fonts.clone());
        doc.set_title(title);
        doc.set_paper_size(Size::new(PAGE_WIDTH_MM, PAGE_HEIGHT_MM));
        doc.set_font_size(NAME_FONT_SIZE);
        doc.set_line_spacing(1.0f64);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(PAGE_MARGIN_MM);
        doc.set_page_decorator(decorator);
        doc
    }
}

fn title_style() -> Style {
    Style::new().bold().with_font_size(TITLE_FONT_SIZE)
}

fn name_style() -> Style {
    Style::new().with_font_size(NAME_FONT_SIZE)
}

fn push_title(doc: &mut Document, shop: &str) {
    doc.push(Break::new(2).styled(title_style()));
    doc.push(Paragraph::new(shop).aligned(Alignment::Center).styled(title_style()));
}

fn push_label(doc: &mut Document, code: &str, name_lines: &[String], barcode: PdfImage) {
    let padding = MAX_NAME_LINES.saturating_sub(name_lines.len());
    if padding > 0 {
        doc.push(Break::new(padding as f64).styled(name_style()));
    }
    for line in name_lines {
        doc.push(Paragraph::new(line.as_str()).aligned(Alignment::Center).styled(name_style()));
    }

    let code_style = Style::new().bold().with_font_size(CODE_FONT_SIZE);
    doc.push(Paragraph::new(code).aligned(Alignment::Center).styled(code_style));
    doc.push(barcode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn item(code: &str, shop: &str, name: &str) -> LabelItem {
        LabelItem { code: code.into(), shop: shop.into(), name: name.into() }
    }

    #[test]
    fn test_plan_single_shop_has_title() {
        let plan = plan(&[item("0001", "Shop1", "Wireless Scanner")]).unwrap();
        assert_eq!(plan.file_name, "Shop1.pdf");
        assert_eq!(
            plan.pages,
            vec![
                Page::Title("Shop1".into()),
                Page::Label { code: "0001".into(), name_lines: vec!["Wireless Scanner".into()] },
            ]
        );
    }

    #[test]
    fn test_plan_several_shops_no_title() {
        let plan = plan(&[
            item("0001", "Ажур", "Сканер"),
            item("0002", "Бриз", "Принтер"),
            item("0003", "Ажур", "Весы"),
        ])
        .unwrap();
        assert_eq!(plan.file_name, "labels.pdf");
        assert_eq!(plan.pages.len(), 3);
        assert!(plan.pages.iter().all(|p| matches!(p, Page::Label { .. })));
    }

    #[test]
    fn test_plan_caps_name_lines() {
        let long = "слово ".repeat(40);
        let plan = plan(&[item("0001", "Ажур", &long)]).unwrap();
        match &plan.pages[1] {
            Page::Label { name_lines, .. } => assert_eq!(name_lines.len(), MAX_NAME_LINES),
            other => panic!("expected label page, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_empty() {
        assert_eq!(plan(&[]).unwrap_err(), RenderError::EmptyInput);
    }

    #[test]
    fn test_file_stem_strips_separators() {
        assert_eq!(file_stem("a/b\\c"), "a_b_c");
    }

    /// A font family for render tests: LiberationSans if installed, otherwise
    /// DejaVuSans copied under the file names genpdf expects.
    struct TestFonts {
        dir: PathBuf,
        family: &'static str,
        _copy: Option<TempDir>,
    }

    fn test_fonts() -> Option<TestFonts> {
        let liberation = std::env::var("LABEL_FONTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/share/fonts/truetype/liberation"));
        if liberation.join("LiberationSans-Regular.ttf").exists() {
            return Some(TestFonts { dir: liberation, family: "LiberationSans", _copy: None });
        }

        let dejavu = Path::new("/usr/share/fonts/truetype/dejavu");
        let regular = dejavu.join("DejaVuSans.ttf");
        if !regular.exists() {
            return None;
        }
        let copy = TempDir::new().unwrap();
        for (style, source) in [
            ("Regular", "DejaVuSans.ttf"),
            ("Bold", "DejaVuSans-Bold.ttf"),
            ("Italic", "DejaVuSans-Oblique.ttf"),
            ("BoldItalic", "DejaVuSans-BoldOblique.ttf"),
        ] {
            let source = dejavu.join(source);
            let source = if source.exists() { source } else { regular.clone() };
            std::fs::copy(source, copy.path().join(format!("DejaVuSans-{style}.ttf"))).unwrap();
        }
        Some(TestFonts { dir: copy.path().to_path_buf(), family: "DejaVuSans", _copy: Some(copy) })
    }

    /// Page objects in the output, not counting the `/Pages` tree node.
    fn page_count(pdf: &[u8]) -> usize {
        regex::bytes::Regex::new(r"/Type\s*/Page\b")
            .unwrap()
            .find_iter(pdf)
            .count()
    }

    #[test]
    fn test_render_pdf_title_then_label() {
        let Some(fonts) = test_fonts() else {
            eprintln!("Skipping test: no TTF fonts found");
            return;
        };
        let renderer = LabelRenderer::load(&fonts.dir, fonts.family).unwrap();
        let doc = renderer.render(&[item("0001", "Shop1", "Wireless Scanner")]).unwrap();
        assert_eq!(doc.file_name, "Shop1.pdf");
        assert!(doc.bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&doc.bytes), 2);
    }

    #[test]
    fn test_render_pdf_one_page_per_label() {
        let Some(fonts) = test_fonts() else {
            eprintln!("Skipping test: no TTF fonts found");
            return;
        };
        let renderer = LabelRenderer::load(&fonts.dir, fonts.family).unwrap();
        let long = "очень длинное наименование товара ".repeat(5);
        let doc = renderer
            .render(&[
                item("0001", "Ажур", &long),
                item("0002", "Бриз", "Принтер"),
                item("0003", "Ажур", "Весы"),
            ])
            .unwrap();
        assert_eq!(doc.file_name, "labels.pdf");
        assert_eq!(page_count(&doc.bytes), 3);
    }

    #[test]
    fn test_render_fails_on_bad_code() {
        let Some(fonts) = test_fonts() else {
            eprintln!("Skipping test: no TTF fonts found");
            return;
        };
        let renderer = LabelRenderer::load(&fonts.dir, fonts.family).unwrap();
        let err = renderer
            .render(&[item("0001", "Ажур", "Сканер"), item("код", "Ажур", "Весы")])
            .unwrap_err();
        assert!(matches!(err, RenderError::Barcode { ref code, .. } if code == "код"));
    }

    #[test]
    fn test_missing_fonts() {
        let err = LabelRenderer::load(Path::new("/nonexistent/fonts"), "Nope").err().unwrap();
        assert!(matches!(err, RenderError::Font(_)));
    }
}
