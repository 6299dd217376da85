//! Report export tools
//!
//! Render a nutrition report to PDF: product header, nutrient table,
//! Nutri-Score component table, summary, and a points chart.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::image_crate::{DynamicImage, ImageFormat, RgbImage};
use printpdf::*;
use serde::Serialize;

use crate::models::{ComponentKind, NutritionReport};

// ============================================================================
// Color Constants (RGB 0-255)
// ============================================================================

const COLOR_TITLE: (u8, u8, u8) = (0, 112, 60);
const COLOR_NEGATIVE: (u8, u8, u8) = (192, 0, 0);
const COLOR_POSITIVE: (u8, u8, u8) = (0, 176, 80);
const COLOR_WARNING: (u8, u8, u8) = (255, 140, 0);
const COLOR_BLACK: (u8, u8, u8) = (0, 0, 0);
const COLOR_GRAY: (u8, u8, u8) = (128, 128, 128);

const PAGE_WIDTH: f32 = 215.9; // Letter
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_BOTTOM: f32 = 20.0;

/// Response for export_nutrition_report_pdf
#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub success: bool,
    pub file_path: String,
    pub product_name: String,
    pub pages: usize,
    pub nutrient_rows: usize,
    pub component_rows: usize,
    pub message: String,
}

fn kind_color(kind: ComponentKind) -> (u8, u8, u8) {
    match kind {
        ComponentKind::Negative => COLOR_NEGATIVE,
        ComponentKind::Positive => COLOR_POSITIVE,
    }
}

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{}", v)).unwrap_or_else(|| "-".to_string())
}

// ============================================================================
// Chart Generation (plotters)
// ============================================================================

/// Bar chart of points per component (outline = max points) as PNG bytes
pub fn generate_points_chart(report: &NutritionReport, width: u32, height: u32) -> Result<Vec<u8>, String> {
    use plotters::prelude::*;

    let rows = &report.component_rows;
    if rows.is_empty() {
        return Err("No Nutri-Score components to chart".to_string());
    }

    let mut buffer = vec![0u8; (width * height * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;

        let y_max = rows
            .iter()
            .map(|r| r.points_max.unwrap_or(0.0).max(r.points.unwrap_or(0.0)))
            .fold(1.0_f64, f64::max)
            + 1.0;
        let n = rows.len();

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(40)
            .build_cartesian_2d((0..n).into_segmented(), 0.0..y_max)
            .map_err(|e| e.to_string())?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => rows.get(*i).map(|r| r.component.clone()).unwrap_or_default(),
                _ => String::new(),
            })
            .y_desc("Points")
            .draw()
            .map_err(|e| e.to_string())?;

        // max points as outlines behind the scored bars
        chart
            .draw_series(rows.iter().enumerate().filter_map(|(i, r)| {
                r.points_max.map(|max| {
                    Rectangle::new(
                        [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), max)],
                        BLACK.mix(0.4).stroke_width(1),
                    )
                })
            }))
            .map_err(|e| e.to_string())?;

        chart
            .draw_series(rows.iter().enumerate().map(|(i, r)| {
                let (cr, cg, cb) = kind_color(r.kind);
                let mut bar = Rectangle::new(
                    [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), r.points.unwrap_or(0.0))],
                    RGBColor(cr, cg, cb).mix(0.8).filled(),
                );
                bar.set_margin(0, 0, 8, 8);
                bar
            }))
            .map_err(|e| e.to_string())?;

        root.present().map_err(|e| e.to_string())?;
    }

    let img = RgbImage::from_raw(width, height, buffer).ok_or("Failed to create image from buffer")?;

    let mut png_bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| e.to_string())?;

    Ok(png_bytes)
}

// ============================================================================
// PDF Generation Helper Functions
// ============================================================================

fn rgb_to_printpdf(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(Rgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, None))
}

fn add_text(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    text: &str,
    x: Mm,
    y: Mm,
    size: f32,
    color: (u8, u8, u8),
) {
    layer.set_fill_color(rgb_to_printpdf(color.0, color.1, color.2));
    layer.use_text(text, size, x, y, font);
}

fn add_line(layer: &PdfLayerReference, x1: Mm, y1: Mm, x2: Mm, y2: Mm, color: (u8, u8, u8), width: f32) {
    layer.set_outline_color(rgb_to_printpdf(color.0, color.1, color.2));
    layer.set_outline_thickness(width);

    let line = Line {
        points: vec![(Point::new(x1, y1), false), (Point::new(x2, y2), false)],
        is_closed: false,
    };
    layer.add_line(line);
}

/// Tracks the write position and starts a new page when the current one is full
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl<'a> PageCursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT - 20.0,
            pages: 1,
        }
    }

    /// Reserve `height` mm, breaking the page if it does not fit
    fn reserve(&mut self, height: f32) {
        if self.y - height < MARGIN_BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - 20.0;
            self.pages += 1;
        }
    }
}

// ============================================================================
// Nutrition Report PDF
// ============================================================================

/// Write a nutrition report as a PDF
pub fn generate_nutrition_pdf(
    report: &NutritionReport,
    barcode: &str,
    output_path: &str,
    include_chart: bool,
) -> Result<GenerateReportResponse, String> {
    let (doc, page1, layer1) = PdfDocument::new("Nutrition Report", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");

    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(|e| e.to_string())?;
    let font_bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(|e| e.to_string())?;

    let mut cursor = PageCursor::new(&doc, doc.get_page(page1).get_layer(layer1));

    // Header
    add_text(&cursor.layer, &font_bold, &report.product_name, Mm(MARGIN_LEFT), Mm(cursor.y), 18.0, COLOR_TITLE);
    cursor.y -= 10.0;

    add_text(&cursor.layer, &font, &format!("Barcode: {}", barcode), Mm(MARGIN_LEFT), Mm(cursor.y), 11.0, COLOR_BLACK);
    add_text(
        &cursor.layer,
        &font,
        &format!("Nutrition Grade: {}", report.nutrition_grade),
        Mm(110.0),
        Mm(cursor.y),
        11.0,
        COLOR_BLACK,
    );
    cursor.y -= 6.0;

    let now = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
    add_text(&cursor.layer, &font, &format!("Generated: {}", now), Mm(MARGIN_LEFT), Mm(cursor.y), 11.0, COLOR_BLACK);
    if let Some(count) = &report.object_count {
        add_text(
            &cursor.layer,
            &font,
            &format!("Items in photo: {} x {}", count.count, count.object_type),
            Mm(110.0),
            Mm(cursor.y),
            11.0,
            COLOR_BLACK,
        );
    }
    cursor.y -= 8.0;

    add_line(&cursor.layer, Mm(MARGIN_LEFT), Mm(cursor.y), Mm(200.0), Mm(cursor.y), COLOR_GRAY, 0.5);
    cursor.y -= 8.0;

    // Summary
    let summary = &report.summary;
    let verdict_color = if summary.is_healthy { COLOR_POSITIVE } else { COLOR_NEGATIVE };
    add_text(&cursor.layer, &font_bold, "Nutri-Score Summary", Mm(MARGIN_LEFT), Mm(cursor.y), 12.0, COLOR_BLACK);
    cursor.y -= 7.0;
    add_text(
        &cursor.layer,
        &font,
        &format!("Final Score: {}", summary.final_score),
        Mm(MARGIN_LEFT),
        Mm(cursor.y),
        10.0,
        verdict_color,
    );
    add_text(
        &cursor.layer,
        &font,
        &format!("Positive Points: {}", summary.positive_points),
        Mm(70.0),
        Mm(cursor.y),
        10.0,
        COLOR_POSITIVE,
    );
    add_text(
        &cursor.layer,
        &font,
        &format!("Negative Points: {}", summary.negative_points),
        Mm(125.0),
        Mm(cursor.y),
        10.0,
        COLOR_NEGATIVE,
    );
    cursor.y -= 12.0;

    // Nutrition facts table
    add_text(&cursor.layer, &font_bold, "Nutrition Facts (per 100g)", Mm(MARGIN_LEFT), Mm(cursor.y), 12.0, COLOR_BLACK);
    cursor.y -= 7.0;

    let nutrient_cols = [MARGIN_LEFT, 95.0, 130.0];
    for (x, header) in nutrient_cols.iter().zip(["Nutrient", "Per 100g", "Unit"]) {
        add_text(&cursor.layer, &font_bold, header, Mm(*x), Mm(cursor.y), 9.0, COLOR_BLACK);
    }
    cursor.y -= 5.0;

    for row in &report.nutrient_rows {
        cursor.reserve(4.5);
        let values = [row.name.clone(), format!("{:.2}", row.value_per_100g), row.unit.clone()];
        for (x, value) in nutrient_cols.iter().zip(values.iter()) {
            add_text(&cursor.layer, &font, value, Mm(*x), Mm(cursor.y), 8.0, COLOR_BLACK);
        }
        cursor.y -= 4.5;
    }
    if report.nutrient_rows.is_empty() {
        add_text(&cursor.layer, &font, "No per-100g values reported", Mm(MARGIN_LEFT), Mm(cursor.y), 8.0, COLOR_GRAY);
        cursor.y -= 4.5;
    }
    cursor.y -= 8.0;

    // Components table
    cursor.reserve(20.0);
    add_text(&cursor.layer, &font_bold, "Nutri-Score Components", Mm(MARGIN_LEFT), Mm(cursor.y), 12.0, COLOR_BLACK);
    cursor.y -= 7.0;

    let component_cols = [MARGIN_LEFT, 75.0, 100.0, 120.0, 140.0, 165.0];
    let headers = ["Component", "Value", "Unit", "Points", "Max Points", "Type"];
    for (x, header) in component_cols.iter().zip(headers) {
        add_text(&cursor.layer, &font_bold, header, Mm(*x), Mm(cursor.y), 9.0, COLOR_BLACK);
    }
    cursor.y -= 5.0;

    for row in &report.component_rows {
        cursor.reserve(4.5);
        let values = [
            row.component.clone(),
            format_opt(row.value),
            row.unit.clone().unwrap_or_default(),
            format_opt(row.points),
            format_opt(row.points_max),
            row.kind.to_string(),
        ];
        for (i, (x, value)) in component_cols.iter().zip(values.iter()).enumerate() {
            let color = if i == 5 { kind_color(row.kind) } else { COLOR_BLACK };
            add_text(&cursor.layer, &font, value, Mm(*x), Mm(cursor.y), 8.0, color);
        }
        cursor.y -= 4.5;
    }
    cursor.y -= 8.0;

    // Chart
    if include_chart && !report.component_rows.is_empty() {
        cursor.reserve(80.0);
        match generate_points_chart(report, 800, 360) {
            Ok(png_bytes) => {
                let dynamic_image = printpdf::image_crate::load_from_memory(&png_bytes).map_err(|e| e.to_string())?;
                let pdf_image = Image::from_dynamic_image(&dynamic_image);

                // 800x360 pixels at 120 DPI = ~169mm x 76mm
                let transform = ImageTransform {
                    translate_x: Some(Mm(MARGIN_LEFT)),
                    translate_y: Some(Mm(cursor.y - 76.0)),
                    dpi: Some(120.0),
                    ..Default::default()
                };
                pdf_image.add_to_layer(cursor.layer.clone(), transform);
                cursor.y -= 82.0;
            }
            Err(e) => {
                add_text(&cursor.layer, &font, &format!("Chart generation error: {}", e), Mm(MARGIN_LEFT), Mm(cursor.y), 9.0, COLOR_NEGATIVE);
                cursor.y -= 8.0;
            }
        }
    }

    // Data issues
    if !report.issues.is_empty() {
        cursor.reserve(12.0);
        add_text(&cursor.layer, &font_bold, "Data Issues", Mm(MARGIN_LEFT), Mm(cursor.y), 12.0, COLOR_WARNING);
        cursor.y -= 6.0;
        for issue in &report.issues {
            cursor.reserve(5.0);
            add_text(&cursor.layer, &font, &format!("- {}", issue), Mm(MARGIN_LEFT), Mm(cursor.y), 9.0, COLOR_BLACK);
            cursor.y -= 5.0;
        }
    }

    let pages = cursor.pages;

    let path = Path::new(output_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer).map_err(|e| e.to_string())?;

    Ok(GenerateReportResponse {
        success: true,
        file_path: output_path.to_string(),
        product_name: report.product_name.clone(),
        pages,
        nutrient_rows: report.nutrient_rows.len(),
        component_rows: report.component_rows.len(),
        message: format!("Nutrition report for {} written to {}", report.product_name, output_path),
    })
}
