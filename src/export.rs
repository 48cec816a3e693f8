//! Spreadsheet and PDF renderings of a [`DreReport`].
//!
//! Pure formatting: every figure comes from the report as computed by the
//! engine, rounded to two decimal places for display.

use crate::config::ExportOptions;
use crate::error::{DreError, Result};
use crate::schema::{DreReport, MonthlyStatement};
use crate::utils::format_money;
use csv::WriterBuilder;
use log::debug;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use serde::{Deserialize, Serialize};

pub const LABEL_TOTAL_REVENUE: &str = "Total Revenue";
pub const LABEL_TOTAL_EXPENSE: &str = "Total Expense";
pub const LABEL_GROSS_MARGIN: &str = "Gross Margin";
pub const LABEL_NET_MARGIN: &str = "Net Margin %";

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// A4 portrait, in points.
const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 56;
const TOP: i64 = 790;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

pub struct ReportExporter<'a> {
    options: &'a ExportOptions,
}

impl<'a> ReportExporter<'a> {
    pub fn new(options: &'a ExportOptions) -> Self {
        Self { options }
    }

    fn filename(&self, report: &DreReport, extension: &str) -> String {
        format!(
            "{}-{}.{}",
            self.options.filename_prefix.trim(),
            report.period(),
            extension
        )
    }

    /// Renders the report as CSV (`text/csv`, `.csv`) rather than `.xlsx`;
    /// spreadsheet tools open it directly. Headline rows come first, then the
    /// comparative table and its annual total when enabled.
    pub fn to_spreadsheet(&self, report: &DreReport) -> Result<ExportedFile> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

        writer.write_record([self.options.title.as_str()])?;
        writer.write_record(["Tenant", report.tenant_id.to_string().as_str()])?;
        writer.write_record(["Period", report.period().to_string().as_str()])?;
        writer.write_record(["Line", "Value"])?;
        for (label, value) in headline_rows(&report.statement) {
            writer.write_record([label, value.as_str()])?;
        }

        if let Some(series) = report.comparative.as_ref().filter(|_| self.options.include_comparative) {
            writer.write_record([
                "Month",
                LABEL_TOTAL_REVENUE,
                LABEL_TOTAL_EXPENSE,
                LABEL_GROSS_MARGIN,
                LABEL_NET_MARGIN,
            ])?;
            for entry in series {
                writer.write_record(comparative_row(&entry.period_label(), entry))?;
            }
            let annual = series.annual_statement()?;
            writer.write_record([
                format!("{} total", annual.year),
                format_money(annual.total_revenue),
                format_money(annual.total_expense),
                format_money(annual.gross_margin),
                format_money(annual.net_margin_percent),
            ])?;
        }

        let content = writer
            .into_inner()
            .map_err(|e| DreError::Export(format!("spreadsheet: {}", e)))?;
        debug!("Rendered spreadsheet of {} bytes", content.len());

        Ok(ExportedFile {
            filename: self.filename(report, "csv"),
            content_type: CSV_CONTENT_TYPE.to_string(),
            content,
        })
    }

    pub fn to_pdf(&self, report: &DreReport) -> Result<ExportedFile> {
        let mut page = PageText::new();

        page.line(16, &[(MARGIN_LEFT, self.options.title.clone())]);
        page.line(
            10,
            &[(
                MARGIN_LEFT,
                format!("Tenant {}  -  Period {}", report.tenant_id, report.period()),
            )],
        );
        page.gap();

        for (label, value) in headline_rows(&report.statement) {
            let shown = if label == LABEL_NET_MARGIN {
                format!("{}%", value)
            } else {
                self.money(&value)
            };
            page.line(12, &[(MARGIN_LEFT, label.to_string()), (300, shown)]);
        }

        if let Some(series) = report.comparative.as_ref().filter(|_| self.options.include_comparative) {
            page.gap();
            page.line(12, &[(MARGIN_LEFT, format!("Comparative {}", series.year))]);
            let columns = [MARGIN_LEFT, 130, 230, 330, 440];
            let header = [
                "Month",
                LABEL_TOTAL_REVENUE,
                LABEL_TOTAL_EXPENSE,
                LABEL_GROSS_MARGIN,
                LABEL_NET_MARGIN,
            ];
            page.line(
                9,
                &columns
                    .iter()
                    .zip(header)
                    .map(|(x, h)| (*x, h.to_string()))
                    .collect::<Vec<_>>(),
            );
            for entry in series {
                let cells = comparative_row(&entry.period_label(), entry);
                page.line(
                    9,
                    &columns
                        .iter()
                        .zip(cells)
                        .map(|(x, c)| (*x, c))
                        .collect::<Vec<_>>(),
                );
            }
        }

        let content = page.render()?;
        debug!("Rendered PDF of {} bytes", content.len());

        Ok(ExportedFile {
            filename: self.filename(report, "pdf"),
            content_type: PDF_CONTENT_TYPE.to_string(),
            content,
        })
    }

    fn money(&self, value: &str) -> String {
        let symbol = self.options.currency_symbol.trim();
        if symbol.is_empty() {
            value.to_string()
        } else {
            format!("{} {}", symbol, value)
        }
    }
}

fn headline_rows(statement: &MonthlyStatement) -> [(&'static str, String); 4] {
    [
        (LABEL_TOTAL_REVENUE, format_money(statement.total_revenue)),
        (LABEL_TOTAL_EXPENSE, format_money(statement.total_expense)),
        (LABEL_GROSS_MARGIN, format_money(statement.gross_margin)),
        (LABEL_NET_MARGIN, format_money(statement.net_margin_percent)),
    ]
}

fn comparative_row(label: &str, entry: &MonthlyStatement) -> [String; 5] {
    [
        label.to_string(),
        format_money(entry.total_revenue),
        format_money(entry.total_expense),
        format_money(entry.gross_margin),
        format_money(entry.net_margin_percent),
    ]
}

/// Encodes text for the page font's WinAnsiEncoding. Latin-1 maps straight
/// through; characters the encoding lacks become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8a,
            '‹' => 0x8b,
            'Œ' => 0x8c,
            'Ž' => 0x8e,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9a,
            '›' => 0x9b,
            'œ' => 0x9c,
            'ž' => 0x9e,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

/// Accumulates positioned text for a single page.
struct PageText {
    operations: Vec<Operation>,
    y: i64,
}

impl PageText {
    fn new() -> Self {
        Self {
            operations: Vec::new(),
            y: TOP,
        }
    }

    fn line(&mut self, size: i64, cells: &[(i64, String)]) {
        for (x, text) in cells {
            self.operations.push(Operation::new("BT", vec![]));
            self.operations.push(Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(size)],
            ));
            self.operations.push(Operation::new(
                "Td",
                vec![Object::Integer(*x), Object::Integer(self.y)],
            ));
            self.operations.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(text), StringFormat::Literal)],
            ));
            self.operations.push(Operation::new("ET", vec![]));
        }
        self.y -= size + 6;
    }

    fn gap(&mut self) {
        self.y -= 12;
    }

    fn render(self) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let content = Content {
            operations: self.operations,
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ComparativeSeries, TenantId};
    use crate::utils::ReportPeriod;
    use rust_decimal::Decimal;

    fn sample_report(with_comparative: bool) -> DreReport {
        let statement = MonthlyStatement::from_totals(
            ReportPeriod::new(2024, 3).unwrap(),
            Decimal::new(300000, 2),
            Decimal::new(130000, 2),
        )
        .unwrap();
        let comparative = with_comparative.then(|| {
            let entries = (1..=12)
                .map(|m| {
                    if m == 3 {
                        statement.clone()
                    } else {
                        MonthlyStatement::empty(ReportPeriod::new(2024, m).unwrap())
                    }
                })
                .collect();
            ComparativeSeries::from_entries(2024, entries).unwrap()
        });
        DreReport {
            tenant_id: TenantId::new(3).unwrap(),
            statement,
            comparative,
        }
    }

    fn contains(haystack: &[u8], needle: impl AsRef<[u8]>) -> bool {
        let needle = needle.as_ref();
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_spreadsheet_headline_figures() {
        let options = ExportOptions::default();
        let file = ReportExporter::new(&options)
            .to_spreadsheet(&sample_report(false))
            .unwrap();
        assert_eq!(file.filename, "dre-2024-03.csv");
        assert_eq!(file.content_type, CSV_CONTENT_TYPE);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file.content.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let value_of = |label: &str| {
            rows.iter()
                .find(|r| r.get(0) == Some(label))
                .and_then(|r| r.get(1))
                .map(str::to_string)
        };

        assert_eq!(value_of(LABEL_TOTAL_REVENUE).as_deref(), Some("3000.00"));
        assert_eq!(value_of(LABEL_TOTAL_EXPENSE).as_deref(), Some("1300.00"));
        assert_eq!(value_of(LABEL_GROSS_MARGIN).as_deref(), Some("1700.00"));
        assert_eq!(value_of(LABEL_NET_MARGIN).as_deref(), Some("56.67"));
        assert!(value_of("2024-03").is_none());
    }

    #[test]
    fn test_spreadsheet_comparative_table() {
        let options = ExportOptions::default();
        let file = ReportExporter::new(&options)
            .to_spreadsheet(&sample_report(true))
            .unwrap();
        let text = String::from_utf8(file.content).unwrap();

        assert!(text.contains("2024-01,0.00,0.00,0.00,0.00"));
        assert!(text.contains("2024-03,3000.00,1300.00,1700.00,56.67"));
        assert!(text.contains("2024 total,3000.00,1300.00,1700.00,56.67"));
    }

    #[test]
    fn test_comparative_can_be_disabled() {
        let options = ExportOptions {
            include_comparative: false,
            ..ExportOptions::default()
        };
        let file = ReportExporter::new(&options)
            .to_spreadsheet(&sample_report(true))
            .unwrap();
        let text = String::from_utf8(file.content).unwrap();
        assert!(!text.contains("2024-01"));
    }

    #[test]
    fn test_pdf_document() {
        let options = ExportOptions {
            currency_symbol: "R$".to_string(),
            ..ExportOptions::default()
        };
        let file = ReportExporter::new(&options)
            .to_pdf(&sample_report(true))
            .unwrap();
        assert_eq!(file.filename, "dre-2024-03.pdf");
        assert_eq!(file.content_type, PDF_CONTENT_TYPE);
        assert!(file.content.starts_with(b"%PDF-1.5"));

        for label in [
            LABEL_TOTAL_REVENUE,
            LABEL_TOTAL_EXPENSE,
            LABEL_GROSS_MARGIN,
            LABEL_NET_MARGIN,
        ] {
            assert!(contains(&file.content, label), "missing {}", label);
        }
        assert!(contains(&file.content, "R$ 3000.00"));
        assert!(contains(&file.content, "56.67%"));

        let parsed = Document::load_mem(&file.content).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_pdf_text_uses_win_ansi() {
        let options = ExportOptions {
            title: "Demonstração do Resultado".to_string(),
            currency_symbol: "€".to_string(),
            ..ExportOptions::default()
        };
        let file = ReportExporter::new(&options)
            .to_pdf(&sample_report(false))
            .unwrap();

        assert!(contains(&file.content, "WinAnsiEncoding"));
        assert!(contains(&file.content, b"Demonstra\xe7\xe3o do Resultado"));
        assert!(contains(&file.content, b"\x80 3000.00"));
        assert!(!contains(&file.content, "Demonstração".as_bytes()));
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(win_ansi("R$ 1,00"), b"R$ 1,00".to_vec());
        assert_eq!(win_ansi("ção"), vec![0xe7, 0xe3, b'o']);
        assert_eq!(win_ansi("€ – ™"), vec![0x80, b' ', 0x96, b' ', 0x99]);
        assert_eq!(win_ansi("数"), b"?".to_vec());
    }
}
