pub mod fleet_report;
pub mod opportunity_report;

use rust_xlsxwriter::{Format, FormatBorder};

/// En-tête bleu #2C5F8A, texte blanc, gras, bordure fine
pub fn create_header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color("2C5F8A")
        .set_font_color("FFFFFF")
        .set_font_size(11)
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
}

/// Format nombre décimal #,##0.00
pub fn create_number_format() -> Format {
    Format::new().set_num_format("#,##0.00")
}

/// Format entier #,##0
pub fn create_integer_format() -> Format {
    Format::new().set_num_format("#,##0")
}

/// Format pourcentage 0.0%
pub fn create_percent_format() -> Format {
    Format::new().set_num_format("0.0%")
}
