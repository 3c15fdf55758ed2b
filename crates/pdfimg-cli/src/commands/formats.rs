//! Formats command - list supported output image formats.

use console::style;

use pdfimg_core::OutputFormat;

pub fn run() -> anyhow::Result<()> {
    for format in OutputFormat::ALL {
        let marker = if format == OutputFormat::default() {
            style(" (default)").dim().to_string()
        } else {
            String::new()
        };
        println!("{:<6} .{}{}", format.name(), format.extension(), marker);
    }
    Ok(())
}
