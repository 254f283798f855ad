//! Console output and operator interaction.
//!
//! Provides consistent formatting for status output, the terminal QR
//! rendering for login, and the interactive record menu.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Select};
use qrcode::render::unicode;
use qrcode::QrCode;
use std::collections::HashMap;

use crate::auth::LoginPrompter;
use crate::gateway::types::RecordSummary;
use crate::normalize::RecordKind;
use crate::pipeline::{RecordSelector, Selection};

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
    println!();
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Render a URL as a scannable half-block QR code.
fn render_qr(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes()).context("failed to encode QR code")?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .quiet_zone(false)
        .build())
}

/// Terminal-driven login prompter: shows the QR ticket and paces the
/// status poll on Enter presses.
pub struct TerminalPrompter;

impl LoginPrompter for TerminalPrompter {
    fn present_qr(&self, url: &str) -> Result<()> {
        print_section("QR Login");
        println!("Scan this code with the app, or open the link below:\n");
        match render_qr(url) {
            Ok(image) => println!("{image}"),
            // A terminal that cannot render the code still gets the URL.
            Err(err) => print_warning(&format!("could not render QR code: {err}")),
        }
        println!("\n  {url}\n");
        Ok(())
    }

    fn wait_for_advance(&self) -> Result<()> {
        println!("Press Enter once you have scanned the code...");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok(())
    }

    fn notify_waiting(&self) {
        print_info("Not scanned yet - scan the code, then press Enter again.");
    }
}

/// Interactive record menu; entry 0 exports every class roster.
pub struct TerminalSelector;

impl RecordSelector for TerminalSelector {
    fn select(
        &self,
        records: &[RecordSummary],
        class_map: &HashMap<String, String>,
    ) -> Result<Selection> {
        let mut items = Vec::with_capacity(records.len() + 1);
        items.push("All classes (member rosters)".to_string());
        for record in records {
            let class_name = class_map
                .get(&record.cls)
                .map_or("unknown class", String::as_str);
            items.push(format!(
                "{} ({}) - {} [{}]",
                record.title,
                class_name,
                record.creator_wx_name,
                RecordKind::from(record.kind).label()
            ));
        }

        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select a record to export")
            .items(&items)
            .default(0)
            .interact()?;

        match choice {
            0 => Ok(Selection::AllClasses),
            n => Ok(Selection::One(n - 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_qr_produces_blocks() {
        let image = render_qr("https://example.com/ticket").unwrap();
        assert!(!image.is_empty());
        assert!(image.lines().count() > 10);
    }
}
