//! Display helpers.

/// Formats an amount as pounds sterling with thousands separators and
/// two decimal places, e.g. `£1,234.50`.  Negative amounts keep the
/// sign after the symbol (`£-75.00`).
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("£{sign}{grouped}.{fraction}")
}

/// Formats a 0-100 percentage with one decimal place, e.g. `35.0%`.
pub fn format_percentage(value: f64) -> String {
    format!("{value:.1}%")
}
