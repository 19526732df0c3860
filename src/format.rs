//! Number formatting for the toolbar labels.

const UNITS: [(f64, &str); 6] = [
    (1e18, "EB"),
    (1e15, "PB"),
    (1e12, "TB"),
    (1e9, "GB"),
    (1e6, "MB"),
    (1e3, "kB"),
];

/// Digits grouped by three, separated by spaces: `1234567` -> `1 234 567`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

/// Decimal data volume with `precision` significant digits (at least 3).
pub fn format_data_volume(bytes: u64, precision: usize) -> String {
    let precision = precision.max(3);
    let amount = bytes as f64;
    let Some(pos) = UNITS.iter().position(|(scale, _)| amount >= *scale) else {
        return format!("{} B", bytes);
    };
    let (scale, unit) = UNITS[pos];
    let rounded = round_significant(amount / scale, precision);
    // 999 999 B rounds to 1000 kB, which reads as 1.00 MB.
    if rounded >= 1000.0 && pos > 0 {
        let (scale, unit) = UNITS[pos - 1];
        let rounded = round_significant(amount / scale, precision);
        return format!("{} {}", to_precision(rounded, precision), unit);
    }
    format!("{} {}", to_precision(rounded, precision), unit)
}

/// Number of digits before the decimal point; zero or negative below 1.
fn magnitude(value: f64) -> i32 {
    let mut digits = value.log10().floor() as i32 + 1;
    if 10f64.powi(digits) <= value {
        digits += 1;
    } else if 10f64.powi(digits - 1) > value {
        digits -= 1;
    }
    digits
}

fn round_significant(value: f64, precision: usize) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let shift = precision as i32 - magnitude(value);
    let factor = 10f64.powi(shift);
    (value * factor).round() / factor
}

/// Render an already rounded value, keeping trailing zeros.
fn to_precision(value: f64, precision: usize) -> String {
    if value <= 0.0 {
        return "0".to_string();
    }
    let decimals = (precision as i32 - magnitude(value)).max(0) as usize;
    format!("{:.*}", decimals, value)
}

/// Downloads derived from consumed bandwidth, rounded to the nearest whole file.
pub fn downloads_from_bandwidth(bandwidth: u64, size: u64) -> u64 {
    if size == 0 {
        return 0;
    }
    (bandwidth as f64 / size as f64).round() as u64
}
