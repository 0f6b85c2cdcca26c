/// Watts below this magnitude are shown in microwatts.
///
/// The boundary itself counts as milliwatts: exactly 1e-3 W reads "1.00 mW",
/// not "1000.00 uW".
pub const MILLIWATT_THRESHOLD: f64 = 1e-3;
/// Formats a reading for the big current-power label, switching between mW and uW.
pub fn format_power(watts: f64) -> String {
    if watts.abs() >= MILLIWATT_THRESHOLD {
        format!("{:.2} mW", watts * 1e3)
    } else {
        format!("{:.2} uW", watts * 1e6)
    }
}
/// Integer with thousands separators, e.g. `12,345`.
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn microwatt_branch() {
        assert_eq!(format_power(5e-7), "0.50 uW");
        assert_eq!(format_power(10e-6), "10.00 uW");
        assert_eq!(format_power(5e-4), "500.00 uW");
        assert_eq!(format_power(0.0), "0.00 uW");
    }
    #[test]
    fn milliwatt_branch_includes_boundary() {
        assert_eq!(format_power(1e-3), "1.00 mW");
        assert_eq!(format_power(2.5e-3), "2.50 mW");
        assert_eq!(format_power(-4e-3), "-4.00 mW");
    }
    #[test]
    fn counts_get_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
