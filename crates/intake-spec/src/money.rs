/// Parses a money display string such as `"1,234,567"` or `"500000.50"`.
///
/// Thousands separators are stripped before parsing. Blank input and
/// non-finite results yield `None`.
pub fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|ch| *ch != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}
