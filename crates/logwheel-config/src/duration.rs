//! Human-readable age strings (`30m`, `1d`, `2w`).

/// Convert an age string to seconds.
///
/// Units: `m` minutes, `h` hours, `d` days, `w` weeks, `M` months (30 days),
/// `y` years (365 days). A bare number is taken as seconds.
pub fn parse_age(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let factor = match unit {
        "" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        "w" => 60 * 60 * 24 * 7,
        "M" => 60 * 60 * 24 * 30,
        "y" => 60 * 60 * 24 * 365,
        _ => return None,
    };
    value.checked_mul(factor)
}
