/// Convert a human size such as `"1.5G"` into bytes (binary multipliers).
///
/// Garbled input yields 0 instead of an error: one bad field must not
/// abort a whole collection pass.
pub fn parse_size(s: &str) -> u64 {
    let s = s.trim().to_ascii_uppercase();
    if s.is_empty() || s == "0" { return 0; }

    let (num, mult) = match s.char_indices().last() {
        Some((i, 'B')) => (&s[..i], 1u64),
        Some((i, 'K')) => (&s[..i], 1 << 10),
        Some((i, 'M')) => (&s[..i], 1 << 20),
        Some((i, 'G')) => (&s[..i], 1 << 30),
        Some((i, 'T')) => (&s[..i], 1 << 40),
        Some((_, c)) if c.is_ascii_digit() => (s.as_str(), 1),
        _ => return 0,
    };

    scale(num.trim(), mult)
}

/// Like [`parse_size`], but also understands the `KiB`/`MiB`/`GiB`/`TiB`
/// suffixes printed by the btrfs tools.
pub fn parse_size_iec(s: &str) -> u64 {
    let t = s.trim();
    match t.strip_suffix("iB") {
        Some(head) if !head.is_empty() => parse_size(head),
        _ => parse_size(t),
    }
}

fn scale(num: &str, mult: u64) -> u64 {
    if num.is_empty() { return 0; }
    match num.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => (v * mult as f64) as u64,
        _ => 0,
    }
}
