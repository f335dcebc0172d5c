/// Number of distinct anchor values: 62^2 two-digit base-62 strings
pub const ANCHOR_SPACE: u16 = 3844;

/// Reserved marker rendered in the anchor column for lines that carry no
/// anchor (empty lines, or duplicates hidden by the first-occurrence policy)
pub const BLANK_MARKER: &str = "  ";

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash a line's content to an anchor value in `0..3844`
///
/// FNV-1a over the raw bytes, folded into the anchor space. Pure and
/// position-unaware: the same content always yields the same value, so the
/// tagger and the resolver agree byte-for-byte on what a line's anchor is.
///
/// # Example
/// ```
/// use line_anchor::line_hash;
/// assert_eq!(line_hash("return 1"), line_hash("return 1"));
/// assert!(line_hash("anything at all") < 3844);
/// ```
pub fn line_hash(content: &str) -> u16 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in content.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % u32::from(ANCHOR_SPACE)) as u16
}

/// Render an anchor value as its two-character base-62 wire form
pub fn format_anchor(value: u16) -> String {
    debug_assert!(value < ANCHOR_SPACE);
    let high = ALPHABET[usize::from(value / 62)] as char;
    let low = ALPHABET[usize::from(value % 62)] as char;
    let mut out = String::with_capacity(2);
    out.push(high);
    out.push(low);
    out
}

/// Parse a two-character base-62 anchor back to its value
///
/// Returns `None` for anything that is not exactly two alphabet characters,
/// including the blank marker.
pub fn parse_anchor(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let high = digit_value(bytes[0])?;
    let low = digit_value(bytes[1])?;
    Some(high * 62 + low)
}

fn digit_value(byte: u8) -> Option<u16> {
    match byte {
        b'0'..=b'9' => Some(u16::from(byte - b'0')),
        b'A'..=b'Z' => Some(u16::from(byte - b'A') + 10),
        b'a'..=b'z' => Some(u16::from(byte - b'a') + 36),
        _ => None,
    }
}
