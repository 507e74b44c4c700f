//! UTF-8 ↔ UTF-16 transcoding.
//!
//! The dictionaries and the lattice operate on 16-bit code units; astral
//! code points are carried as surrogate pairs, exactly as they are stored in
//! the trie labels.

/// Encode a string as UTF-16 code units.
pub fn encode(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Decode UTF-16 code units back into a `String`.
///
/// Returns `None` on unpaired surrogates.
pub fn decode(units: &[u16]) -> Option<String> {
    String::from_utf16(units).ok()
}

/// Decode raw bytes as strict UTF-8 and re-encode as UTF-16 code units.
///
/// Overlong encodings, surrogate code points, and values above U+10FFFF are
/// rejected, so a malformed query line can be reported and skipped instead
/// of producing garbage lattice input.
pub fn decode_utf8(bytes: &[u8]) -> Option<Vec<u16>> {
    std::str::from_utf8(bytes).ok().map(encode)
}
