//! XML dialect adapter (spec §4.2). A generic XML serializer's escaping
//! does not match what iRODS accepts on the wire, and a generic XML
//! deserializer will choke on the control bytes iRODS servers sometimes
//! emit; these two passes bridge the gap.

use super::error::Error;

const ESCAPES: &[(&str, &str)] = &[
    ("&#34;", "&quot;"),
    ("&#39;", "&apos;"),
    ("&#x9;", "\t"),
    ("&#xA;", "\n"),
    ("&#xD;", "\r"),
];

/// Rewrites a generic XML serialization to iRODS's expected escaping.
///
/// iRODS rejects numeric character references for quote, apostrophe, tab,
/// newline, and carriage return; a standard serializer emits exactly those
/// numeric references, so this pass walks the output byte-by-byte and
/// substitutes the five literals spec'd above. All other bytes pass
/// through unchanged. `input` must be valid UTF-8.
pub fn preprocess_xml(input: &[u8]) -> Result<Vec<u8>, Error> {
    std::str::from_utf8(input)?;

    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    'outer: while i < input.len() {
        for (pat, rep) in ESCAPES {
            let pat = pat.as_bytes();
            if input[i..].starts_with(pat) {
                out.extend_from_slice(rep.as_bytes());
                i += pat.len();
                continue 'outer;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    Ok(out)
}

/// Repairs incoming XML so it only contains runes permitted by XML 1.0.
///
/// Any rune outside `{U+0009, U+000A, U+000D, U+0020..=U+D7FF,
/// U+E000..=U+FFFD, U+10000..=U+10FFFF}` is replaced with U+FFFD. Invalid
/// UTF-8 byte sequences (as opposed to merely-disallowed-but-valid
/// scalar values) are a fatal error, not something this pass repairs.
pub fn postprocess_xml(input: &[u8]) -> Result<String, Error> {
    let s = std::str::from_utf8(input)?;

    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if is_xml_1_0_permitted(ch) {
            out.push(ch);
        } else {
            out.push('\u{FFFD}');
        }
    }
    Ok(out)
}

fn is_xml_1_0_permitted(ch: char) -> bool {
    matches!(ch as u32,
        0x9 | 0xA | 0xD
        | 0x20..=0xD7FF
        | 0xE000..=0xFFFD
        | 0x10000..=0x10FFFF
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_rewrites_the_five_escapes() {
        let out = preprocess_xml(b"a&#34;b&#xA;c").unwrap();
        assert_eq!(out, b"a&quot;b\nc");
    }

    #[test]
    fn preprocess_output_never_contains_numeric_refs() {
        let out = preprocess_xml(b"<x>&#34;&#39;&#x9;&#xA;&#xD;</x>").unwrap();
        let out = String::from_utf8(out).unwrap();
        for pat in ["&#34;", "&#39;", "&#x9;", "&#xA;", "&#xD;"] {
            assert!(!out.contains(pat), "{out:?} should not contain {pat:?}");
        }
        assert!(out.contains("&quot;"));
        assert!(out.contains("&apos;"));
    }

    #[test]
    fn postprocess_replaces_disallowed_control_bytes() {
        let out = postprocess_xml(b"a\x0Bb").unwrap();
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn postprocess_is_identity_on_the_safe_ascii_subset() {
        let input = "hello, world! 123";
        let out = postprocess_xml(input.as_bytes()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn postprocess_rejects_invalid_utf8() {
        assert!(postprocess_xml(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn preprocess_rejects_invalid_utf8() {
        assert!(preprocess_xml(&[0xff, 0xfe]).is_err());
    }
}
