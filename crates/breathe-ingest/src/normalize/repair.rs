//! Stage 1: text repair.
//!
//! Undoes UTF-8 that was decoded as Windows-1252 / Latin-1 (possibly more
//! than once), then applies the smaller fixes: HTML entities in plain text,
//! curly quotes, Latin ligatures, full-width forms and line breaks.

use std::sync::LazyLock;

/// Upper bound on nested mis-decodings to undo.
const MAX_MOJIBAKE_PASSES: usize = 3;

/// Characters Windows-1252 assigns to bytes 0x80..=0x9F, indexed by `byte - 0x80`.
///
/// Undefined slots (0x81, 0x8D, 0x8F, 0x90, 0x9D) keep the C1 control code
/// point, which is how Latin-1 decoders surface them.
static CP1252_HIGH: LazyLock<[char; 32]> = LazyLock::new(|| {
    let mut table = ['\0'; 32];
    for (i, slot) in table.iter_mut().enumerate() {
        let byte = 0x80 + i as u8;
        let bytes = [byte];
        let (decoded, had_errors) =
            encoding_rs::WINDOWS_1252.decode_without_bom_handling(&bytes);
        *slot = match decoded.chars().next() {
            Some(c) if !had_errors && c != '\u{fffd}' => c,
            _ => char::from(byte),
        };
    }
    table
});

/// Byte a single-byte decoder would have read to produce `c`, if any.
fn sloppy_byte(c: char) -> Option<u8> {
    let cp = c as u32;
    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    if (0x80..=0x9F).contains(&cp) {
        // Latin-1 view of a byte cp1252 leaves undefined
        return Some(cp as u8);
    }
    CP1252_HIGH
        .iter()
        .position(|&mapped| mapped == c)
        .map(|i| 0x80 + i as u8)
}

/// Decode `bytes` as UTF-8, keeping the original character wherever a byte
/// does not take part in a valid sequence. `chars[i]` produced `bytes[i]`.
fn decode_lossless(bytes: &[u8], chars: &[char], out: &mut String) {
    let mut pos = 0;
    while pos < bytes.len() {
        match std::str::from_utf8(&bytes[pos..]) {
            Ok(valid) => {
                out.push_str(valid);
                return;
            }
            Err(e) => {
                let valid_end = pos + e.valid_up_to();
                out.push_str(std::str::from_utf8(&bytes[pos..valid_end]).unwrap_or_default());
                let bad_len = e.error_len().unwrap_or(bytes.len() - valid_end);
                out.extend(&chars[valid_end..valid_end + bad_len]);
                pos = valid_end + bad_len;
            }
        }
    }
}

/// Re-encode every single-byte-representable run and read it back as UTF-8.
fn redecode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut bytes = Vec::new();
    let mut chars = Vec::new();

    for c in text.chars() {
        match sloppy_byte(c) {
            Some(b) => {
                bytes.push(b);
                chars.push(c);
            }
            None => {
                decode_lossless(&bytes, &chars, &mut out);
                bytes.clear();
                chars.clear();
                out.push(c);
            }
        }
    }
    decode_lossless(&bytes, &chars, &mut out);
    out
}

/// Whether `c` is what a UTF-8 continuation byte (0x80..=0xBF) looks like
/// after single-byte decoding.
fn looks_like_continuation(c: char) -> bool {
    sloppy_byte(c).is_some_and(|b| (0x80..=0xBF).contains(&b))
}

/// Whether `c` is what a UTF-8 lead byte (0xC2..=0xF4) looks like after
/// single-byte decoding.
fn looks_like_lead(c: char) -> bool {
    sloppy_byte(c).is_some_and(|b| (0xC2..=0xF4).contains(&b))
}

/// How strongly the text looks mis-decoded: lead/continuation look-alike
/// pairs plus stray C1 control characters.
fn badness(text: &str) -> usize {
    let mut score = 0;
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if ('\u{80}'..='\u{9f}').contains(&c) {
            score += 1;
        }
        if let Some(p) = prev {
            if looks_like_lead(p) && looks_like_continuation(c) {
                score += 1;
            }
        }
        prev = Some(c);
    }
    score
}

/// Undo UTF-8 bytes that were decoded with a single-byte charset.
///
/// A candidate is kept only if it scores strictly better, so clean text
/// (including genuine Latin-1 like "café") is returned unchanged.
pub fn fix_mojibake(text: &str) -> String {
    let mut current = text.to_string();
    let mut score = badness(&current);
    for _ in 0..MAX_MOJIBAKE_PASSES {
        if score == 0 {
            break;
        }
        let candidate = redecode(&current);
        let candidate_score = badness(&candidate);
        if candidate_score >= score {
            break;
        }
        current = candidate;
        score = candidate_score;
    }
    current
}

/// Whether the text contains something that looks like an HTML tag.
fn has_markup(text: &str) -> bool {
    text.as_bytes()
        .windows(2)
        .any(|w| w[0] == b'<' && (w[1].is_ascii_alphabetic() || w[1] == b'/'))
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "hellip" => '…',
        "deg" => '°',
        "micro" => 'µ',
        "plusmn" => '±',
        _ => return None,
    })
}

fn decode_entity(body: &str) -> Option<char> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).filter(|&c| c != '\0');
    }
    named_entity(body)
}

/// Longest entity body we look for between `&` and `;`.
const MAX_ENTITY_LEN: usize = 10;

/// Decode `&name;`, `&#NN;` and `&#xHH;` in text that is not markup.
/// Unknown entities are left as written.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') || has_markup(text) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&end| end > 0 && end <= MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Straighten curly quotes, expand ligatures, fold full-width forms and
/// normalize line breaks, one character at a time.
fn fix_characters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{2018}'..='\u{201b}' => out.push('\''),
            '\u{201c}'..='\u{201f}' => out.push('"'),
            'ﬀ' => out.push_str("ff"),
            'ﬁ' => out.push_str("fi"),
            'ﬂ' => out.push_str("fl"),
            'ﬃ' => out.push_str("ffi"),
            'ﬄ' => out.push_str("ffl"),
            'ﬅ' | 'ﬆ' => out.push_str("st"),
            '\u{ff01}'..='\u{ff5e}' => {
                out.push(char::from_u32(c as u32 - 0xfee0).unwrap_or(c));
            }
            '\u{3000}' => out.push(' '),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\u{85}' | '\u{2028}' | '\u{2029}' => out.push('\n'),
            _ => out.push(c),
        }
    }
    out
}

/// Full stage 1: entities, then mojibake, then per-character fixes.
pub fn repair_text(text: &str) -> String {
    let unescaped = unescape_entities(text);
    let fixed = fix_mojibake(&unescaped);
    fix_characters(&fixed)
}
