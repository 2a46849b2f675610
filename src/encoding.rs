//! Adaptive character-encoding recovery.
//!
//! Many CJK-region academic portals serve GBK/GB18030 content with absent or
//! wrong charset headers; decoding those bytes as UTF-8 silently corrupts
//! titles and abstracts instead of failing. The resolver decodes the raw
//! bytes with each candidate charset and keeps the one with the lowest
//! mojibake score.

use encoding_rs::{Encoding, GB18030, GBK, UTF_8};

/// Known artifacts of double-decoded or mis-decoded CJK text.
const MOJIBAKE_GLYPHS: [char; 3] = ['Â', 'Ã', '½'];

/// Picks the decoding that minimizes a mojibake heuristic score.
#[derive(Debug, Clone)]
pub struct EncodingResolver {
    candidates: Vec<&'static Encoding>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        // Fixed preference order; GB2312 content decodes cleanly as GBK.
        Self {
            candidates: vec![UTF_8, GB18030, GBK],
        }
    }
}

impl EncodingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes` with every candidate and return the cleanest text.
    ///
    /// `declared` is the transport layer's own charset label, used only as a
    /// last resort when no candidate produces anything.
    pub fn resolve(&self, bytes: &[u8], declared: Option<&str>) -> String {
        let mut best: Option<(f64, String, &'static str)> = None;

        for encoding in &self.candidates {
            // decode() honors a BOM when present, so UTF-8-with-BOM is
            // covered by the UTF-8 candidate.
            let (text, _, _) = encoding.decode(bytes);
            let score = mojibake_score(&text);

            if best.as_ref().map(|(s, _, _)| score < *s).unwrap_or(true) {
                let clean = score == 0.0;
                best = Some((score, text.into_owned(), encoding.name()));
                if clean {
                    break;
                }
            }
        }

        match best {
            Some((score, text, name)) => {
                if score > 0.0 {
                    tracing::debug!(encoding = name, score, "best decode still has artifacts");
                }
                text
            }
            None => {
                // No candidates configured: trust the transport's label.
                let encoding = declared
                    .and_then(|label| Encoding::for_label(label.as_bytes()))
                    .unwrap_or(UTF_8);
                encoding.decode(bytes).0.into_owned()
            }
        }
    }
}

/// Mojibake heuristic: lower is better, 0 = clean.
///
/// +10 per replacement character; for CJK-heavy text, a Latin-1-supplement
/// fraction above 5% adds `ratio * 100`; +2 per known mojibake glyph.
pub fn mojibake_score(text: &str) -> f64 {
    let mut score = 0.0;
    let mut total = 0usize;
    let mut cjk = 0usize;
    let mut latin1_sup = 0usize;

    for c in text.chars() {
        total += 1;
        match c {
            '\u{FFFD}' => score += 10.0,
            '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' => cjk += 1,
            '\u{00A0}'..='\u{00FF}' => latin1_sup += 1,
            _ => {}
        }
        if MOJIBAKE_GLYPHS.contains(&c) {
            score += 2.0;
        }
    }

    if cjk > 10 && total > 0 {
        let ratio = latin1_sup as f64 / total as f64;
        if ratio > 0.05 {
            score += ratio * 100.0;
        }
    }

    score
}
