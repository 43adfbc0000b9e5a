//! Canonical text form used for comparison, never for display.
//!
//! Folding steps, in order:
//! 1. width: full-width ASCII and the ideographic space become ASCII,
//!    half-width katakana become full-width (voiced marks are merged)
//! 2. kana: hiragana become katakana
//! 3. Unicode lowercase
//! 4. trim surrounding whitespace

/// Half-width katakana block U+FF61..=U+FF9F mapped to full-width, by offset.
const HALF_WIDTH_KANA: &str = "。「」、・ヲァィゥェォャュョッーアイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワン゛゜";

const HALF_WIDTH_VOICED_MARK: char = '\u{FF9E}';
const HALF_WIDTH_SEMI_VOICED_MARK: char = '\u{FF9F}';

/// Script and case folded form of `text`
pub fn normalize(text: &str) -> String {
    fold_kana(&fold_width(text)).to_lowercase().trim().to_string()
}

/// Fold full-width/half-width variants to a single width
pub fn fold_width(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{3000}' => out.push(' '),
            '\u{FF01}'..='\u{FF5E}' => {
                out.push(char::from_u32(c as u32 - 0xFEE0).unwrap_or(c));
            }
            '\u{FF61}'..='\u{FF9F}' => {
                let base = half_width_kana(c);
                let combined = match chars.peek() {
                    Some(&HALF_WIDTH_VOICED_MARK) => voiced(base),
                    Some(&HALF_WIDTH_SEMI_VOICED_MARK) => semi_voiced(base),
                    _ => None,
                };
                match combined {
                    Some(kana) => {
                        chars.next();
                        out.push(kana);
                    }
                    None => out.push(base),
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Fold hiragana to katakana
pub fn fold_kana(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{3041}'..='\u{3096}' | '\u{309D}'..='\u{309E}' => {
                char::from_u32(c as u32 + 0x60).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

fn half_width_kana(c: char) -> char {
    let offset = (c as u32 - 0xFF61) as usize;
    HALF_WIDTH_KANA.chars().nth(offset).unwrap_or(c)
}

fn voiced(kana: char) -> Option<char> {
    if kana == 'ウ' {
        return Some('ヴ');
    }
    if "カキクケコサシスセソタチツテトハヒフヘホ".contains(kana) {
        return char::from_u32(kana as u32 + 1);
    }
    None
}

fn semi_voiced(kana: char) -> Option<char> {
    if "ハヒフヘホ".contains(kana) {
        return char::from_u32(kana as u32 + 2);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_width_ascii_folds_to_ascii() {
        assert_eq!(fold_width("ＡＰＩ　１２３！"), "API 123!");
    }

    #[test]
    fn test_half_width_kana_folds_to_full_width() {
        assert_eq!(fold_width("ﾃﾞｰﾀﾍﾞｰｽ"), "データベース");
        assert_eq!(fold_width("ﾊﾟｿｺﾝ"), "パソコン");
        assert_eq!(fold_width("ｳﾞｧ"), "ヴァ");
    }

    #[test]
    fn test_stray_voiced_mark_is_kept() {
        assert_eq!(fold_width("ｱﾞ"), "ア゛");
    }

    #[test]
    fn test_hiragana_folds_to_katakana() {
        assert_eq!(fold_kana("でーたべーす"), "データベース");
        assert_eq!(fold_kana("漢字とかな"), "漢字トカナ");
    }

    #[test]
    fn test_normalize_folds_case_and_trims() {
        assert_eq!(normalize("  Ｄａｔａｂａｓｅ "), "database");
        assert_eq!(normalize("でーたべーす"), normalize("ﾃﾞｰﾀﾍﾞｰｽ"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("ﾃﾞｰﾀ Base　ＡＰＩ");
        assert_eq!(normalize(&once), once);
    }
}
