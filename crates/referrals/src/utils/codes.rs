//! Referral code generation and validation.

const MAX_SOURCE_CHARS: usize = 10;
const MAX_BASE_CHARS: usize = 8;
const FALLBACK_CODE: &str = "REF";

fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        'א' | 'ע' => "A",
        'ב' => "B",
        'ג' => "G",
        'ד' => "D",
        'ה' => "H",
        'ו' => "V",
        'ז' => "Z",
        'ח' => "CH",
        'ט' | 'ת' => "T",
        'י' => "Y",
        'כ' | 'ך' | 'ק' => "K",
        'ל' => "L",
        'מ' | 'ם' => "M",
        'נ' | 'ן' => "N",
        'ס' => "S",
        'פ' | 'ף' => "P",
        'צ' | 'ץ' => "TZ",
        'ר' => "R",
        'ש' => "SH",
        _ => return None,
    })
}

fn is_hebrew_letter(c: char) -> bool {
    ('\u{05D0}'..='\u{05EA}').contains(&c)
}

/// Uppercase Latin stem derived from a display name, at most eight characters.
pub fn code_base(name: &str) -> String {
    let mut base = String::new();
    for c in name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_hebrew_letter(*c))
        .take(MAX_SOURCE_CHARS)
    {
        match transliterate(c) {
            Some(latin) => base.push_str(latin),
            None => base.push(c.to_ascii_uppercase()),
        }
    }
    let base: String = base.chars().take(MAX_BASE_CHARS).collect();
    if base.is_empty() {
        FALLBACK_CODE.to_string()
    } else {
        base
    }
}

/// First free code for `name`: the stem itself, then the stem with 1, 2, ... appended.
pub fn generate_referral_code(name: &str, taken: &[String]) -> String {
    let base = code_base(name);
    let mut code = base.clone();
    let mut counter = 1;
    while taken.iter().any(|t| t == &code) {
        code = format!("{base}{counter}");
        counter += 1;
    }
    code
}

pub fn is_valid_code(code: &str) -> bool {
    (3..=15).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric())
}
