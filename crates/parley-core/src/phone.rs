//! Email and phone number validation.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("email pattern compiles")
});

/// Characters people type between digits.
static SEPARATORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-.()]").expect("separator pattern compiles"));

/// Syntactic local@domain check. Case-insensitive.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(&email.to_lowercase())
}

/// Region assumed for numbers written without a country code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhoneRegion {
    #[default]
    Us,
    Ca,
}

impl FromStr for PhoneRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Self::Us),
            "CA" => Ok(Self::Ca),
            other => Err(format!("unsupported phone region {}", other)),
        }
    }
}

impl PhoneRegion {
    fn country_code(self) -> &'static str {
        // Both share the North American Numbering Plan.
        match self {
            Self::Us | Self::Ca => "1",
        }
    }
}

/// Normalize a phone number to E.164 (`+<digits>`).
///
/// Numbers starting with `+` are taken as international and must carry
/// 8 to 15 digits. Anything else is read as a national number in `region`:
/// ten digits, optionally preceded by the trunk `1`, with area code and
/// exchange not starting with 0 or 1.
pub fn normalize_phone(raw: &str, region: PhoneRegion) -> Option<String> {
    let trimmed = raw.trim();
    let (international, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let digits = SEPARATORS_RE.replace_all(rest, "");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    if international {
        if !(8..=15).contains(&digits.len()) || digits.starts_with('0') {
            return None;
        }
        if let Some(national) = digits.strip_prefix('1') {
            // NANP numbers get the same shape check as national ones.
            if national.len() != 10 || !is_nanp(national) {
                return None;
            }
        }
        return Some(format!("+{}", digits));
    }

    let national = match digits.len() {
        10 => &digits[..],
        11 if digits.starts_with(region.country_code()) => &digits[1..],
        _ => return None,
    };

    is_nanp(national).then(|| format!("+{}{}", region.country_code(), national))
}

fn is_nanp(national: &str) -> bool {
    let b = national.as_bytes();
    b.len() == 10 && (b'2'..=b'9').contains(&b[0]) && (b'2'..=b'9').contains(&b[3])
}
