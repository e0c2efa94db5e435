//! Field validators shared by console forms.

use regex::Regex;
use std::sync::LazyLock;

/// Mainland China mobile numbers: 13x through 19x, 11 digits.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^1[3-9]\d{9}$").unwrap());

/// Resident ID numbers: 15 digits, 18 digits, or 17 digits plus a check letter.
static ID_CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^\d{15}$)|(^\d{18}$)|(^\d{17}(\d|X|x)$)").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn is_valid_id_card(id_card: &str) -> bool {
    ID_CARD_RE.is_match(id_card)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}
