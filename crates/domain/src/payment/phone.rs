//! 電話番号の検証
//!
//! 汎用検証（E.164 または緩い形式）と、国限定の決済レール向けの携帯電話番号検証を持つ。
//!
//! | レール | 国 | 受理する形式 |
//! |-------|----|-------------|
//! | iDEAL 連絡先など | オランダ | `+31 6` / `0031 6` / `06` + 8 桁 |
//! | Bizum | スペイン | (`+34` / `0034`) + `6` または `7` で始まる 9 桁 |
//! | MB WAY | ポルトガル | (`+351` / `00351`) + `91` `92` `93` `96` で始まる 9 桁 |

use std::{fmt, sync::LazyLock};

use regex::Regex;

use super::{ValidationError, ValidationErrorKind};

static E164_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("E.164 パターンは有効な正規表現"));

static RELAXED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9\s\-().]{7,20}$").expect("電話番号パターンは有効な正規表現")
});

static DUTCH_MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+31|0031|0)(6[0-9]{8})$").expect("オランダ携帯パターンは有効な正規表現")
});

static SPANISH_MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+34|0034)?([67][0-9]{8})$").expect("スペイン携帯パターンは有効な正規表現")
});

static PORTUGUESE_MOBILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+351|00351)?(9[1236][0-9]{7})$")
        .expect("ポルトガル携帯パターンは有効な正規表現")
});

const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// 携帯電話番号の国
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MobileCountry {
    Netherlands,
    Spain,
    Portugal,
}

impl MobileCountry {
    /// 国際電話の国番号
    pub fn calling_code(self) -> &'static str {
        match self {
            Self::Netherlands => "31",
            Self::Spain => "34",
            Self::Portugal => "351",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Netherlands => "オランダ",
            Self::Spain => "スペイン",
            Self::Portugal => "ポルトガル",
        }
    }
}

/// 検証済み電話番号
///
/// 汎用検証では書式文字を除いた値、国別検証では E.164 形式に正規化した値を持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber {
    number:  String,
    country: Option<MobileCountry>,
}

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.number
    }

    /// 国別検証を通過した場合の国
    pub fn country(&self) -> Option<MobileCountry> {
        self.country
    }

    /// 数字の桁数
    pub fn digit_count(&self) -> usize {
        self.number.chars().filter(char::is_ascii_digit).count()
    }

    pub fn into_string(self) -> String {
        self.number
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.number)
    }
}

/// 電話番号検証器
pub struct PhoneValidator;

impl PhoneValidator {
    /// 書式文字（空白、ハイフン、ピリオド、括弧、スラッシュ）を除去する
    pub fn clean(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '(' | ')' | '/'))
            .collect()
    }

    /// 正規化済みの値が厳密な E.164 形式か
    pub fn is_e164(cleaned: &str) -> bool {
        E164_PATTERN.is_match(cleaned)
    }

    /// 電話番号を検証する
    ///
    /// 書式文字を除いた数字が 7〜15 桁で、E.164 か緩い形式のいずれかに一致すれば受理する。
    pub fn validate(raw: &str) -> Result<PhoneNumber, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::required("phone", "電話番号"));
        }

        let cleaned = Self::clean(trimmed);
        let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new(
                "phone",
                ValidationErrorKind::InvalidFormat,
                "電話番号に使用できない文字が含まれています",
            ));
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(ValidationError::new(
                "phone",
                ValidationErrorKind::InvalidLength,
                format!("電話番号は {MIN_DIGITS}〜{MAX_DIGITS} 桁である必要があります"),
            ));
        }
        if !Self::is_e164(&cleaned) && !RELAXED_PATTERN.is_match(trimmed) {
            return Err(ValidationError::new(
                "phone",
                ValidationErrorKind::InvalidFormat,
                "電話番号の形式が不正です",
            ));
        }

        Ok(PhoneNumber {
            number:  cleaned,
            country: None,
        })
    }

    /// オランダの携帯電話番号を検証し、`+316XXXXXXXX` に正規化する
    pub fn validate_dutch_mobile(raw: &str) -> Result<PhoneNumber, ValidationError> {
        Self::validate_mobile(raw, MobileCountry::Netherlands, &DUTCH_MOBILE)
    }

    /// スペインの携帯電話番号（Bizum）を検証し、`+34XXXXXXXXX` に正規化する
    pub fn validate_spanish_mobile(raw: &str) -> Result<PhoneNumber, ValidationError> {
        Self::validate_mobile(raw, MobileCountry::Spain, &SPANISH_MOBILE)
    }

    /// ポルトガルの携帯電話番号（MB WAY）を検証し、`+351XXXXXXXXX` に正規化する
    pub fn validate_portuguese_mobile(raw: &str) -> Result<PhoneNumber, ValidationError> {
        Self::validate_mobile(raw, MobileCountry::Portugal, &PORTUGUESE_MOBILE)
    }

    fn validate_mobile(
        raw: &str,
        country: MobileCountry,
        pattern: &Regex,
    ) -> Result<PhoneNumber, ValidationError> {
        let cleaned = Self::clean(raw);
        if cleaned.is_empty() {
            return Err(ValidationError::required("phone", "電話番号"));
        }

        let Some(subscriber) = pattern.captures(&cleaned).and_then(|caps| caps.get(1)) else {
            return Err(ValidationError::new(
                "phone",
                ValidationErrorKind::UnsupportedCountry,
                format!("{}の携帯電話番号ではありません", country.label()),
            ));
        };

        Ok(PhoneNumber {
            number:  format!("+{}{}", country.calling_code(), subscriber.as_str()),
            country: Some(country),
        })
    }
}
