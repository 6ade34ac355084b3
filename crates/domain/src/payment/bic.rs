//! BIC（SWIFT コード）の検証
//!
//! 構成: 銀行コード 4 文字 + 国コード 2 文字 + 所在地コード 2 文字 (+ 支店コード 3 文字)
//!
//! 所在地コードの 1 文字目に `0` / `1` は使えず、2 文字目に `O` は使えない（SWIFT の規則）。

use std::{fmt, sync::LazyLock};

use regex::Regex;

use super::{ValidationError, ValidationErrorKind};

static BIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{6}[A-Z2-9][A-NP-Z0-9]([A-Z0-9]{3})?$").expect("BIC パターンは有効な正規表現")
});

/// 支店コード省略時（本店）の値
const PRIMARY_OFFICE_BRANCH: &str = "XXX";

/// BIC の国コードとして認める ISO 3166-1 alpha-2 コード（昇順）
///
/// SWIFT が割り当てる `XK`（コソボ）を含む。
const COUNTRY_CODES: &[&str] = &[
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW",
    "AX", "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN",
    "BO", "BQ", "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG",
    "CH", "CI", "CK", "CL", "CM", "CN", "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ",
    "DE", "DJ", "DK", "DM", "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI",
    "FJ", "FK", "FM", "FO", "FR", "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL",
    "GM", "GN", "GP", "GQ", "GR", "GS", "GT", "GU", "GW", "GY", "HK", "HM", "HN", "HR",
    "HT", "HU", "ID", "IE", "IL", "IM", "IN", "IO", "IQ", "IR", "IS", "IT", "JE", "JM",
    "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN", "KP", "KR", "KW", "KY", "KZ", "LA",
    "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV", "LY", "MA", "MC", "MD", "ME",
    "MF", "MG", "MH", "MK", "ML", "MM", "MN", "MO", "MP", "MQ", "MR", "MS", "MT", "MU",
    "MV", "MW", "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI", "NL", "NO", "NP",
    "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM", "PN", "PR",
    "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW", "SA", "SB", "SC", "SD",
    "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS", "ST", "SV",
    "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO",
    "TR", "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE",
    "VG", "VI", "VN", "VU", "WF", "WS", "XK", "YE", "YT", "ZA", "ZM", "ZW",
];

/// BIC の国コードとして認められるか
pub fn is_known_country_code(code: &str) -> bool {
    COUNTRY_CODES.binary_search(&code).is_ok()
}

/// 検証済み BIC（空白なし・大文字、8 文字または 11 文字）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bic(String);

impl Bic {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bank_code(&self) -> &str {
        &self.0[..4]
    }

    pub fn country_code(&self) -> &str {
        &self.0[4..6]
    }

    pub fn location_code(&self) -> &str {
        &self.0[6..8]
    }

    /// 支店コード（8 文字の BIC は本店 `XXX`）
    pub fn branch_code(&self) -> &str {
        if self.0.len() == 8 {
            PRIMARY_OFFICE_BRANCH
        } else {
            &self.0[8..]
        }
    }
}

impl fmt::Display for Bic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// BIC 検証器
pub struct BicValidator;

impl BicValidator {
    /// 空白を除去し大文字に変換する
    pub fn clean(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// BIC を検証する
    pub fn validate(raw: &str) -> Result<Bic, ValidationError> {
        let bic = Self::clean(raw);

        if bic.is_empty() {
            return Err(ValidationError::required("bic", "BIC"));
        }
        if bic.chars().count() != 8 && bic.chars().count() != 11 {
            return Err(ValidationError::new(
                "bic",
                ValidationErrorKind::InvalidLength,
                "BIC は 8 文字または 11 文字である必要があります",
            ));
        }
        if !BIC_PATTERN.is_match(&bic) {
            return Err(ValidationError::new(
                "bic",
                ValidationErrorKind::InvalidFormat,
                "BIC の形式が不正です（銀行コード 4 文字 + 国コード 2 文字 + 所在地コード 2 文字）",
            ));
        }

        let country = &bic[4..6];
        if !is_known_country_code(country) {
            return Err(ValidationError::new(
                "bic",
                ValidationErrorKind::UnsupportedCountry,
                format!("BIC の国コード {country} は認識できません"),
            ));
        }

        Ok(Bic(bic))
    }
}
