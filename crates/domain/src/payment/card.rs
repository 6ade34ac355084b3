//! カード番号・CVV・有効期限の検証

use std::fmt;

use serde::Serialize;
use strum::IntoStaticStr;

use super::{ValidationError, ValidationErrorKind};
use crate::clock::Clock;

const MIN_CARD_DIGITS: usize = 13;
const MAX_CARD_DIGITS: usize = 19;

/// カードブランド
///
/// 先頭桁の範囲による推定。有効性の判定には使わない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    DinersClub,
    Jcb,
    Maestro,
    Unknown,
}

impl CardBrand {
    /// 数字のみのカード番号からブランドを推定する
    pub fn detect(digits: &str) -> Self {
        let starts_in = |len: usize, lo: u32, hi: u32| -> bool {
            digits
                .get(..len)
                .and_then(|prefix| prefix.parse::<u32>().ok())
                .is_some_and(|prefix| (lo..=hi).contains(&prefix))
        };

        if starts_in(2, 34, 34) || starts_in(2, 37, 37) {
            Self::Amex
        } else if starts_in(1, 4, 4) {
            Self::Visa
        } else if starts_in(2, 51, 55) || starts_in(4, 2221, 2720) {
            Self::Mastercard
        } else if starts_in(4, 6011, 6011) || starts_in(3, 644, 649) || starts_in(2, 65, 65) {
            Self::Discover
        } else if starts_in(3, 300, 305) || starts_in(2, 36, 36) || starts_in(2, 38, 38) {
            Self::DinersClub
        } else if starts_in(4, 3528, 3589) {
            Self::Jcb
        } else if starts_in(2, 50, 50)
            || starts_in(2, 56, 58)
            || starts_in(4, 6304, 6304)
            || starts_in(4, 6759, 6759)
            || starts_in(6, 676770, 676770)
            || starts_in(6, 676774, 676774)
        {
            Self::Maestro
        } else {
            Self::Unknown
        }
    }

    /// CVV の桁数（Amex のみ 4 桁）
    pub fn cvv_length(self) -> usize {
        match self {
            Self::Amex => 4,
            _ => 3,
        }
    }

    /// 決済ゲートウェイの決済手段コード
    pub fn gateway_code(self) -> &'static str {
        match self {
            Self::Visa => "VISA",
            Self::Mastercard => "MASTERCARD",
            Self::Amex => "AMEX",
            Self::Maestro => "MAESTRO",
            Self::Discover | Self::DinersClub | Self::Jcb | Self::Unknown => "CREDITCARD",
        }
    }
}

/// 検証済みカード番号（数字のみ）
///
/// PII のため `Debug` / `Display` は下 4 桁以外をマスクする。
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber {
    digits: String,
    brand:  CardBrand,
}

impl CardNumber {
    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn brand(&self) -> CardBrand {
        self.brand
    }

    pub fn last4(&self) -> &str {
        &self.digits[self.digits.len() - 4..]
    }

    /// 表示用のマスク済み文字列（例: `**** 1111`）
    pub fn masked(&self) -> String {
        format!("**** {}", self.last4())
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardNumber")
            .field("brand", &self.brand)
            .field("last4", &self.last4())
            .finish()
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// カード有効期限（年月）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CardExpiry {
    year:  i32,
    month: u32,
}

impl CardExpiry {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

/// カード検証器
pub struct CardValidator;

impl CardValidator {
    /// 空白とハイフンを除去する
    pub fn clean(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect()
    }

    /// Luhn チェックサム
    ///
    /// 右端から数えて偶数番目の桁を 2 倍し、9 を超えたら 9 を引き、
    /// 全桁の合計が 10 で割り切れれば有効。数字以外を含む場合は無効。
    pub fn luhn_valid(digits: &str) -> bool {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        let sum: u32 = digits
            .bytes()
            .rev()
            .enumerate()
            .map(|(i, b)| {
                let d = u32::from(b - b'0');
                if i % 2 == 1 {
                    let doubled = d * 2;
                    if doubled > 9 { doubled - 9 } else { doubled }
                } else {
                    d
                }
            })
            .sum();

        sum % 10 == 0
    }

    /// カード番号を検証する
    pub fn validate_number(raw: &str) -> Result<CardNumber, ValidationError> {
        let digits = Self::clean(raw);

        if digits.is_empty() {
            return Err(ValidationError::required("card_number", "カード番号"));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::new(
                "card_number",
                ValidationErrorKind::InvalidFormat,
                "カード番号は数字のみで入力してください",
            ));
        }
        if !(MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&digits.len()) {
            return Err(ValidationError::new(
                "card_number",
                ValidationErrorKind::InvalidLength,
                format!("カード番号は {MIN_CARD_DIGITS}〜{MAX_CARD_DIGITS} 桁である必要があります"),
            ));
        }
        if !Self::luhn_valid(&digits) {
            return Err(ValidationError::new(
                "card_number",
                ValidationErrorKind::InvalidChecksum,
                "カード番号のチェックサムが一致しません",
            ));
        }

        let brand = CardBrand::detect(&digits);
        Ok(CardNumber { digits, brand })
    }

    /// CVV を検証する
    pub fn validate_cvv(cvv: &str, brand: CardBrand) -> Result<(), ValidationError> {
        let cvv = cvv.trim();
        if cvv.is_empty() {
            return Err(ValidationError::required("cvv", "セキュリティコード"));
        }
        if !cvv.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::new(
                "cvv",
                ValidationErrorKind::InvalidFormat,
                "セキュリティコードは数字のみで入力してください",
            ));
        }

        let expected = brand.cvv_length();
        if cvv.len() != expected {
            return Err(ValidationError::new(
                "cvv",
                ValidationErrorKind::InvalidLength,
                format!("セキュリティコードは {expected} 桁である必要があります"),
            ));
        }
        Ok(())
    }

    /// 有効期限を検証する
    ///
    /// 年は 2 桁（`28` → 2028）または 4 桁。現在の年月より前なら期限切れ。
    /// 当月末までは有効とみなす。
    pub fn validate_expiry(
        month: u32,
        year: i32,
        clock: &dyn Clock,
    ) -> Result<CardExpiry, ValidationError> {
        if !(1..=12).contains(&month) {
            return Err(ValidationError::new(
                "expiry_month",
                ValidationErrorKind::InvalidFormat,
                "有効期限の月は 1〜12 である必要があります",
            ));
        }

        let year = match year {
            0..=99 => 2000 + year,
            1000..=9999 => year,
            _ => {
                return Err(ValidationError::new(
                    "expiry_year",
                    ValidationErrorKind::InvalidFormat,
                    "有効期限の年は 2 桁または 4 桁で入力してください",
                ));
            }
        };

        let expiry = CardExpiry { year, month };
        let (current_year, current_month) = clock.current_year_month();
        let current = CardExpiry {
            year:  current_year,
            month: current_month,
        };

        if expiry < current {
            return Err(ValidationError::new(
                "expiry",
                ValidationErrorKind::Expired,
                "カードの有効期限が切れています",
            ));
        }
        Ok(expiry)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::clock::FixedClock;

    #[fixture]
    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap())
    }

    /// 先頭部分から Luhn を満たすチェックディジットを付けた番号を作る
    fn with_check_digit(body: &str) -> String {
        (0..=9)
            .map(|d| format!("{body}{d}"))
            .find(|candidate| CardValidator::luhn_valid(candidate))
            .unwrap()
    }

    // カード番号

    #[rstest]
    #[case("4111111111111111", CardBrand::Visa)]
    #[case("4111 1111 1111 1111", CardBrand::Visa)]
    #[case("5555-5555-5555-4444", CardBrand::Mastercard)]
    #[case("2223003122003222", CardBrand::Mastercard)]
    #[case("378282246310005", CardBrand::Amex)]
    #[case("6011111111111117", CardBrand::Discover)]
    #[case("30569309025904", CardBrand::DinersClub)]
    #[case("3530111333300000", CardBrand::Jcb)]
    fn test_有効なカード番号を受理しブランドを推定する(
        #[case] raw: &str,
        #[case] brand: CardBrand,
    ) {
        let number = CardValidator::validate_number(raw).unwrap();
        assert_eq!(number.brand(), brand);
    }

    #[test]
    fn test_チェックサム不一致のカード番号を拒否する() {
        let err = CardValidator::validate_number("4111111111111112").unwrap_err();
        assert_eq!(err.field, "card_number");
        assert_eq!(err.kind, ValidationErrorKind::InvalidChecksum);
    }

    #[rstest]
    #[case("411111111111", ValidationErrorKind::InvalidLength)]
    #[case("41111111111111111111", ValidationErrorKind::InvalidLength)]
    #[case("4111a11111111111", ValidationErrorKind::InvalidFormat)]
    #[case("   ", ValidationErrorKind::Required)]
    fn test_不正な形式のカード番号を拒否する(
        #[case] raw: &str,
        #[case] kind: ValidationErrorKind,
    ) {
        assert_eq!(CardValidator::validate_number(raw).unwrap_err().kind, kind);
    }

    #[test]
    fn test_13桁から19桁ではluhnが成立する番号のみ受理する() {
        for len in MIN_CARD_DIGITS..=MAX_CARD_DIGITS {
            let body: String = "4929123456789012345".chars().take(len - 1).collect();
            let valid = with_check_digit(&body);
            assert!(CardValidator::validate_number(&valid).is_ok(), "{valid}");

            for d in (0..=9).map(|d| format!("{body}{d}")).filter(|c| *c != valid) {
                assert!(CardValidator::validate_number(&d).is_err(), "{d}");
            }
        }
    }

    #[test]
    fn test_有効な番号の任意の1桁を変えると拒否される() {
        let valid = "4111111111111111";
        for pos in 0..valid.len() {
            for replacement in b'0'..=b'9' {
                let mut bytes = valid.as_bytes().to_vec();
                if bytes[pos] == replacement {
                    continue;
                }
                bytes[pos] = replacement;
                let mutated = String::from_utf8(bytes).unwrap();
                assert!(!CardValidator::luhn_valid(&mutated), "{mutated}");
            }
        }
    }

    #[rstest]
    #[case("5012345678901234", CardBrand::Maestro)]
    #[case("6759000000000000", CardBrand::Maestro)]
    #[case("6770000000000000", CardBrand::Unknown)]
    #[case("9999", CardBrand::Unknown)]
    #[case("", CardBrand::Unknown)]
    fn test_ブランド推定は有効性と無関係に先頭桁で決まる(
        #[case] digits: &str,
        #[case] brand: CardBrand,
    ) {
        assert_eq!(CardBrand::detect(digits), brand);
    }

    #[test]
    fn test_カード番号のdebug出力はマスクされる() {
        let number = CardValidator::validate_number("4111111111111111").unwrap();
        let debug = format!("{number:?}");

        assert!(!debug.contains("4111111111111111"));
        assert!(debug.contains("1111"));
        assert_eq!(number.to_string(), "**** 1111");
    }

    // CVV

    #[rstest]
    #[case("123", CardBrand::Visa)]
    #[case("1234", CardBrand::Amex)]
    fn test_ブランドに応じた桁数のcvvを受理する(#[case] cvv: &str, #[case] brand: CardBrand) {
        assert!(CardValidator::validate_cvv(cvv, brand).is_ok());
    }

    #[rstest]
    #[case("1234", CardBrand::Visa, ValidationErrorKind::InvalidLength)]
    #[case("123", CardBrand::Amex, ValidationErrorKind::InvalidLength)]
    #[case("12a", CardBrand::Mastercard, ValidationErrorKind::InvalidFormat)]
    #[case("", CardBrand::Visa, ValidationErrorKind::Required)]
    fn test_不正なcvvを拒否する(
        #[case] cvv: &str,
        #[case] brand: CardBrand,
        #[case] kind: ValidationErrorKind,
    ) {
        assert_eq!(CardValidator::validate_cvv(cvv, brand).unwrap_err().kind, kind);
    }

    // 有効期限

    #[rstest]
    #[case(10, 2026)]
    #[case(10, 26)]
    #[case(1, 2027)]
    fn test_当月以降の有効期限を受理する(clock: FixedClock, #[case] month: u32, #[case] year: i32) {
        assert!(CardValidator::validate_expiry(month, year, &clock).is_ok());
    }

    #[rstest]
    fn test_前月の有効期限は期限切れ(clock: FixedClock) {
        let err = CardValidator::validate_expiry(9, 2026, &clock).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Expired);
    }

    #[rstest]
    #[case(0, 2027, "expiry_month")]
    #[case(13, 2027, "expiry_month")]
    #[case(1, 202, "expiry_year")]
    fn test_不正な年月を拒否する(
        clock: FixedClock,
        #[case] month: u32,
        #[case] year: i32,
        #[case] field: &str,
    ) {
        let err = CardValidator::validate_expiry(month, year, &clock).unwrap_err();
        assert_eq!(err.field, field);
        assert_eq!(err.kind, ValidationErrorKind::InvalidFormat);
    }
}
