//! 決済手段ごとの検証ディスパッチ
//!
//! 利用者が入力した決済手段データ（[`PaymentMethodDetails`]）を手段ごとの検証器に振り分け、
//! 正規化済みの値と決済ゲートウェイの手段コードを持つ [`ValidatedPaymentMethod`] を返す。

use std::{fmt, sync::Arc};

use serde::Deserialize;

use super::{
    Bic,
    BicValidator,
    CardExpiry,
    CardNumber,
    CardValidator,
    Iban,
    IbanValidator,
    PhoneNumber,
    PhoneValidator,
    ValidationError,
};
use crate::clock::Clock;

/// 未検証の決済手段データ
///
/// カード番号・CVV を含むため `Debug` は手段の種別のみ出力する。
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethodDetails {
    CreditCard {
        number:       String,
        cvv:          String,
        expiry_month: u32,
        expiry_year:  i32,
        holder:       String,
    },
    DirectDebit {
        iban:           String,
        account_holder: String,
        #[serde(default)]
        bic:            Option<String>,
    },
    Ideal {
        #[serde(default)]
        issuer_bic: Option<String>,
    },
    BankTransfer,
    Bizum {
        phone: String,
    },
    MbWay {
        phone: String,
    },
}

impl PaymentMethodDetails {
    /// 手段の種別名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreditCard { .. } => "credit_card",
            Self::DirectDebit { .. } => "direct_debit",
            Self::Ideal { .. } => "ideal",
            Self::BankTransfer => "bank_transfer",
            Self::Bizum { .. } => "bizum",
            Self::MbWay { .. } => "mb_way",
        }
    }
}

impl fmt::Debug for PaymentMethodDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentMethodDetails")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// 検証済みの決済手段
///
/// CVV は検証にのみ使い、ここには保持しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedPaymentMethod {
    Card {
        number: CardNumber,
        expiry: CardExpiry,
        holder: String,
    },
    DirectDebit {
        iban:           Iban,
        account_holder: String,
        bic:            Option<Bic>,
    },
    Ideal {
        issuer: Option<Bic>,
    },
    BankTransfer,
    Bizum {
        phone: PhoneNumber,
    },
    MbWay {
        phone: PhoneNumber,
    },
}

impl ValidatedPaymentMethod {
    /// 決済ゲートウェイに渡す手段コード
    ///
    /// カードはブランドが判別できればブランドのコード、できなければ `CREDITCARD`。
    pub fn gateway_code(&self) -> &'static str {
        match self {
            Self::Card { number, .. } => number.brand().gateway_code(),
            Self::DirectDebit { .. } => "DIRDEB",
            Self::Ideal { .. } => "IDEAL",
            Self::BankTransfer => "BANKTRANS",
            Self::Bizum { .. } => "BIZUM",
            Self::MbWay { .. } => "MBWAY",
        }
    }
}

/// 決済手段の検証器
///
/// IBAN の許可リストと時刻は構築時に注入する。
#[derive(Clone)]
pub struct PaymentMethodValidator {
    iban_validator: IbanValidator,
    clock:          Arc<dyn Clock>,
}

impl PaymentMethodValidator {
    pub fn new(iban_validator: IbanValidator, clock: Arc<dyn Clock>) -> Self {
        Self {
            iban_validator,
            clock,
        }
    }

    /// 手段ごとの検証器に振り分けて検証する
    ///
    /// 最初に見つかった問題を返す。
    pub fn validate(
        &self,
        details: &PaymentMethodDetails,
    ) -> Result<ValidatedPaymentMethod, ValidationError> {
        match details {
            PaymentMethodDetails::CreditCard {
                number,
                cvv,
                expiry_month,
                expiry_year,
                holder,
            } => {
                let number = CardValidator::validate_number(number)?;
                CardValidator::validate_cvv(cvv, number.brand())?;
                let expiry =
                    CardValidator::validate_expiry(*expiry_month, *expiry_year, self.clock.as_ref())?;
                let holder = require_holder("holder", "カード名義", holder)?;
                Ok(ValidatedPaymentMethod::Card {
                    number,
                    expiry,
                    holder,
                })
            }
            PaymentMethodDetails::DirectDebit {
                iban,
                account_holder,
                bic,
            } => {
                let iban = self.iban_validator.validate(iban)?;
                let account_holder = require_holder("account_holder", "口座名義", account_holder)?;
                let bic = optional_bic(bic.as_deref())?;
                Ok(ValidatedPaymentMethod::DirectDebit {
                    iban,
                    account_holder,
                    bic,
                })
            }
            PaymentMethodDetails::Ideal { issuer_bic } => Ok(ValidatedPaymentMethod::Ideal {
                issuer: optional_bic(issuer_bic.as_deref())?,
            }),
            PaymentMethodDetails::BankTransfer => Ok(ValidatedPaymentMethod::BankTransfer),
            PaymentMethodDetails::Bizum { phone } => Ok(ValidatedPaymentMethod::Bizum {
                phone: PhoneValidator::validate_spanish_mobile(phone)?,
            }),
            PaymentMethodDetails::MbWay { phone } => Ok(ValidatedPaymentMethod::MbWay {
                phone: PhoneValidator::validate_portuguese_mobile(phone)?,
            }),
        }
    }
}

impl fmt::Debug for PaymentMethodValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentMethodValidator")
            .field("iban_validator", &self.iban_validator)
            .finish_non_exhaustive()
    }
}

fn require_holder(field: &'static str, label: &str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field, label));
    }
    Ok(value.to_string())
}

/// 空欄は未指定として扱う
fn optional_bic(raw: Option<&str>) -> Result<Option<Bic>, ValidationError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => BicValidator::validate(raw).map(Some),
        _ => Ok(None),
    }
}
