// src/common/amount_normalizer.rs

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::common::error::NormalizeError;
use crate::models::revenue::RawValue;

/// Converte um valor monetário "solto" ("฿12,500.00", "12500", 12500) em
/// `Decimal` não negativo. Zero é válido; quem decide ignorá-lo é o motor.
pub fn normalize_amount(token: Option<&RawValue>) -> Result<Decimal, NormalizeError> {
    match token {
        None => Err(NormalizeError::UnparseableAmount(String::new())),
        Some(RawValue::Text(text)) => normalize_amount_str(text),
        Some(RawValue::Number(number)) => {
            let text = number.to_string();
            let value = Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| NormalizeError::UnparseableAmount(text.clone()))?;
            non_negative(value, &text)
        }
    }
}

pub fn normalize_amount_str(token: &str) -> Result<Decimal, NormalizeError> {
    let unparseable = || NormalizeError::UnparseableAmount(token.to_string());

    // Um sinal de menos antes do primeiro dígito é valor negativo, não lixo
    let leading = token
        .find(|c: char| c.is_ascii_digit())
        .map_or(token, |idx| &token[..idx]);
    if leading.contains('-') {
        return Err(unparseable());
    }

    // Fica só com dígitos e o separador decimal
    let mut stripped: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if stripped.matches('.').count() > 1 || !stripped.bytes().any(|b| b.is_ascii_digit()) {
        return Err(unparseable());
    }

    if stripped.starts_with('.') {
        stripped.insert(0, '0');
    }
    if stripped.ends_with('.') {
        stripped.pop();
    }

    let value = Decimal::from_str(&stripped).map_err(|_| unparseable())?;
    non_negative(value, token)
}

fn non_negative(value: Decimal, token: &str) -> Result<Decimal, NormalizeError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(NormalizeError::UnparseableAmount(token.to_string()));
    }
    Ok(value)
}
