use std::{fmt::Display, iter::Sum, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const USDT_CURRENCY_CODE: &str = "USDT";
/// USDT-TRC20 is a 6-decimal token. One `MicroUsdt` is its smallest on-chain unit.
pub const USDT_DECIMALS: u32 = 6;
const UNITS_PER_USDT: i64 = 1_000_000;

//--------------------------------------     MicroUsdt       ---------------------------------------------------------
/// A fixed-point USDT amount, stored as an integer number of micro-USDT (10^-6 USDT).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MicroUsdt(i64);

op!(binary MicroUsdt, Add, add);
op!(binary MicroUsdt, Sub, sub);
op!(inplace MicroUsdt, AddAssign, add_assign);
op!(inplace MicroUsdt, SubAssign, sub_assign);
op!(unary MicroUsdt, Neg, neg);

impl Sum for MicroUsdt {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, v| acc + v)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented in micro-USDT: {0}")]
pub struct MicroUsdtConversionError(String);

impl From<i64> for MicroUsdt {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for MicroUsdt {
    type Error = MicroUsdtConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MicroUsdtConversionError(format!("{value} is too large to convert to MicroUsdt")))
    }
}

impl MicroUsdt {
    /// One ten-thousandth of a USDT, the resolution of order amount disambiguators.
    pub const TEN_THOUSANDTH: MicroUsdt = MicroUsdt(100);

    pub const fn new(micro_usdt: i64) -> Self {
        Self(micro_usdt)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_usdt(usdt: i64) -> Self {
        Self(usdt * UNITS_PER_USDT)
    }

    pub fn abs_diff(&self, other: MicroUsdt) -> MicroUsdt {
        Self((self.0 - other.0).abs())
    }

    /// Rescales a raw token amount with `decimals` decimal places into micro-USDT. Precision beyond 6 decimals is
    /// truncated.
    pub fn from_base_units(raw: u128, decimals: u32) -> Result<Self, MicroUsdtConversionError> {
        let scaled = if decimals >= USDT_DECIMALS {
            10u128.checked_pow(decimals - USDT_DECIMALS).map(|d| raw / d)
        } else {
            10u128.checked_pow(USDT_DECIMALS - decimals).and_then(|m| raw.checked_mul(m))
        };
        scaled
            .and_then(|v| i64::try_from(v).ok())
            .map(Self)
            .ok_or_else(|| MicroUsdtConversionError(format!("{raw} with {decimals} decimals is out of range")))
    }
}

/// Displays the amount in USDT, trimming trailing zeros but always showing at least two decimals.
/// e.g. `5.3217`, `15.00`, `0.000001`.
impl Display for MicroUsdt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / UNITS_PER_USDT as u64;
        let frac = format!("{:06}", abs % UNITS_PER_USDT as u64);
        let trimmed = frac.trim_end_matches('0');
        let frac = if trimmed.len() < 2 { &frac[..2] } else { trimmed };
        write!(f, "{sign}{whole}.{frac}")
    }
}

impl FromStr for MicroUsdt {
    type Err = MicroUsdtConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MicroUsdtConversionError(format!("'{s}' is not a valid USDT amount"));
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if frac.len() > USDT_DECIMALS as usize || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = if whole.is_empty() { 0 } else { whole.parse::<i64>().map_err(|_| err())? };
        let frac_units = if frac.is_empty() { 0 } else { format!("{frac:0<6}").parse::<i64>().map_err(|_| err())? };
        let units = whole.checked_mul(UNITS_PER_USDT).and_then(|w| w.checked_add(frac_units)).ok_or_else(err)?;
        Ok(Self(if negative { -units } else { units }))
    }
}
