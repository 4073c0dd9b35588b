pub mod helpers;
mod micro_usdt;

pub mod op;
mod secret;

pub use micro_usdt::{MicroUsdt, MicroUsdtConversionError, USDT_CURRENCY_CODE, USDT_DECIMALS};
pub use secret::Secret;
