//! Identifier generation

use crate::error::{MarketError, MarketResult};
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique record id then encode using bech32, e.g. `booking_1...`
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// [`new_uuid_to_bech32`] with the failure folded into [`MarketError`].
pub fn new_record_id(hrp: &str) -> MarketResult<String> {
    new_uuid_to_bech32(hrp).map_err(|e| MarketError::Identifier(e.to_string()))
}
