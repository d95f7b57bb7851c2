use crate::chain::ChainEvent;
use log::warn;
use serde_json::Value;

/// Number of base units in one token.
pub const REWARD_SCALE: u128 = 1_000_000_000_000_000_000;
pub const REWARDS_PALLET: &str = "Rewards";
pub const BLOCK_REWARD_EVENT: &str = "BlockReward";

/// Rounds to `precision` decimal places. Zero and non finite values become 0.
pub fn to_fixed(value: f64, precision: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Converts a base unit reward into tokens, rounded to 2 decimal places.
pub fn decode_reward_amount(amount: u128) -> f64 {
    let whole = (amount / REWARD_SCALE) as f64;
    let fraction = (amount % REWARD_SCALE) as f64 / REWARD_SCALE as f64;
    to_fixed(whole + fraction, 2)
}

/// Reads a balance from an event field. Decoders emit balances as numbers,
/// decimal strings or `0x` hex strings depending on their width.
pub fn parse_reward_value(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from).or_else(|| match n.as_f64() {
            // Integers above u64::MAX arrive as floats unless the decoder emits strings.
            Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
                warn!("Reward {n} exceeds u64, decoded through f64");
                Some(f as u128)
            }
            _ => {
                warn!("Ignoring non integer reward value {n}");
                None
            }
        }),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u128::from_str_radix(hex, 16).ok(),
            None => s.parse::<u128>().ok(),
        },
        Value::Object(map) => map
            .get("amount")
            .or_else(|| map.get("reward"))
            .and_then(parse_reward_value),
        _ => None,
    }
}

/// Finds the block reward paid to the block author among the block's events.
pub fn find_block_reward(events: &[ChainEvent]) -> Option<u128> {
    events
        .iter()
        .filter(|e| e.is(REWARDS_PALLET, BLOCK_REWARD_EVENT))
        .find_map(|e| e.fields.iter().rev().find_map(parse_reward_value))
}
