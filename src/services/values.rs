use ethers::types::U256;
use serde_json::Value;

/// Best-effort conversion of an RPC value (hex string, decimal string, JSON
/// number, null) into wei. Unparseable input becomes zero; this never fails.
pub fn to_wei(value: &Value) -> U256 {
    match value {
        Value::Null => U256::zero(),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                U256::from(u)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f > 0.0 {
                    U256::from(f.trunc() as u128)
                } else {
                    U256::zero()
                }
            } else {
                U256::zero()
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                U256::from_str_radix(hex, 16).unwrap_or_else(|_| U256::zero())
            } else if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                U256::from_dec_str(s).unwrap_or_else(|_| U256::zero())
            } else {
                // fallback: tolerate "1.5e18"-style numerics
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| U256::from(f.trunc() as u128))
                    .unwrap_or_else(U256::zero)
            }
        }
        _ => U256::zero(),
    }
}

/// Divide a wei amount by 10^decimals into a display float. Values beyond the
/// u128 fast path fall back to decimal-string division so huge balances do
/// not overflow. Returns 0.0 instead of failing.
pub fn wei_to_decimal(wei: U256, decimals: u32) -> f64 {
    if wei.is_zero() {
        return 0.0;
    }
    if wei.bits() <= 128 {
        return wei.as_u128() as f64 / 10f64.powi(decimals as i32);
    }

    let digits = wei.to_string();
    let decimals = decimals as usize;
    let shifted = if digits.len() > decimals {
        let (int_part, frac_part) = digits.split_at(digits.len() - decimals);
        format!("{}.{}", int_part, frac_part)
    } else {
        format!("0.{}{}", "0".repeat(decimals - digits.len()), digits)
    };
    shifted.parse::<f64>().unwrap_or(0.0)
}

/// 18-decimal shorthand for native balances and gas fees.
pub fn wei_to_eth(wei: U256) -> f64 {
    wei_to_decimal(wei, 18)
}
