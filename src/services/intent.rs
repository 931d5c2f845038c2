use crate::utils::is_eth_address;

/// What a chat query is asking for, in priority order. A transaction hash in
/// the text always wins; keyword intents are checked next; anything left is
/// `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    TxLookup(String),
    Gas,
    Portfolio,
    Activity,
    Dao,
    Unknown,
}

/// Classify a raw chat query. Matching is case-insensitive on the keyword
/// side; extracted hashes keep their original casing.
pub fn classify(query: &str) -> Intent {
    if let Some(hash) = extract_tx_hash(query) {
        return Intent::TxLookup(hash);
    }
    let lower = query.to_lowercase();
    if lower.contains("gas") {
        return Intent::Gas;
    }
    if lower.contains("pnl") || lower.contains("portfolio") || lower.contains("net worth") {
        return Intent::Portfolio;
    }
    if lower.contains("recent") || lower.contains("activity") || lower.contains("transactions") {
        return Intent::Activity;
    }
    if lower.contains("dao")
        || lower.contains("proposal")
        || lower.contains("vote")
        || lower.contains("governance")
    {
        return Intent::Dao;
    }
    Intent::Unknown
}

impl Intent {
    /// Intents that read wallet state need a valid address before any
    /// upstream call is made.
    pub fn requires_address(&self) -> bool {
        matches!(
            self,
            Intent::Gas | Intent::Portfolio | Intent::Activity | Intent::Dao
        )
    }
}

/// True when the supplied address satisfies the intent's requirements.
pub fn address_ok(intent: &Intent, address: &str) -> bool {
    !intent.requires_address() || is_eth_address(address)
}

// Internal helper that scans for a 0x-prefixed 64-hex-digit run.
fn extract_tx_hash(query: &str) -> Option<String> {
    let bytes = query.as_bytes();
    let mut i = 0;
    while i + 66 <= bytes.len() {
        if bytes[i] == b'0' && (bytes[i + 1] == b'x' || bytes[i + 1] == b'X') {
            let run = &query[i + 2..];
            let hex_len = run
                .bytes()
                .take_while(|b| b.is_ascii_hexdigit())
                .count();
            if hex_len >= 64 {
                return Some(format!("0x{}", &run[..64]));
            }
            i += 2 + hex_len;
        } else {
            i += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn hash_beats_keywords() {
        // Memastikan hash transaksi menang atas kata kunci gas
        let hash = format!("0x{}", "ab".repeat(32));
        let query = format!("how much gas did {} burn?", hash);
        assert_eq!(classify(&query), Intent::TxLookup(hash));
    }

    #[test]
    fn keyword_priority_order() {
        assert_eq!(classify("gas spent this month"), Intent::Gas);
        assert_eq!(classify("show my PORTFOLIO"), Intent::Portfolio);
        assert_eq!(classify("net worth please"), Intent::Portfolio);
        assert_eq!(classify("recent transactions"), Intent::Activity);
        assert_eq!(classify("any governance votes?"), Intent::Dao);
        assert_eq!(classify("hello there"), Intent::Unknown);
    }

    #[test]
    fn gas_outranks_portfolio() {
        // Memastikan "gas" diperiksa sebelum "portfolio"
        assert_eq!(classify("portfolio gas costs"), Intent::Gas);
    }

    #[test]
    fn short_hex_run_is_not_a_hash() {
        let query = format!("look at 0x{}", "ab".repeat(20));
        assert_eq!(classify(&query), Intent::Unknown);
    }

    #[test]
    fn address_requirements() {
        assert!(address_ok(&Intent::Gas, ADDR));
        assert!(!address_ok(&Intent::Gas, "not-an-address"));
        assert!(!address_ok(&Intent::Dao, ""));
        assert!(address_ok(&Intent::Unknown, ""));
        assert!(address_ok(&Intent::TxLookup("0xdead".to_string()), ""));
    }
}
