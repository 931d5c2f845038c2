// Validation helpers shared by the API handlers and the chat dispatcher.

/// Simple Ethereum address check: "0x" followed by exactly 40 hex chars.
pub fn is_eth_address(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.len() != 42 || !trimmed.starts_with("0x") {
        return false;
    }
    trimmed[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Transaction hash check: "0x" followed by exactly 64 hex chars.
pub fn is_tx_hash(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.len() != 66 || !trimmed.starts_with("0x") {
        return false;
    }
    trimmed[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Addresses are compared lower-cased everywhere.
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_address() {
        // Memastikan alamat 0x + 40 hex diterima
        assert!(is_eth_address(&format!("0x{}", "a".repeat(40))));
    }

    #[test]
    fn rejects_short_and_unprefixed_addresses() {
        // Memastikan alamat pendek / tanpa prefix ditolak
        assert!(!is_eth_address("0x1234"));
        assert!(!is_eth_address(&"a".repeat(42)));
        assert!(!is_eth_address(&format!("0x{}g", "a".repeat(39))));
        assert!(!is_eth_address(""));
    }

    #[test]
    fn tx_hash_requires_64_hex_chars() {
        // Memastikan hash transaksi harus 64 hex
        assert!(is_tx_hash(&format!("0x{}", "0".repeat(64))));
        assert!(!is_tx_hash(&format!("0x{}", "0".repeat(40))));
    }

    #[test]
    fn normalize_lowercases_and_trims() {
        // Memastikan alamat dinormalisasi ke huruf kecil
        assert_eq!(normalize_address(" 0xABCD "), "0xabcd");
    }
}
