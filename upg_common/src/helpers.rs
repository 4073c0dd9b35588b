/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Splits a comma-separated list, trimming whitespace and dropping empty entries.
pub fn parse_comma_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

/// Shortens a ledger address for display to operators, e.g. `TXYZabcd*****wxyz1234`. Short values are returned
/// unchanged.
pub fn mask_address(address: &str) -> String {
    let chars = address.chars().collect::<Vec<char>>();
    if chars.len() > 15 {
        let head = chars[..8].iter().collect::<String>();
        let tail = chars[chars.len() - 8..].iter().collect::<String>();
        format!("{head}*****{tail}")
    } else {
        address.to_string()
    }
}
