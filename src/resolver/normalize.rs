//! Address normalization and key derivation

/// Case-fold an address and strip punctuation and redundant whitespace.
///
/// `"123 Main St, Anytown, WA 99999"` and `"123 main st anytown wa 99999"`
/// normalize to the same string.
pub fn normalize_address(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive a deterministic key from the first and last token of a
/// normalized address. Returns `None` for an empty address.
pub fn derive_key(prefix: &str, normalized: &str) -> Option<String> {
    let mut tokens = normalized.split_whitespace();
    let first = tokens.next()?;
    let key = match tokens.last() {
        Some(last) => format!("{prefix}{first}{last}"),
        None => format!("{prefix}{first}"),
    };
    Some(key)
}

/// Best-effort split of a US-style postal address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: Option<String>,
}

impl AddressParts {
    /// Parse `"street, city STATE zip"`, `"street, city STATE, zip"` and
    /// `"street, city, STATE zip"`. Missing parts are left empty.
    pub fn parse(address: &str) -> Self {
        let mut segments: Vec<String> = address
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let mut parts = AddressParts::default();

        if let Some(last) = segments.last_mut() {
            if let Some((rest, token)) = split_last_token(last) {
                if is_zip(&token) {
                    parts.zip = Some(token);
                    *last = rest;
                }
            }
        }
        pop_empty(&mut segments);

        if segments.len() >= 2 {
            if let Some(last) = segments.last_mut() {
                if let Some((rest, token)) = split_last_token(last) {
                    if is_state(&token) {
                        parts.state = token.to_uppercase();
                        *last = rest;
                    }
                }
            }
            pop_empty(&mut segments);
        }

        if segments.len() >= 2 {
            parts.city = segments.pop().unwrap_or_default();
        }
        parts.street = segments.join(", ");
        parts
    }
}

fn split_last_token(segment: &str) -> Option<(String, String)> {
    let trimmed = segment.trim();
    let token = trimmed.split_whitespace().last()?.to_string();
    let rest = trimmed[..trimmed.len() - token.len()].trim_end().to_string();
    Some((rest, token))
}

fn pop_empty(segments: &mut Vec<String>) {
    if segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }
}

fn is_zip(token: &str) -> bool {
    let (head, tail) = token.split_once('-').unwrap_or((token, ""));
    head.len() == 5
        && head.chars().all(|c| c.is_ascii_digit())
        && (tail.is_empty() || (tail.len() == 4 && tail.chars().all(|c| c.is_ascii_digit())))
}

fn is_state(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_alphabetic())
}
