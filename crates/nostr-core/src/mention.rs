//! Handle and wallet-address detection in notification text.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Ethereum addresses and ENS names.
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b0x[a-fA-F0-9]{40}\b|\b[\w-]+(?:\.[\w-]+)*\.eth\b").unwrap()
});

/// Bech32 npubs (optionally `nostr:`-prefixed) and `@name` handles.
static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:nostr:)?(npub1[02-9ac-hj-np-z]{58})|@(\w+)").unwrap()
});

/// Find wallet addresses in `text`, first occurrence order, no duplicates.
pub fn detect_addresses(text: &str) -> Vec<String> {
    dedup(ADDRESS_RE.find_iter(text).map(|m| m.as_str().to_string()))
}

/// Find account handles in `text`, first occurrence order, no duplicates.
///
/// Returned handles carry no `@` or `nostr:` prefix.
pub fn detect_handles(text: &str) -> Vec<String> {
    dedup(HANDLE_RE.captures_iter(text).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }))
}

fn dedup(found: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    found.filter(|s| seen.insert(s.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const NPUB: &str = "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6";

    #[test]
    fn detects_hex_addresses_and_ens_names() {
        let text = format!("send to {ADDR} or vitalik.eth, again {ADDR}");
        assert_eq!(detect_addresses(&text), vec![ADDR.to_string(), "vitalik.eth".to_string()]);
    }

    #[test]
    fn short_hex_is_not_an_address() {
        assert!(detect_addresses("price went 0x1234 today").is_empty());
        assert!(detect_addresses("no wallets here").is_empty());
    }

    #[test]
    fn detects_handles_and_npubs() {
        let text = format!("@alice hi, cc nostr:{NPUB} and @bob and @alice");
        assert_eq!(
            detect_handles(&text),
            vec!["alice".to_string(), NPUB.to_string(), "bob".to_string()]
        );
    }

    #[test]
    fn at_prefixed_npub_is_one_handle() {
        let text = format!("@{NPUB} gm");
        assert_eq!(detect_handles(&text), vec![NPUB.to_string()]);
    }

    #[test]
    fn handle_stops_at_punctuation() {
        assert_eq!(detect_handles("hi"), Vec::<String>::new());
        assert_eq!(detect_handles("ping @carol_1!"), vec!["carol_1".to_string()]);
    }
}
