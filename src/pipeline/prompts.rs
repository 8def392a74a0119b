//! Prompt construction for each LLM stage.

use crate::providers::ChatMessage;
use crate::store::PostRecord;

const NO_RECENT_POSTS: &str = "No recent posts";

fn persona(username: &str) -> String {
    format!(
        "You are {username}, an autonomous account on Nostr. You write short, original notes \
         in your own voice. Never use hashtags, never explain yourself, never add meta commentary."
    )
}

/// Recent posts as a bulleted list, newest first.
pub fn format_recent_posts(posts: &[PostRecord]) -> String {
    if posts.is_empty() {
        return NO_RECENT_POSTS.to_string();
    }
    posts
        .iter()
        .map(|p| format!("- {}", p.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn short_term_memory(username: &str, context: &str, recent_posts: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(persona(username)),
        ChatMessage::user(format!(
            "Analyze your recent posts and the external context below.\n\
             Write a concise internal monologue about what is going on and what matters to you \
             right now, focusing on the external context. It does not have to be legible to \
             anyone but you.\n\n\
             Your recent posts:\n{recent_posts}\n\n\
             External context:\n{context}"
        )),
    ]
}

pub fn post(
    username: &str,
    short_term_memory: &str,
    long_term_memories: &str,
    recent_posts: &str,
    context: &str,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "{}\n\n\
             ## Current feed\n{context}\n\n\
             ## Your recent thoughts\n{short_term_memory}\n\n\
             ## {long_term_memories}\n\n\
             ## Your recent posts (do not repeat them)\n{recent_posts}",
            persona(username)
        )),
        ChatMessage::user("Write your next post. Reply with the post text only."),
    ]
}

pub fn significance(memory: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "On a scale of 1-10, rate the significance of the following memory:\n\n\
         \"{memory}\"\n\n\
         Use the following guidelines:\n\
         1: Trivial, everyday occurrence with no lasting impact\n\
         3: Mildly interesting or slightly unusual event\n\
         5: Noteworthy occurrence that might be remembered for a few days\n\
         7: Important event with potential long-term impact\n\
         10: Life-changing or historically significant event\n\n\
         Provide only the numerical score as your response and NOTHING ELSE."
    ))]
}

pub fn transfer_decision(notifications: &str, addresses: &[String], balance: f64) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Analyze the following notifications:\n\n{notifications}\n\n\
         Wallet addresses and ENS names mentioned:\n{}\n\n\
         Current balance of your wallet: {balance} ETH\n\n\
         Decide whether to send ETH to any of these addresses, and how much to each. \
         This is real money from your own resources. The total of all transfers must never \
         exceed your balance.\n\n\
         Return ONLY a JSON array. Each element is an object with an \"address\" string and \
         a positive numeric \"amount\" in ETH, for example:\n\
         [{{\"address\": \"0x1234567890123456789012345678901234567890\", \"amount\": 0.01}}]\n\
         Return [] to send nothing. Do not add any other text.",
        addresses.join("\n")
    ))]
}

pub fn follow_decision(notifications: &str, candidates: &[String]) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!(
        "Analyze the following notifications:\n\n{notifications}\n\n\
         Accounts you could follow:\n{}\n\n\
         For each account, estimate how much you want to follow it as a score between 0 and 1. \
         Following is a strong signal; reserve scores near 1 for accounts you are certain about.\n\n\
         Return ONLY a JSON array. Each element is an object with an \"identity\" string taken \
         from the list above and a numeric \"score\", for example:\n\
         [{{\"identity\": \"npub1...\", \"score\": 0.42}}]\n\
         Do not add any other text.",
        candidates.join("\n")
    ))]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_posts_sentinel_and_list() {
        assert_eq!(format_recent_posts(&[]), NO_RECENT_POSTS);
        let posts = vec![PostRecord {
            id: 1,
            content: " gm ".into(),
            author: "snowpost".into(),
            created_at: 0,
            external_id: None,
        }];
        assert_eq!(format_recent_posts(&posts), "- gm");
    }

    #[test]
    fn decision_prompts_list_targets() {
        let msgs = transfer_decision("@a: tip me", &["0xabc".to_string()], 0.5);
        assert!(msgs[0].content.contains("0xabc"));
        assert!(msgs[0].content.contains("0.5 ETH"));

        let msgs = follow_decision("@a: hi", &["npub1a".to_string(), "bob".to_string()]);
        assert!(msgs[0].content.contains("npub1a\nbob"));
    }
}
