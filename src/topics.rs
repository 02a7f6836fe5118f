//! Topic catalog and hashtag selection
//!
//! Topics are (niche, subcategory) pairs derived from the static hashtag
//! table; selection state is never persisted. Balancing is recomputed from
//! the recent post history on every call, so it self-heals after restarts or
//! manual data edits.

use rand::Rng;
use std::collections::HashMap;

use crate::constants::TWEET_MAX_CHARS;
use crate::models::Post;

/// A generation topic drawn from the static catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    pub niche: &'static str,
    pub subcategory: &'static str,
}

/// Hashtag table keyed by niche, then subcategory.
///
/// Subcategory order is significant: it breaks scoring ties.
static HASHTAG_TABLE: &[(&str, &[(&str, &[&str])])] = &[(
    "Technology",
    &[
        (
            "AI & Machine Learning",
            &[
                "#AI",
                "#MachineLearning",
                "#DeepLearning",
                "#ArtificialIntelligence",
                "#ML",
                "#DataScience",
                "#NeuralNetworks",
                "#AITech",
            ],
        ),
        (
            "Web Development",
            &[
                "#WebDev",
                "#JavaScript",
                "#React",
                "#Frontend",
                "#Backend",
                "#FullStack",
                "#WebDesign",
                "#Coding",
            ],
        ),
        (
            "Mobile Apps",
            &[
                "#MobileApp",
                "#AppDevelopment",
                "#iOS",
                "#Android",
                "#ReactNative",
                "#Flutter",
                "#MobileDev",
                "#AppDesign",
            ],
        ),
        (
            "Cybersecurity",
            &[
                "#Cybersecurity",
                "#InfoSec",
                "#DataProtection",
                "#CyberSafe",
                "#Security",
                "#Hacking",
                "#Privacy",
                "#CyberDefense",
            ],
        ),
        (
            "Cloud Computing",
            &[
                "#CloudComputing",
                "#AWS",
                "#Azure",
                "#Cloud",
                "#DevOps",
                "#ServerLess",
                "#CloudNative",
                "#CloudTech",
            ],
        ),
        (
            "Blockchain",
            &[
                "#Blockchain",
                "#Crypto",
                "#Web3",
                "#DeFi",
                "#NFT",
                "#Bitcoin",
                "#Ethereum",
                "#CryptoTech",
            ],
        ),
        (
            "IoT",
            &[
                "#IoT",
                "#InternetOfThings",
                "#SmartHome",
                "#ConnectedDevices",
                "#IoTSecurity",
                "#SmartTech",
                "#IoTDev",
            ],
        ),
        (
            "DevOps",
            &[
                "#DevOps",
                "#CICD",
                "#Automation",
                "#Docker",
                "#Kubernetes",
                "#CloudOps",
                "#SRE",
                "#InfraAsCode",
            ],
        ),
        (
            "Software Engineering",
            &[
                "#SoftwareEngineering",
                "#Programming",
                "#CodeQuality",
                "#SoftwareDev",
                "#Engineering",
                "#Tech",
                "#Developer",
            ],
        ),
        (
            "Data Science",
            &[
                "#DataScience",
                "#BigData",
                "#Analytics",
                "#DataAnalytics",
                "#Python",
                "#DataViz",
                "#Statistics",
                "#DataDriven",
            ],
        ),
        (
            "FinTech & Finance",
            &[
                "#FinTech",
                "#Finance",
                "#PersonalFinance",
                "#FinTechInnovation",
                "#Payments",
                "#DigitalBanking",
                "#FinancialTechnology",
                "#AIinFinance",
            ],
        ),
        (
            "Startups & Entrepreneurship",
            &[
                "#Startup",
                "#Business",
                "#Entrepreneurship",
                "#EntrepreneurMindset",
                "#Innovate",
            ],
        ),
        (
            "Emerging Tech",
            &["#DeFiInfra", "#AIInfra", "#RWA", "#AgenticAI", "#Tokenization"],
        ),
    ],
)];

/// All topics available to the scheduled generator.
pub fn catalog() -> Vec<Topic> {
    let mut topics = Vec::new();
    for &(niche, subcategories) in HASHTAG_TABLE {
        for &(subcategory, _) in subcategories {
            topics.push(Topic { niche, subcategory });
        }
    }
    topics
}

/// Hashtags for a (niche, subcategory) pair; empty when the pair is unknown.
pub fn relevant_hashtags(niche: &str, subcategory: &str) -> &'static [&'static str] {
    HASHTAG_TABLE
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(niche))
        .and_then(|(_, subs)| {
            subs.iter()
                .find(|(s, _)| s.eq_ignore_ascii_case(subcategory))
        })
        .map(|(_, tags)| *tags)
        .unwrap_or(&[])
}

/// Score the catalog hashtags against the text and keep the best two.
///
/// A tag whose bare word already appears in the text scores higher; ties
/// keep table order (the sort is stable).
pub fn select_best_hashtags(niche: &str, subcategory: &str, text: &str) -> Vec<&'static str> {
    let available = relevant_hashtags(niche, subcategory);
    if available.is_empty() {
        return Vec::new();
    }

    let text_lower = text.to_lowercase();
    let mut scored: Vec<(&'static str, i32)> = available
        .iter()
        .map(|tag| {
            let word = tag.trim_start_matches('#').to_lowercase();
            let score = if text_lower.contains(&word) { 2 } else { 1 };
            (*tag, score)
        })
        .collect();

    scored.sort_by_key(|(_, score)| std::cmp::Reverse(*score));
    scored.into_iter().take(2).map(|(tag, _)| tag).collect()
}

/// Append topic hashtags to a post if it has none, keeping it within the
/// platform limit. Identity when the text already contains `#`, when the
/// pair has no hashtags, or when no combination fits.
pub fn add_hashtags(text: &str, niche: &str, subcategory: &str) -> String {
    if text.contains('#') {
        return text.to_string();
    }

    let hashtags = select_best_hashtags(niche, subcategory, text);
    if hashtags.is_empty() {
        return text.to_string();
    }

    let combined = format!("{} {}", text, hashtags.join(" "));
    if combined.chars().count() <= TWEET_MAX_CHARS {
        return combined;
    }

    let single = format!("{} {}", text, hashtags[0]);
    if single.chars().count() <= TWEET_MAX_CHARS {
        return single;
    }

    text.to_string()
}

/// Pick the least-used topic over the recent history, breaking ties uniformly
/// at random. Returns `None` only for an empty catalog.
pub fn select_topic(recent: &[Post]) -> Option<Topic> {
    let topics = catalog();
    if topics.is_empty() {
        return None;
    }

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for topic in &topics {
        counts.insert(topic.subcategory, 0);
    }
    for post in recent {
        if let Some(sub) = post.subcategory.as_deref() {
            if let Some(count) = counts.get_mut(sub) {
                *count += 1;
            }
        }
    }

    let min_count = counts.values().copied().min().unwrap_or(0);
    let candidates: Vec<Topic> = topics
        .into_iter()
        .filter(|t| counts.get(t.subcategory) == Some(&min_count))
        .collect();

    let index = rand::rng().random_range(0..candidates.len());
    Some(candidates[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostSource, PostStatus};
    use chrono::Utc;

    fn post_about(subcategory: &str) -> Post {
        Post {
            id: 0,
            text: "t".to_string(),
            status: PostStatus::Posted,
            source: PostSource::Timeline,
            tweet_id: None,
            is_ai_generated: true,
            ai_model: None,
            niche: Some("Technology".to_string()),
            subcategory: Some(subcategory.to_string()),
            ai_guidance: None,
            ai_prompt: None,
            slot_type: None,
            error_message: None,
            error_code: None,
            created_at: Utc::now(),
            posted_at: None,
        }
    }

    #[test]
    fn test_selected_topic_is_least_used() {
        // Every catalog subcategory except one gets a post; the selector must
        // pick the unused one.
        let topics = catalog();
        let spared = topics[3].subcategory;
        let recent: Vec<Post> = topics
            .iter()
            .filter(|t| t.subcategory != spared)
            .map(|t| post_about(t.subcategory))
            .collect();

        for _ in 0..10 {
            let picked = select_topic(&recent).unwrap();
            assert_eq!(picked.subcategory, spared);
        }
    }

    #[test]
    fn test_selection_spread_stays_bounded() {
        // Simulate many rounds; max/min usage spread must not diverge.
        let mut recent: Vec<Post> = Vec::new();
        for _ in 0..200 {
            let topic = select_topic(&recent).unwrap();
            recent.push(post_about(topic.subcategory));
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for topic in catalog() {
            counts.insert(topic.subcategory, 0);
        }
        for post in &recent {
            *counts.get_mut(post.subcategory.as_deref().unwrap()).unwrap() += 1;
        }
        let max = counts.values().max().unwrap();
        let min = counts.values().min().unwrap();
        assert!(max - min <= 1, "spread {} exceeds 1", max - min);
    }

    #[test]
    fn test_add_hashtags_identity_when_present() {
        let text = "Shipping fast matters #BuildInPublic";
        assert_eq!(add_hashtags(text, "Technology", "Web Development"), text);
    }

    #[test]
    fn test_add_hashtags_appends_within_limit() {
        let text = "Shipping fast matters more than shipping perfect";
        let result = add_hashtags(text, "Technology", "Web Development");
        assert!(result.starts_with(text));
        assert!(result.contains('#'));
        assert!(result.chars().count() <= TWEET_MAX_CHARS);
    }

    #[test]
    fn test_add_hashtags_unknown_pair_is_identity() {
        let text = "No catalog entry for this one";
        assert_eq!(add_hashtags(text, "Gardening", "Roses"), text);
    }

    #[test]
    fn test_add_hashtags_falls_back_to_original_when_too_long() {
        let text = "x".repeat(279);
        assert_eq!(
            add_hashtags(&text, "Technology", "Web Development"),
            text,
            "no hashtag fits next to a 279-char post"
        );
    }

    #[test]
    fn test_word_overlap_outranks_table_order() {
        let tags = select_best_hashtags(
            "Technology",
            "Web Development",
            "A react hook that saves re-renders",
        );
        assert_eq!(tags[0], "#React");
    }
}
