//! Emoji detection and sentiment.
//!
//! Shares are taken from the Emoji Sentiment Ranking (Kralj Novak et al.)
//! for the emoji people actually send to a support bot.

/// The sentiment an emoji trigger listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

/// Shares of negative, neutral and positive use; they sum to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl SentimentScore {
    #[must_use]
    pub fn share(&self, sentiment: Sentiment) -> f64 {
        match sentiment {
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
            Sentiment::Positive => self.positive,
        }
    }
}

const LEXICON: &[(char, f64, f64, f64)] = &[
    ('😂', 0.247, 0.285, 0.468),
    ('❤', 0.044, 0.166, 0.790),
    ('♥', 0.036, 0.218, 0.746),
    ('😍', 0.052, 0.219, 0.729),
    ('😭', 0.436, 0.220, 0.344),
    ('😘', 0.065, 0.233, 0.702),
    ('😊', 0.053, 0.254, 0.693),
    ('👌', 0.114, 0.325, 0.561),
    ('💕', 0.052, 0.309, 0.639),
    ('👏', 0.127, 0.351, 0.522),
    ('😁', 0.136, 0.331, 0.533),
    ('☺', 0.071, 0.262, 0.667),
    ('👍', 0.096, 0.303, 0.601),
    ('😉', 0.087, 0.341, 0.572),
    ('😄', 0.093, 0.297, 0.610),
    ('😃', 0.083, 0.268, 0.649),
    ('🙂', 0.095, 0.392, 0.513),
    ('😀', 0.108, 0.334, 0.558),
    ('🙏', 0.152, 0.348, 0.500),
    ('🎉', 0.044, 0.297, 0.659),
    ('😎', 0.079, 0.372, 0.549),
    ('😅', 0.218, 0.328, 0.454),
    ('🤔', 0.150, 0.600, 0.250),
    ('😐', 0.285, 0.515, 0.200),
    ('😶', 0.230, 0.520, 0.250),
    ('🙄', 0.380, 0.460, 0.160),
    ('😮', 0.290, 0.450, 0.260),
    ('😳', 0.233, 0.390, 0.377),
    ('😒', 0.504, 0.264, 0.232),
    ('😢', 0.497, 0.185, 0.318),
    ('😞', 0.539, 0.178, 0.283),
    ('😔', 0.469, 0.214, 0.317),
    ('😩', 0.405, 0.250, 0.345),
    ('😡', 0.590, 0.220, 0.190),
    ('😠', 0.551, 0.221, 0.228),
    ('😤', 0.470, 0.260, 0.270),
    ('💔', 0.550, 0.181, 0.269),
    ('👎', 0.581, 0.232, 0.187),
    ('😱', 0.427, 0.223, 0.350),
    ('😰', 0.530, 0.220, 0.250),
];

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2300..=0x23FF | 0x2B00..=0x2BFF
    )
}

fn is_modifier(c: char) -> bool {
    matches!(u32::from(c), 0xFE0F | 0x200D | 0x20E3)
}

/// Whether the text ends with an emoji, ignoring variation selectors.
#[must_use]
pub fn ends_with_emoji(text: &str) -> bool {
    text.chars().rev().find(|c| !is_modifier(*c)).is_some_and(is_emoji)
}

/// The emoji of a message that consists of nothing else. Whitespace and
/// punctuation are allowed in between; any other character disqualifies it.
#[must_use]
pub fn emoji_only(text: &str) -> Option<Vec<char>> {
    let mut emoji = Vec::new();
    for c in text.chars() {
        if is_emoji(c) {
            emoji.push(c);
        } else if !(c.is_whitespace() || c.is_ascii_punctuation() || is_modifier(c)) {
            return None;
        }
    }
    (!emoji.is_empty()).then_some(emoji)
}

/// Mean sentiment of the known emoji in `emoji`, if any is known.
#[must_use]
pub fn sentiment(emoji: &[char]) -> Option<SentimentScore> {
    let known: Vec<_> = emoji
        .iter()
        .filter_map(|c| LEXICON.iter().find(|(e, ..)| e == c))
        .collect();
    if known.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = known.len() as f64;
    let sum = known.iter().fold((0.0, 0.0, 0.0), |(n, u, p), (_, neg, neu, pos)| {
        (n + neg, u + neu, p + pos)
    });
    Some(SentimentScore {
        negative: sum.0 / count,
        neutral: sum.1 / count,
        positive: sum.2 / count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pure_emoji_messages_qualify() {
        assert_eq!(emoji_only("😂 😂!"), Some(vec!['😂', '😂']));
        assert_eq!(emoji_only("❤️"), Some(vec!['❤']));
        assert_eq!(emoji_only("haha 😂"), None);
        assert_eq!(emoji_only("  "), None);
    }

    #[test]
    fn sentiment_is_averaged_over_known_emoji() {
        let score = sentiment(&['😍', '👍']).expect("known");
        assert!(score.positive > 0.6);
        assert!(sentiment(&['😡']).expect("known").share(Sentiment::Negative) > 0.5);
        assert!(sentiment(&['🦀']).is_none());
    }

    #[test]
    fn trailing_emoji_are_detected() {
        assert!(ends_with_emoji("Hallo 👋"));
        assert!(ends_with_emoji("Super ❤️"));
        assert!(!ends_with_emoji("Hallo"));
    }
}
