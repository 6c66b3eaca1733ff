//! Canned answers about one listing.
//!
//! Lookup order: the listing's own Q&A table, then topic buckets filled from
//! listing fields, then a fixed fallback.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::chat::{ChatMessage, Transcript};
use crate::concierge::listing::{Property, PropertyId};

pub const FALLBACK_REPLY: &str =
    "I don't have that specific data right now, but I can ask your Realtor to find out!";
pub const SCHOOL_DISTRICT_REPLY: &str =
    "This property is located in a highly-rated school district according to local data.";
pub const SAFETY_REPLY: &str = "This neighborhood has a Safety Score of A (Top 15% in the region). It is considered a very safe, family-friendly area.";

const COST_WORDS: [&str; 3] = ["tax", "cost", "payment"];
const SCHOOL_WORDS: [&str; 3] = ["school", "education", "kid"];
const SAFETY_WORDS: [&str; 3] = ["safe", "crime", "security"];
const INVESTMENT_WORDS: [&str; 3] = ["invest", "growth", "value"];
const SCHOOL_FEATURE_WORDS: [&str; 3] = ["school", "elementary", "high"];

fn mentions(query: &str, words: &[&str]) -> bool {
    words.iter().any(|w| query.contains(w))
}

pub fn answer(property: &Property, query: &str) -> String {
    let query = query.to_lowercase();

    if let Some(entry) = property
        .qa
        .iter()
        .find(|entry| entry.keywords.iter().any(|k| query.contains(&k.to_lowercase())))
    {
        return entry.answer.clone();
    }

    if mentions(&query, &COST_WORDS) {
        let financials = property.financials.as_ref();
        let tax = financials
            .and_then(|f| f.property_tax.as_deref())
            .unwrap_or("standard for this area");
        let hoa = financials.and_then(|f| f.hoa.as_deref()).unwrap_or("$0");
        format!(
            "Based on the listing price, estimated property taxes are {}. HOA fees are {}.",
            tax, hoa
        )
    } else if mentions(&query, &SCHOOL_WORDS) {
        let school_feature = property.features.iter().find(|f| {
            let lower = f.to_lowercase();
            SCHOOL_FEATURE_WORDS.iter().any(|w| lower.contains(w))
        });
        match school_feature {
            Some(feature) => format!(
                "This home is zoned for excellent schools, including {}.",
                feature
            ),
            None => SCHOOL_DISTRICT_REPLY.to_string(),
        }
    } else if mentions(&query, &SAFETY_WORDS) {
        SAFETY_REPLY.to_string()
    } else if mentions(&query, &INVESTMENT_WORDS) {
        let growth = property
            .investment
            .as_ref()
            .and_then(|i| i.growth_rate.as_deref())
            .unwrap_or("steady");
        let rating = if property.investment_rating.is_empty() {
            "Strong"
        } else {
            property.investment_rating.as_str()
        };
        format!(
            "Our AI rates this as a {} investment opportunity with a projected growth rate of {} annually.",
            rating, growth
        )
    } else {
        FALLBACK_REPLY.to_string()
    }
}

/// Chat overlay scoped to one listing. Each opening gets a fresh
/// `generation`, so replies queued for an earlier overlay never land here.
#[derive(Debug, Clone)]
pub struct PropertyChat {
    property_id: PropertyId,
    generation: u64,
    transcript: Transcript,
    outstanding: BTreeSet<u64>,
    next_seq: u64,
}

impl PropertyChat {
    pub fn open(property: &Property, generation: u64) -> Self {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::bot(format!(
            "Hi! I've analyzed {}. Ask me about taxes, schools, neighborhood safety, or investment potential.",
            property.address
        )));
        Self {
            property_id: property.id,
            generation,
            transcript,
            outstanding: BTreeSet::new(),
            next_seq: 0,
        }
    }

    pub fn property_id(&self) -> PropertyId {
        self.property_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records the question. The reply is delivered later with [`Self::reply`]
    /// under the returned sequence number.
    pub fn ask(&mut self, text: &str) -> (ChatMessage, u64) {
        let message = self.transcript.push(ChatMessage::user(text)).clone();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.outstanding.insert(seq);
        (message, seq)
    }

    /// Answers question `seq`. `None` if that question is not outstanding.
    pub fn reply(&mut self, seq: u64, property: &Property, query: &str) -> Option<ChatMessage> {
        if !self.outstanding.remove(&seq) {
            return None;
        }
        Some(self.transcript.push(ChatMessage::bot(answer(property, query))).clone())
    }

    pub fn is_typing(&self) -> bool {
        !self.outstanding.is_empty()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn view(&self) -> PropertyChatView {
        PropertyChatView {
            property_id: self.property_id,
            typing: self.is_typing(),
            transcript: self.transcript.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyChatView {
    pub property_id: PropertyId,
    pub typing: bool,
    pub transcript: Transcript,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(extra: serde_json::Value) -> Property {
        let mut value = serde_json::json!({
            "id": 1, "address": "1248 Oakwood Ave", "city": "San Jose, CA",
            "price": "$985,000", "beds": 3, "baths": 2, "sqft": 1850,
            "match_reason": "", "ai_score": 98, "investment_rating": "A+"
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn qa_table_wins_over_topic_buckets() {
        let p = listing(serde_json::json!({
            "qa": [
                { "keywords": ["parking", "garage"], "answer": "Street parking only." },
                { "keywords": ["school"], "answer": "Walk to Lincoln Elementary." }
            ]
        }));
        assert_eq!(answer(&p, "Is there a GARAGE?"), "Street parking only.");
        assert_eq!(answer(&p, "what about schools"), "Walk to Lincoln Elementary.");
    }

    #[test]
    fn school_bucket_uses_matching_feature() {
        let p = listing(serde_json::json!({
            "features": ["Hardwood Floors", "Near Lincoln Elementary"]
        }));
        assert_eq!(
            answer(&p, "How are the schools?"),
            "This home is zoned for excellent schools, including Near Lincoln Elementary."
        );
    }

    #[test]
    fn school_bucket_without_feature_is_generic() {
        let p = listing(serde_json::json!({ "features": ["Hardwood Floors"] }));
        assert_eq!(answer(&p, "good for kids?"), SCHOOL_DISTRICT_REPLY);
    }

    #[test]
    fn cost_bucket_reads_financials() {
        let p = listing(serde_json::json!({
            "financials": { "property_tax": "$887/mo", "hoa": "$0/mo" }
        }));
        assert_eq!(
            answer(&p, "What are the taxes?"),
            "Based on the listing price, estimated property taxes are $887/mo. HOA fees are $0/mo."
        );
        let bare = listing(serde_json::json!({}));
        assert!(answer(&bare, "monthly payment?").contains("standard for this area"));
    }

    #[test]
    fn investment_and_safety_buckets() {
        let p = listing(serde_json::json!({ "investment": { "growth_rate": "5.2%" } }));
        assert_eq!(
            answer(&p, "good investment?"),
            "Our AI rates this as a A+ investment opportunity with a projected growth rate of 5.2% annually."
        );
        assert_eq!(answer(&p, "is it safe here"), SAFETY_REPLY);
    }

    #[test]
    fn unknown_topic_falls_back() {
        let p = listing(serde_json::json!({}));
        assert_eq!(answer(&p, "does it have a pool?"), FALLBACK_REPLY);
    }

    #[test]
    fn overlay_tracks_pending_replies() {
        let p = listing(serde_json::json!({}));
        let mut chat = PropertyChat::open(&p, 0);
        assert!(chat.transcript().messages()[0].text.contains("1248 Oakwood Ave"));
        let (_, first) = chat.ask("taxes?");
        let (_, second) = chat.ask("schools?");
        assert_ne!(first, second);
        assert!(chat.is_typing());
        assert!(chat.reply(first, &p, "taxes?").is_some());
        assert!(chat.is_typing());
        assert!(chat.reply(second, &p, "schools?").is_some());
        assert!(!chat.is_typing());
        assert_eq!(chat.transcript().len(), 5);
    }

    #[test]
    fn each_question_is_answered_once() {
        let p = listing(serde_json::json!({}));
        let mut chat = PropertyChat::open(&p, 3);
        assert_eq!(chat.generation(), 3);
        let (_, seq) = chat.ask("taxes?");
        assert!(chat.reply(seq, &p, "taxes?").is_some());
        assert!(chat.reply(seq, &p, "taxes?").is_none());
        assert!(chat.reply(seq + 1, &p, "taxes?").is_none());
        assert_eq!(chat.transcript().len(), 3);
    }
}
