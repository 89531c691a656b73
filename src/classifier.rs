//! Query Classifier for the Chat Assistant
//!
//! Decides whether a chat query needs live web search or can be answered
//! from the static knowledge base.
//!
//! # Classification Strategy
//!
//! Three signal families are matched against the query text:
//! 1. Real-time (temporal words, years 2024-2029, scheduling and availability): +0.5
//! 2. Policy (visa, immigration, legal, eligibility terms): +0.3
//! 3. Current-state question phrasing: +0.2
//!
//! Confidence is the sum of the fired weights, capped at 1.0. The classifier
//! is only one trigger for live search; weak local retrieval is another.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metrics;

/// Reason reported when no signal family fired
pub const FALLBACK_REASON: &str = "General query, no real-time or policy signals detected";

/// Classifier confidence above which a signalled query goes to live search
pub const LIVE_SEARCH_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Knowledge-base confidence below which live search is used
pub const KB_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Knowledge-base result count below which live search is used
pub const KB_MIN_RESULTS: usize = 2;

/// Which kind of signal a pattern family detects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Realtime,
    Policy,
    CurrentStateQuestion,
}

/// A weighted family of compiled patterns
struct SignalFamily {
    signal: Signal,
    weight: f64,
    reason: &'static str,
    patterns: Vec<Regex>,
}

impl SignalFamily {
    fn new(signal: Signal, weight: f64, reason: &'static str, patterns: &[&str]) -> Self {
        Self {
            signal,
            weight,
            reason,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){}", p)).expect("Invalid classifier pattern"))
                .collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

lazy_static! {
    static ref SIGNAL_FAMILIES: Vec<SignalFamily> = vec![
        SignalFamily::new(
            Signal::Realtime,
            0.5,
            "requests real-time information",
            &[
                r"\b(current|currently|latest|recent|recently|today|tonight|nowadays|right now|as of now|up[- ]to[- ]date)\b",
                r"\bthis (week|month|year)\b",
                r"\b202[4-9]\b",
                r"\b(appointments?|availability|available slots?|open slots?|wait(ing)? times?|processing times?|deadlines?|opening hours|book(ing)? an?)\b",
                r"\b(exchange rates?|news|announced|announcement|breaking)\b",
            ],
        ),
        SignalFamily::new(
            Signal::Policy,
            0.3,
            "involves visa or immigration policy",
            &[
                r"\b(visas?|immigration|immigrate|emigrate|residency|residence permits?|work permits?|study permits?|citizenship|naturali[sz]ation|green card|asylum|refugee status)\b",
                r"\b(laws?|legal|legislation|regulations?|policy|policies|requirements?|rules)\b",
                r"\b(eligib(le|ility)|qualify|qualifies|criteria|sponsor(ship)?|points test)\b",
            ],
        ),
        SignalFamily::new(
            Signal::CurrentStateQuestion,
            0.2,
            "asks about the current state",
            &[
                r"\b(what|which|how|when|is|are|do|does)\b.*\b(current|currently|now|today|latest|still)\b",
                r"\b(has|have)\b.*\b(changed|been updated)\b",
            ],
        ),
    ];
}

/// Result of classifying a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    /// Query needs current information
    pub is_realtime: bool,

    /// Query concerns visa, immigration or legal policy
    pub is_policy_related: bool,

    /// Summed signal weight, 0.0 to 1.0
    pub confidence: f64,

    /// Comma-joined list of fired signals, or [`FALLBACK_REASON`]
    pub reason: String,
}

/// Where a query should be answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Real-time web search (quota- and rate-limited)
    LiveSearch,
    /// Local knowledge base
    Knowledge,
}

impl Route {
    /// Lowercase name for metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::LiveSearch => "live_search",
            Route::Knowledge => "knowledge",
        }
    }
}

/// Regex-heuristic query classifier
pub struct QueryClassifier;

impl QueryClassifier {
    /// Classify a free-text query
    ///
    /// # Examples
    ///
    /// ```
    /// use tribe_gatekeeper::classifier::QueryClassifier;
    ///
    /// let result = QueryClassifier::classify("What is the current visa processing time in 2025?");
    /// assert!(result.is_realtime);
    /// assert!(result.is_policy_related);
    /// assert!(result.confidence >= 0.8);
    ///
    /// let result = QueryClassifier::classify("Tell me about your company history");
    /// assert_eq!(result.confidence, 0.0);
    /// ```
    pub fn classify(text: &str) -> QueryClassification {
        let mut confidence = 0.0;
        let mut reasons = Vec::new();
        let mut is_realtime = false;
        let mut is_policy_related = false;

        for family in SIGNAL_FAMILIES.iter() {
            if !family.matches(text) {
                continue;
            }
            confidence += family.weight;
            reasons.push(family.reason);
            match family.signal {
                Signal::Realtime => is_realtime = true,
                Signal::Policy => is_policy_related = true,
                Signal::CurrentStateQuestion => {}
            }
        }

        let reason = if reasons.is_empty() {
            FALLBACK_REASON.to_string()
        } else {
            reasons.join(", ")
        };

        QueryClassification {
            is_realtime,
            is_policy_related,
            confidence: f64::min(confidence, 1.0),
            reason,
        }
    }

    /// Whether to fall back to live search
    ///
    /// True when the classifier is confident about a real-time or policy
    /// signal, or when the caller's own retrieval was weak (low confidence or
    /// too few results).
    pub fn should_use_live_search(
        classification: &QueryClassification,
        kb_confidence: f64,
        kb_result_count: usize,
    ) -> bool {
        let signalled = (classification.is_realtime || classification.is_policy_related)
            && classification.confidence > LIVE_SEARCH_CONFIDENCE_THRESHOLD;

        signalled || kb_confidence < KB_CONFIDENCE_THRESHOLD || kb_result_count < KB_MIN_RESULTS
    }

    /// Classify and pick a route in one step
    pub fn route(
        text: &str,
        kb_confidence: f64,
        kb_result_count: usize,
    ) -> (QueryClassification, Route) {
        let classification = Self::classify(text);
        let route = if Self::should_use_live_search(&classification, kb_confidence, kb_result_count)
        {
            Route::LiveSearch
        } else {
            Route::Knowledge
        };

        metrics::QUERY_CLASSIFICATIONS_TOTAL
            .with_label_values(&[route.as_str()])
            .inc();
        tracing::debug!(
            confidence = classification.confidence,
            route = route.as_str(),
            "Classified query"
        );

        (classification, route)
    }
}
