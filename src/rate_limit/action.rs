//! Action Types
//!
//! Every externally-backed feature that is rate limited per user. Adding a
//! variant forces a policy entry in [`ActionType::policy`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::window::WindowScheme;

/// Rate-limited user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Chat assistant message
    ChatMessage,
    /// Real-time web search through the search provider
    LiveSearch,
    /// AI-generated relocation protocol (step checklist)
    ProtocolGeneration,
    /// Document vault analysis
    DocumentAnalysis,
    /// Visa pathway discovery for a corridor
    VisaDiscovery,
    /// Machine translation of UI or document text
    Translation,
    /// Cost-of-living and budget lookups
    CostOfLiving,
}

/// Static limits and cost for one action type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionPolicy {
    /// Calls allowed per window
    pub limit: u32,

    /// Window the limit applies to
    pub window: WindowScheme,

    /// Estimated upstream cost of one call in USD
    pub cost_per_call_usd: f64,

    /// Whether the feature may serve cached/static data when limited
    pub graceful_fallback: bool,
}

impl ActionType {
    /// All action types, in declaration order
    pub const ALL: [ActionType; 7] = [
        ActionType::ChatMessage,
        ActionType::LiveSearch,
        ActionType::ProtocolGeneration,
        ActionType::DocumentAnalysis,
        ActionType::VisaDiscovery,
        ActionType::Translation,
        ActionType::CostOfLiving,
    ];

    /// Default policy for this action type
    pub fn policy(&self) -> ActionPolicy {
        match self {
            ActionType::ChatMessage => ActionPolicy {
                limit: 30,
                window: WindowScheme::Hourly,
                cost_per_call_usd: 0.002,
                graceful_fallback: false,
            },
            ActionType::LiveSearch => ActionPolicy {
                limit: 10,
                window: WindowScheme::Daily,
                cost_per_call_usd: 0.005,
                graceful_fallback: true,
            },
            ActionType::ProtocolGeneration => ActionPolicy {
                limit: 5,
                window: WindowScheme::Daily,
                cost_per_call_usd: 0.02,
                graceful_fallback: false,
            },
            ActionType::DocumentAnalysis => ActionPolicy {
                limit: 20,
                window: WindowScheme::Daily,
                cost_per_call_usd: 0.01,
                graceful_fallback: false,
            },
            ActionType::VisaDiscovery => ActionPolicy {
                limit: 10,
                window: WindowScheme::Daily,
                cost_per_call_usd: 0.004,
                graceful_fallback: true,
            },
            ActionType::Translation => ActionPolicy {
                limit: 100,
                window: WindowScheme::Hourly,
                cost_per_call_usd: 0.0005,
                graceful_fallback: true,
            },
            ActionType::CostOfLiving => ActionPolicy {
                limit: 20,
                window: WindowScheme::Daily,
                cost_per_call_usd: 0.001,
                graceful_fallback: true,
            },
        }
    }

    /// Stable snake_case name used in storage, config and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ChatMessage => "chat_message",
            ActionType::LiveSearch => "live_search",
            ActionType::ProtocolGeneration => "protocol_generation",
            ActionType::DocumentAnalysis => "document_analysis",
            ActionType::VisaDiscovery => "visa_discovery",
            ActionType::Translation => "translation",
            ActionType::CostOfLiving => "cost_of_living",
        }
    }

    /// Human-readable name for user-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::ChatMessage => "chat messages",
            ActionType::LiveSearch => "live search",
            ActionType::ProtocolGeneration => "protocol generation",
            ActionType::DocumentAnalysis => "document analysis",
            ActionType::VisaDiscovery => "visa discovery",
            ActionType::Translation => "translation",
            ActionType::CostOfLiving => "cost of living lookups",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognised action name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action type '{name}'. Valid actions: {valid}")]
pub struct UnknownActionError {
    /// The rejected name
    pub name: String,
    /// Comma-separated list of accepted names
    pub valid: String,
}

impl FromStr for ActionType {
    type Err = UnknownActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ActionType::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| UnknownActionError {
                name: s.to_string(),
                valid: ActionType::ALL
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
