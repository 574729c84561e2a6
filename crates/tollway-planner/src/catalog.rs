//! Capability categories recognized by the decomposer.
//!
//! The order of [`CATALOG`] is the order tasks are emitted in.

use serde::{Deserialize, Serialize};

/// Capability a task needs from the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Data and blockchain retrieval.
    Data,
    /// Analysis and research.
    Analysis,
    /// Computation and prediction.
    Computation,
    /// Generation and content creation.
    Generation,
}

/// Fixed attributes of one capability category.
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub capability: Capability,
    /// Action name put on the generated step.
    pub action: &'static str,
    /// Human-readable task summary.
    pub summary: &'static str,
    /// Any of these (lower-case) activates the category.
    pub keywords: &'static [&'static str],
    /// Capability tags recorded on the task.
    pub tags: &'static [&'static str],
    pub estimated_cost: f64,
    /// Milliseconds.
    pub estimated_time: u64,
    pub priority: i32,
}

impl Category {
    /// Whether the (already lower-cased) text mentions any keyword.
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|keyword| text.contains(keyword))
    }
}

pub const CATALOG: [Category; 4] = [
    Category {
        capability: Capability::Data,
        action: "fetch_data",
        summary: "Retrieve source data",
        keywords: &[
            "data",
            "fetch",
            "retrieve",
            "blockchain",
            "on-chain",
            "price",
            "balance",
            "transaction",
            "wallet",
            "token",
        ],
        tags: &["data_retrieval", "blockchain"],
        estimated_cost: 0.01,
        estimated_time: 2_000,
        priority: 1,
    },
    Category {
        capability: Capability::Analysis,
        action: "analyze",
        summary: "Analyze and research",
        keywords: &[
            "analyze",
            "analyse",
            "analysis",
            "research",
            "investigate",
            "evaluate",
            "compare",
            "review",
        ],
        tags: &["analysis", "research"],
        estimated_cost: 0.05,
        estimated_time: 5_000,
        priority: 2,
    },
    Category {
        capability: Capability::Computation,
        action: "compute",
        summary: "Compute and predict",
        keywords: &[
            "compute",
            "calculate",
            "predict",
            "forecast",
            "estimate",
            "simulate",
        ],
        tags: &["computation", "prediction"],
        estimated_cost: 0.03,
        estimated_time: 3_000,
        priority: 2,
    },
    Category {
        capability: Capability::Generation,
        action: "generate",
        summary: "Generate content",
        keywords: &[
            "generate",
            "create",
            "write",
            "report",
            "summarize",
            "summary",
            "draft",
            "content",
        ],
        tags: &["generation", "content_creation"],
        estimated_cost: 0.02,
        estimated_time: 4_000,
        priority: 3,
    },
];
