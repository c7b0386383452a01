//! Keyword routing of subtasks to specialised assistants.
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. research keywords (`update`, `recent`, `release`, `news`, `search`, `find`)
//! 2. finance keywords (`stock`, `ticker`, `price`, `market`)
//! 3. math keywords (`calculate`, `sum`, `math`)
//! 4. a digit together with one of `+ - * /`
//! 5. question words (`latest`, `who`, `when`)
//!
//! Research routes fall back to [`Route::General`] when web search is not
//! available. Anything unmatched is general.

use serde::{Deserialize, Serialize};

const RESEARCH_KEYWORDS: &[&str] = &["update", "recent", "release", "news", "search", "find"];
const FINANCE_KEYWORDS: &[&str] = &["stock", "ticker", "price", "market"];
const MATH_KEYWORDS: &[&str] = &["calculate", "sum", "math"];
const OPERATORS: &[char] = &['+', '-', '*', '/'];
const QUESTION_KEYWORDS: &[&str] = &["latest", "who", "when"];

/// Overall task used by the routing demo
pub const DEMO_TASK: &str = "Prepare a brief update for a product manager: \
    1) Find a recent Llama Stack update. \
    2) Compute 45 * 12 / 6. \
    3) Get the closing price of GOOG for 2023.";

/// Subtasks the demo task is split into
pub const DEMO_SUBTASKS: &[&str] = &[
    "Find a recent Llama Stack update and summarize it in one sentence.",
    "Compute 45 * 12 / 6.",
    "What was the closing price of GOOG for 2023?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    General,
    Research,
    Math,
    Finance,
}

impl Route {
    pub const ALL: [Route; 4] = [Route::General, Route::Research, Route::Math, Route::Finance];

    /// System instructions for the assistant serving this route
    pub fn instructions(&self) -> &'static str {
        match self {
            Route::General => "You are a helpful assistant.",
            Route::Research => "You are a research assistant. Use web search when helpful.",
            Route::Math => "You are a math assistant. Show the calculation step by step.",
            Route::Finance => "You are a finance assistant. Answer questions about tickers and market data.",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Route::General => "general",
            Route::Research => "research",
            Route::Math => "math",
            Route::Finance => "finance",
        };
        write!(f, "{}", s)
    }
}

/// Routes prompts by case-insensitive keyword matching
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRouter {
    web_available: bool,
}

impl TaskRouter {
    pub fn new(web_available: bool) -> Self {
        Self { web_available }
    }

    pub fn route(&self, prompt: &str) -> Route {
        let prompt = prompt.to_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|w| prompt.contains(w));

        if contains_any(RESEARCH_KEYWORDS) {
            return self.research();
        }
        if contains_any(FINANCE_KEYWORDS) {
            return Route::Finance;
        }
        if contains_any(MATH_KEYWORDS) {
            return Route::Math;
        }
        if prompt.chars().any(|c| c.is_ascii_digit()) && prompt.contains(OPERATORS) {
            return Route::Math;
        }
        if contains_any(QUESTION_KEYWORDS) {
            return self.research();
        }
        Route::General
    }

    fn research(&self) -> Route {
        if self.web_available {
            Route::Research
        } else {
            Route::General
        }
    }
}

/// Prompt asking the general assistant to merge subtask answers
pub fn synthesis_prompt(results: &[(String, String)]) -> String {
    let sections: Vec<String> = results
        .iter()
        .map(|(subtask, answer)| format!("- {}\n  Result: {}", subtask, answer))
        .collect();
    format!(
        "Synthesize the following subtask results into a concise update:\n\n{}",
        sections.join("\n\n")
    )
}
