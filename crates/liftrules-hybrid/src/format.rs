use std::fmt::Write;

use crate::retriever::{RuleSearch, RulesRetriever};

/// Numbered plain-text listing handed to the rules agent.
pub fn render_for_agent(search: &RuleSearch) -> String {
    let mut out = String::from("Here are the most relevant rules:\n\n");
    if let Some(reason) = &search.degraded_reason {
        let _ = writeln!(out, "(Semantic search unavailable, keyword matches only: {reason})\n");
    }
    if search.hits.is_empty() {
        out.push_str("No matching rules found.\n");
    }
    for (i, hit) in search.hits.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, hit.text);
        let _ = writeln!(out, "   (Score: {:.3})\n", hit.score);
    }
    out
}

/// Answers a rules question with the default result count. Failures become a
/// message for the agent instead of an error.
pub fn answer_rules_query(retriever: &RulesRetriever, query: &str) -> String {
    match retriever.search_default(query) {
        Ok(search) => render_for_agent(&search),
        Err(e) => format!("Error searching rules: {e}"),
    }
}
