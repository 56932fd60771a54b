//! Relevance-query prompt assembly.

use std::fmt::Write;

/// Build the relevance prompt for one (intention, URL, title) triple.
///
/// The model is instructed to answer with a JSON object carrying a binary
/// `decision` and a `justification` capped at `word_limit` words. The cap
/// is advisory at this layer; the response is also truncated after parsing.
pub fn relevance_prompt(intention: &str, url: &str, title: &str, word_limit: usize) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "My current task is: \"{intention}\". A user wants to visit a website \
         with the title \"{title}\" at the URL \"{url}\".\n\n\
         Is this site relevant to the task?\n\n\
         Respond with a JSON object with two keys:\n\
         1. \"decision\": a single word, either \"YES\" or \"NO\".\n\
         2. \"justification\": a brief explanation (under {word_limit} words) for your decision."
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_all_inputs() {
        let p = relevance_prompt(
            "write quarterly report",
            "https://news.example.com/story",
            "Breaking News",
            40,
        );
        assert!(p.contains("write quarterly report"));
        assert!(p.contains("https://news.example.com/story"));
        assert!(p.contains("Breaking News"));
        assert!(p.contains("under 40 words"));
    }

    #[test]
    fn prompt_requests_structured_answer() {
        let p = relevance_prompt("task", "https://x.example/", "t", 25);
        assert!(p.contains("\"decision\""));
        assert!(p.contains("\"justification\""));
        assert!(p.contains("YES"));
        assert!(p.contains("NO"));
    }
}
