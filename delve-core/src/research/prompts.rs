//! Prompt templates for every research stage.

use crate::web::SearchResult;

/// Default system text for summarization and report writing.
pub const RESEARCH_BASE_SYSTEM: &str = "You are an AI critical thinker research assistant. Your sole \
purpose is to write well written, critically acclaimed, objective and structured reports on the \
given text.";

/// The reply a model gives for a chunk unrelated to the topic.
pub const NOT_RELEVANT: &str = "Not relevant.";

/// System text naming the research topic.
pub fn research_topic_system(topic: &str) -> String {
    format!("You are an AI researcher assistant, and your research topic is:\n#TOPIC#\n{topic}")
}

/// Topic system text, plus a reply-language instruction when one is given.
pub fn research_system_text(topic: &str, language: Option<&str>) -> String {
    match language {
        Some(language) => format!(
            "{} Please respond in {language}.",
            research_topic_system(topic)
        ),
        None => research_topic_system(topic),
    }
}

pub fn search_topic_prompt(keyword_count: usize) -> String {
    format!(
        "Please provide up to {keyword_count} necessary keywords related to your research topic \
         for Google search. Your response must be in JSON format, for example: \
         [\"keyword1\", \"keyword2\"]."
    )
}

/// Render the keyword → results grounding block.
pub fn grounding_block(keywords: &[String], results: &[Vec<SearchResult>]) -> String {
    keywords
        .iter()
        .zip(results)
        .map(|(keyword, results)| {
            let rendered = serde_json::to_string(results).unwrap_or_else(|_| "[]".to_string());
            format!("#### Keyword: {keyword}\n Search Result: {rendered}\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summarize_search_prompt(decomposition_nums: usize, search_results: &str) -> String {
    format!(
        "### Requirements\n\
         1. The keywords related to your research topic and the search results are shown in the \
         \"Search Result Information\" section.\n\
         2. Provide up to {decomposition_nums} queries related to your research topic base on the \
         search results.\n\
         3. Please respond in the following JSON format: [\"query1\", \"query2\", \"query3\", ...].\n\
         \n\
         ### Search Result Information\n\
         {search_results}\n"
    )
}

pub fn rank_urls_prompt(topic: &str, query: &str, results: &[SearchResult]) -> String {
    let listed = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let rendered = serde_json::to_string(r).unwrap_or_default();
            format!("{i}: {rendered}")
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "### Topic\n{topic}\n### Query\n{query}\n\n### The online search results\n{listed}\n\n\
         ### Requirements\n\
         Please remove irrelevant search results that are not related to the query or topic. Then, \
         sort the remaining search results based on the link credibility. If two results have \
         equal credibility, prioritize them based on the relevance. Provide the\n\
         ranked results' indices in JSON format, like [0, 1, 3, 4, ...], without including other \
         words.\n"
    )
}

pub fn browse_and_summarize_prompt(query: &str, content: &str) -> String {
    format!(
        "### Requirements\n\
         1. Utilize the text in the \"Reference Information\" section to respond to the question \
         \"{query}\".\n\
         2. If the question cannot be directly answered using the text, but the text is related to \
         the research topic, please provide a comprehensive summary of the text.\n\
         3. If the text is entirely unrelated to the research topic, please reply with a simple \
         text \"{NOT_RELEVANT}\"\n\
         4. Include all relevant factual information, numbers, statistics, etc., if available.\n\
         \n\
         ### Reference Information\n\
         {content}\n"
    )
}

pub fn conduct_research_prompt(topic: &str, content: &str) -> String {
    format!(
        "### Reference Information\n\
         {content}\n\
         \n\
         ### Requirements\n\
         Please provide a detailed research report in response to the following topic: \
         \"{topic}\", using the information provided above. The report must meet the following \
         requirements:\n\
         \n\
         - Focus on directly addressing the chosen topic.\n\
         - Ensure a well-structured and in-depth presentation, incorporating relevant facts and \
         figures where available.\n\
         - Present data and findings in an intuitive manner, utilizing feature comparative tables, \
         if applicable.\n\
         - The report should have a minimum word count of 2,000 and be formatted with Markdown \
         syntax following APA style guidelines.\n\
         - Include all source URLs in APA format at the end of the report.\n"
    )
}
