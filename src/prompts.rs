// prompts.rs

/// Asks the model for native-language search queries covering press
/// commentary about the subject. One query per line, newest conventions of
/// the target language, no numbering.
pub fn query_plan_prompt(
    language_name: &str,
    language_code: &str,
    subject: &str,
    max_queries: usize,
    current_date: &str,
) -> String {
    format!(
        "You are planning a news search in {language_name} ({language_code}) for {current_date}.

Write up to {max_queries} search queries, in {language_name}, that would surface recent press
coverage and commentary about {subject} in {language_name}-language media. Use the name of
{subject} as it is written in {language_name}. Favor queries about politics, diplomacy, economy,
and society over sports or tourism.

Reply with one query per line and nothing else. Do not number the queries, do not explain them."
    )
}

/// Headline-only relevance check. The reply contract is strict: a
/// comma-separated list of 1-based indices, or the single word NONE.
pub fn headline_filter_prompt(headlines: &str, language_name: &str, subject: &str) -> String {
    format!(
        "These headlines were found in {language_name}-language media:

{headlines}

Which of them reflect {language_name}-language media's own commentary or perspective on {subject}:
its diplomatic positions, economic relations, political analysis, or stance on {subject}'s actions
and policies?

Exclude sports results, weather, tourism, entertainment, {subject}'s own internal news, and
headlines that do not actually concern {subject}.

Reply with only the matching numbers separated by commas (for example: 1,3,7).
If no headline qualifies, reply with the single word NONE."
    )
}

/// Sentiment classification over title plus truncated content. The reply
/// contract is a single JSON object.
pub fn sentiment_prompt(title: &str, content: &str, subject: &str) -> String {
    format!(
        "Title: {title}

{content}

Assess how this article portrays {subject}. Respond with only a JSON object, no prose and no code
fences, with exactly these fields:
{{\"sentiment\": \"positive\"|\"negative\"|\"neutral\", \"score\": <number from -1.0 to 1.0>, \"explanation\": \"<one or two sentences>\", \"key_phrases\": [\"<phrase>\", ...]}}"
    )
}

/// Translation into English, tone-preserving.
pub fn translation_prompt(text: &str, language_name: &str) -> String {
    format!(
        "Translate the following text from {language_name} to English. Preserve the meaning and
tone as accurately as possible. Reply with the translation only.

{text}"
    )
}
