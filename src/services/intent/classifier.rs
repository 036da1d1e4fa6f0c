use super::lexicon::{contains_phrase, CATEGORY_KEYWORDS};
use crate::models::{Expert, IntentCategory};

/// How many of the latest user utterances feed the classifier.
pub const RECENT_UTTERANCES: usize = 5;

/// Every category keyword found in `text`.
pub fn matched_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .filter(|kw| contains_phrase(&lower, kw))
        .map(|kw| kw.to_string())
        .collect()
}

/// Picks the category with the most keyword hits across the utterances.
/// Ties go to the earlier bucket; no hits at all is `General`.
pub fn classify<'a, I>(utterances: I) -> IntentCategory
where
    I: IntoIterator<Item = &'a str>,
{
    let lowered: Vec<String> = utterances.into_iter().map(str::to_lowercase).collect();

    let mut best = (IntentCategory::General, 0usize);
    for (category, keywords) in CATEGORY_KEYWORDS {
        let hits = lowered
            .iter()
            .map(|text| keywords.iter().filter(|kw| contains_phrase(text, kw)).count())
            .sum::<usize>();
        if hits > best.1 {
            best = (*category, hits);
        }
    }
    best.0
}

/// Orders experts so those whose specialization mentions the category come
/// first. Nobody is dropped.
pub fn rank_experts(experts: &[Expert], category: IntentCategory) -> Vec<Expert> {
    let keywords = CATEGORY_KEYWORDS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, kws)| *kws)
        .unwrap_or(&[]);

    let relevance = |expert: &Expert| -> usize {
        let Some(field) = expert.specialization.as_deref() else {
            return 0;
        };
        let field = field.to_lowercase();
        let named =
            usize::from(category != IntentCategory::General && field.contains(category.as_str()));
        named + keywords.iter().filter(|kw| contains_phrase(&field, kw)).count()
    };

    let mut ranked = experts.to_vec();
    // stable sort keeps the server order among equals
    ranked.sort_by_key(|e| std::cmp::Reverse(relevance(e)));
    ranked
}
