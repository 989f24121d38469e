use super::models::Group;
use crate::config::RulesConfig;

/// Picks the group finished items belong in.
#[derive(Debug, Clone)]
pub struct GroupResolver {
    keywords: Vec<String>,
}

impl Default for GroupResolver {
    fn default() -> Self {
        Self::new(&RulesConfig::default())
    }
}

impl GroupResolver {
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            keywords: rules
                .group_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// First group, in the order given, whose title contains a keyword.
    ///
    /// The input is deliberately not sorted: the platform's order is the
    /// tie-break. Callers pass a freshly fetched list every time.
    pub fn resolve<'a>(&self, groups: &'a [Group]) -> Option<&'a Group> {
        groups.iter().find(|group| {
            let title = group.title.to_lowercase();
            self.keywords.iter().any(|k| title.contains(k.as_str()))
        })
    }
}
