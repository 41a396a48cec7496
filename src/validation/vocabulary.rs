//! Fixed professional-term vocabulary for the density stage

use indexmap::IndexMap;
use std::collections::HashSet;

/// Vocabulary category labels, in scan order
pub const CATEGORIES: [&str; 6] = [
    "role",
    "requirement",
    "responsibility",
    "organization",
    "skill",
    "experience",
];

const ROLE_TERMS: &[&str] = &[
    "engineer", "developer", "manager", "analyst", "consultant", "director",
    "coordinator", "specialist", "administrator", "architect", "designer",
    "lead", "officer", "technician", "supervisor",
];

const REQUIREMENT_TERMS: &[&str] = &[
    "required", "requirements", "qualification", "qualifications", "preferred",
    "minimum", "degree", "bachelor", "master", "certification", "proficiency",
    "eligible",
];

const RESPONSIBILITY_TERMS: &[&str] = &[
    "responsible", "responsibilities", "duties", "manage", "coordinate",
    "develop", "maintain", "oversee", "implement", "collaborate", "deliver",
    "support",
];

const ORGANIZATION_TERMS: &[&str] = &[
    "team", "company", "department", "organization", "client", "stakeholder",
    "stakeholders", "business", "enterprise", "division", "office",
];

const SKILL_TERMS: &[&str] = &[
    "skill", "skills", "communication", "leadership", "analytical",
    "technical", "software", "programming", "analysis", "planning",
    "problem", "solving",
];

const EXPERIENCE_TERMS: &[&str] = &[
    "experience", "years", "background", "proven", "expertise", "knowledge",
    "familiarity", "history", "senior", "junior",
];

/// Distinct-hit tally across the vocabulary
#[derive(Debug, Clone)]
pub struct VocabularyHits {
    /// Number of distinct vocabulary terms present in the text
    pub total_distinct: usize,
    /// Distinct hits per category, keyed by category label
    pub by_category: IndexMap<String, usize>,
}

/// Professional-term vocabulary grouped by category
pub struct ProfessionalVocabulary {
    groups: [(&'static str, &'static [&'static str]); 6],
}

impl Default for ProfessionalVocabulary {
    fn default() -> Self {
        Self {
            groups: [
                ("role", ROLE_TERMS),
                ("requirement", REQUIREMENT_TERMS),
                ("responsibility", RESPONSIBILITY_TERMS),
                ("organization", ORGANIZATION_TERMS),
                ("skill", SKILL_TERMS),
                ("experience", EXPERIENCE_TERMS),
            ],
        }
    }
}

impl ProfessionalVocabulary {
    /// Tally distinct case-insensitive term hits in the text.
    ///
    /// Terms match whole words only; "team" in "steamroller" does not count.
    pub fn scan(&self, text: &str) -> VocabularyHits {
        let words: HashSet<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let mut total_distinct = 0;
        let mut by_category = IndexMap::new();

        for (category, terms) in &self.groups {
            let hits = terms.iter().filter(|t| words.contains(**t)).count();
            total_distinct += hits;
            by_category.insert(category.to_string(), hits);
        }

        VocabularyHits {
            total_distinct,
            by_category,
        }
    }
}
