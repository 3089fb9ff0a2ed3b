//! Certificate-type taxonomy.
//!
//! Award names are open-world: any free-text label is accepted. Known types
//! get their capitalization canonicalized through an exact (case-insensitive)
//! table, and a keyword classifier sorts arbitrary labels into broad award
//! categories as a best-effort fallback. Unrecognized labels pass through
//! unchanged and classify as `Other` -- never an error.

/// Broad award category inferred from a certificate-type label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardCategory {
    Mun,
    BizCom,
    SpecialMention,
    Other,
}

const MUN_FIELDS: &[&str] = &["name", "school", "country", "committee", "date_issued"];
const BIZCOM_FIELDS: &[&str] = &["name", "school", "segment", "team_name", "date_issued"];
const SPECIAL_MENTION_FIELDS: &[&str] = &["name", "school", "date_issued"];

/// Canonical certificate types with their category and full field lists.
///
/// The field lists document what each type carries; enforcement is narrower
/// (see [`required_fields`]).
pub const KNOWN_TYPES: &[(&str, AwardCategory, &[&str])] = &[
    ("MUN Participant", AwardCategory::Mun, MUN_FIELDS),
    ("Campus Ambassador", AwardCategory::Mun, MUN_FIELDS),
    ("Secretariat Board Member", AwardCategory::Mun, MUN_FIELDS),
    ("Outstanding Delegate 1", AwardCategory::Mun, MUN_FIELDS),
    ("Outstanding Delegate 2", AwardCategory::Mun, MUN_FIELDS),
    ("Outstanding Delegate 3", AwardCategory::Mun, MUN_FIELDS),
    ("Best Delegate", AwardCategory::Mun, MUN_FIELDS),
    ("BizCom Participant", AwardCategory::BizCom, BIZCOM_FIELDS),
    ("BizCom Winner", AwardCategory::BizCom, BIZCOM_FIELDS),
    (
        "Special Mention 1",
        AwardCategory::SpecialMention,
        SPECIAL_MENTION_FIELDS,
    ),
    (
        "Special Mention 2",
        AwardCategory::SpecialMention,
        SPECIAL_MENTION_FIELDS,
    ),
    (
        "Special Mention 3",
        AwardCategory::SpecialMention,
        SPECIAL_MENTION_FIELDS,
    ),
    (
        "Special Mention 5",
        AwardCategory::SpecialMention,
        SPECIAL_MENTION_FIELDS,
    ),
];

const MUN_KEYWORDS: &[&str] = &[
    "delegate",
    "ambassador",
    "participant",
    "secretariat",
    "mun",
    "committee",
    "country",
];
const BIZCOM_KEYWORDS: &[&str] = &["bizcom", "business", "segment", "team"];
const SPECIAL_MENTION_KEYWORDS: &[&str] = &["special mention", "mention"];

/// Classify a certificate-type label into a broad award category.
///
/// Keyword-based substring matching over the lowercased label; the MUN
/// keywords are checked first, so a label matching several lists lands in
/// the earliest matching category.
pub fn award_category(certificate_type: &str) -> AwardCategory {
    let normalized = certificate_type.to_lowercase();
    let normalized = normalized.trim();

    if MUN_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return AwardCategory::Mun;
    }
    if BIZCOM_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return AwardCategory::BizCom;
    }
    if SPECIAL_MENTION_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return AwardCategory::SpecialMention;
    }

    AwardCategory::Other
}

/// Canonicalize the capitalization of a known certificate type.
///
/// Case-insensitive exact match against [`KNOWN_TYPES`]; anything else is
/// returned trimmed but otherwise unchanged (arbitrary award names are
/// acceptable).
pub fn normalize_type(certificate_type: &str) -> String {
    let trimmed = certificate_type.trim();

    for (canonical, _, _) in KNOWN_TYPES {
        if canonical.eq_ignore_ascii_case(trimmed) {
            return (*canonical).to_string();
        }
    }

    trimmed.to_string()
}

/// The enforced required-field set for a certificate type.
///
/// Only `participant_name` is enforced, for known and unknown types alike:
/// the full field lists in [`KNOWN_TYPES`] describe what a type carries, but
/// entry-time enforcement was deliberately relaxed so that partially-filled
/// sheets can still be imported (missing attributes simply produce no
/// metadata rows).
pub fn required_fields(certificate_type: &str) -> Vec<&'static str> {
    let normalized = normalize_type(certificate_type);

    for (canonical, _, fields) in KNOWN_TYPES {
        if *canonical == normalized {
            return fields
                .iter()
                .map(|f| if *f == "name" { "participant_name" } else { *f })
                .filter(|f| *f == "participant_name")
                .collect();
        }
    }

    vec!["participant_name"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_exact_match_canonicalizes_case() {
        assert_eq!(normalize_type("mun participant"), "MUN Participant");
        assert_eq!(normalize_type("BEST DELEGATE"), "Best Delegate");
        assert_eq!(normalize_type("  special mention 3  "), "Special Mention 3");
    }

    #[test]
    fn normalize_unknown_passes_through() {
        assert_eq!(normalize_type("Debate Champion"), "Debate Champion");
        assert_eq!(normalize_type("  Special Mention  "), "Special Mention");
    }

    #[test]
    fn category_from_keywords() {
        assert_eq!(award_category("Outstanding Delegate 2"), AwardCategory::Mun);
        assert_eq!(award_category("campus AMBASSADOR"), AwardCategory::Mun);
        assert_eq!(award_category("BizCom Winner"), AwardCategory::BizCom);
        // "mention" keyword, and no MUN/BizCom keyword before it
        assert_eq!(
            award_category("Honorable Mention"),
            AwardCategory::SpecialMention
        );
        assert_eq!(award_category("Debate Champion"), AwardCategory::Other);
    }

    #[test]
    fn required_fields_narrowed_to_participant_name() {
        assert_eq!(required_fields("MUN Participant"), vec!["participant_name"]);
        assert_eq!(
            required_fields("Special Mention 3"),
            vec!["participant_name"]
        );
        assert_eq!(required_fields("BizCom Winner"), vec!["participant_name"]);
        // Unknown types fall back to the same policy
        assert_eq!(required_fields("Debate Champion"), vec!["participant_name"]);
    }
}
