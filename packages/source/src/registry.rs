//! Explicit parser registry.
//!
//! Every configured data source registers its definition here; lookup by
//! name is a direct scan of the list, with no reflection involved.
//! Adding a source means writing a definition under [`crate::parsers`]
//! and appending its constructor below.

use crate::parser_def::ParserDefinition;
use crate::parsers;

/// Returns every registered parser definition.
#[must_use]
pub fn all_parsers() -> Vec<ParserDefinition> {
    vec![
        parsers::geonature::geonature_occurrences(),
        parsers::alpine_wfs::alpine_protected_species(),
    ]
}

/// Looks up a parser definition by name.
#[must_use]
pub fn find_parser(name: &str) -> Option<ParserDefinition> {
    all_parsers().into_iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_names_are_unique() {
        let parsers = all_parsers();
        let mut names: Vec<String> = parsers.iter().map(|def| def.name.clone()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), parsers.len());
    }

    #[test]
    fn every_registered_parser_validates() {
        for def in all_parsers() {
            def.validate()
                .unwrap_or_else(|e| panic!("{} is invalid: {e}", def.name));
        }
    }

    #[test]
    fn lookup_by_name() {
        assert!(find_parser("geonature-occurrences").is_some());
        assert!(find_parser("no-such-parser").is_none());
    }
}
