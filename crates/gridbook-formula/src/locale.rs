//! Locale-specific function display names and separators.
//!
//! Function identity is always the numeric index from
//! [`crate::functions`]; locales only change how a function is *displayed*
//! and typed. The override tables below are keyed by that index, so a
//! locale table can be swapped without touching the registry.

use crate::functions::{self, FunctionSpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    EnUs,
    DeDe,
    FrFr,
}

impl Locale {
    /// Argument separator used in formula text for this locale.
    #[must_use]
    pub fn arg_separator(self) -> char {
        match self {
            Locale::EnUs => ',',
            Locale::DeDe | Locale::FrFr => ';',
        }
    }

    fn overrides(self) -> &'static [(u16, &'static str)] {
        match self {
            Locale::EnUs => &[],
            Locale::DeDe => DE_DE_NAMES,
            Locale::FrFr => FR_FR_NAMES,
        }
    }
}

// Curated subsets; functions without an entry display their canonical name.
const DE_DE_NAMES: &[(u16, &'static str)] = &[
    (1, "WENN"),
    (2, "ISTNV"),
    (3, "ISTFEHLER"),
    (4, "SUMME"),
    (5, "MITTELWERT"),
    (10, "NV"),
    (20, "WURZEL"),
    (36, "UND"),
    (37, "ODER"),
    (38, "NICHT"),
    (48, "TEXT"),
    (63, "ZUFALLSZAHL"),
    (65, "DATUM"),
    (67, "TAG"),
    (68, "MONAT"),
    (69, "JAHR"),
    (74, "JETZT"),
    (100, "WAHL"),
    (102, "SVERWEIS"),
    (101, "WVERWEIS"),
    (112, "KLEIN"),
    (113, "GROSS"),
    (115, "LINKS"),
    (116, "RECHTS"),
    (121, "CODE"),
    (221, "HEUTE"),
    (228, "SUMMENPRODUKT"),
    (336, "VERKETTEN"),
    (345, "SUMMEWENN"),
    (346, "ZAEHLENWENN"),
];

const FR_FR_NAMES: &[(u16, &'static str)] = &[
    (1, "SI"),
    (2, "ESTNA"),
    (3, "ESTERREUR"),
    (4, "SOMME"),
    (5, "MOYENNE"),
    (20, "RACINE"),
    (36, "ET"),
    (37, "OU"),
    (38, "NON"),
    (63, "ALEA"),
    (65, "DATE"),
    (67, "JOUR"),
    (68, "MOIS"),
    (69, "ANNEE"),
    (74, "MAINTENANT"),
    (100, "CHOISIR"),
    (102, "RECHERCHEV"),
    (101, "RECHERCHEH"),
    (112, "MINUSCULE"),
    (113, "MAJUSCULE"),
    (115, "GAUCHE"),
    (116, "DROITE"),
    (221, "AUJOURDHUI"),
    (228, "SOMMEPROD"),
    (336, "CONCATENER"),
    (345, "SOMME.SI"),
    (346, "NB.SI"),
];

/// Display name for a function in the given locale. Falls back to the
/// canonical name when the locale has no override.
#[must_use]
pub fn display_name(id: u16, locale: Locale) -> Option<&'static str> {
    if let Some(&(_, name)) = locale.overrides().iter().find(|(fid, _)| *fid == id) {
        return Some(name);
    }
    functions::function_spec_from_id(id).map(|spec| spec.name)
}

/// Resolve a typed function name under a locale: locale override table
/// first, then the canonical table (canonical names stay accepted in every
/// locale for interchange).
#[must_use]
pub fn function_spec_from_localized_name(name: &str, locale: Locale) -> Option<FunctionSpec> {
    let upper = name.trim().to_ascii_uppercase();
    if let Some(&(id, _)) = locale
        .overrides()
        .iter()
        .find(|(_, loc_name)| *loc_name == upper)
    {
        return functions::function_spec_from_id(id);
    }
    functions::function_spec_from_name(&upper)
}
