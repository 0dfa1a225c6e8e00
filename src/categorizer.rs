// Buckets every budget-line label ("agrégat") into spend, revenue or other.
//
// The membership lists are plain data copied from the published nomenclature.
// Matching is exact and case-sensitive, spend is checked before revenue.
use serde::Serialize;
use std::fmt;

/// Budget lines counted as spending.
pub const SPEND_LABELS: [&str; 19] = [
    "Dépenses",
    "Dépenses totales",
    "Dépenses totales hors remboursement du capital de la dette",
    "Dépenses - Fonctionnement",
    "Dépenses de fonctionnement",
    "Achats et charges externes",
    "Frais de personnel",
    "Charges financières",
    "Dépenses d'intervention",
    "Subventions aux personnes de droit privé",
    "Contributions aux organismes de transport",
    "Dépenses - Investissement",
    "Dépenses d'investissement",
    "Remboursements d'emprunts hors gestion active de la dette",
    "Dépenses d'investissement hors remboursement du capital de la dette",
    "Dépenses d'équipement",
    "Subventions d'équipement versées",
    "Subventions d'équipement versées aux communes et aux groupements",
    "Annuité de la dette",
];

/// Budget lines counted as revenue.
pub const REVENUE_LABELS: [&str; 26] = [
    "Recettes",
    "Recettes totales",
    "Recettes totales hors emprunts",
    "Recettes - Fonctionnement",
    "Recettes de fonctionnement",
    "Impôts et taxes",
    "Impôts locaux",
    "Autres impôts et taxes",
    "Cartes grises",
    "CVAE",
    "TICPE",
    "TVA",
    "Concours de l'Etat",
    "Dotation globale de fonctionnement",
    "Péréquations et compensations fiscales",
    "Autres dotations de fonctionnement",
    "Subventions reçues et participations",
    "Ventes de biens et services",
    "Recettes - Investissement",
    "Recettes d'investissement",
    "Emprunts hors gestion active de la dette",
    "Recettes d'investissement hors emprunts",
    "FCTVA",
    "Autres dotations et subventions",
    "DRES",
    "Produit des cessions d'immobilisations",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    #[serde(rename = "Dépenses")]
    Spend,
    #[serde(rename = "Recettes")]
    Revenue,
    #[serde(rename = "Autres")]
    Other,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Spend, Category::Revenue, Category::Other];

    /// Display name used in tables and in the exported `categorie` column.
    pub fn label(self) -> &'static str {
        match self {
            Category::Spend => "Dépenses",
            Category::Revenue => "Recettes",
            Category::Other => "Autres",
        }
    }

    /// Accepts the display name or the English variant name, any case.
    pub fn parse(s: &str) -> Option<Category> {
        let s = s.trim();
        Category::ALL.into_iter().find(|c| {
            c.label().eq_ignore_ascii_case(s) || format!("{:?}", c).eq_ignore_ascii_case(s)
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

pub fn categorize(label: &str) -> Category {
    if SPEND_LABELS.contains(&label) {
        Category::Spend
    } else if REVENUE_LABELS.contains(&label) {
        Category::Revenue
    } else {
        Category::Other
    }
}
