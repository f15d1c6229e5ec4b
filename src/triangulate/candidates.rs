//! Candidate zone lookup: ordered strategies, first non-empty result wins.

use std::sync::Arc;

use crate::models::{AddressRecord, PostalZone};
use crate::normalize::SynonymService;
use crate::pip::names::CAPITAL_KEY;
use crate::pip::{normalize_place_name, ZoneIndex};

pub struct CandidateContext<'a> {
    pub zones: &'a ZoneIndex,
    pub synonyms: &'a SynonymService,
    pub record: &'a AddressRecord,
}

pub type CandidateStrategy = fn(&CandidateContext) -> Vec<Arc<PostalZone>>;

/// Strategies in evaluation order
pub const STRATEGIES: &[(&str, CandidateStrategy)] = &[
    ("name", by_name),
    ("synonym", by_synonym),
    ("admin_code", by_admin_code),
    ("admin_code_prefix", by_admin_code_prefix),
    ("admin_code_suffix", by_admin_code_suffix),
    ("department", by_department),
];

#[derive(Debug, Default)]
pub struct Candidates {
    pub zones: Vec<Arc<PostalZone>>,
    /// Strategy that produced `zones`; `None` when nothing matched
    pub matched_by: Option<&'static str>,
}

impl Candidates {
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

pub fn find(ctx: &CandidateContext) -> Candidates {
    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| {
            let zones = strategy(ctx);
            (!zones.is_empty()).then_some(Candidates {
                zones,
                matched_by: Some(*name),
            })
        })
        .unwrap_or_default()
}

fn by_name(ctx: &CandidateContext) -> Vec<Arc<PostalZone>> {
    ctx.zones.by_municipality(&ctx.record.city).to_vec()
}

/// "Cali, Valle" / "Cartagena - Bolívar" style suffixes, then the synonym table
fn by_synonym(ctx: &CandidateContext) -> Vec<Arc<PostalZone>> {
    let city = ctx.record.city.trim();
    if city.is_empty() {
        return Vec::new();
    }

    let head = city
        .split([',', '-', '/', '('])
        .next()
        .unwrap_or_default()
        .trim();
    if head != city {
        let zones = ctx.zones.by_municipality(head);
        if !zones.is_empty() {
            return zones.to_vec();
        }
    }

    ctx.synonyms
        .expand(head)
        .iter()
        .map(|name| ctx.zones.by_municipality(name))
        .find(|zones| !zones.is_empty())
        .map(<[_]>::to_vec)
        .unwrap_or_default()
}

fn by_admin_code(ctx: &CandidateContext) -> Vec<Arc<PostalZone>> {
    ctx.zones.by_admin_code(&ctx.record.admin_code).to_vec()
}

fn by_admin_code_prefix(ctx: &CandidateContext) -> Vec<Arc<PostalZone>> {
    ctx.zones.by_admin_code_prefix(&ctx.record.admin_code)
}

fn by_admin_code_suffix(ctx: &CandidateContext) -> Vec<Arc<PostalZone>> {
    ctx.zones.by_admin_code_suffix(&ctx.record.admin_code)
}

/// Exact department match. The capital district is its own department but its
/// zones may be filed under the surrounding one, so it falls back to the capital's name.
fn by_department(ctx: &CandidateContext) -> Vec<Arc<PostalZone>> {
    let zones = ctx.zones.by_department(&ctx.record.department);
    if !zones.is_empty() {
        return zones.to_vec();
    }
    if normalize_place_name(&ctx.record.department) == CAPITAL_KEY {
        return ctx.zones.by_municipality(CAPITAL_KEY).to_vec();
    }
    Vec::new()
}
