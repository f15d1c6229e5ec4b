use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::pip::names::normalize_place_name;

/// Built-in municipality synonyms. First name on a line is canonical.
const DEFAULT_SYNONYMS: &str = "
bogota, santa fe de bogota, santafe de bogota, santafe
cali, santiago de cali
cartagena, cartagena de indias
cucuta, san jose de cucuta
santa marta, distrito turistico cultural e historico de santa marta
barranquilla, distrito especial industrial y portuario de barranquilla
buga, guadalajara de buga
mompos, santa cruz de mompox, mompox
tumaco, san andres de tumaco
ubate, villa de san diego de ubate
tolu, santiago de tolu
san andres, san andres isla
";

/// Manages synonym mappings for municipality names.
///
/// Every name is stored in place-name normalized form, see [`normalize_place_name`].
#[derive(Debug, Clone, Default)]
pub struct SynonymService {
    /// Variant -> canonical name
    replacements: HashMap<String, String>,
    /// Canonical name -> known variants
    variants: HashMap<String, Vec<String>>,
}

impl SynonymService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service preloaded with the built-in table
    pub fn with_defaults() -> Self {
        let mut service = Self::new();
        service.load_str(DEFAULT_SYNONYMS);
        service
    }

    /// Load synonyms from a directory, recursively.
    pub fn load_from_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        if !dir.exists() {
            warn!("Synonym directory not found: {}", dir.display());
            return Ok(());
        }

        info!("Loading synonyms from {}", dir.display());

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() || path.extension().map_or(true, |e| e != "txt") {
                continue;
            }

            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read synonym file: {}", path.display()))?;
            self.load_str(&content);
        }

        info!("Loaded {} synonym mappings", self.replacements.len());
        Ok(())
    }

    /// Parse synonym lines.
    ///
    /// `a, b, c` maps b and c to a; `a, b => c` maps a and b to c. `#` starts a comment.
    pub fn load_str(&mut self, content: &str) {
        let comment_regex = Regex::new(r"#.*").unwrap();

        for line in content.lines() {
            let line = comment_regex.replace(line, "");
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((left, right)) = line.split_once("=>") {
                // explicit mapping: left => right, first item on the right is canonical
                if let Some(target) = right.split(',').next() {
                    for src in left.split(',') {
                        self.insert(src, target);
                    }
                }
            } else {
                // equivalent list: "a, b, c" => map b->a, c->a
                let mut parts = line.split(',');
                if let Some(canon) = parts.next() {
                    for variant in parts {
                        self.insert(variant, canon);
                    }
                }
            }
        }
    }

    fn insert(&mut self, variant: &str, canonical: &str) {
        let variant = normalize_place_name(variant);
        let canonical = normalize_place_name(canonical);
        if variant.is_empty() || canonical.is_empty() || variant == canonical {
            return;
        }
        self.replacements.insert(variant.clone(), canonical.clone());
        let known = self.variants.entry(canonical).or_default();
        if !known.contains(&variant) {
            known.push(variant);
        }
    }

    /// Canonical form of a municipality name (the normalized name itself if unknown)
    pub fn canonical(&self, name: &str) -> String {
        let normalized = normalize_place_name(name);
        self.replacements
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Every other known spelling of `name`: its canonical form first, then the variants.
    pub fn expand(&self, name: &str) -> Vec<String> {
        let normalized = normalize_place_name(name);
        let canonical = self.canonical(&normalized);

        let mut names = vec![canonical.clone()];
        if let Some(variants) = self.variants.get(&canonical) {
            names.extend(variants.iter().cloned());
        }
        names.retain(|n| *n != normalized);
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}
