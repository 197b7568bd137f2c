use std::collections::BTreeMap;

use crate::types::{Keyset, Mint, Proof};

/// Read-only projection of one mint over the wallet's proofs.
///
/// Only active keysets count: units, keysets and balances of a rotated-out keyset are hidden.
#[derive(Debug, Clone, Copy)]
pub struct MintView<'a> {
    mint: &'a Mint,
    proofs: &'a [Proof],
}

impl<'a> MintView<'a> {
    pub fn new(mint: &'a Mint, proofs: &'a [Proof]) -> Self {
        Self { mint, proofs }
    }

    pub fn mint(&self) -> &'a Mint {
        self.mint
    }

    pub fn url(&self) -> &'a str {
        &self.mint.url
    }

    pub fn active_keysets(self) -> impl Iterator<Item = &'a Keyset> + 'a {
        self.mint.keysets.iter().filter(|k| k.active)
    }

    /// distinct units in first-seen order
    pub fn units(&self) -> Vec<&'a str> {
        let mut units: Vec<&str> = vec![];
        for k in self.active_keysets() {
            if !units.contains(&k.unit.as_str()) {
                units.push(&k.unit);
            }
        }
        units
    }

    pub fn supports_unit(&self, unit: &str) -> bool {
        self.active_keysets().any(|k| k.unit == unit)
    }

    pub fn unit_keysets<'b>(self, unit: &'b str) -> impl Iterator<Item = &'a Keyset> + 'b
    where
        'a: 'b,
    {
        self.active_keysets().filter(move |k| k.unit == unit)
    }

    /// every proof of this mint, any keyset, active or not
    pub fn proofs(&self) -> Vec<&'a Proof> {
        self.proofs
            .iter()
            .filter(|p| self.mint.has_keyset(&p.id))
            .collect()
    }

    pub fn unit_proofs(&self, unit: &str) -> Vec<&'a Proof> {
        let ids: Vec<&str> = self.unit_keysets(unit).map(|k| k.id.as_str()).collect();
        self.proofs
            .iter()
            .filter(|p| ids.contains(&p.id.as_str()))
            .collect()
    }

    pub fn unit_balance(&self, unit: &str) -> u64 {
        self.unit_proofs(unit).iter().map(|p| p.amount).sum()
    }

    /// unit => balance, for every unit of the mint including empty ones
    pub fn all_balances(&self) -> BTreeMap<String, u64> {
        self.units()
            .into_iter()
            .map(|u| (u.to_owned(), self.unit_balance(u)))
            .collect()
    }

    /// proofs of the mint whose keyset has no cached keys
    pub fn proofs_without_keys(&self) -> Vec<&'a Proof> {
        self.proofs()
            .into_iter()
            .filter(|p| self.mint.keys_for(&p.id).is_none())
            .collect()
    }
}
