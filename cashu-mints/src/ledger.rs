//! Unspent/spent proofs and the blind signature audit trail.
//!
//! Pure data, no I/O: the registry persists whatever changed.

use std::collections::HashSet;

use crate::error::MintError as Error;
use crate::types::{BlindSignature, BlindSignatureAudit, Proof};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProofLedger {
    pub(crate) proofs: Vec<Proof>,
    pub(crate) spent_proofs: Vec<Proof>,
    pub(crate) blind_signatures: Vec<BlindSignatureAudit>,
}

impl ProofLedger {
    pub fn new(
        proofs: Vec<Proof>,
        spent_proofs: Vec<Proof>,
        blind_signatures: Vec<BlindSignatureAudit>,
    ) -> Self {
        Self {
            proofs,
            spent_proofs,
            blind_signatures,
        }
    }

    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    pub fn spent_proofs(&self) -> &[Proof] {
        &self.spent_proofs
    }

    pub fn blind_signatures(&self) -> &[BlindSignatureAudit] {
        &self.blind_signatures
    }

    pub fn contains(&self, secret: &str) -> bool {
        self.proofs.iter().any(|p| p.secret == secret)
    }

    pub fn is_spent(&self, secret: &str) -> bool {
        self.spent_proofs.iter().any(|p| p.secret == secret)
    }

    /// Insert all proofs or none.
    ///
    /// A secret repeated inside the batch, already unspent, or already spent is refused.
    pub fn add_proofs(&mut self, new_proofs: &[Proof]) -> Result<(), Error> {
        let mut seen: HashSet<&str> = self
            .proofs
            .iter()
            .chain(self.spent_proofs.iter())
            .map(|p| p.secret.as_str())
            .collect();

        for p in new_proofs {
            if !seen.insert(p.secret.as_str()) {
                return Err(Error::DuplicateProof(p.secret.clone()));
            }
        }

        self.proofs.extend(new_proofs.iter().map(|p| Proof {
            reserved: false,
            ..p.clone()
        }));
        debug!("add_proofs: {} now {}", new_proofs.len(), self.proofs.len());

        Ok(())
    }

    /// Move proofs to the spent side, matched by secret.
    ///
    /// Proofs we never held are still recorded as spent; a secret already spent is not recorded twice.
    /// Returns how many unspent entries were removed.
    pub fn remove_proofs(&mut self, spent: &[Proof]) -> usize {
        let secrets: HashSet<&str> = spent.iter().map(|p| p.secret.as_str()).collect();

        let before = self.proofs.len();
        self.proofs.retain(|p| !secrets.contains(p.secret.as_str()));
        let removed = before - self.proofs.len();

        let mut recorded: HashSet<String> =
            self.spent_proofs.iter().map(|p| p.secret.clone()).collect();
        for p in spent {
            if recorded.insert(p.secret.clone()) {
                self.spent_proofs.push(Proof {
                    reserved: false,
                    ..p.clone()
                });
            }
        }

        debug!(
            "remove_proofs: {} given, {} removed, {} spent total",
            spent.len(),
            removed,
            self.spent_proofs.len()
        );
        removed
    }

    /// never fails, never deduplicates
    pub fn append_audit(
        &mut self,
        signature: BlindSignature,
        amount: u64,
        secret: &[u8],
        r: &[u8],
    ) -> &BlindSignatureAudit {
        let audit = BlindSignatureAudit {
            id: signature.id.clone(),
            signature,
            amount,
            secret: secret.to_vec(),
            r: hex::encode(r),
        };
        self.blind_signatures.push(audit);
        &self.blind_signatures[self.blind_signatures.len() - 1]
    }
}
