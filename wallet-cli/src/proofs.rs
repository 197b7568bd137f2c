use cashu_mints::{KvStore, MintRegistry, Offline, Proof, ProofsHelper, RegistryError};

use crate::opts::ProofsOpts;

impl ProofsOpts {
    pub async fn run<S: KvStore>(self, r: MintRegistry<S, Offline>) {
        if let Err(e) = self.fun(r).await {
            error!("run failed: {}", e);
            std::process::exit(1);
        }
    }

    pub async fn fun<S: KvStore>(
        self,
        r: MintRegistry<S, Offline>,
    ) -> Result<(), RegistryError<S::Error>> {
        let js = std::fs::read_to_string(&self.file)
            .map_err(|e| format_err!("read {} failed: {}", self.file, e))?;
        let proofs: Vec<Proof> = serde_json::from_str(&js)?;

        if self.remove {
            let n = r.remove_proofs(&proofs).await?;
            info!("{} proofs removed, {} requested", n, proofs.len());
        } else {
            r.add_proofs(&proofs).await?;
            info!("{} proofs added: {}", proofs.len(), proofs.sum());
        }

        println!(
            "balance: {} (active mint {})",
            r.active_balance()?,
            r.active_mint_balance()?
        );

        Ok(())
    }
}
