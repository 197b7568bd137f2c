use cashu_mints::{unit_label, KvStore, MintRegistry, Offline, ProofsHelper, RegistryError};

use crate::opts::ShowOpts;

impl ShowOpts {
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
        let state = r.state()?;

        println!(
            "active: {} {}",
            state.active_mint_url,
            unit_label(&state.active_unit)
        );

        for (idx, mint) in state.mints.iter().enumerate() {
            let view = state.view(mint);
            let mark = if mint.url == state.active_mint_url { "*" } else { " " };

            println!(
                "{}{:>2} {} {}",
                mark,
                idx,
                mint.url,
                mint.nickname.as_deref().unwrap_or_default()
            );
            for (unit, amount) in view.all_balances() {
                println!("      {:>6}: {}", unit_label(&unit), amount);
            }

            if self.keysets {
                for ks in &mint.keysets {
                    let keys = mint.keys_for(&ks.id).map(|k| k.keys.len()).unwrap_or(0);
                    println!(
                        "      {} {:>6} active={} keys={}",
                        ks.id, ks.unit, ks.active, keys
                    );
                }
            }

            let orphans = view.proofs_without_keys().len();
            if orphans > 0 {
                warn!("{} has {} proofs without keys", mint.url, orphans);
            }
        }

        println!(
            "balance: {} (active mint {})",
            state.active_balance(),
            state.active_mint_balance()
        );

        if self.proofs {
            let ps = state.ledger.proofs();
            println!("proofs: {} sum {}", ps.len(), ps.sum());
            for (idx, p) in ps.iter().enumerate() {
                let unit = state.keyset_unit(&p.id).unwrap_or("?");
                println!("{:>3} {} {:>6} {} {}", idx, p.id, p.amount, unit, p.secret);
            }
        }

        if self.spent {
            let ps = state.ledger.spent_proofs();
            println!("spent: {} sum {}", ps.len(), ps.sum());
            for (idx, p) in ps.iter().enumerate() {
                println!("{:>3} {} {:>6} {}", idx, p.id, p.amount, p.secret);
            }
        }

        Ok(())
    }
}
