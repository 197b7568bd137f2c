use cashu_mints::{unit_label, KvStore, MintRegistry, Offline, RegistryError};

use crate::opts::UnitOpts;

impl UnitOpts {
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
        // offline: only succeeds when the mint is already the active one
        if !self.mint.is_empty() {
            r.activate_mint_url(&self.mint, false, None).await?;
        }

        let unit = match self.unit.as_deref() {
            Some(u) => {
                r.activate_unit(u).await?;
                u.to_owned()
            }
            None => r.toggle_unit().await?,
        };

        let balance = r.active_mint_balance()?;
        println!(
            "{} {}: {}",
            r.active_mint_url()?,
            unit_label(&unit),
            balance
        );

        Ok(())
    }
}
