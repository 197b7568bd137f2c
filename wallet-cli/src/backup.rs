use base64::Engine;
use cashu_mints::{KvStore, MintRegistry, Offline, RegistryError};

use crate::opts::BackupOpts;

impl BackupOpts {
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
        let snapshot = r.backup().await?;
        debug!("backup {} slots", snapshot.len());

        let mut out = serde_json::to_string_pretty(&snapshot)?;
        if self.base64 {
            out = base64::engine::general_purpose::STANDARD.encode(out.as_bytes());
        }

        if self.output == "-" {
            println!("{}", out);
        } else {
            std::fs::write(&self.output, out)
                .map_err(|e| format_err!("write {} failed: {}", self.output, e))?;
            info!("backup wrote to {}", self.output);
        }

        Ok(())
    }
}
