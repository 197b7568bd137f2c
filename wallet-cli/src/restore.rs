use base64::Engine;
use cashu_mints::{KvStore, MintRegistry, Offline, RegistryError, Snapshot};

use crate::opts::RestoreOpts;

impl RestoreOpts {
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
        let txt = std::fs::read_to_string(&self.input)
            .map_err(|e| format_err!("read {} failed: {}", self.input, e))?;

        let snapshot = parse_backup(&txt)?;
        let n = r.restore_from_backup(&snapshot).await?;
        info!("{} slots restored", n);

        println!(
            "active: {} {}, balance: {}",
            r.active_mint_url()?,
            r.active_unit_label()?,
            r.active_balance()?
        );

        Ok(())
    }
}

/// json object, or the same json in base64
pub fn parse_backup(txt: &str) -> anyhow::Result<Snapshot> {
    let txt = txt.trim();
    if txt.starts_with('{') {
        return Ok(serde_json::from_str(txt)?);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(txt)
        .map_err(|e| format_err!("backup is neither json nor base64: {}", e))?;
    let snapshot = serde_json::from_slice(&bytes)?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backup() {
        let js = r#"{"cashu.activeUnit":"\"sat\"","cashu.mints":"[]"}"#;
        let a = parse_backup(js).unwrap();
        assert_eq!(a.len(), 2);

        let b64 = base64::engine::general_purpose::STANDARD.encode(js);
        let b = parse_backup(&format!("{}\n", b64)).unwrap();
        assert_eq!(a, b);

        assert!(parse_backup("not a backup!").is_err());
    }
}
