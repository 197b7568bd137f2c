use std::sync::Arc;

use crate::error::ClientError as Error;
use crate::types::{KeyRecord, Keyset, MintInfo};

/// NUT-02 `GET /v1/keysets`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeysetResponse {
    pub keysets: Vec<Keyset>,
}

/// NUT-01 `GET /v1/keys[/{id}]`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeysResponse {
    pub keysets: Vec<KeyRecord>,
}

/// The mint endpoints the registry needs.
///
/// Implementations own transport, timeouts and decoding (see `ClientError::try_parse`);
/// every call must finish or fail in bounded time.
/// <https://github.com/cashubtc/nuts/tree/main>
#[async_trait]
pub trait MintApi: Send + Sync {
    /// NUT-06: Mint information
    async fn get_info(&self, mint_url: &str) -> Result<MintInfo, Error>;
    /// 02  keysets of the mint, active and inactive
    async fn get_keysets(&self, mint_url: &str) -> Result<KeysetResponse, Error>;
    /// 01  all active keys when `keyset_id` is None, else a single element for that keyset
    async fn get_keys(&self, mint_url: &str, keyset_id: Option<&str>)
        -> Result<KeysResponse, Error>;
}

#[async_trait]
impl<T> MintApi for Arc<T>
where
    T: MintApi + ?Sized,
{
    async fn get_info(&self, mint_url: &str) -> Result<MintInfo, Error> {
        self.as_ref().get_info(mint_url).await
    }
    async fn get_keysets(&self, mint_url: &str) -> Result<KeysetResponse, Error> {
        self.as_ref().get_keysets(mint_url).await
    }
    async fn get_keys(
        &self,
        mint_url: &str,
        keyset_id: Option<&str>,
    ) -> Result<KeysResponse, Error> {
        self.as_ref().get_keys(mint_url, keyset_id).await
    }
}

/// No transport: every call fails, so only cached mint data is usable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

#[async_trait]
impl MintApi for Offline {
    async fn get_info(&self, mint_url: &str) -> Result<MintInfo, Error> {
        Err(offline(mint_url))
    }
    async fn get_keysets(&self, mint_url: &str) -> Result<KeysetResponse, Error> {
        Err(offline(mint_url))
    }
    async fn get_keys(
        &self,
        mint_url: &str,
        _keyset_id: Option<&str>,
    ) -> Result<KeysResponse, Error> {
        Err(offline(mint_url))
    }
}

fn offline(mint_url: &str) -> Error {
    Error::Transport(format!("offline, can't reach {}", mint_url))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SyncStage;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    pub const KEYS_SAT: &str = "009a1f293253e41e";
    pub const KEYS_USD: &str = "00c074b96c7e2b0e";
    pub const KEYS_EUR: &str = "00e1eb6a1e4d6b9f";
    pub const KEYS_OLD: &str = "I2yN+iRYfkzT";

    #[derive(Debug, Clone, Default)]
    pub struct MockMintData {
        pub info: MintInfo,
        pub keysets: Vec<Keyset>,
        pub keys: Vec<KeyRecord>,
    }

    impl MockMintData {
        /// one keyset per unit, all active, keys for each
        pub fn with_units(name: &str, units: &[(&str, &str)]) -> Self {
            let keysets = units
                .iter()
                .map(|(id, unit)| Keyset::new(*id, *unit, true))
                .collect::<Vec<_>>();
            let keys = keysets.iter().map(key_record).collect();
            Self {
                info: MintInfo {
                    name: name.to_owned(),
                    version: "Nutshell/0.15.3".to_owned(),
                    ..Default::default()
                },
                keysets,
                keys,
            }
        }
    }

    pub fn key_record(ks: &Keyset) -> KeyRecord {
        let mut keys = BTreeMap::new();
        keys.insert(1, format!("02{}01", ks.id));
        keys.insert(2, format!("02{}02", ks.id));
        KeyRecord {
            id: ks.id.clone(),
            unit: Some(ks.unit.clone()),
            keys,
        }
    }

    /// Scripted mint: records every call, yields once per call so concurrent flows interleave.
    #[derive(Debug, Default)]
    pub struct MockMint {
        pub mints: Mutex<BTreeMap<String, MockMintData>>,
        pub calls: Mutex<Vec<String>>,
        pub fail: Mutex<Option<(String, SyncStage)>>,
    }

    impl MockMint {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_mint(self, url: &str, data: MockMintData) -> Self {
            self.mints.lock().unwrap().insert(url.to_owned(), data);
            self
        }

        pub fn set_mint(&self, url: &str, data: MockMintData) {
            self.mints.lock().unwrap().insert(url.to_owned(), data);
        }

        pub fn fail_at(&self, url: &str, stage: SyncStage) {
            *self.fail.lock().unwrap() = Some((url.to_owned(), stage));
        }

        pub fn heal(&self) {
            *self.fail.lock().unwrap() = None;
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        async fn enter(
            &self,
            call: String,
            url: &str,
            stage: SyncStage,
        ) -> Result<MockMintData, Error> {
            self.calls.lock().unwrap().push(call);
            tokio::task::yield_now().await;

            let failing = self
                .fail
                .lock()
                .unwrap()
                .as_ref()
                .map(|(u, s)| u == url && *s == stage)
                .unwrap_or(false);
            if failing {
                return Err(Error::Transport("connection reset by peer".to_owned()));
            }

            let data = self.mints.lock().unwrap().get(url).cloned();
            data.ok_or_else(|| Error::Mint(404, format!("no mint at {}", url)))
        }
    }

    #[async_trait]
    impl MintApi for MockMint {
        async fn get_info(&self, mint_url: &str) -> Result<MintInfo, Error> {
            let m = self
                .enter(format!("info {}", mint_url), mint_url, SyncStage::Info)
                .await?;
            Ok(m.info)
        }
        async fn get_keysets(&self, mint_url: &str) -> Result<KeysetResponse, Error> {
            let m = self
                .enter(format!("keysets {}", mint_url), mint_url, SyncStage::Keysets)
                .await?;
            Ok(KeysetResponse { keysets: m.keysets })
        }
        async fn get_keys(
            &self,
            mint_url: &str,
            keyset_id: Option<&str>,
        ) -> Result<KeysResponse, Error> {
            let call = format!("keys {} {}", mint_url, keyset_id.unwrap_or("*"));
            let m = self.enter(call, mint_url, SyncStage::Keys).await?;

            let keysets = match keyset_id {
                None => {
                    let active = m
                        .keysets
                        .iter()
                        .filter(|k| k.active)
                        .map(|k| k.id.as_str())
                        .collect::<Vec<_>>();
                    m.keys
                        .into_iter()
                        .filter(|k| active.contains(&k.id.as_str()))
                        .collect()
                }
                Some(id) => m.keys.into_iter().filter(|k| k.id == id).collect(),
            };
            Ok(KeysResponse { keysets })
        }
    }

    #[tokio::test]
    async fn test_offline() {
        let e = Offline.get_keysets("https://8333.space:3338").await.unwrap_err();
        assert!(e.is_transport());
        assert_eq!(e.to_string(), "offline, can't reach https://8333.space:3338");
    }

    #[test]
    fn test_decode_keys_response() {
        let body = r#"{"keysets":[{"id":"009a1f293253e41e","unit":"sat","keys":{"1":"02aa","2":"02bb"}}]}"#;
        let res = Error::try_parse::<KeysResponse>(body, 200).unwrap();
        assert_eq!(res.keysets.len(), 1);
        assert_eq!(res.keysets[0].keys.get(&2).map(|s| s.as_str()), Some("02bb"));

        let err = r#"{"code":12001,"detail":"keyset not found"}"#;
        let e = Error::try_parse::<KeysResponse>(err, 400).unwrap_err();
        assert!(e.is_mint());
    }

    #[tokio::test]
    async fn test_mock_keys_single() {
        let mock = MockMint::new().with_mint(
            "https://a.example",
            MockMintData::with_units("A", &[(KEYS_SAT, "sat"), (KEYS_USD, "usd")]),
        );
        let all = mock.get_keys("https://a.example", None).await.unwrap();
        assert_eq!(all.keysets.len(), 2);
        let one = mock
            .get_keys("https://a.example", Some(KEYS_USD))
            .await
            .unwrap();
        assert_eq!(one.keysets.len(), 1);
        assert_eq!(one.keysets[0].id, KEYS_USD);
        assert_eq!(mock.calls().len(), 2);
    }
}
