use std::collections::BTreeMap;

pub static CURRENCY_UNIT_SAT: &str = "sat";

/// A signing keyset as listed by the mint: one unit, possibly rotated out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyset {
    pub id: String,
    pub unit: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Keyset {
    pub fn new(id: impl Into<String>, unit: impl Into<String>, active: bool) -> Self {
        Self {
            id: id.into(),
            unit: unit.into(),
            active,
        }
    }
}

/// Public keys of one keyset, amount => hex pubkey.
///
/// Treated as immutable once fetched: a keyset's keys never change after the mint starts signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub keys: BTreeMap<u64, String>,
}

// https://github.com/cashubtc/nuts/blob/main/06.md
// only the commonly shown fields are typed, the rest is kept verbatim
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_long: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mint {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub keysets: Vec<Keyset>,
    #[serde(default)]
    pub keys: Vec<KeyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MintInfo>,
}

impl Mint {
    pub fn new(url: impl Into<String>, nickname: Option<String>) -> Self {
        Self {
            url: url.into(),
            nickname,
            keysets: vec![],
            keys: vec![],
            info: None,
        }
    }

    pub fn has_keyset(&self, keyset_id: &str) -> bool {
        self.keysets.iter().any(|k| k.id == keyset_id)
    }

    pub fn keys_for(&self, keyset_id: &str) -> Option<&KeyRecord> {
        self.keys.iter().find(|k| k.id == keyset_id)
    }
}

/// An unspent token held by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// keyset id
    pub id: String,
    pub amount: u64,
    pub secret: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(default)]
    pub reserved: bool,
}

impl Proof {
    pub fn new(
        id: impl Into<String>,
        amount: u64,
        secret: impl Into<String>,
        c: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            secret: secret.into(),
            c: c.into(),
            reserved: false,
        }
    }
}

/// helper for Proofs
pub trait ProofsHelper {
    fn as_slice(&self) -> &[Proof];
    fn sum(&self) -> u64 {
        self.as_slice().iter().map(|p| p.amount).sum()
    }
    fn secrets(&self) -> std::collections::HashSet<&str> {
        self.as_slice().iter().map(|p| p.secret.as_str()).collect()
    }
}

impl ProofsHelper for [Proof] {
    fn as_slice(&self) -> &[Proof] {
        self
    }
}

impl ProofsHelper for Vec<Proof> {
    fn as_slice(&self) -> &[Proof] {
        &self[..]
    }
}

/// Blind signature as returned by the mint (NUT-00 `BlindSignature`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    pub id: String,
    pub amount: u64,
    #[serde(rename = "C_")]
    pub c: String,
}

/// Audit record for every blind signature the wallet requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignatureAudit {
    pub signature: BlindSignature,
    pub amount: u64,
    #[serde(with = "base64_bytes")]
    pub secret: Vec<u8>,
    pub id: String,
    /// blinding factor, hex
    pub r: String,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// trim, strip trailing slashes, default to https when no `scheme://` is given
///
/// Hosts are not validated here, a bad host fails when the mint is contacted.
pub fn sanitize_url(url: &str) -> String {
    let cleaned = url.trim().trim_end_matches('/');

    if has_scheme(cleaned) {
        cleaned.to_owned()
    } else {
        format!("https://{}", cleaned)
    }
}

// ^[a-z]+://
fn has_scheme(url: &str) -> bool {
    match url.find("://") {
        Some(idx) if idx > 0 => url[..idx].bytes().all(|b| b.is_ascii_lowercase()),
        _ => false,
    }
}

pub fn unit_label(unit: &str) -> &str {
    match unit {
        "sat" => "SAT",
        "usd" => "USD",
        "eur" => "EUR",
        "msat" => "mSAT",
        other => other,
    }
}

// #[cfg(test)]
pub mod tests {
    #[allow(unused_imports)]
    use super::*;

    pub const MINT_URL: &str = "https://8333.space:3338";
    pub const MINT_URL_TEST: &str = "https://testnut.cashu.space";

    // Nutshell/0.15.3
    // curl -X GET https://8333.space:3338/v1/info
    pub const INFO: &str = r#"{"name":"Cashu test mint","pubkey":"03e3d23e1b66eadaf15ce0d640a908e8ba1984baed34ab98c547aab4cf4249440d","version":"Nutshell/0.15.3","description":"This mint is for testing and development purposes only.","contact":[["",""]],"nuts":{"4":{"methods":[{"method":"bolt11","unit":"sat","min_amount":0,"max_amount":100000}],"disabled":false},"7":{"supported":true}}}"#;
    // LNbitsCashu/0.4.5, pubkey missing
    pub const INFO_LNBITS: &str = r#"{"name":"STPI Cashu Mint","version":"LNbitsCashu/0.5","description":"STPI mint","description_long":"","nuts":{"4":{"methods":[["bolt11","sat"]],"disabled":true}}}"#;

    // curl https://testnut.cashu.space/v1/keysets
    pub const KEYSETS: &str = r#"{"keysets":[{"id":"009a1f293253e41e","unit":"sat","active":true},{"id":"00c074b96c7e2b0e","unit":"usd","active":true},{"id":"I2yN+iRYfkzT","unit":"sat","active":false}]}"#;

    #[test]
    fn test_06_mint_information() {
        let js: MintInfo = serde_json::from_str(INFO).unwrap();
        assert_eq!(js.name, "Cashu test mint");
        assert_eq!(js.version, "Nutshell/0.15.3");
        assert!(js.pubkey.is_some());
        assert!(js.extra.contains_key("nuts"));

        // unknown fields survive a round trip through the store
        let back = serde_json::to_value(&js).unwrap();
        assert_eq!(back["nuts"]["7"]["supported"], true);
    }

    #[test]
    fn test_06_mint_information_lnbits() {
        let js: MintInfo = serde_json::from_str(INFO_LNBITS).unwrap();
        assert_eq!(js.name, "STPI Cashu Mint");
        assert_eq!(js.pubkey, None);
        assert_eq!(js.description_long.as_deref(), Some(""));
    }

    #[test]
    fn test_02_keysets() {
        #[derive(Deserialize)]
        struct Resp {
            keysets: Vec<Keyset>,
        }
        let js: Resp = serde_json::from_str(KEYSETS).unwrap();
        assert_eq!(js.keysets.len(), 3);
        assert_eq!(js.keysets[1], Keyset::new("00c074b96c7e2b0e", "usd", true));
        assert!(!js.keysets[2].active);
    }

    #[test]
    fn test_keyset_active_defaults_true() {
        let ks: Keyset = serde_json::from_str(r#"{"id":"00ad268c4d1f5826","unit":"sat"}"#).unwrap();
        assert!(ks.active);
    }

    #[test]
    fn test_proof_json() {
        let js = r#"{"id":"009a1f293253e41e","amount":8,"secret":"6bc1b36401c872b4","C":"034c57f5ce19a33d"}"#;
        let p: Proof = serde_json::from_str(js).unwrap();
        assert_eq!(p.amount, 8);
        assert_eq!(p.c, "034c57f5ce19a33d");
        assert!(!p.reserved);

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["C"], "034c57f5ce19a33d");
        assert_eq!(back["reserved"], false);
    }

    #[test]
    fn test_audit_secret_base64() {
        let audit = BlindSignatureAudit {
            signature: BlindSignature {
                id: "009a1f293253e41e".to_owned(),
                amount: 2,
                c: "02abcd".to_owned(),
            },
            amount: 2,
            secret: vec![0, 1, 2, 254, 255],
            id: "009a1f293253e41e".to_owned(),
            r: "0aff".to_owned(),
        };
        let js = serde_json::to_value(&audit).unwrap();
        assert_eq!(js["secret"], "AAEC/v8=");
        assert_eq!(js["signature"]["C_"], "02abcd");

        let back: BlindSignatureAudit = serde_json::from_value(js).unwrap();
        assert_eq!(back, audit);
    }

    #[test]
    fn test_sanitize_url() {
        #[rustfmt::skip]
        let cases = [
            ("  mint.example.com/  ", "https://mint.example.com"),
            ("http://mint.example.com", "http://mint.example.com"),
            ("http://mint.example.com/", "http://mint.example.com"),
            ("https://8333.space:3338///", "https://8333.space:3338"),
            ("mint.example.com/Bitcoin/", "https://mint.example.com/Bitcoin"),
            // uppercase scheme is not recognised as one
            ("HTTP://mint.example.com", "https://HTTP://mint.example.com"),
            ("", "https://"),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize_url(input), expected, "{:?}", input);
        }
    }

    #[test]
    fn test_unit_label() {
        assert_eq!(unit_label("sat"), "SAT");
        assert_eq!(unit_label("msat"), "mSAT");
        assert_eq!(unit_label("btc"), "btc");
    }
}
