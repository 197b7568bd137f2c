use std::fmt;
use strum::{AsRefStr, Display, EnumIs};

use serde::{Deserialize, Serialize};

/// which mint call a sync failure came from
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
//
#[derive(Display, AsRefStr, EnumIs)]
pub enum SyncStage {
    #[strum(serialize = "mint info")]
    Info,
    #[strum(serialize = "mint keysets")]
    Keysets,
    #[strum(serialize = "mint keys")]
    Keys,
}

#[derive(Debug)]
//
#[derive(EnumIs, thiserror::Error)]
pub enum MintError {
    #[error("No active mint")]
    NoActiveMint,
    #[error("Mint not found: {0}")]
    MintNotFound(String),
    /// keyset known but no keys cached for it
    #[error("Keys not found: {0}")]
    KeysNotFound(String),
    /// keyset id not listed by any known mint
    #[error("Keyset not found: {0}")]
    KeysetNotFound(String),
    #[error("Unit not supported by mint: {0}")]
    UnsupportedUnit(String),
    #[error("Could not get {stage}: {source}")]
    Sync {
        stage: SyncStage,
        #[source]
        source: ClientError,
    },
    /// mint answered with an explicit error field
    #[error("Mint error: {0}")]
    MintProtocol(String),
    #[error("Duplicate proof secret: {0}")]
    DuplicateProof(String),
    /// custum error
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl MintError {
    pub fn sync(stage: SyncStage) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::Sync { stage, source }
    }

    /// NotFound family of the taxonomy
    pub fn is_not_found(&self) -> bool {
        self.is_no_active_mint()
            || self.is_mint_not_found()
            || self.is_keys_not_found()
            || self.is_keyset_not_found()
    }

    /// failures caused by the mint or the network rather than local state
    pub fn is_external(&self) -> bool {
        self.is_sync() || self.is_mint_protocol()
    }
}

#[derive(Debug)]
//
#[derive(EnumIs)]
pub enum ClientError {
    /// Json error
    Json(serde_json::Error),
    /// transport failed before a response was read
    Transport(String),
    /// mint returns Error: <code, detail/error>
    Mint(i32, String),
    /// unknown http response
    UnknownResponse(i32, String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> ClientError {
        Self::Json(err)
    }
}

impl std::error::Error for ClientError {}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ClientError::*;

        match &self {
            Json(err) => write!(f, "{}", err),
            Transport(err) => write!(f, "{}", err),
            Mint(code, err) => write!(f, "{} {}", code, err),
            UnknownResponse(code, body) => {
                write!(f, "mint returns unknown response(code: {}): {}", code, body)
            }
        }
    }
}

// erros has not NUT now,
// 0.13 become detail, before is error
// https://github.com/cashubtc/cashu/blob/main/cashu/core/errors.py#L38
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintErrorResponse {
    #[serde(default)]
    code: i32,
    error: Option<String>,
    detail: Option<String>,
}

/// Response decoding for `MintApi` implementations over http.
impl ClientError {
    pub fn from_body(body: &str) -> Result<Self, anyhow::Error> {
        let mut json: MintErrorResponse = serde_json::from_str(body)?;

        let detail = json.detail.take().or_else(|| json.error.take());

        let e = Self::Mint(json.code, detail.unwrap_or_else(|| body.to_owned()));

        Ok(e)
    }

    pub fn try_parse<T: serde::de::DeserializeOwned>(body: &str, httpcode: i32) -> Result<T, Self> {
        let js = serde_json::from_str::<T>(body);

        match js {
            Ok(res) => Ok(res),
            Err(_) => {
                let e = Self::from_body(body)
                    .map_err(|_| Self::UnknownResponse(httpcode, body.to_owned()))?;
                Err(e)
            }
        }
    }
}

/// Raise `MintProtocol` when a mint response carries a non-null `error` (or `detail`).
pub fn assert_mint_error(response: &serde_json::Value) -> Result<(), MintError> {
    let field = response
        .get("error")
        .filter(|e| !e.is_null())
        .or_else(|| response.get("detail").filter(|e| !e.is_null()));

    match field {
        None => Ok(()),
        Some(serde_json::Value::String(s)) => Err(MintError::MintProtocol(s.clone())),
        Some(other) => Err(MintError::MintProtocol(other.to_string())),
    }
}
