use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity provider a principal was registered through.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Local,
    Google,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Local => write!(f, "LOCAL"),
            Provider::Google => write!(f, "GOOGLE"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Provider::Local),
            "GOOGLE" => Ok(Provider::Google),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Role a signed token plays in the pair.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "ACCESS"),
            TokenKind::Refresh => write!(f, "REFRESH"),
        }
    }
}

/// Remediation step pending against a revoked token id. The revocation list
/// stores these per claim key; they are surfaced to the caller when the
/// entry is inspected.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationAction {
    InvalidateClaim,
    ForceReauth,
}

impl fmt::Display for RevocationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationAction::InvalidateClaim => write!(f, "INVALIDATE_CLAIM"),
            RevocationAction::ForceReauth => write!(f, "FORCE_REAUTH"),
        }
    }
}

impl std::str::FromStr for RevocationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVALIDATE_CLAIM" => Ok(RevocationAction::InvalidateClaim),
            "FORCE_REAUTH" => Ok(RevocationAction::ForceReauth),
            other => Err(format!("unknown revocation action: {other}")),
        }
    }
}
