//! Encoded token
//!
//! The wire form exchanged between wallets: `cashuA` followed by the url safe base64 encoding of
//! the JSON token. Padding is optional on decode. A decoded token encodes back to the exact string
//! it was read from as long as its content is unchanged.

use std::fmt;
use std::str::FromStr;

use bitcoin::base64::engine::{general_purpose, GeneralPurpose};
use bitcoin::base64::{alphabet, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::mint_url::MintUrl;
use crate::proof::{Proofs, ProofsMethods};
use crate::{ensure_cashu, Amount};

const TOKEN_PREFIX: &str = "cashuA";

/// Proofs of a single mint inside a [`Token`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Url of mint
    pub mint: MintUrl,
    /// [`Proofs`]
    pub proofs: Proofs,
}

/// Token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Proofs in [`Token`] by mint
    pub token: Vec<TokenEntry>,
    /// Memo for token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Token Unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// String the token was decoded from
    #[serde(skip)]
    encoded: Option<String>,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token && self.memo == other.memo && self.unit == other.unit
    }
}

impl Eq for Token {}

impl Token {
    /// Create new [`Token`] bound to a single mint
    pub fn new(mint_url: MintUrl, proofs: Proofs, memo: Option<String>) -> Result<Self, Error> {
        ensure_cashu!(!proofs.is_empty(), Error::ProofsRequired);

        Ok(Self {
            token: vec![TokenEntry {
                mint: mint_url,
                proofs,
            }],
            memo,
            unit: None,
            encoded: None,
        })
    }

    /// All proofs of the token regardless of mint
    pub fn proofs(&self) -> Proofs {
        self.token
            .iter()
            .flat_map(|t| t.proofs.iter().cloned())
            .collect()
    }

    /// Sum of all proof amounts
    #[inline]
    pub fn value(&self) -> Result<Amount, Error> {
        Ok(Amount::try_sum(
            self.token
                .iter()
                .map(|t| t.proofs.total_amount())
                .collect::<Result<Vec<Amount>, _>>()?,
        )?)
    }

    /// Memo
    #[inline]
    pub fn memo(&self) -> &Option<String> {
        &self.memo
    }

    /// The one mint this token belongs to
    ///
    /// A token naming several mints is ambiguous and is rejected, as is a token naming none.
    pub fn mint_url(&self) -> Result<MintUrl, Error> {
        match self.token.as_slice() {
            [] => Err(Error::TokenMintUndefined),
            [entry] => Ok(entry.mint.clone()),
            [first, rest @ ..] => {
                if rest.iter().all(|entry| entry.mint == first.mint) {
                    Ok(first.mint.clone())
                } else {
                    Err(Error::MultiMintTokenNotSupported)
                }
            }
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let s = trimmed
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(Error::UnsupportedToken)?;

        let decode_config = general_purpose::GeneralPurposeConfig::new()
            .with_decode_padding_mode(bitcoin::base64::engine::DecodePaddingMode::Indifferent);
        let decoded = GeneralPurpose::new(&alphabet::URL_SAFE, decode_config).decode(s)?;
        let decoded_str = String::from_utf8(decoded)?;
        let mut token: Token = serde_json::from_str(&decoded_str)?;
        token.encoded = Some(trimmed.to_string());
        Ok(token)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(encoded) = &self.encoded {
            // Fields are public, reuse the original only if it still decodes to this token
            if Token::from_str(encoded).is_ok_and(|original| original == *self) {
                return write!(f, "{encoded}");
            }
        }

        let json_string = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        let encoded = general_purpose::URL_SAFE.encode(json_string);
        write!(f, "{TOKEN_PREFIX}{encoded}")
    }
}
