use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Error, ErrorKind};
use std::str::FromStr;

pub const ACCOUNT_ID_SIZE: usize = 32;
const SS58_CHECKSUM_SIZE: usize = 2;

/// 32 byte account identifier, the raw form of a reward address.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccountId(pub [u8; ACCOUNT_ID_SIZE]);

impl AccountId {
    pub fn new(bytes: [u8; ACCOUNT_ID_SIZE]) -> Self {
        AccountId(bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != ACCOUNT_ID_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Invalid AccountId length, expected {ACCOUNT_ID_SIZE} got {}",
                    bytes.len()
                ),
            ));
        }
        let mut buf = [0u8; ACCOUNT_ID_SIZE];
        buf.copy_from_slice(bytes);
        Ok(AccountId(buf))
    }

    /// Decodes an SS58 address. The prefix is skipped and the checksum is not verified,
    /// only the embedded account id is used.
    pub fn from_ss58(address: &str) -> Result<Self, Error> {
        let data = bs58::decode(address).into_vec().map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Invalid SS58 Address {address}: {e}"),
            )
        })?;
        let prefix_len = match data.first() {
            Some(b) if *b < 64 => 1,
            Some(b) if *b < 128 => 2,
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("Invalid SS58 prefix for {address}"),
                ))
            }
        };
        if data.len() != prefix_len + ACCOUNT_ID_SIZE + SS58_CHECKSUM_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid SS58 Address length for {address}: {}", data.len()),
            ));
        }
        Self::parse(&data[prefix_len..prefix_len + ACCOUNT_ID_SIZE])
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(stripped) = s.strip_prefix("0x") {
            let bytes = hex::decode(stripped).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidData,
                    format!("Invalid hex AccountId {s}: {e}"),
                )
            })?;
            Self::parse(&bytes)
        } else {
            Self::from_ss58(s)
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}
