use crate::address::{AccountId, ACCOUNT_ID_SIZE};
use crate::chain::Header;
use std::io::{Error, ErrorKind};

pub const SUBSPACE_ENGINE_ID: [u8; 4] = *b"SUB_";

const DIGEST_OTHER: u8 = 0;
const DIGEST_CONSENSUS: u8 = 4;
const DIGEST_SEAL: u8 = 5;
const DIGEST_PRE_RUNTIME: u8 = 6;
const DIGEST_RUNTIME_ENVIRONMENT_UPDATED: u8 = 8;

fn truncated(what: &str) -> Error {
    Error::new(
        ErrorKind::UnexpectedEof,
        format!("Unexpected end of input reading {what}"),
    )
}

/// Decodes a SCALE compact integer, returning the value and the number of bytes consumed.
pub fn decode_compact(bytes: &[u8]) -> Result<(u64, usize), Error> {
    let first = *bytes.first().ok_or_else(|| truncated("compact prefix"))?;
    match first & 0b11 {
        0b00 => Ok((u64::from(first >> 2), 1)),
        0b01 => {
            let raw = bytes.get(..2).ok_or_else(|| truncated("compact u16"))?;
            Ok((u64::from(u16::from_le_bytes([raw[0], raw[1]]) >> 2), 2))
        }
        0b10 => {
            let raw = bytes.get(..4).ok_or_else(|| truncated("compact u32"))?;
            Ok((
                u64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) >> 2),
                4,
            ))
        }
        _ => {
            let len = usize::from(first >> 2) + 4;
            if len > 8 {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("Compact integer of {len} bytes does not fit in u64"),
                ));
            }
            let raw = bytes.get(1..=len).ok_or_else(|| truncated("compact big integer"))?;
            let mut buf = [0u8; 8];
            buf[..len].copy_from_slice(raw);
            Ok((u64::from_le_bytes(buf), len + 1))
        }
    }
}

pub fn encode_compact(value: u64) -> Vec<u8> {
    if value < 1 << 6 {
        vec![(value as u8) << 2]
    } else if value < 1 << 14 {
        (((value as u16) << 2) | 0b01).to_le_bytes().to_vec()
    } else if value < 1 << 30 {
        (((value as u32) << 2) | 0b10).to_le_bytes().to_vec()
    } else {
        let bytes = value.to_le_bytes();
        let len = 8 - (value.leading_zeros() / 8) as usize;
        let mut out = vec![(((len - 4) as u8) << 2) | 0b11];
        out.extend_from_slice(&bytes[..len]);
        out
    }
}

fn decode_vec(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let (len, offset) = decode_compact(bytes)?;
    let end = offset
        .checked_add(len as usize)
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Digest length overflow"))?;
    bytes
        .get(offset..end)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| truncated("digest payload"))
}

fn engine_id(bytes: &[u8]) -> Result<[u8; 4], Error> {
    let raw = bytes.get(..4).ok_or_else(|| truncated("engine id"))?;
    Ok([raw[0], raw[1], raw[2], raw[3]])
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DigestItem {
    PreRuntime([u8; 4], Vec<u8>),
    Consensus([u8; 4], Vec<u8>),
    Seal([u8; 4], Vec<u8>),
    Other(Vec<u8>),
    RuntimeEnvironmentUpdated,
}
impl DigestItem {
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let (kind, rest) = bytes.split_first().ok_or_else(|| truncated("digest item"))?;
        match *kind {
            DIGEST_PRE_RUNTIME => Ok(DigestItem::PreRuntime(
                engine_id(rest)?,
                decode_vec(&rest[4..])?,
            )),
            DIGEST_CONSENSUS => Ok(DigestItem::Consensus(
                engine_id(rest)?,
                decode_vec(&rest[4..])?,
            )),
            DIGEST_SEAL => Ok(DigestItem::Seal(engine_id(rest)?, decode_vec(&rest[4..])?)),
            DIGEST_OTHER => Ok(DigestItem::Other(decode_vec(rest)?)),
            DIGEST_RUNTIME_ENVIRONMENT_UPDATED => Ok(DigestItem::RuntimeEnvironmentUpdated),
            other => Err(Error::new(
                ErrorKind::InvalidData,
                format!("Unknown digest item type: {other}"),
            )),
        }
    }

    pub fn decode_hex(log: &str) -> Result<Self, Error> {
        let bytes = hex::decode(log.trim_start_matches("0x")).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("Invalid digest log hex: {e}"),
            )
        })?;
        Self::decode(&bytes)
    }

    pub fn encode(&self) -> Vec<u8> {
        let (kind, engine, data) = match self {
            DigestItem::PreRuntime(e, d) => (DIGEST_PRE_RUNTIME, Some(e), d.as_slice()),
            DigestItem::Consensus(e, d) => (DIGEST_CONSENSUS, Some(e), d.as_slice()),
            DigestItem::Seal(e, d) => (DIGEST_SEAL, Some(e), d.as_slice()),
            DigestItem::Other(d) => (DIGEST_OTHER, None, d.as_slice()),
            DigestItem::RuntimeEnvironmentUpdated => {
                return vec![DIGEST_RUNTIME_ENVIRONMENT_UPDATED]
            }
        };
        let mut out = vec![kind];
        if let Some(engine) = engine {
            out.extend_from_slice(engine);
        }
        out.extend(encode_compact(data.len() as u64));
        out.extend_from_slice(data);
        out
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Solution {
    pub public_key: AccountId,
    pub reward_address: AccountId,
}

/// Block production proof carried in the pre-runtime digest.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PreDigest {
    pub slot: u64,
    pub solution: Solution,
}
impl PreDigest {
    pub const SIZE: usize = 8 + 2 * ACCOUNT_ID_SIZE;

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < Self::SIZE {
            return Err(truncated("pre-digest"));
        }
        let mut slot = [0u8; 8];
        slot.copy_from_slice(&bytes[..8]);
        Ok(PreDigest {
            slot: u64::from_le_bytes(slot),
            solution: Solution {
                public_key: AccountId::parse(&bytes[8..8 + ACCOUNT_ID_SIZE])?,
                reward_address: AccountId::parse(&bytes[8 + ACCOUNT_ID_SIZE..Self::SIZE])?,
            },
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.slot.to_le_bytes().to_vec();
        out.extend_from_slice(&self.solution.public_key.0);
        out.extend_from_slice(&self.solution.reward_address.0);
        out
    }
}

/// Finds the block producer's pre-runtime digest in the header's digest logs.
pub fn find_pre_digest(header: &Header) -> Result<PreDigest, Error> {
    for log in &header.digest.logs {
        if let DigestItem::PreRuntime(engine, data) = DigestItem::decode_hex(log)? {
            if engine == SUBSPACE_ENGINE_ID {
                return PreDigest::decode(&data);
            }
        }
    }
    Err(Error::new(
        ErrorKind::NotFound,
        format!("No pre-runtime digest found in block {}", header.number),
    ))
}
