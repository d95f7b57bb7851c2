use serde::de::{Error, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::Formatter;
use std::marker::PhantomData;

/// Accepts block numbers as JSON numbers, decimal strings or `0x` prefixed hex strings.
pub fn parse_block_number<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct BlockNumber(PhantomData<fn() -> u64>);
    impl Visitor<'_> for BlockNumber {
        type Value = u64;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("block number as integer, decimal string or hex string")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u64::try_from(v).map_err(|_| Error::custom("Negative block number"))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(v)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            match v.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => v.parse::<u64>(),
            }
            .map_err(|_| Error::custom(format!("Invalid block number: {v}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(0)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(0)
        }
    }
    d.deserialize_any(BlockNumber(PhantomData))
}

/// Node's self-reported sync snapshot. `highestBlock` may be null while the node has no peers.
#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    #[serde(deserialize_with = "parse_block_number")]
    pub starting_block: u64,
    #[serde(deserialize_with = "parse_block_number")]
    pub current_block: u64,
    #[serde(default, deserialize_with = "parse_block_number")]
    pub highest_block: u64,
}

#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub peers: u64,
    pub is_syncing: bool,
    pub should_have_peers: bool,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub peer_id: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub best_hash: String,
    #[serde(default, deserialize_with = "parse_block_number")]
    pub best_number: u64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct Digest {
    pub logs: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub parent_hash: String,
    #[serde(deserialize_with = "parse_block_number")]
    pub number: u64,
    pub state_root: String,
    pub extrinsics_root: String,
    pub digest: Digest,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct Block {
    pub header: Header,
    #[serde(default)]
    pub extrinsics: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
pub struct SignedBlock {
    pub block: Block,
    #[serde(default)]
    pub justifications: Option<Value>,
}

/// Runtime event with its pallet/variant name and field values, as produced by an event decoder.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
pub struct ChainEvent {
    pub pallet: String,
    pub name: String,
    pub fields: Vec<Value>,
}
impl ChainEvent {
    pub fn is(&self, pallet: &str, name: &str) -> bool {
        self.pallet.eq_ignore_ascii_case(pallet) && self.name.eq_ignore_ascii_case(name)
    }
}
