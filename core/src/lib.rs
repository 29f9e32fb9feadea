#[macro_use]
extern crate num_derive;

mod u256_struct;
use u256_struct::u256_struct;

mod account_info;
pub use account_info::AccountInfo;

mod amount;
pub use amount::{Amount, RAW_PER_NANO};

mod block_hash;
pub use block_hash::{BlockHash, BlockHashBuilder};

mod blocks;
pub use blocks::*;

mod confirmation_height_info;
pub use confirmation_height_info::ConfirmationHeightInfo;

mod pending_key;
pub use pending_key::{PendingInfo, PendingKey};

mod qualified_root;
pub use qualified_root::QualifiedRoot;

mod vote;
pub use vote::{Signature, Vote, VoteCode, VoteSource};

pub mod utils;

use serde::{Deserialize, Serialize};

u256_struct!(Account);
u256_struct!(PublicKey);
u256_struct!(Root);
u256_struct!(Link);

macro_rules! convert_u256 {
    ($from:ident => $($to:ident),+) => {
        $(
            impl From<$from> for $to {
                fn from(value: $from) -> Self {
                    $to::from_bytes(*value.as_bytes())
                }
            }
        )+
    };
}

convert_u256!(Account => PublicKey, Root, Link);
convert_u256!(PublicKey => Account, Root, Link);
convert_u256!(BlockHash => Root, Link);
convert_u256!(Root => Account, BlockHash);
convert_u256!(Link => Account, BlockHash, PublicKey);

pub(crate) fn write_hex_bytes(bytes: &[u8], f: &mut std::fmt::Formatter) -> std::fmt::Result {
    for &byte in bytes {
        write!(f, "{:02X}", byte)?;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, FromPrimitive)]
#[serde(rename_all = "snake_case")]
pub enum Networks {
    Invalid,
    /// Low work parameters, publicly known genesis key, dev IP ports
    Dev,
    /// Normal work parameters, secret test genesis key, test IP ports
    Test,
    /// Normal work parameters, secret live key, live IP ports
    Live,
}

impl Networks {
    pub fn as_str(&self) -> &'static str {
        match self {
            Networks::Invalid => "invalid",
            Networks::Dev => "dev",
            Networks::Test => "test",
            Networks::Live => "live",
        }
    }
}

impl std::str::FromStr for Networks {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Networks::Dev),
            "test" => Ok(Networks::Test),
            "live" => Ok(Networks::Live),
            _ => Err(anyhow::anyhow!("invalid network: {s}")),
        }
    }
}
