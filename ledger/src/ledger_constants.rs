use lattice_core::{Account, Amount, Block, BlockHash, Link, Networks, PublicKey};
use once_cell::sync::Lazy;

static DEV_PUBLIC_KEY_DATA: &str =
    "7A1C49C2E6C4B3D0F1E52A0B9C8D7E6F5A4B3C2D1E0F9A8B7C6D5E4F3A2B1C0D";
static TEST_PUBLIC_KEY_DATA: &str =
    "3D7F0E2A9B1C4D5E6F708192A3B4C5D6E7F8091A2B3C4D5E6F708192A3B4C5D6";
static LIVE_PUBLIC_KEY_DATA: &str =
    "C4E1B2A3948576F6E5D4C3B2A1908F7E6D5C4B3A29180F7E6D5C4B3A2918F7E6";

pub static DEV_GENESIS_KEY: Lazy<PublicKey> =
    Lazy::new(|| PublicKey::decode_hex(DEV_PUBLIC_KEY_DATA).unwrap());
pub static DEV_GENESIS_ACCOUNT: Lazy<Account> = Lazy::new(|| (*DEV_GENESIS_KEY).into());
pub static DEV_GENESIS_BLOCK: Lazy<Block> = Lazy::new(|| genesis_block(*DEV_GENESIS_KEY));
pub static DEV_GENESIS_HASH: Lazy<BlockHash> = Lazy::new(|| DEV_GENESIS_BLOCK.hash());

pub static LEDGER_CONSTANTS_STUB: Lazy<LedgerConstants> = Lazy::new(LedgerConstants::dev);

/// The first block of the ledger opens the genesis account with the whole supply
fn genesis_block(key: PublicKey) -> Block {
    Block::new(
        key.into(),
        BlockHash::zero(),
        key,
        Amount::MAX,
        Link::zero(),
    )
}

#[derive(Clone)]
pub struct LedgerConstants {
    pub network: Networks,
    pub genesis_account: Account,
    pub genesis_block: Block,
    pub genesis_amount: Amount,
    pub burn_account: Account,
}

impl LedgerConstants {
    fn new(network: Networks, genesis_key: PublicKey) -> Self {
        Self {
            network,
            genesis_account: genesis_key.into(),
            genesis_block: genesis_block(genesis_key),
            genesis_amount: Amount::MAX,
            burn_account: Account::zero(),
        }
    }

    pub fn dev() -> Self {
        Self::new(Networks::Dev, *DEV_GENESIS_KEY)
    }

    pub fn test() -> Self {
        Self::new(
            Networks::Test,
            PublicKey::decode_hex(TEST_PUBLIC_KEY_DATA).unwrap(),
        )
    }

    pub fn live() -> Self {
        Self::new(
            Networks::Live,
            PublicKey::decode_hex(LIVE_PUBLIC_KEY_DATA).unwrap(),
        )
    }

    pub fn for_network(network: Networks) -> Self {
        match network {
            Networks::Dev | Networks::Invalid => Self::dev(),
            Networks::Test => Self::test(),
            Networks::Live => Self::live(),
        }
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_block.hash()
    }
}
