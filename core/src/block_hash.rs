use crate::u256_struct::u256_struct;
use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};

u256_struct!(BlockHash);

pub struct BlockHashBuilder {
    blake: Blake2bVar,
}

impl Default for BlockHashBuilder {
    fn default() -> Self {
        Self {
            blake: Blake2bVar::new(32).unwrap(),
        }
    }
}

impl BlockHashBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn update(mut self, data: impl AsRef<[u8]>) -> Self {
        self.blake.update(data.as_ref());
        self
    }

    pub fn build(self) -> BlockHash {
        let mut hash_bytes = [0u8; 32];
        self.blake.finalize_variable(&mut hash_bytes).unwrap();
        BlockHash::from_bytes(hash_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        let a = BlockHashBuilder::new().update([1, 2, 3]).build();
        let b = BlockHashBuilder::new().update([1, 2, 3]).build();
        assert_eq!(a, b);
        assert!(!a.is_zero());
    }

    #[test]
    fn different_input_different_hash() {
        let a = BlockHashBuilder::new().update([1, 2, 3]).build();
        let b = BlockHashBuilder::new().update([1, 2, 4]).build();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_round_trip() {
        let hash = BlockHash::from(0x1234);
        let decoded = BlockHash::decode_hex(hash.encode_hex()).unwrap();
        assert_eq!(decoded, hash);
        assert_eq!(BlockHash::decode_hex("1234").unwrap(), hash);
    }
}
