/// Generates a 32 byte value type (accounts, hashes, roots, links) with
/// hex formatting, serde support and conversions from small integers.
macro_rules! u256_struct {
    ($name:ident) => {
        #[derive(PartialEq, Eq, Hash, Clone, Copy, Default, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        #[allow(dead_code)]
        impl $name {
            pub const fn zero() -> Self {
                Self([0; 32])
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0; 32]
            }

            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let bytes: [u8; 32] = bytes.try_into().ok()?;
                Some(Self(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn number(&self) -> primitive_types::U256 {
                primitive_types::U256::from_big_endian(&self.0)
            }

            pub fn random() -> Self {
                Self(rand::random::<[u8; 32]>())
            }

            /// Returns the value that directly follows this one, or None at the maximum
            pub fn inc(&self) -> Option<Self> {
                let (value, overflow) = self.number().overflowing_add(primitive_types::U256::one());
                if overflow {
                    None
                } else {
                    Some(Self::from(value))
                }
            }

            pub fn encode_hex(&self) -> String {
                let mut result = String::with_capacity(64);
                for byte in self.0 {
                    result.push_str(&format!("{:02X}", byte));
                }
                result
            }

            pub fn decode_hex(s: impl AsRef<str>) -> anyhow::Result<Self> {
                let s = s.as_ref();
                if s.is_empty() || s.len() > 64 {
                    anyhow::bail!("invalid hex string length: {}", s.len());
                }
                let padded = format!("{:0>64}", s);
                let mut bytes = [0u8; 32];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = u8::from_str_radix(&padded[i * 2..i * 2 + 2], 16)?;
                }
                Ok(Self(bytes))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&value.to_be_bytes());
                Self(bytes)
            }
        }

        impl From<primitive_types::U256> for $name {
            fn from(value: primitive_types::U256) -> Self {
                let mut bytes = [0u8; 32];
                value.to_big_endian(&mut bytes);
                Self(bytes)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                crate::write_hex_bytes(&self.0, f)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                crate::write_hex_bytes(&self.0, f)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.encode_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let value = <String as serde::Deserialize>::deserialize(deserializer)?;
                $name::decode_hex(value).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use u256_struct;
