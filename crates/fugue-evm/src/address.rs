//! Contract address derivation

use fugue_primitives::{Address, H256};
use rlp::RlpStream;

fn from_hash(hash: H256) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// CREATE: `keccak256(rlp([sender, nonce]))[12..]`
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    from_hash(fugue_crypto::keccak256(&stream.out()))
}

/// CREATE2: `keccak256(0xff ++ sender ++ salt ++ keccak256(init_code))[12..]`
pub fn create2_address(sender: &Address, salt: &[u8; 32], init_code_hash: &H256) -> Address {
    let mut buf = [0u8; 85];
    buf[0] = 0xff;
    buf[1..21].copy_from_slice(sender.as_bytes());
    buf[21..53].copy_from_slice(salt);
    buf[53..].copy_from_slice(init_code_hash.as_bytes());
    from_hash(fugue_crypto::keccak256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_address() {
        let sender = Address::from_hex("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
        assert_eq!(
            create_address(&sender, 0),
            Address::from_hex("0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d").unwrap()
        );
        assert_eq!(
            create_address(&sender, 1),
            Address::from_hex("0x343c43a37d37dff08ae8c4a11544c718abb4fcf8").unwrap()
        );
    }

    // EIP-1014 example 0
    #[test]
    fn test_create2_address() {
        let init_hash = fugue_crypto::keccak256(&[0x00]);
        assert_eq!(
            create2_address(&Address::ZERO, &[0u8; 32], &init_hash),
            Address::from_hex("0x4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38").unwrap()
        );
    }
}
