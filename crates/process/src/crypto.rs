//! Decryption of signed, AES-128-CBC encrypted text assets.
//!
//! Layout: a 128-byte signature block, 16 bytes from which the IV is derived,
//! then the PKCS#7-padded ciphertext. Key and IV are derived from a fixed
//! 32-byte mask: the key is the first half, the IV is the derivation block
//! XORed with the second half.

use crate::error::{ErrorKind, Result};
use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use exn::{OptionExt, ResultExt};

/// Hex encoding of the key/IV mask.
pub const MASK_HEX: &str = "554954704169383270484157776e7a7148524d4377506f6e4a4c49423357436c";
/// Length of the leading signature block.
pub const SIGNATURE_LEN: usize = 128;
const BLOCK_LEN: usize = 16;

fn mask() -> Result<[u8; 2 * BLOCK_LEN]> {
    let mut mask = [0; 2 * BLOCK_LEN];
    hex::decode_to_slice(MASK_HEX, &mut mask).or_raise(|| ErrorKind::Decrypt)?;
    Ok(mask)
}

/// Decrypt a signed asset, returning the unpadded plaintext.
///
/// Fails with [`Decrypt`](ErrorKind::Decrypt) when the data is too short, is
/// not block aligned or does not unpad cleanly.
pub fn decrypt(data: &[u8]) -> Result<Vec<u8>> {
    let payload = data.get(SIGNATURE_LEN..).ok_or_raise(|| ErrorKind::Decrypt)?;
    if payload.len() < 2 * BLOCK_LEN || payload.len() % BLOCK_LEN != 0 {
        exn::bail!(ErrorKind::Decrypt);
    }
    let mask = mask()?;
    let (head, ciphertext) = payload.split_at(BLOCK_LEN);
    let iv: [u8; BLOCK_LEN] = std::array::from_fn(|i| head[i] ^ mask[BLOCK_LEN + i]);
    let cipher = cbc::Decryptor::<Aes128>::new_from_slices(&mask[..BLOCK_LEN], &iv)
        .map_err(|_| exn::Exn::from(ErrorKind::Decrypt))?;
    cipher.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| exn::Exn::from(ErrorKind::Decrypt))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    /// Produce the signed layout [`decrypt`] expects.
    pub(crate) fn encrypt(plaintext: &[u8]) -> Vec<u8> {
        let mask = mask().unwrap();
        let head = [0x5a; BLOCK_LEN];
        let iv: [u8; BLOCK_LEN] = std::array::from_fn(|i| head[i] ^ mask[BLOCK_LEN + i]);
        let ciphertext = cbc::Encryptor::<Aes128>::new_from_slices(&mask[..BLOCK_LEN], &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let mut data = vec![0; SIGNATURE_LEN];
        data.extend_from_slice(&head);
        data.extend_from_slice(&ciphertext);
        data
    }

    #[test]
    fn test_mask_is_ascii_key() {
        assert_eq!(&mask().unwrap(), b"UITpAi82pHAWwnzqHRMCwPonJLIB3WCl");
    }

    #[test]
    fn test_decrypt() {
        let plaintext = br#"{"charId":"char_002_amiya","rarity":5}"#;
        assert_eq!(decrypt(&encrypt(plaintext)).unwrap(), plaintext);
    }

    #[test]
    fn test_decrypt_empty_plaintext() {
        assert_eq!(decrypt(&encrypt(b"")).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_rejects_short_data() {
        let err = decrypt(&[0; SIGNATURE_LEN + BLOCK_LEN]).unwrap_err();
        assert_eq!(*err, ErrorKind::Decrypt);
    }

    #[test]
    fn test_decrypt_rejects_misaligned_data() {
        let mut data = encrypt(b"print('hello')");
        data.pop();
        assert_eq!(*decrypt(&data).unwrap_err(), ErrorKind::Decrypt);
    }
}
