//! C1 — Frame Codec: AES-256-CTR encrypt/decrypt of TC/TM frames.
//!
//! Grounded in the reference `encrypt_frame`/nonce derivation (SHA-256 over
//! timestamp/seq/src/dst/id/sat, sequence-parity IV half-select, AES-CTR
//! with the IV treated as a full 128-bit counter).
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::wire::{rebuild, FrameView};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Two 256-bit keys compiled in; `EXT_HDR_DATA == 1` selects `k1`, else `k0`.
#[derive(Clone)]
pub struct KeyRing {
    k0: [u8; 32],
    k1: [u8; 32],
}

impl KeyRing {
    pub fn new(k0: [u8; 32], k1: [u8; 32]) -> Self {
        Self { k0, k1 }
    }

    fn select(&self, ext_hdr_data: u8) -> &[u8; 32] {
        if ext_hdr_data == 1 {
            &self.k1
        } else {
            &self.k0
        }
    }
}

/// `N = TS ∥ SEQ ∥ SRC ∥ 0x00 ∥ DST ∥ 0x00 ∥ ID ∥ SAT ∥ 0x00` (14 bytes).
fn build_nonce_input(view: &FrameView) -> [u8; 14] {
    let mut n = [0u8; 14];
    n[0..4].copy_from_slice(view.timestamp());
    n[4..6].copy_from_slice(view.seq_bytes());
    n[6] = view.sa_id();
    n[7] = 0x00;
    n[8] = view.da_id();
    n[9] = 0x00;
    n[10..12].copy_from_slice(view.tc_tm_id());
    n[12] = view.sat_id();
    n[13] = 0x00;
    n
}

/// IV = SHA-256(N) halved by SEQ parity. SEQ is read big-endian for this
/// parity test even though the wire field itself is little-endian — a
/// literal carry-over from the upstream encoder that downstream decoders
/// must match byte-for-byte to stay interoperable.
fn derive_iv(view: &FrameView) -> [u8; 16] {
    let nonce_input = build_nonce_input(view);
    let digest = Sha256::digest(nonce_input);
    let seq_be = u16::from_be_bytes(*view.seq_bytes());
    let mut iv = [0u8; 16];
    if seq_be % 2 == 0 {
        iv.copy_from_slice(&digest[0..16]);
    } else {
        iv.copy_from_slice(&digest[16..32]);
    }
    iv
}

fn transform(frame_bytes: &[u8], keys: &KeyRing) -> Result<Vec<u8>, CoreError> {
    let view = FrameView::parse(frame_bytes)?;
    let key = keys.select(view.ext_hdr_data());
    let iv = derive_iv(&view);

    let mut region = view.encrypted_region().to_vec();
    let mut cipher = Aes256Ctr::new(key.into(), &iv.into());
    cipher.apply_keystream(&mut region);

    Ok(rebuild(view.header_prefix(), &region, view.trailer()))
}

/// Encrypt `PAYLOAD ∥ CRC`; CSP, fixed header, LEN, AUTH and EOF pass through
/// unchanged. Output length always equals input length (CTR is a stream
/// cipher, no padding).
pub fn encrypt_frame(frame_bytes: &[u8], keys: &KeyRing) -> Result<Vec<u8>, CoreError> {
    transform(frame_bytes, keys)
}

/// AES-CTR is an involution: decrypting runs the identical keystream XOR.
/// This function does not verify AUTH — callers that need integrity
/// checking must do it themselves against the returned frame's AUTH field.
pub fn decrypt_frame(frame_bytes: &[u8], keys: &KeyRing) -> Result<Vec<u8>, CoreError> {
    transform(frame_bytes, keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(payload: &[u8], seq: u16) -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&[0x98, 0xBA, 0x76, 0x00]);
        f.push(0xAA);
        f.push(0xBB);
        f.push(0x01);
        f.extend_from_slice(&[0x69, 0xC2, 0xDF, 0x00]);
        f.extend_from_slice(&seq.to_le_bytes());
        f.push(1);
        f.push(2);
        f.push(0);
        f.push(3);
        f.push(4);
        f.push(0);
        f.extend_from_slice(&[0x00, 0x04]);
        f.push(0);
        f.push(0); // EXT_HDR_DATA = 0 -> k0
        f.extend_from_slice(&[0, 0]);
        f.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        f.extend_from_slice(payload);
        f.push(0x00); // CRC
        f.extend_from_slice(&[0x11u8; 32]); // AUTH
        f.push(0xFF); // EOF
        f
    }

    fn test_keys() -> KeyRing {
        KeyRing::new([1u8; 32], [2u8; 32])
    }

    #[test]
    fn roundtrip_restores_original() {
        let keys = test_keys();
        let original = sample_frame(&[0x00, 0x04], 0x0300);
        let encrypted = encrypt_frame(&original, &keys).unwrap();
        assert_eq!(encrypted.len(), original.len());
        assert_ne!(&encrypted[27..27 + 3], &original[27..27 + 3]);
        let decrypted = decrypt_frame(&encrypted, &keys).unwrap();
        assert_eq!(decrypted, original);
    }

    #[test]
    fn csp_header_auth_eof_untouched() {
        let keys = test_keys();
        let original = sample_frame(&[0xde, 0xad, 0xbe, 0xef], 7);
        let encrypted = encrypt_frame(&original, &keys).unwrap();
        assert_eq!(encrypted[..27], original[..27]);
        let trailer_start = 27 + 4 + 1;
        assert_eq!(encrypted[trailer_start..], original[trailer_start..]);
    }

    #[test]
    fn even_and_odd_seq_use_different_iv_half() {
        let keys = test_keys();
        let even = sample_frame(&[0x01, 0x02, 0x03, 0x04], 0x0300);
        let odd = sample_frame(&[0x01, 0x02, 0x03, 0x04], 0x0301);
        let enc_even = encrypt_frame(&even, &keys).unwrap();
        let enc_odd = encrypt_frame(&odd, &keys).unwrap();
        assert_ne!(
            &enc_even[27..27 + 5],
            &enc_odd[27..27 + 5],
            "different SEQ parity must select a different IV half"
        );
    }
}
