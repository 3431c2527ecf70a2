//! Byte-exact TC/TM frame layout.
//!
//! ```text
//! [CSP 4B BE][SOF1 1B][SOF2 1B][CTRL 1B][TIMESTAMP 4B LE]
//! [SEQ 2B LE][SAT_ID 1B][GND_ID 1B][QOS 1B][SA_ID 1B][DA_ID 1B][RM_ID 1B]
//! [TC/TM_ID 2B BE][EXT_HDR_LEN 1B][EXT_HDR_DATA 1B][CO_ID 2B]
//! [LEN 2B LE][PAYLOAD LEN bytes][CRC 1B][AUTH 32B][EOF 1B]
//! ```
use crate::error::CoreError;

/// Offset of the `LEN` field.
const OFF_LEN: usize = 25;
/// Offset where the variable-length payload body begins.
const OFF_PAYLOAD: usize = 27;
const AUTH_LEN: usize = 32;
/// Bytes of fixed header + trailer (payload excluded): 27 header + 1 CRC + 32 AUTH + 1 EOF.
const FIXED_OVERHEAD: usize = OFF_PAYLOAD + 1 + AUTH_LEN + 1;

/// A parsed view over a frame buffer. Holds no owned bytes; all accessors
/// slice into the buffer it was built from.
pub struct FrameView<'a> {
    buf: &'a [u8],
    payload_len: usize,
}

impl<'a> FrameView<'a> {
    /// Validate `buf` against the fixed layout and return a view into it.
    pub fn parse(buf: &'a [u8]) -> Result<Self, CoreError> {
        if buf.len() < OFF_PAYLOAD + 2 {
            return Err(CoreError::FrameFormat(format!(
                "buffer too short for fixed header: {} bytes",
                buf.len()
            )));
        }
        let payload_len = u16::from_le_bytes([buf[OFF_LEN], buf[OFF_LEN + 1]]) as usize;
        let expected = FIXED_OVERHEAD + payload_len;
        if buf.len() != expected {
            return Err(CoreError::FrameFormat(format!(
                "LEN={} implies frame of {} bytes, got {}",
                payload_len,
                expected,
                buf.len()
            )));
        }
        Ok(Self { buf, payload_len })
    }

    pub fn csp(&self) -> &[u8] {
        &self.buf[0..4]
    }

    pub fn timestamp(&self) -> &[u8; 4] {
        self.buf[7..11].try_into().unwrap()
    }

    pub fn seq_bytes(&self) -> &[u8; 2] {
        self.buf[11..13].try_into().unwrap()
    }

    pub fn seq_le(&self) -> u16 {
        u16::from_le_bytes(*self.seq_bytes())
    }

    pub fn sat_id(&self) -> u8 {
        self.buf[13]
    }

    pub fn sa_id(&self) -> u8 {
        self.buf[16]
    }

    pub fn da_id(&self) -> u8 {
        self.buf[17]
    }

    pub fn tc_tm_id(&self) -> &[u8; 2] {
        self.buf[19..21].try_into().unwrap()
    }

    pub fn ext_hdr_data(&self) -> u8 {
        self.buf[22]
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// `PAYLOAD ∥ CRC` — the encrypted region.
    pub fn encrypted_region(&self) -> &[u8] {
        &self.buf[OFF_PAYLOAD..OFF_PAYLOAD + self.payload_len + 1]
    }

    pub fn auth(&self) -> &[u8] {
        let start = OFF_PAYLOAD + self.payload_len + 1;
        &self.buf[start..start + AUTH_LEN]
    }

    pub fn eof(&self) -> u8 {
        self.buf[self.buf.len() - 1]
    }

    /// Everything outside the encrypted region, for invariant checks and
    /// for re-stitching a transformed frame.
    pub fn header_prefix(&self) -> &[u8] {
        &self.buf[..OFF_PAYLOAD]
    }

    pub fn trailer(&self) -> &[u8] {
        let start = OFF_PAYLOAD + self.payload_len + 1;
        &self.buf[start..]
    }
}

/// Rebuild a full frame from an unchanged prefix/trailer and a (possibly
/// transformed) encrypted region. `new_region` must be the same length as
/// the original (`PAYLOAD ∥ CRC`); CTR mode guarantees this.
pub fn rebuild(prefix: &[u8], new_region: &[u8], trailer: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + new_region.len() + trailer.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(new_region);
    out.extend_from_slice(trailer);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(payload: &[u8]) -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&[0x98, 0xBA, 0x76, 0x00]); // CSP
        f.push(0xAA); // SOF1
        f.push(0xBB); // SOF2
        f.push(0x01); // CTRL
        f.extend_from_slice(&[0, 0, 0, 0]); // TIMESTAMP
        f.extend_from_slice(&0x0300u16.to_le_bytes()); // SEQ even
        f.push(1); // SAT_ID
        f.push(2); // GND_ID
        f.push(0); // QOS
        f.push(3); // SA_ID
        f.push(4); // DA_ID
        f.push(0); // RM_ID
        f.extend_from_slice(&[0x00, 0x04]); // TC/TM_ID BE
        f.push(0); // EXT_HDR_LEN
        f.push(0); // EXT_HDR_DATA
        f.extend_from_slice(&[0, 0]); // CO_ID
        f.extend_from_slice(&(payload.len() as u16).to_le_bytes()); // LEN
        f.extend_from_slice(payload);
        f.push(0x00); // CRC
        f.extend_from_slice(&[0u8; 32]); // AUTH
        f.push(0xFF); // EOF
        f
    }

    #[test]
    fn parses_fixed_layout() {
        let raw = sample_frame(&[0x00, 0x04]);
        let view = FrameView::parse(&raw).unwrap();
        assert_eq!(view.payload_len(), 2);
        assert_eq!(view.csp(), &[0x98, 0xBA, 0x76, 0x00]);
        assert_eq!(view.seq_le(), 0x0300);
        assert_eq!(view.encrypted_region(), &[0x00, 0x04, 0x00]);
        assert_eq!(view.eof(), 0xFF);
    }

    #[test]
    fn rejects_len_mismatch() {
        let mut raw = sample_frame(&[0x00, 0x04]);
        raw.pop();
        assert!(FrameView::parse(&raw).is_err());
    }
}
