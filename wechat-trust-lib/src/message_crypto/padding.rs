//! 32-byte block padding applied to the whole envelope.
//!
//! The platform pads to 32-byte blocks even though AES works on 16-byte
//! blocks, so this is not the cipher's own PKCS#7. The pad byte equals the
//! pad length, between 1 and 32; an aligned buffer receives a full 32-byte
//! block of padding.

/// Padding block size in bytes.
pub const BLOCK_SIZE: usize = 32;

/// Append padding to `buf`.
pub fn pad(buf: &mut Vec<u8>) {
    let amount = BLOCK_SIZE - (buf.len() % BLOCK_SIZE);
    buf.resize(buf.len() + amount, amount as u8);
}

/// Strip padding from `buf`.
///
/// A trailing byte outside `1..=32` (or larger than the buffer) means the
/// buffer carries no padding and it is returned unchanged.
pub fn unpad(buf: &[u8]) -> &[u8] {
    let Some(&last) = buf.last() else {
        return buf;
    };
    let amount = last as usize;
    if !(1..=BLOCK_SIZE).contains(&amount) || amount > buf.len() {
        return buf;
    }
    &buf[..buf.len() - amount]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_unaligned() {
        let mut buf = vec![0xAA; 30];
        pad(&mut buf);
        assert_eq!(buf.len(), 32);
        assert_eq!(&buf[30..], &[2, 2]);
    }

    #[test]
    fn test_pad_aligned_adds_full_block() {
        let mut buf = vec![0xAA; 64];
        pad(&mut buf);
        assert_eq!(buf.len(), 96);
        assert!(buf[64..].iter().all(|b| *b == 32));
    }

    #[test]
    fn test_pad_is_32_not_16() {
        // 20 bytes would need 12 bytes under 16-byte PKCS#7
        let mut buf = vec![0u8; 20];
        pad(&mut buf);
        assert_eq!(buf.len(), 32);
        assert_eq!(*buf.last().unwrap(), 12);

        let mut buf = vec![0u8; 40];
        pad(&mut buf);
        assert_eq!(buf.len(), 64);
        assert_eq!(*buf.last().unwrap(), 24);
    }

    #[test]
    fn test_unpad_roundtrip() {
        for len in 0..100 {
            let original: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut buf = original.clone();
            pad(&mut buf);
            assert_eq!(buf.len() % BLOCK_SIZE, 0);
            assert_eq!(unpad(&buf), original.as_slice());
        }
    }

    #[test]
    fn test_unpad_out_of_range_is_no_padding() {
        let buf = [1u8, 2, 3, 0];
        assert_eq!(unpad(&buf), &buf);

        let buf = [1u8, 2, 3, 33];
        assert_eq!(unpad(&buf), &buf);

        let buf = [5u8, 5];
        assert_eq!(unpad(&buf), &buf);

        assert!(unpad(&[]).is_empty());
    }
}
