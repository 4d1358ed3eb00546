//! MJPEG byte-stream demuxing
//!
//! Pulls complete JPEG images out of a raw multipart/MJPEG byte stream by
//! scanning for SOI/EOI markers. Part headers and boundary lines between
//! images are discarded as leading garbage.

use bytes::{Buf, Bytes, BytesMut};

/// JPEG start-of-image marker
const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound for buffered bytes without a complete frame.
/// A stalled or corrupt stream otherwise grows the buffer indefinitely.
pub const MAX_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// Extract the next complete JPEG from the buffer, if one is present.
///
/// Consumes everything up to and including the returned frame. Returns
/// `None` when the buffer does not yet hold a complete image.
pub fn extract_jpeg(buf: &mut BytesMut) -> Option<Bytes> {
    let start = find(buf, &SOI)?;
    if start > 0 {
        buf.advance(start);
    }

    // Search for EOI after the SOI marker
    let end = find(&buf[SOI.len()..], &EOI)?;
    let total = SOI.len() + end + EOI.len();
    Some(buf.split_to(total).freeze())
}

/// True if the buffer has grown past the cap without yielding a frame
pub fn overflowed(buf: &BytesMut) -> bool {
    buf.len() > MAX_BUFFER_BYTES
}

fn find(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut v = vec![0xFF, 0xD8];
        v.extend_from_slice(body);
        v.extend_from_slice(&[0xFF, 0xD9]);
        v
    }

    #[test]
    fn test_extracts_single_frame() {
        let frame = jpeg(b"imagedata");
        let mut buf = BytesMut::from(&frame[..]);
        let out = extract_jpeg(&mut buf).expect("frame");
        assert_eq!(&out[..], &frame[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_skips_part_headers_before_soi() {
        let frame = jpeg(b"xyz");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        buf.extend_from_slice(&frame);
        let out = extract_jpeg(&mut buf).expect("frame");
        assert_eq!(&out[..], &frame[..]);
    }

    #[test]
    fn test_incomplete_frame_returns_none() {
        let mut buf = BytesMut::from(&[0xFF, 0xD8, 0x01, 0x02][..]);
        assert!(extract_jpeg(&mut buf).is_none());
        // Buffer keeps the partial frame for the next read
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_two_frames_extracted_in_order() {
        let a = jpeg(b"first");
        let b = jpeg(b"second");
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&a);
        buf.extend_from_slice(b"\r\n--frame\r\n\r\n");
        buf.extend_from_slice(&b);

        assert_eq!(&extract_jpeg(&mut buf).unwrap()[..], &a[..]);
        assert_eq!(&extract_jpeg(&mut buf).unwrap()[..], &b[..]);
        assert!(extract_jpeg(&mut buf).is_none());
    }

    #[test]
    fn test_no_soi_returns_none() {
        let mut buf = BytesMut::from(&b"not a jpeg at all"[..]);
        assert!(extract_jpeg(&mut buf).is_none());
    }
}
