//! RFC 6455 §5.2 frame serialization.

use super::Frame;

/// Serializes `frame` to its wire bytes. If `frame.mask` is set, the
/// payload is masked in the output (the frame's own `payload` field is
/// left untouched — masking happens on a copy).
///
/// Panics if `frame.opcode` doesn't fit in 4 bits — only reachable via
/// `OpCode::Reserved` built directly with an out-of-range byte, since
/// every opcode this crate decodes off the wire is already masked to its
/// low nibble. This is a programmer error, not a wire condition (see
/// `Error::OpcodeOutOfRange`).
pub fn serialize_frame(frame: &Frame) -> Vec<u8> {
    let opcode = frame.opcode.to_nibble();
    assert!(
        opcode <= 0x0F,
        "frame opcode {opcode:#x} exceeds 4 bits"
    );

    let mut out = Vec::with_capacity(frame.payload.len() + 14);

    let first = (frame.fin as u8) << 7
        | (frame.rsv1 as u8) << 6
        | (frame.rsv2 as u8) << 5
        | (frame.rsv3 as u8) << 4
        | opcode;
    out.push(first);

    let mask_bit = if frame.mask.is_some() { 0x80 } else { 0x00 };
    let len = frame.payload.len();
    if len < 126 {
        out.push(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if let Some(mask) = frame.mask {
        out.extend_from_slice(&mask);
        out.extend(
            frame
                .payload
                .iter()
                .enumerate()
                .map(|(i, b)| b ^ mask[i % 4]),
        );
    } else {
        out.extend_from_slice(&frame.payload);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::OpCode;
    use bytes::Bytes;

    #[test]
    fn masked_short_frame_matches_known_wire_bytes() {
        // "ab" masked with key 01 02 03 04 — matches the worked example
        // this crate's test suite checks end to end.
        let frame = Frame {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Text,
            mask: Some([0x01, 0x02, 0x03, 0x04]),
            payload: Bytes::from_static(b"ab"),
        };
        let raw = serialize_frame(&frame);
        assert_eq!(raw, vec![0x81, 0x82, 0x01, 0x02, 0x03, 0x04, b'a' ^ 1, b'b' ^ 2]);
    }

    #[test]
    fn reserved_bits_round_trip_through_the_first_byte() {
        // fin=false, rsv={T,F,T}, opcode=7, masked with key 01 02 03 04,
        // payload [1,2,3,4,5] — the worked example from the design spec's
        // end-to-end scenarios.
        let frame = Frame {
            fin: false,
            rsv1: true,
            rsv2: false,
            rsv3: true,
            opcode: OpCode::from_nibble(7),
            mask: Some([0x01, 0x02, 0x03, 0x04]),
            payload: Bytes::from_static(&[1, 2, 3, 4, 5]),
        };
        let raw = serialize_frame(&frame);
        let expected_payload: Vec<u8> = [1u8, 2, 3, 4, 5]
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ [0x01, 0x02, 0x03, 0x04][i % 4])
            .collect();
        let mut expected = vec![0x57, 0x85, 0x01, 0x02, 0x03, 0x04];
        expected.extend_from_slice(&expected_payload);
        assert_eq!(raw, expected);
    }

    #[test]
    fn unmasked_frame_has_no_mask_bytes() {
        let frame = Frame::text(Bytes::from_static(b"hi"));
        let raw = serialize_frame(&frame);
        assert_eq!(raw, vec![0x81, 0x02, b'h', b'i']);
    }

    #[test]
    fn extended_length_16_bit() {
        let payload = vec![0u8; 300];
        let frame = Frame::binary(payload.clone());
        let raw = serialize_frame(&frame);
        assert_eq!(raw[0], 0x82);
        assert_eq!(raw[1], 126);
        assert_eq!(u16::from_be_bytes([raw[2], raw[3]]), 300);
        assert_eq!(&raw[4..], &payload[..]);
    }

    #[test]
    #[should_panic(expected = "exceeds 4 bits")]
    fn opcode_above_four_bits_panics() {
        let frame = Frame {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: OpCode::Reserved(0x10),
            mask: None,
            payload: Bytes::new(),
        };
        serialize_frame(&frame);
    }

    #[test]
    fn extended_length_64_bit() {
        let payload = vec![0u8; 0x10101];
        let frame = Frame::binary(payload.clone());
        let raw = serialize_frame(&frame);
        assert_eq!(raw[0], 0x82);
        assert_eq!(raw[1], 127);
        assert_eq!(
            u64::from_be_bytes(raw[2..10].try_into().unwrap()),
            0x10101
        );
    }
}
