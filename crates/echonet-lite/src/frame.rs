//! ECHONET Lite Application-Layer frame codec (§3 `Frame`, §4.B).

use crate::error::{DecodeError, ParseError};
use crate::objects::validate_fixed_width;
use crate::types::{ClassCode, Esv, Eoj, Property, EHD1, EHD2, HOME_AIRCON_1, NODE_PROFILE, SMART_METER_1};

/// The request/get half and, for `SetGet` verbs, the optional second
/// (Get) block of properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tid: u16,
    pub seoj: Eoj,
    pub deoj: Eoj,
    pub esv: Esv,
    /// First property block. For every verb except `SetGet`/`SetGetRes`
    /// this is the only block.
    pub properties: Vec<Property>,
    /// Second property block, present only for `SetGet`/`SetGetRes` (§3).
    pub properties2: Vec<Property>,
}

// EHD1(1) + EHD2(1) + TID(2) + SEOJ(3) + DEOJ(3) + ESV(1) + OPC(1).
const MIN_FRAME_LEN: usize = 12;

impl Frame {
    pub fn new(tid: u16, seoj: Eoj, deoj: Eoj, esv: Esv, properties: Vec<Property>) -> Self {
        Self { tid, seoj, deoj, esv, properties, properties2: Vec::new() }
    }

    pub fn new_set_get(
        tid: u16,
        seoj: Eoj,
        deoj: Eoj,
        esv: Esv,
        set_properties: Vec<Property>,
        get_properties: Vec<Property>,
    ) -> Self {
        Self { tid, seoj, deoj, esv, properties: set_properties, properties2: get_properties }
    }

    /// Parses a complete ECHONET Lite frame out of `bytes`. Never reads past
    /// `bytes.len()`; property parsing must exactly consume the remainder
    /// or the frame is rejected (§3 invariants).
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(ParseError::TooShort(bytes.len()));
        }
        if bytes[0] != EHD1 || bytes[1] != EHD2 {
            return Err(ParseError::BadHeader { ehd1: bytes[0], ehd2: bytes[1] });
        }
        let tid = u16::from_be_bytes([bytes[2], bytes[3]]);
        let seoj = Eoj::from_bytes([bytes[4], bytes[5], bytes[6]]);
        let deoj = Eoj::from_bytes([bytes[7], bytes[8], bytes[9]]);
        let esv = Esv::from_byte(bytes[10]);
        let opc = bytes[11];

        let mut cursor = 12usize;
        let properties = parse_property_block(bytes, &mut cursor, opc, seoj.class)?;

        let properties2 = if esv.is_set_get() {
            if cursor >= bytes.len() {
                return Err(ParseError::TruncatedProperties { expected: 1, remaining: 0 });
            }
            let opc2 = bytes[cursor];
            cursor += 1;
            parse_property_block(bytes, &mut cursor, opc2, seoj.class)?
        } else {
            Vec::new()
        };

        if cursor != bytes.len() {
            return Err(ParseError::TruncatedProperties {
                expected: bytes.len() - cursor,
                remaining: bytes.len() - cursor,
            });
        }

        Ok(Frame { tid, seoj, deoj, esv, properties, properties2 })
    }

    /// Serializes this frame to its wire form (§3 serialization order).
    /// Construction-valid `Frame` values always serialize; there is no
    /// fallible path on this side of the codec.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.properties.len() * 3);
        out.push(EHD1);
        out.push(EHD2);
        out.extend_from_slice(&self.tid.to_be_bytes());
        out.extend_from_slice(&self.seoj.to_bytes());
        out.extend_from_slice(&self.deoj.to_bytes());
        out.push(self.esv.to_byte());
        write_property_block(&mut out, &self.properties);
        if self.esv.is_set_get() {
            write_property_block(&mut out, &self.properties2);
        }
        out
    }

    pub fn property(&self, epc: u8) -> Option<&Property> {
        self.properties.iter().find(|p| p.epc == epc)
    }
}

fn parse_property_block(
    bytes: &[u8],
    cursor: &mut usize,
    opc: u8,
    class: ClassCode,
) -> Result<Vec<Property>, ParseError> {
    let mut properties = Vec::with_capacity(opc as usize);
    for _ in 0..opc {
        if *cursor + 2 > bytes.len() {
            return Err(ParseError::TruncatedProperties {
                expected: 2,
                remaining: bytes.len() - *cursor,
            });
        }
        let epc = bytes[*cursor];
        let pdc = bytes[*cursor + 1] as usize;
        *cursor += 2;
        if *cursor + pdc > bytes.len() {
            return Err(ParseError::TruncatedProperties { expected: pdc, remaining: bytes.len() - *cursor });
        }
        // A zero-length EDT is a property request (Get/InfReq), never a
        // value subject to §8 S6's fixed-width rule.
        if pdc > 0 {
            if let Err(DecodeError::WrongLength { expected, actual, .. }) =
                validate_fixed_width(class, epc, pdc)
            {
                return Err(ParseError::InconsistentOpc {
                    opc,
                    epc,
                    expected: expected as u8,
                    actual: actual as u8,
                });
            }
        }
        let edt = bytes[*cursor..*cursor + pdc].to_vec();
        *cursor += pdc;
        properties.push(Property::new(epc, edt));
    }
    Ok(properties)
}

fn write_property_block(out: &mut Vec<u8>, properties: &[Property]) {
    out.push(properties.len() as u8);
    for property in properties {
        out.push(property.epc);
        out.push(property.pdc());
        out.extend_from_slice(&property.edt);
    }
}

// ---------------------------------------------------------------------
// Factory constructors (§4.B)
// ---------------------------------------------------------------------

/// Announces this node's instance list via multicast `Inf` (§9: SEOJ=DEOJ=
/// Node-Profile is preserved even though it is atypical).
pub fn make_inf(tid: u16, instance_list: Vec<u8>) -> Frame {
    Frame::new(
        tid,
        NODE_PROFILE,
        NODE_PROFILE,
        Esv::Inf,
        vec![Property::new(0xD5, instance_list)],
    )
}

/// Asks peers to notify their instance list.
pub fn make_inf_req(tid: u16) -> Frame {
    Frame::new(tid, NODE_PROFILE, NODE_PROFILE, Esv::InfReq, vec![Property::request(0xD5)])
}

/// `Get` against the Node Profile for the standard bootstrap property set.
pub fn make_get_all(tid: u16) -> Frame {
    let epcs = [0x80u8, 0x82, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0x9F];
    Frame::new(
        tid,
        NODE_PROFILE,
        NODE_PROFILE,
        Esv::Get,
        epcs.iter().map(|&epc| Property::request(epc)).collect(),
    )
}

/// `Get` against Home Aircon instance 1 for internal/outer temperature.
pub fn make_aircon_get(tid: u16) -> Frame {
    Frame::new(
        tid,
        NODE_PROFILE,
        HOME_AIRCON_1,
        Esv::Get,
        vec![Property::request(0xBB), Property::request(0xBE)],
    )
}

/// `Get` against the Smart Meter for a single property.
pub fn make_smart_meter_get(tid: u16, epc: u8) -> Frame {
    Frame::new(tid, NODE_PROFILE, SMART_METER_1, Esv::Get, vec![Property::request(epc)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassCode, NODE_PROFILE};

    #[test]
    fn round_trips_aircon_get_res() {
        // S1 from the round-trip scenarios: 1081 0000 0130 01 05ff 01 72 02 bb 01 1a be 01 0f
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x01, 0x30, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x02, 0xBB, 0x01,
            0x1A, 0xBE, 0x01, 0x0F,
        ];
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.esv, Esv::GetRes);
        assert_eq!(frame.properties.len(), 2);
        assert_eq!(frame.property(0xBB).unwrap().edt, vec![0x1A]);
        assert_eq!(frame.property(0xBE).unwrap().edt, vec![0x0F]);
        assert_eq!(frame.serialize(), bytes);
    }

    #[test]
    fn round_trips_node_profile_inf_instance_list() {
        // S2: 1081 0001 0ef0 01 05ff 01 73 01 d5 04 01 01 30 01
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x01, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x73, 0x01, 0xD5, 0x04,
            0x01, 0x01, 0x30, 0x01,
        ];
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.esv, Esv::Inf);
        assert_eq!(frame.seoj.class, ClassCode::new(0x0E, 0xF0));
        assert_eq!(frame.property(0xD5).unwrap().edt, vec![0x01, 0x01, 0x30, 0x01]);
        assert_eq!(frame.serialize(), bytes);
    }

    #[test]
    fn rejects_buffers_shorter_than_the_fixed_header() {
        let bytes = [0x10, 0x81, 0x00, 0x00, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x62];
        assert_eq!(Frame::parse(&bytes), Err(ParseError::TooShort(11)));
    }

    #[test]
    fn twelve_byte_zero_opc_frame_parses() {
        let bytes = [0x10, 0x81, 0x00, 0x00, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x62, 0x00];
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.properties.len(), 0);
        assert_eq!(frame.serialize(), bytes);
    }

    #[test]
    fn rejects_bad_header() {
        let bytes = [0x11, 0x81, 0x00, 0x00, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x62, 0x00];
        assert!(matches!(Frame::parse(&bytes), Err(ParseError::BadHeader { .. })));
    }

    #[test]
    fn rejects_a_fixed_width_property_with_the_wrong_length() {
        // SEOJ=Home Aircon, OPC=1, EPC=0xBB (expects 1 byte), PDC=2.
        let bytes = [
            0x10, 0x81, 0x00, 0x00, 0x01, 0x30, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xBB, 0x02, 0x00, 0x00,
        ];
        assert!(matches!(Frame::parse(&bytes), Err(ParseError::InconsistentOpc { .. })));
    }

    #[test]
    fn rejects_truncated_property_data() {
        // OPC=1 claims a property but the buffer ends before its EDT.
        let bytes = [0x10, 0x81, 0x00, 0x00, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x62, 0x01, 0x80, 0x01];
        assert!(matches!(Frame::parse(&bytes), Err(ParseError::TruncatedProperties { .. })));
    }

    #[test]
    fn factory_frames_start_with_the_echonet_header_and_are_well_formed() {
        for frame in [
            make_inf(1, vec![0x01, 0x01, 0x30, 0x01]),
            make_inf_req(2),
            make_get_all(3),
            make_aircon_get(4),
            make_smart_meter_get(5, 0xE7),
        ] {
            let bytes = frame.serialize();
            assert!(bytes.len() >= 12);
            assert_eq!(&bytes[0..2], &[0x10, 0x81]);
            assert_eq!(Frame::parse(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn opc_255_with_matching_length_is_accepted() {
        let mut bytes = vec![0x10, 0x81, 0x00, 0x00, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x62, 0xFF];
        for epc in 0u8..255 {
            bytes.push(epc);
            bytes.push(0);
        }
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(frame.properties.len(), 255);
    }
}
