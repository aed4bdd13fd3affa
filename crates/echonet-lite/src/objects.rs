//! Typed decoding of known device classes from a parsed [`crate::frame::Frame`]
//! (§3 `AirconObject`/`SmartMeterObject`, §4.B typed decoders).

use crate::error::DecodeError;
use crate::frame::Frame;
use crate::types::{ClassCode, CLASS_HOME_AIRCON, CLASS_SMART_METER};

/// Dispatch result of [`decode_object`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceObject {
    Aircon(AirconObject),
    SmartMeter(SmartMeterObject),
    Unknown,
}

/// Install location, decoded from EPC `0x81`'s single-byte bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationCode {
    pub code: u8,
    pub number: u8,
}

impl LocationCode {
    fn from_byte(byte: u8) -> Self {
        Self { code: byte >> 3, number: byte & 0x07 }
    }

    /// Label used for metric locations (§4.F): the code name with the
    /// instance number appended only when non-zero.
    pub fn label(&self) -> String {
        let name = location_name(self.code);
        if self.number == 0 {
            name.to_string()
        } else {
            format!("{name}{}", self.number)
        }
    }
}

fn location_name(code: u8) -> &'static str {
    match code {
        0x00 => "undefined",
        0x01 => "living",
        0x02 => "dining",
        0x03 => "kitchen",
        0x04 => "bathroom",
        0x05 => "lavatory",
        0x06 => "washroom",
        0x07 => "passageway",
        0x08 => "room",
        0x09 => "stairway",
        0x0A => "entrance",
        0x0B => "storeroom",
        0x0C => "frontyard",
        0x0D => "backyard",
        0x0E => "garage",
        0x0F => "balcony",
        0x10 => "others",
        _ => "unspecified",
    }
}

/// Decoded view of a Home Aircon frame (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirconObject {
    pub install_location: Option<LocationCode>,
    pub internal_temp: Option<f64>,
    pub outer_temp: Option<f64>,
}

/// Decoded view of a Smart Meter frame (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmartMeterObject {
    pub coefficient: Option<u32>,
    pub cumulative_energy_unit: Option<f64>,
    pub instantaneous_power: Option<Result<i32, ()>>,
    pub instantaneous_current: Option<(i16, i16)>,
    /// Raw EPC `0xE0` count, in units of `cumulative_energy_unit` (§4.F).
    pub cumulative_energy_raw: Option<u32>,
}

/// Sentinel EDT value meaning "not measured" for EPC `0xE7` (§4.B).
const POWER_NOT_MEASURED: i32 = 0x7FFF_FFFE;

/// Dispatches on `ClassCode(SEOJ)` and decodes the properties it recognizes.
/// Properties with zero-length EDT are treated as absent rather than an
/// error (§4.B parse edge cases).
pub fn decode_object(frame: &Frame) -> DeviceObject {
    match frame.seoj.class {
        CLASS_HOME_AIRCON => DeviceObject::Aircon(decode_aircon(frame)),
        CLASS_SMART_METER => DeviceObject::SmartMeter(decode_smart_meter(frame)),
        _ => DeviceObject::Unknown,
    }
}

fn decode_aircon(frame: &Frame) -> AirconObject {
    AirconObject {
        install_location: decode_location(frame),
        internal_temp: decode_signed_byte_celsius(frame, 0xBB),
        outer_temp: decode_signed_byte_celsius(frame, 0xBE),
    }
}

fn decode_location(frame: &Frame) -> Option<LocationCode> {
    let property = frame.property(0x81)?;
    if property.edt.is_empty() {
        return None;
    }
    Some(LocationCode::from_byte(property.edt[0]))
}

fn decode_signed_byte_celsius(frame: &Frame, epc: u8) -> Option<f64> {
    let property = frame.property(epc)?;
    if property.edt.is_empty() {
        return None;
    }
    Some(property.edt[0] as i8 as f64)
}

fn decode_smart_meter(frame: &Frame) -> SmartMeterObject {
    SmartMeterObject {
        coefficient: decode_u32(frame, 0xD3),
        cumulative_energy_unit: decode_energy_unit(frame),
        instantaneous_power: decode_power(frame),
        instantaneous_current: decode_current(frame),
        cumulative_energy_raw: decode_u32(frame, 0xE0),
    }
}

fn decode_u32(frame: &Frame, epc: u8) -> Option<u32> {
    let property = frame.property(epc)?;
    if property.edt.is_empty() {
        return None;
    }
    let bytes: [u8; 4] = property.edt.clone().try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// EPC `0xE1`: a single byte selecting one of the standard coefficient
/// multipliers for cumulative energy (0x00 => 0.1, 0x01 => 1, 0x02 => 10, …).
fn decode_energy_unit(frame: &Frame) -> Option<f64> {
    let property = frame.property(0xE1)?;
    if property.edt.is_empty() {
        return None;
    }
    Some(match property.edt[0] {
        0x00 => 0.1,
        0x01 => 1.0,
        0x02 => 10.0,
        0x03 => 100.0,
        0x04 => 1_000.0,
        0x05 => 10_000.0,
        0x0A => 0.01,
        0x0B => 0.001,
        0x0C => 0.0001,
        other => other as f64,
    })
}

fn decode_power(frame: &Frame) -> Option<Result<i32, ()>> {
    let property = frame.property(0xE7)?;
    if property.edt.is_empty() {
        return None;
    }
    let bytes: [u8; 4] = property.edt.clone().try_into().ok()?;
    let watts = i32::from_be_bytes(bytes);
    Some(if watts == POWER_NOT_MEASURED { Err(()) } else { Ok(watts) })
}

fn decode_current(frame: &Frame) -> Option<(i16, i16)> {
    let property = frame.property(0xE8)?;
    if property.edt.len() < 4 {
        return None;
    }
    let r = i16::from_be_bytes([property.edt[0], property.edt[1]]);
    let t = i16::from_be_bytes([property.edt[2], property.edt[3]]);
    Some((r, t))
}

/// Validates a property's EDT length against the fixed width its EPC
/// requires (§8 S6: a mismatch is a decode-time error, not a silent
/// truncation).
pub fn validate_fixed_width(class: ClassCode, epc: u8, len: usize) -> Result<(), DecodeError> {
    let expected = match (class, epc) {
        (CLASS_HOME_AIRCON, 0xBB) | (CLASS_HOME_AIRCON, 0xBE) => Some(1),
        (CLASS_HOME_AIRCON, 0x81) => Some(1),
        (CLASS_SMART_METER, 0xD3) => Some(4),
        (CLASS_SMART_METER, 0xE0) => Some(4),
        (CLASS_SMART_METER, 0xE1) => Some(1),
        (CLASS_SMART_METER, 0xE7) => Some(4),
        (CLASS_SMART_METER, 0xE8) => Some(4),
        _ => None,
    };
    match expected {
        Some(expected) if expected != len => {
            Err(DecodeError::WrongLength { epc, expected, actual: len })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn decodes_aircon_temperatures_from_get_res() {
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x01, 0x30, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x02, 0xBB, 0x01,
            0x1A, 0xBE, 0x01, 0x0F,
        ];
        let frame = Frame::parse(&bytes).unwrap();
        match decode_object(&frame) {
            DeviceObject::Aircon(aircon) => {
                assert_eq!(aircon.internal_temp, Some(26.0));
                assert_eq!(aircon.outer_temp, Some(15.0));
            }
            other => panic!("expected Aircon, got {other:?}"),
        }
    }

    #[test]
    fn decodes_negative_outer_temperature_as_signed() {
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x01, 0x30, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xBE, 0x01,
            0xF6, // -10 as i8
        ];
        let frame = Frame::parse(&bytes).unwrap();
        match decode_object(&frame) {
            DeviceObject::Aircon(aircon) => assert_eq!(aircon.outer_temp, Some(-10.0)),
            other => panic!("expected Aircon, got {other:?}"),
        }
    }

    #[test]
    fn decodes_smart_meter_instantaneous_power() {
        // S3: data=1081 00000288 01 05ff 01 72 01 e7 04 00 00 01 f8 -> 504 W
        let bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xE7, 0x04,
            0x00, 0x00, 0x01, 0xF8,
        ];
        let frame = Frame::parse(&bytes).unwrap();
        match decode_object(&frame) {
            DeviceObject::SmartMeter(meter) => {
                assert_eq!(meter.instantaneous_power, Some(Ok(504)));
            }
            other => panic!("expected SmartMeter, got {other:?}"),
        }
    }

    #[test]
    fn not_measured_power_surfaces_as_absent_reading() {
        let mut bytes: Vec<u8> = vec![
            0x10, 0x81, 0x00, 0x00, 0x02, 0x88, 0x01, 0x05, 0xFF, 0x01, 0x72, 0x01, 0xE7, 0x04,
        ];
        bytes.extend_from_slice(&POWER_NOT_MEASURED.to_be_bytes());
        let frame = Frame::parse(&bytes).unwrap();
        match decode_object(&frame) {
            DeviceObject::SmartMeter(meter) => assert_eq!(meter.instantaneous_power, Some(Err(()))),
            other => panic!("expected SmartMeter, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_length_property_per_s6() {
        // OPC=1, EPC=0xBB, PDC=2, EDT=00 00 — wrong length for 0xBB (expects 1).
        let err = validate_fixed_width(CLASS_HOME_AIRCON, 0xBB, 2).unwrap_err();
        assert_eq!(err, DecodeError::WrongLength { epc: 0xBB, expected: 1, actual: 2 });
    }

    #[test]
    fn unknown_class_decodes_to_unknown() {
        let bytes = [0x10, 0x81, 0x00, 0x00, 0x05, 0xFF, 0x01, 0x05, 0xFF, 0x01, 0x62, 0x00];
        let frame = Frame::parse(&bytes).unwrap();
        assert_eq!(decode_object(&frame), DeviceObject::Unknown);
    }
}
