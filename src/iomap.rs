//! Mapping from numeric AVL IO element ids to named telemetry fields.
//!
//! The table mirrors the tracker configuration deployed on the fleet:
//! digital/analog inputs, the three accelerometer axes, radio and power
//! diagnostics. Ids outside the table are kept verbatim under `unknown` so
//! nothing the device reports is dropped silently. No value is rescaled
//! here; unit handling belongs to the ingestion service.

use std::collections::BTreeMap;

use crate::codec::{IoElement, IoValue};

pub const IO_DIN1: u16 = 1;
pub const IO_DIN2: u16 = 2;
pub const IO_AIN1: u16 = 9;
pub const IO_ODOMETER: u16 = 16;
pub const IO_AXIS_X: u16 = 17;
pub const IO_AXIS_Y: u16 = 18;
pub const IO_AXIS_Z: u16 = 19;
pub const IO_GSM_SIGNAL: u16 = 21;
pub const IO_EXTERNAL_VOLTAGE: u16 = 66;
pub const IO_BATTERY_VOLTAGE: u16 = 67;
pub const IO_IGNITION: u16 = 239;
pub const IO_MOVEMENT: u16 = 240;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MappedIo {
    pub din1: Option<u64>,
    pub din2: Option<u64>,
    pub ain1: Option<u64>,
    /// Total odometer, meters.
    pub odometer: Option<u64>,
    /// Accelerometer axes, signed milli-g.
    pub axis_x: Option<i16>,
    pub axis_y: Option<i16>,
    pub axis_z: Option<i16>,
    pub gsm_signal: Option<u64>,
    /// External (vehicle) supply, millivolts.
    pub external_voltage: Option<u64>,
    /// Backup battery, millivolts.
    pub battery_voltage: Option<u64>,
    pub ignition: Option<u64>,
    pub movement: Option<u64>,
    /// Everything the table does not name, id → raw value.
    pub unknown: BTreeMap<u16, IoValue>,
}

pub fn map_elements(elements: &[IoElement]) -> MappedIo {
    let mut out = MappedIo::default();

    for element in elements {
        let Some(raw) = scalar(&element.value) else {
            // Variable-width blobs have no scalar reading.
            out.unknown.insert(element.id, element.value.clone());
            continue;
        };

        match element.id {
            IO_DIN1 => out.din1 = Some(raw),
            IO_DIN2 => out.din2 = Some(raw),
            IO_AIN1 => out.ain1 = Some(raw),
            IO_ODOMETER => out.odometer = Some(raw),
            IO_AXIS_X => out.axis_x = Some(as_i16(raw)),
            IO_AXIS_Y => out.axis_y = Some(as_i16(raw)),
            IO_AXIS_Z => out.axis_z = Some(as_i16(raw)),
            IO_GSM_SIGNAL => out.gsm_signal = Some(raw),
            IO_EXTERNAL_VOLTAGE => out.external_voltage = Some(raw),
            IO_BATTERY_VOLTAGE => out.battery_voltage = Some(raw),
            IO_IGNITION => out.ignition = Some(raw),
            IO_MOVEMENT => out.movement = Some(raw),
            other => {
                out.unknown.insert(other, element.value.clone());
            }
        }
    }

    out
}

fn scalar(value: &IoValue) -> Option<u64> {
    match value {
        IoValue::U8(v) => Some(*v as u64),
        IoValue::U16(v) => Some(*v as u64),
        IoValue::U32(v) => Some(*v as u64),
        IoValue::U64(v) => Some(*v),
        IoValue::Var(_) => None,
    }
}

/// Accelerometer readings travel as the two's-complement image of a signed
/// 16-bit milli-g value.
fn as_i16(raw: u64) -> i16 {
    raw as u16 as i16
}
