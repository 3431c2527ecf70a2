//! C2 — Binary Decoder Runtime: execute a [`PacketSchema`] against a raw
//! payload and produce ordered [`DecodedRow`]s.
use chrono::{TimeZone, Utc};
use ground_protocol::error::CoreError;
use ground_protocol::model::{DecodedRow, Value};

use crate::schema::{
    CommonHeader, FieldType, PacketSchema, SegmentField, SegmentShape, Transform,
};

enum RawValue {
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn skip(&mut self, n: usize) -> Result<(), CoreError> {
        if self.pos + n > self.data.len() {
            return Err(CoreError::Input("not enough bytes to skip".to_string()));
        }
        self.pos += n;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CoreError> {
        if self.pos + n > self.data.len() {
            return Err(CoreError::Input("not enough bytes to read".to_string()));
        }
        let chunk = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(chunk)
    }

    fn read_typed(&mut self, field_type: FieldType) -> Result<RawValue, CoreError> {
        Ok(match field_type {
            FieldType::Uint8 => RawValue::Int(self.take(1)?[0] as i64),
            FieldType::Int8 => RawValue::Int(self.take(1)?[0] as i8 as i64),
            FieldType::Uint16Le => {
                RawValue::Int(u16::from_le_bytes(self.take(2)?.try_into().unwrap()) as i64)
            }
            FieldType::Int16Le => {
                RawValue::Int(i16::from_le_bytes(self.take(2)?.try_into().unwrap()) as i64)
            }
            FieldType::Uint32Le => {
                RawValue::Int(u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as i64)
            }
            FieldType::Uint64Le => {
                RawValue::Int(u64::from_le_bytes(self.take(8)?.try_into().unwrap()) as i64)
            }
            FieldType::Float32Le => {
                RawValue::Float(f32::from_le_bytes(self.take(4)?.try_into().unwrap()) as f64)
            }
            FieldType::Float64Le => {
                RawValue::Float(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
            }
            FieldType::Bytes(n) => RawValue::Bytes(self.take(n)?.to_vec()),
        })
    }
}

/// Convert a decoded hex string into bytes, rejecting odd length.
pub fn normalize_hex(hex_str: &str) -> Result<Vec<u8>, CoreError> {
    let cleaned: String = hex_str
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.len() % 2 != 0 {
        return Err(CoreError::Input(format!(
            "hex string has odd length: {}",
            cleaned.len()
        )));
    }
    hex::decode(&cleaned).map_err(|e| CoreError::Input(format!("invalid hex input: {e}")))
}

fn raw_to_value(raw: &RawValue) -> Value {
    match raw {
        RawValue::Int(i) => Value::Int(*i),
        RawValue::Float(f) => Value::Float(*f),
        RawValue::Bytes(b) => Value::Str(hex::encode(b)),
    }
}

enum TransformOutput {
    Single(Value),
    Merge(Vec<(String, Value)>),
}

fn apply_transform(transform: Transform, raw: &RawValue) -> TransformOutput {
    match transform {
        Transform::Epoch32ToUtcDatetime => {
            let secs = match raw {
                RawValue::Int(i) => *i,
                RawValue::Float(f) => *f as i64,
                RawValue::Bytes(_) => 0,
            };
            let ts = Utc.timestamp_opt(secs, 0).single().unwrap_or(Utc::now());
            TransformOutput::Single(Value::Timestamp(ts))
        }
        Transform::Epoch64ToUtcDatetime => {
            let raw_u64 = match raw {
                RawValue::Int(i) => *i as u64,
                RawValue::Float(f) => *f as u64,
                RawValue::Bytes(_) => 0,
            };
            if raw_u64 == u64::MAX {
                TransformOutput::Single(Value::Null)
            } else {
                let ts = Utc
                    .timestamp_opt(raw_u64 as i64, 0)
                    .single()
                    .unwrap_or(Utc::now());
                TransformOutput::Single(Value::Timestamp(ts))
            }
        }
        Transform::TempU8_255InvalidAsInt8 => {
            let raw_int = match raw {
                RawValue::Int(i) => *i,
                _ => 0,
            };
            if raw_int == 255 {
                TransformOutput::Single(Value::Null)
            } else {
                TransformOutput::Single(Value::Int(raw_int as u8 as i8 as i64))
            }
        }
        Transform::AdcsStatePacked7_12 => {
            let bytes = match raw {
                RawValue::Bytes(b) => b.clone(),
                _ => vec![0u8; 6],
            };
            let mut packed = 0u64;
            for (i, b) in bytes.iter().enumerate().take(8) {
                packed |= (*b as u64) << (8 * i);
            }
            let moi = (packed >> 2) & 0x3;
            let gain = (packed >> 4) & 0x3;
            TransformOutput::Merge(vec![
                ("Moment_Of_Inertia_Index".to_string(), Value::Int(moi as i64)),
                (
                    "Moment_Of_Inertia_Index_Name".to_string(),
                    Value::Str(crate::schema::MapName::InertiaIndex.label(moi as i64)),
                ),
                ("Gain_Index".to_string(), Value::Int(gain as i64)),
                (
                    "Gain_Index_Name".to_string(),
                    Value::Str(crate::schema::MapName::GainIndex.label(gain as i64)),
                ),
                ("Packed_7_12_Raw".to_string(), Value::Int(packed as i64)),
            ])
        }
        Transform::AdcsStateValidityByte13 => {
            let b = match raw {
                RawValue::Int(i) => (*i as i64) & 0xFF,
                _ => 0,
            };
            let time_valid = (b >> 6) & 0x1 == 1;
            let att_valid = (b >> 7) & 0x1 == 1;
            TransformOutput::Merge(vec![
                ("Time_Validity_Flag".to_string(), Value::Bool(time_valid)),
                ("Attitude_Validity_Flag".to_string(), Value::Bool(att_valid)),
                ("Validity_Byte_13_Raw".to_string(), Value::Int(b)),
            ])
        }
        Transform::AdcsStateFlagsByte14 => {
            let b = match raw {
                RawValue::Int(i) => (*i as i64) & 0xFF,
                _ => 0,
            };
            let ref_valid = b & 0x1 == 1;
            let orbit_mode = (b >> 1) & 0xF;
            let eclipse = (b >> 5) & 0x1 == 1;
            TransformOutput::Merge(vec![
                ("Reference_Validity_Flag".to_string(), Value::Bool(ref_valid)),
                ("Orbit_Propagation_Mode".to_string(), Value::Int(orbit_mode)),
                (
                    "Orbit_Propagation_Mode_Name".to_string(),
                    Value::Str(crate::schema::MapName::OrbitPropMode.label(orbit_mode)),
                ),
                ("Eclipse_Flag".to_string(), Value::Bool(eclipse)),
                ("Flags_Byte_14_Raw".to_string(), Value::Int(b)),
            ])
        }
    }
}

/// Run one field through the read -> map -> transform -> scale pipeline and
/// merge its output into `row`.
fn apply_field(reader: &mut ByteReader, field: &SegmentField, row: &mut DecodedRow) -> Result<(), CoreError> {
    let raw = reader.read_typed(field.field_type)?;

    if let Some(map_name) = field.map_name {
        let as_int = match &raw {
            RawValue::Int(i) => *i,
            RawValue::Float(f) => *f as i64,
            RawValue::Bytes(_) => 0,
        };
        row.insert(field.name, Value::Int(as_int));
        row.insert(format!("{}_Name", field.name), Value::Str(map_name.label(as_int)));
        return Ok(());
    }

    if let Some(transform) = field.transform {
        match apply_transform(transform, &raw) {
            TransformOutput::Single(v) => row.insert(field.name, v),
            TransformOutput::Merge(pairs) => {
                for (k, v) in pairs {
                    row.insert(k, v);
                }
            }
        }
        return Ok(());
    }

    let mut value = raw_to_value(&raw);
    if let Some(scale) = field.scale {
        if let Some(n) = value.as_f64() {
            value = Value::Float(n * scale);
        }
    }
    row.insert(field.name, value);
    Ok(())
}

fn read_header(reader: &mut ByteReader, header: &CommonHeader) -> Result<DecodedRow, CoreError> {
    reader.skip(header.skip_bytes)?;
    let mut row = DecodedRow::new();
    for field in &header.fields {
        let raw = reader.read_typed(field.field_type)?;
        row.insert(field.name, raw_to_value(&raw));
    }
    Ok(row)
}

fn field_len(field: &SegmentField) -> usize {
    field.field_type.byte_len()
}

/// Execute `schema` against raw packet bytes, producing one row per
/// successfully decoded instance. Never aborts the whole decode: a failure
/// mid-instance resyncs to the next segment boundary and continues.
pub fn decode(schema: &PacketSchema, data: &[u8]) -> Result<Vec<DecodedRow>, CoreError> {
    let mut reader = ByteReader::new(data);

    let header = read_header(&mut reader, &schema.common_header)?;

    if let Some(expected) = schema.expected_queue_id {
        if let Some(got) = header.get("Queue_ID").and_then(Value::as_i64) {
            if got != expected as i64 {
                tracing::warn!(
                    packet = schema.name,
                    expected,
                    got,
                    "Queue_ID mismatch"
                );
            }
        }
    }

    let count = header
        .get("Number_of_Instances")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if count <= 0 {
        return Ok(Vec::new());
    }

    let mut rows = Vec::new();

    match &schema.segment {
        SegmentShape::Fixed {
            fields,
            segment_len_bytes,
        } => {
            for idx in 0..count {
                if reader.remaining() < *segment_len_bytes {
                    break;
                }
                let start = reader.pos;
                let mut row = header.clone();
                let mut failed = false;
                for field in fields {
                    if apply_field(&mut reader, field, &mut row).is_err() {
                        tracing::error!(packet = schema.name, instance = idx, "failed parsing segment");
                        failed = true;
                        break;
                    }
                }
                if failed {
                    reader.pos = start + segment_len_bytes;
                    continue;
                }
                let consumed = reader.pos - start;
                if consumed != *segment_len_bytes {
                    tracing::warn!(
                        packet = schema.name,
                        instance = idx,
                        consumed,
                        expected = segment_len_bytes,
                        "segment consumed a different byte count than declared"
                    );
                    reader.pos = start + segment_len_bytes;
                }
                rows.push(row);
            }
        }
        SegmentShape::Variable { base, var_array } => {
            for idx in 0..count {
                let min_base_len: usize = base.iter().map(field_len).sum();
                if reader.remaining() < min_base_len {
                    break;
                }
                let start = reader.pos;
                let mut row = header.clone();
                let mut failed = false;
                for field in base {
                    if apply_field(&mut reader, field, &mut row).is_err() {
                        failed = true;
                        break;
                    }
                }
                if failed {
                    tracing::error!(packet = schema.name, instance = idx, "failed parsing segment base");
                    break;
                }

                let n = row
                    .get(var_array.count_from)
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let item_len = var_array.item.field_type.byte_len();
                if n < 0 || reader.remaining() < (n as usize) * item_len {
                    reader.pos = start;
                    break;
                }

                for k in 1..=n {
                    let raw = match reader.read_typed(var_array.item.field_type) {
                        Ok(r) => r,
                        Err(_) => {
                            failed = true;
                            break;
                        }
                    };
                    let mut value = raw_to_value(&raw);
                    if let Some(scale) = var_array.item.scale {
                        if let Some(v) = value.as_f64() {
                            value = Value::Float(v * scale);
                        }
                    }
                    row.insert(
                        format!("{}{}{}", var_array.item.name_prefix, k, var_array.item.name_suffix),
                        value,
                    );
                }
                if failed {
                    tracing::error!(packet = schema.name, instance = idx, "failed parsing variable array");
                    break;
                }

                rows.push(row);
            }
        }
    }

    Ok(rows)
}

/// Convenience wrapper accepting a hex-encoded payload.
pub fn decode_hex(schema: &PacketSchema, hex_str: &str) -> Result<Vec<DecodedRow>, CoreError> {
    let bytes = normalize_hex(hex_str)?;
    decode(schema, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas;

    #[test]
    fn css_vector_fixed_segment_decodes_one_row() {
        let schema = schemas::adcs_css_vector::schema();
        let mut body = vec![0u8; 26];
        body.push(1); // Submodule_ID
        body.push(7); // Queue_ID
        body.extend_from_slice(&1u16.to_le_bytes()); // Number_of_Instances
        body.push(0x00); // Operation_Status
        body.extend_from_slice(&0x69C2DF00u32.to_le_bytes()); // Epoch
        body.extend_from_slice(&0i16.to_le_bytes()); // X
        body.extend_from_slice(&0i16.to_le_bytes()); // Y
        body.extend_from_slice(&16367i16.to_le_bytes()); // Z * 1000

        let rows = decode(&schema, &body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Sun_Vector_X"), Some(&Value::Float(0.0)));
        let z = rows[0].get("Sun_Vector_Z").unwrap().as_f64().unwrap();
        assert!((z - 16.367).abs() < 1e-9);
    }

    #[test]
    fn zero_instances_yields_empty() {
        let schema = schemas::adcs_css_vector::schema();
        let mut body = vec![0u8; 26];
        body.push(1);
        body.push(7);
        body.extend_from_slice(&0u16.to_le_bytes());
        assert!(decode(&schema, &body).unwrap().is_empty());
    }

    #[test]
    fn meas_rw_speed_variable_array_rows() {
        let schema = schemas::adcs_meas_rw_speed::schema();
        let mut body = vec![0u8; 26];
        body.push(1);
        body.push(23);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(0x00); // Operation_Status
        body.extend_from_slice(&0u32.to_le_bytes()); // Epoch
        body.push(2); // RW_Count_N
        body.extend_from_slice(&100i16.to_le_bytes());
        body.extend_from_slice(&(-50i16).to_le_bytes());

        let rows = decode(&schema, &body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("RW_Speed_1_RPM"), Some(&Value::Int(100)));
        assert_eq!(rows[0].get("RW_Speed_2_RPM"), Some(&Value::Int(-50)));
    }

    #[test]
    fn current_state_bitfields_unpack() {
        let schema = schemas::adcs_current_state::schema();
        let mut body = vec![0u8; 26];
        body.push(1);
        body.push(6);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.push(0x00); // Operation_Status
        body.extend_from_slice(&0u32.to_le_bytes()); // Epoch
        body.push(4); // Estimation mode -> ADCS_EST_MODE_KALMAN
        body.push(5); // Control mode -> ADCS_CTRL_MODE_SUN_POINTING
        let packed: u64 = (1 << 2) | (2 << 4); // moi=1, gain=2
        body.extend_from_slice(&packed.to_le_bytes()[0..6]);
        body.push(0b1100_0000); // validity byte: time+attitude valid
        body.push(0b0010_0011); // flags byte: ref_valid, orbit_mode=1, no eclipse

        let rows = decode(&schema, &body).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("Moment_Of_Inertia_Index"), Some(&Value::Int(1)));
        assert_eq!(row.get("Gain_Index"), Some(&Value::Int(2)));
        assert_eq!(row.get("Time_Validity_Flag"), Some(&Value::Bool(true)));
        assert_eq!(row.get("Reference_Validity_Flag"), Some(&Value::Bool(true)));
        assert_eq!(row.get("Orbit_Propagation_Mode"), Some(&Value::Int(1)));
    }

    #[test]
    fn eps_ses_temp_sentinel_becomes_null() {
        let schema = schemas::eps_ses_temp::schema();
        let mut body = vec![0u8; 26];
        body.push(1);
        body.push(1);
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0u64.to_le_bytes()); // Epoch_Time_UTC
        body.push(20); // SES_A_Subsystem_ID -> "SES - A"
        body.push(255); // SES_A_Temperature_C -> invalid
        body.push(21); // SES_B_Subsystem_ID -> "SES - B"
        body.push(200u8); // SES_B_Temperature_C -> signed -56

        let rows = decode(&schema, &body).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("SES_A_Temperature_C"), Some(&Value::Null));
        assert_eq!(row.get("SES_B_Temperature_C"), Some(&Value::Int(-56)));
        assert_eq!(
            row.get("SES_A_Subsystem_ID_Name"),
            Some(&Value::Str("SES - A".to_string()))
        );
    }
}
