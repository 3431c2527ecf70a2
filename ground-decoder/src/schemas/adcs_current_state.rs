//! `HEALTH_ADCS_CURRENT_STATE` — ADCS mode/status, with a packed bitfield
//! region spanning bytes 7-14 of the segment.
use crate::schema::{
    CommonHeader, CommonHeaderField, FieldType, MapName, PacketSchema, SegmentField,
    SegmentShape, Transform,
};

pub fn schema() -> PacketSchema {
    PacketSchema {
        name: "HEALTH_ADCS_CURRENT_STATE",
        expected_queue_id: Some(6),
        common_header: CommonHeader {
            skip_bytes: 26,
            fields: vec![
                CommonHeaderField {
                    name: "Submodule_ID",
                    field_type: FieldType::Uint8,
                },
                CommonHeaderField {
                    name: "Queue_ID",
                    field_type: FieldType::Uint8,
                },
                CommonHeaderField {
                    name: "Number_of_Instances",
                    field_type: FieldType::Uint16Le,
                },
            ],
        },
        segment: SegmentShape::Fixed {
            fields: vec![
                SegmentField::plain("Operation_Status", FieldType::Uint8),
                SegmentField::transformed(
                    "Epoch_Time_UTC",
                    FieldType::Uint32Le,
                    Transform::Epoch32ToUtcDatetime,
                ),
                SegmentField::mapped(
                    "Attitude_Estimation_Mode",
                    FieldType::Uint8,
                    MapName::EstimationMode,
                ),
                SegmentField::mapped("Control_Mode", FieldType::Uint8, MapName::ControlMode),
                SegmentField::transformed(
                    "_Packed_Block_7_12",
                    FieldType::Bytes(6),
                    Transform::AdcsStatePacked7_12,
                ),
                SegmentField::transformed(
                    "_Validity_Byte_13",
                    FieldType::Uint8,
                    Transform::AdcsStateValidityByte13,
                ),
                SegmentField::transformed(
                    "_Flags_Byte_14",
                    FieldType::Uint8,
                    Transform::AdcsStateFlagsByte14,
                ),
            ],
            segment_len_bytes: 15,
        },
    }
}
