//! `HEALTH_EPS_SES_TEMP` — dual sun-sensor-enclosure temperature readings,
//! each with a `255 = no sensor` sentinel.
use crate::schema::{
    CommonHeader, CommonHeaderField, FieldType, MapName, PacketSchema, SegmentField,
    SegmentShape, Transform,
};

pub fn schema() -> PacketSchema {
    PacketSchema {
        name: "HEALTH_EPS_SES_TEMP",
        expected_queue_id: Some(1),
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
                SegmentField::transformed(
                    "Epoch_Time_UTC",
                    FieldType::Uint64Le,
                    Transform::Epoch64ToUtcDatetime,
                ),
                SegmentField::mapped(
                    "SES_A_Subsystem_ID",
                    FieldType::Uint8,
                    MapName::EpsSubsystem,
                ),
                SegmentField::transformed(
                    "SES_A_Temperature_C",
                    FieldType::Uint8,
                    Transform::TempU8_255InvalidAsInt8,
                ),
                SegmentField::mapped(
                    "SES_B_Subsystem_ID",
                    FieldType::Uint8,
                    MapName::EpsSubsystem,
                ),
                SegmentField::transformed(
                    "SES_B_Temperature_C",
                    FieldType::Uint8,
                    Transform::TempU8_255InvalidAsInt8,
                ),
            ],
            segment_len_bytes: 12,
        },
    }
}
