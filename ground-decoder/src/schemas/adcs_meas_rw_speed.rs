//! `HEALTH_ADCS_MEAS_RW_SPEED` — reaction wheel speed array, variable-length
//! segment sized by a leading wheel-count field.
use crate::schema::{
    CommonHeader, CommonHeaderField, FieldType, PacketSchema, SegmentField, SegmentShape,
    Transform, VarArrayItem, VarArraySpec,
};

pub fn schema() -> PacketSchema {
    PacketSchema {
        name: "HEALTH_ADCS_MEAS_RW_SPEED",
        expected_queue_id: Some(23),
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
        segment: SegmentShape::Variable {
            base: vec![
                SegmentField::plain("Operation_Status", FieldType::Uint8),
                SegmentField::transformed(
                    "Epoch_Time_UTC",
                    FieldType::Uint32Le,
                    Transform::Epoch32ToUtcDatetime,
                ),
                SegmentField::plain("RW_Count_N", FieldType::Uint8),
            ],
            var_array: VarArraySpec {
                count_from: "RW_Count_N",
                item: VarArrayItem {
                    name_prefix: "RW_Speed_",
                    name_suffix: "_RPM",
                    field_type: FieldType::Int16Le,
                    scale: None,
                },
            },
        },
    }
}
