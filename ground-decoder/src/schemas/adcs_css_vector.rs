//! `HEALTH_ADCS_CSS_VECTOR` — coarse sun sensor vector, fixed-length segment.
use crate::schema::{
    CommonHeader, CommonHeaderField, FieldType, PacketSchema, SegmentField, SegmentShape,
    Transform,
};

pub fn schema() -> PacketSchema {
    PacketSchema {
        name: "HEALTH_ADCS_CSS_VECTOR",
        expected_queue_id: None,
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
                    "Epoch_Time_Human",
                    FieldType::Uint32Le,
                    Transform::Epoch32ToUtcDatetime,
                ),
                SegmentField::scaled("Sun_Vector_X", FieldType::Int16Le, 0.001),
                SegmentField::scaled("Sun_Vector_Y", FieldType::Int16Le, 0.001),
                SegmentField::scaled("Sun_Vector_Z", FieldType::Int16Le, 0.001),
            ],
            segment_len_bytes: 11,
        },
    }
}
