//! Declarative packet schemas: types, transforms and mappings as closed,
//! exhaustively-matched sum types rather than stringly-typed dictionaries.

/// A field's on-wire encoding. All multi-byte integers are little-endian
/// except where the comment says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Uint8,
    Uint16Le,
    Uint32Le,
    Uint64Le,
    Int8,
    Int16Le,
    Float32Le,
    Float64Le,
    /// Fixed-width opaque byte run, consumed whole by a bit-unpack transform.
    Bytes(usize),
}

impl FieldType {
    pub fn byte_len(self) -> usize {
        match self {
            FieldType::Uint8 | FieldType::Int8 => 1,
            FieldType::Uint16Le | FieldType::Int16Le => 2,
            FieldType::Uint32Le | FieldType::Float32Le => 4,
            FieldType::Uint64Le | FieldType::Float64Le => 8,
            FieldType::Bytes(n) => n,
        }
    }
}

/// Closed set of post-read transforms. Some (the `AdcsState*` family) unpack
/// a multi-bit field into several named sub-fields merged into the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Epoch32ToUtcDatetime,
    Epoch64ToUtcDatetime,
    /// `0xFF` (255) in a `UINT8` temperature reading means "no sensor"; any
    /// other value is reinterpreted as a signed degree count.
    TempU8_255InvalidAsInt8,
    /// Bits 2-3 moment-of-inertia index, bits 4-5 gain index, of a 6-byte
    /// little-endian packed block.
    AdcsStatePacked7_12,
    /// Bit 6 time-valid, bit 7 attitude-valid, of one status byte.
    AdcsStateValidityByte13,
    /// Bit 0 reference-valid, bits 1-4 orbit propagation mode, bit 5 eclipse,
    /// of one status byte.
    AdcsStateFlagsByte14,
}

/// Closed set of named enum-label tables, applied as a sibling `<field>_Name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapName {
    OrbitPropMode,
    GainIndex,
    InertiaIndex,
    EstimationMode,
    ControlMode,
    EpsSubsystem,
}

impl MapName {
    /// Label for `value`, or `"UNKNOWN_{value}"` when the table has no entry.
    pub fn label(self, value: i64) -> String {
        let table: &[(i64, &str)] = match self {
            MapName::OrbitPropMode => &[
                (0, "ADCS_KEPLER"),
                (1, "ADCS_GRAVITY_POINT"),
                (2, "ADCS_GRAVITY_J2"),
                (3, "ADCS_GRAVITY_HARMONIC"),
                (4, "ADCS_SGP4"),
                (5, "ADCS_EXTERN_ACC"),
                (6, "ADCS_POLYNOMIAL"),
                (7, "ADCS_DEPRECATED"),
                (8, "ADCS_FILTER"),
            ],
            MapName::GainIndex => &[
                (1, "Sun Pointing"),
                (2, "Target Tracking"),
                (3, "Fine Target Tracking"),
            ],
            MapName::InertiaIndex => &[(1, "Deployed"), (2, "Stowed"), (3, "Compromised")],
            MapName::EstimationMode => &[
                (1, "ADCS_EST_MODE_RAW"),
                (2, "ADCS_EST_MODE_FG_WO_IMU"),
                (3, "ADCS_EST_MODE_FG"),
                (4, "ADCS_EST_MODE_KALMAN"),
                (5, "ADCS_EST_MODE_KALMAN_B"),
            ],
            MapName::ControlMode => &[
                (4, "ADCS_CTRL_MODE_THREE_AXIS"),
                (5, "ADCS_CTRL_MODE_SUN_POINTING"),
                (6, "ADCS_CTRL_MODE_NADIR_POINTING"),
                (7, "ADCS_CTRL_MODE_TARGET_TRACKING"),
                (8, "ADCS_CTRL_MODE_FINE_SUN_POINTING"),
            ],
            MapName::EpsSubsystem => &[
                (0, "Hold and Release Module"),
                (1, "Primary On - Board Controller"),
                (2, "Secondary On - Board Controller"),
                (3, "Primary Payload Server"),
                (4, "Secondary Payload Server"),
                (5, "Primary GPS"),
                (6, "Secondary GPS"),
                (7, "Primary ADCS"),
                (8, "Reserved"),
                (9, "Primary UHF"),
                (10, "Reserved"),
                (11, "Primary S-BAND"),
                (12, "Reserved"),
                (13, "Primary X-BAND"),
                (14, "Secondary X-BAND"),
                (15, "Primary Edge Server"),
                (16, "Secondary Edge Server"),
                (17, "Primary Thruster"),
                (18, "Reserved"),
                (19, "MSI"),
                (20, "SES - A"),
                (21, "SES - B"),
                (22, "SAS - A"),
                (23, "Burn Wire - 1"),
                (24, "SAS - B"),
                (25, "Burn Wire - 2"),
                (26, "Avionics"),
                (27, "Reserved"),
                (28, "Reserved"),
            ],
        };
        table
            .iter()
            .find(|(k, _)| *k == value)
            .map(|(_, v)| v.to_string())
            .unwrap_or_else(|| format!("UNKNOWN_{value}"))
    }
}

#[derive(Debug, Clone)]
pub struct CommonHeaderField {
    pub name: &'static str,
    pub field_type: FieldType,
}

/// `skip_bytes` then fixed header fields read in declared order, present on
/// every row decoded from this schema.
#[derive(Debug, Clone)]
pub struct CommonHeader {
    pub skip_bytes: usize,
    pub fields: Vec<CommonHeaderField>,
}

#[derive(Debug, Clone)]
pub struct SegmentField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub scale: Option<f64>,
    pub transform: Option<Transform>,
    pub map_name: Option<MapName>,
}

impl SegmentField {
    pub fn plain(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            scale: None,
            transform: None,
            map_name: None,
        }
    }

    pub fn scaled(name: &'static str, field_type: FieldType, scale: f64) -> Self {
        Self {
            name,
            field_type,
            scale: Some(scale),
            transform: None,
            map_name: None,
        }
    }

    pub fn transformed(name: &'static str, field_type: FieldType, transform: Transform) -> Self {
        Self {
            name,
            field_type,
            scale: None,
            transform: Some(transform),
            map_name: None,
        }
    }

    pub fn mapped(name: &'static str, field_type: FieldType, map_name: MapName) -> Self {
        Self {
            name,
            field_type,
            scale: None,
            transform: None,
            map_name: Some(map_name),
        }
    }
}

/// One variable-length array item: `"{name_prefix}{k}{name_suffix}"` for
/// `k = 1..=n`.
#[derive(Debug, Clone)]
pub struct VarArrayItem {
    pub name_prefix: &'static str,
    pub name_suffix: &'static str,
    pub field_type: FieldType,
    pub scale: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct VarArraySpec {
    /// Name of the base field (already read) giving the repeat count.
    pub count_from: &'static str,
    pub item: VarArrayItem,
}

/// The two shapes a packet's repeating instance segment can take.
#[derive(Debug, Clone)]
pub enum SegmentShape {
    Fixed {
        fields: Vec<SegmentField>,
        segment_len_bytes: usize,
    },
    Variable {
        base: Vec<SegmentField>,
        var_array: VarArraySpec,
    },
}

#[derive(Debug, Clone)]
pub struct PacketSchema {
    pub name: &'static str,
    pub expected_queue_id: Option<u8>,
    pub common_header: CommonHeader,
    pub segment: SegmentShape,
}
