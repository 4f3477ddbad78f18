//! PostgreSQL type Object IDs (OIDs).
//!
//! Built-in types have fixed OIDs. Names returned here are the `pg_type`
//! `typname` values, so array types carry the `_` prefix (`_int4`).
//! Extension types such as `hstore` or `ltree` get an OID at install time
//! and have to be looked up in the catalog.

pub const BOOL: u32 = 16;
pub const BYTEA: u32 = 17;
pub const CHAR: u32 = 18;
pub const NAME: u32 = 19;
pub const INT8: u32 = 20;
pub const INT2: u32 = 21;
pub const INT4: u32 = 23;
pub const TEXT: u32 = 25;
pub const OID: u32 = 26;
pub const JSON: u32 = 114;
pub const XML: u32 = 142;
pub const POINT: u32 = 600;
pub const LSEG: u32 = 601;
pub const BOX: u32 = 603;
pub const CIDR: u32 = 650;
pub const FLOAT4: u32 = 700;
pub const FLOAT8: u32 = 701;
pub const UNKNOWN: u32 = 705;
pub const CIRCLE: u32 = 718;
pub const MACADDR: u32 = 829;
pub const INET: u32 = 869;
pub const BPCHAR: u32 = 1042;
pub const VARCHAR: u32 = 1043;
pub const DATE: u32 = 1082;
pub const TIME: u32 = 1083;
pub const TIMESTAMP: u32 = 1114;
pub const TIMESTAMPTZ: u32 = 1184;
pub const INTERVAL: u32 = 1186;
pub const TIMETZ: u32 = 1266;
pub const NUMERIC: u32 = 1700;
pub const REGCLASS: u32 = 2205;
pub const VOID: u32 = 2278;
pub const UUID: u32 = 2950;
pub const TSVECTOR: u32 = 3614;
pub const JSONB: u32 = 3802;
pub const INT4RANGE: u32 = 3904;
pub const NUMRANGE: u32 = 3906;
pub const TSRANGE: u32 = 3908;
pub const TSTZRANGE: u32 = 3910;
pub const DATERANGE: u32 = 3912;
pub const INT8RANGE: u32 = 3926;

// ==================== Array Types ====================

pub const BOOL_ARRAY: u32 = 1000;
pub const BYTEA_ARRAY: u32 = 1001;
pub const INT2_ARRAY: u32 = 1005;
pub const INT4_ARRAY: u32 = 1007;
pub const TEXT_ARRAY: u32 = 1009;
pub const VARCHAR_ARRAY: u32 = 1015;
pub const INT8_ARRAY: u32 = 1016;
pub const FLOAT8_ARRAY: u32 = 1022;
pub const TIMESTAMP_ARRAY: u32 = 1115;
pub const NUMERIC_ARRAY: u32 = 1231;
pub const JSONB_ARRAY: u32 = 3807;

/// `typname` of a built-in type.
pub const fn builtin_type_name(oid: u32) -> Option<&'static str> {
    let name = match oid {
        BOOL => "bool",
        BYTEA => "bytea",
        CHAR => "char",
        NAME => "name",
        INT8 => "int8",
        INT2 => "int2",
        INT4 => "int4",
        TEXT => "text",
        OID => "oid",
        JSON => "json",
        XML => "xml",
        POINT => "point",
        LSEG => "lseg",
        BOX => "box",
        CIDR => "cidr",
        FLOAT4 => "float4",
        FLOAT8 => "float8",
        UNKNOWN => "unknown",
        CIRCLE => "circle",
        MACADDR => "macaddr",
        INET => "inet",
        BPCHAR => "bpchar",
        VARCHAR => "varchar",
        DATE => "date",
        TIME => "time",
        TIMESTAMP => "timestamp",
        TIMESTAMPTZ => "timestamptz",
        INTERVAL => "interval",
        TIMETZ => "timetz",
        NUMERIC => "numeric",
        REGCLASS => "regclass",
        VOID => "void",
        UUID => "uuid",
        TSVECTOR => "tsvector",
        JSONB => "jsonb",
        INT4RANGE => "int4range",
        NUMRANGE => "numrange",
        TSRANGE => "tsrange",
        TSTZRANGE => "tstzrange",
        DATERANGE => "daterange",
        INT8RANGE => "int8range",
        143 => "_xml",
        199 => "_json",
        651 => "_cidr",
        719 => "_circle",
        BOOL_ARRAY => "_bool",
        BYTEA_ARRAY => "_bytea",
        1002 => "_char",
        1003 => "_name",
        INT2_ARRAY => "_int2",
        INT4_ARRAY => "_int4",
        TEXT_ARRAY => "_text",
        1014 => "_bpchar",
        VARCHAR_ARRAY => "_varchar",
        INT8_ARRAY => "_int8",
        1017 => "_point",
        1018 => "_lseg",
        1020 => "_box",
        1021 => "_float4",
        FLOAT8_ARRAY => "_float8",
        1028 => "_oid",
        1040 => "_macaddr",
        1041 => "_inet",
        TIMESTAMP_ARRAY => "_timestamp",
        1182 => "_date",
        1183 => "_time",
        1185 => "_timestamptz",
        1187 => "_interval",
        NUMERIC_ARRAY => "_numeric",
        1270 => "_timetz",
        2210 => "_regclass",
        2951 => "_uuid",
        3643 => "_tsvector",
        JSONB_ARRAY => "_jsonb",
        3905 => "_int4range",
        3907 => "_numrange",
        3909 => "_tsrange",
        3911 => "_tstzrange",
        3913 => "_daterange",
        3927 => "_int8range",
        _ => return None,
    };
    Some(name)
}
