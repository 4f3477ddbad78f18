//! PostgreSQL wire protocol v3 framing.

pub mod messages;
pub mod reader;
pub mod writer;

pub use messages::{
    BackendMessage, DescribeKind, ErrorFields, FieldDescription, FrontendMessage,
    PROTOCOL_VERSION, SSL_REQUEST_CODE, TransactionStatus,
};
pub use reader::MessageReader;
pub use writer::MessageWriter;
