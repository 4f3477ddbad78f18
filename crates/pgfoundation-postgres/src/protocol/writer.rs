//! PostgreSQL message encoder.
//!
//! Messages are appended to one buffer so an extended-query round trip
//! (Parse, Bind, Describe, Execute, Sync) goes out in a single write.
//! Lengths are back-patched once each message body is complete.

use super::messages::{DescribeKind, FrontendMessage, SSL_REQUEST_CODE, frontend_type};

/// Buffer for writing PostgreSQL protocol messages.
///
/// All multi-byte integers are written in big-endian (network) byte order.
#[derive(Debug, Clone)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(1024),
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single message, replacing whatever was buffered.
    pub fn write(&mut self, msg: &FrontendMessage) -> &[u8] {
        self.buf.clear();
        self.push(msg);
        &self.buf
    }

    /// Append a message after those already buffered.
    pub fn push(&mut self, msg: &FrontendMessage) {
        match msg {
            FrontendMessage::Startup { version, params } => {
                let start = self.begin_untyped();
                self.put_i32(*version);
                for (key, value) in params {
                    self.put_cstr(key);
                    self.put_cstr(value);
                }
                self.buf.push(0);
                self.finish(start);
            }
            FrontendMessage::SSLRequest => {
                let start = self.begin_untyped();
                self.put_i32(SSL_REQUEST_CODE);
                self.finish(start);
            }
            FrontendMessage::PasswordMessage(password) => {
                let start = self.begin(frontend_type::PASSWORD);
                self.put_cstr(password);
                self.finish(start);
            }
            FrontendMessage::SASLInitialResponse { mechanism, data } => {
                let start = self.begin(frontend_type::PASSWORD);
                self.put_cstr(mechanism);
                if data.is_empty() {
                    self.put_i32(-1);
                } else {
                    self.put_i32(data.len() as i32);
                    self.buf.extend_from_slice(data);
                }
                self.finish(start);
            }
            FrontendMessage::SASLResponse(data) => {
                let start = self.begin(frontend_type::PASSWORD);
                self.buf.extend_from_slice(data);
                self.finish(start);
            }
            FrontendMessage::Query(query) => {
                let start = self.begin(frontend_type::QUERY);
                self.put_cstr(query);
                self.finish(start);
            }
            FrontendMessage::Parse {
                name,
                query,
                param_types,
            } => {
                let start = self.begin(frontend_type::PARSE);
                self.put_cstr(name);
                self.put_cstr(query);
                self.put_i16(param_types.len() as i16);
                for oid in param_types {
                    self.buf.extend_from_slice(&oid.to_be_bytes());
                }
                self.finish(start);
            }
            FrontendMessage::Bind {
                portal,
                statement,
                params,
            } => {
                let start = self.begin(frontend_type::BIND);
                self.put_cstr(portal);
                self.put_cstr(statement);
                // all parameters in text format
                self.put_i16(0);
                self.put_i16(params.len() as i16);
                for param in params {
                    match param {
                        Some(text) => {
                            self.put_i32(text.len() as i32);
                            self.buf.extend_from_slice(text.as_bytes());
                        }
                        None => self.put_i32(-1),
                    }
                }
                // all results in text format
                self.put_i16(0);
                self.finish(start);
            }
            FrontendMessage::Describe { kind, name } => {
                self.put_target(frontend_type::DESCRIBE, *kind, name);
            }
            FrontendMessage::Close { kind, name } => {
                self.put_target(frontend_type::CLOSE, *kind, name);
            }
            FrontendMessage::Execute { portal, max_rows } => {
                let start = self.begin(frontend_type::EXECUTE);
                self.put_cstr(portal);
                self.put_i32(*max_rows);
                self.finish(start);
            }
            FrontendMessage::Sync => {
                let start = self.begin(frontend_type::SYNC);
                self.finish(start);
            }
            FrontendMessage::Terminate => {
                let start = self.begin(frontend_type::TERMINATE);
                self.finish(start);
            }
        }
    }

    /// Start a typed message; returns the offset of its length field.
    fn begin(&mut self, tag: u8) -> usize {
        self.buf.push(tag);
        self.begin_untyped()
    }

    fn begin_untyped(&mut self) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        start
    }

    /// Patch the length field written by `begin`; the length includes itself.
    fn finish(&mut self, start: usize) {
        let len = (self.buf.len() - start) as i32;
        self.buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
    }

    fn put_target(&mut self, tag: u8, kind: DescribeKind, name: &str) {
        let start = self.begin(tag);
        self.buf.push(kind.as_byte());
        self.put_cstr(name);
        self.finish(start);
    }

    fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn put_cstr(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }
}
