//! PostgreSQL message decoder.
//!
//! Bytes read from the socket are fed into a [`MessageReader`]; complete
//! messages are handed out one at a time while partial ones stay buffered.

use pgfoundation_core::error::{ConnectionErrorKind, Error, Result};

use super::messages::{
    BackendMessage, ErrorFields, FieldDescription, TransactionStatus, backend_type,
};

/// Largest message the reader accepts (1 GiB, the server's own limit).
const MAX_MESSAGE_LEN: usize = 1 << 30;

fn protocol_error(message: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Protocol, message)
}

/// Incremental decoder for backend messages.
#[derive(Debug, Default)]
pub struct MessageReader {
    buf: Vec<u8>,
}

impl MessageReader {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(8192),
        }
    }

    /// Append raw bytes received from the server.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes waiting to form a complete message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete message, or `None` when more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<BackendMessage>> {
        if self.buf.len() < 5 {
            return Ok(None);
        }
        let tag = self.buf[0];
        let declared = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| (4..=MAX_MESSAGE_LEN).contains(len))
            .ok_or_else(|| protocol_error(format!("invalid message length {declared}")))?;

        if self.buf.len() < len + 1 {
            return Ok(None);
        }

        let body: Vec<u8> = self.buf.drain(..=len).skip(5).collect();
        parse_message(tag, &body).map(Some)
    }
}

/// Cursor over one message body.
struct Body<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Body<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| protocol_error("unexpected end of message"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(protocol_error("unexpected end of message"));
        }
        let data = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(data)
    }

    fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| protocol_error("unterminated string"))?;
        let s = std::str::from_utf8(&rest[..end])
            .map_err(|e| protocol_error(format!("invalid UTF-8: {e}")))?
            .to_string();
        self.pos += end + 1;
        Ok(s)
    }

    fn rest(&mut self) -> Vec<u8> {
        let data = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        data
    }
}

fn parse_message(tag: u8, body: &[u8]) -> Result<BackendMessage> {
    let mut body = Body::new(body);

    let msg = match tag {
        backend_type::AUTHENTICATION => parse_authentication(&mut body)?,
        backend_type::BACKEND_KEY_DATA => BackendMessage::BackendKeyData {
            process_id: body.read_i32()?,
            secret_key: body.read_i32()?,
        },
        backend_type::PARAMETER_STATUS => BackendMessage::ParameterStatus {
            name: body.read_cstring()?,
            value: body.read_cstring()?,
        },
        backend_type::READY_FOR_QUERY => {
            let status = body.read_byte()?;
            let status = TransactionStatus::from_byte(status).ok_or_else(|| {
                protocol_error(format!("unknown transaction status '{}'", status as char))
            })?;
            BackendMessage::ReadyForQuery(status)
        }
        backend_type::ROW_DESCRIPTION => {
            let count = body.read_i16()?.max(0) as usize;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                fields.push(FieldDescription {
                    name: body.read_cstring()?,
                    table_oid: body.read_u32()?,
                    column_id: body.read_i16()?,
                    type_oid: body.read_u32()?,
                    type_size: body.read_i16()?,
                    type_modifier: body.read_i32()?,
                    format: body.read_i16()?,
                });
            }
            BackendMessage::RowDescription(fields)
        }
        backend_type::DATA_ROW => {
            let count = body.read_i16()?.max(0) as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let len = body.read_i32()?;
                if len < 0 {
                    values.push(None);
                } else {
                    values.push(Some(body.read_bytes(len as usize)?.to_vec()));
                }
            }
            BackendMessage::DataRow(values)
        }
        backend_type::COMMAND_COMPLETE => BackendMessage::CommandComplete(body.read_cstring()?),
        backend_type::EMPTY_QUERY_RESPONSE => BackendMessage::EmptyQueryResponse,
        backend_type::ERROR_RESPONSE => BackendMessage::ErrorResponse(parse_error_fields(&mut body)?),
        backend_type::NOTICE_RESPONSE => {
            BackendMessage::NoticeResponse(parse_error_fields(&mut body)?)
        }
        backend_type::PARSE_COMPLETE => BackendMessage::ParseComplete,
        backend_type::BIND_COMPLETE => BackendMessage::BindComplete,
        backend_type::CLOSE_COMPLETE => BackendMessage::CloseComplete,
        backend_type::NO_DATA => BackendMessage::NoData,
        backend_type::PORTAL_SUSPENDED => BackendMessage::PortalSuspended,
        backend_type::PARAMETER_DESCRIPTION => {
            let count = body.read_i16()?.max(0) as usize;
            let mut oids = Vec::with_capacity(count);
            for _ in 0..count {
                oids.push(body.read_u32()?);
            }
            BackendMessage::ParameterDescription(oids)
        }
        backend_type::NOTIFICATION_RESPONSE => BackendMessage::NotificationResponse {
            process_id: body.read_i32()?,
            channel: body.read_cstring()?,
            payload: body.read_cstring()?,
        },
        other => {
            return Err(protocol_error(format!(
                "unexpected message type '{}'",
                other as char
            )));
        }
    };

    Ok(msg)
}

fn parse_authentication(body: &mut Body<'_>) -> Result<BackendMessage> {
    let code = body.read_i32()?;
    let msg = match code {
        0 => BackendMessage::AuthenticationOk,
        3 => BackendMessage::AuthenticationCleartextPassword,
        5 => {
            let salt = body.read_bytes(4)?;
            BackendMessage::AuthenticationMD5Password([salt[0], salt[1], salt[2], salt[3]])
        }
        10 => {
            let mut mechanisms = Vec::new();
            loop {
                let mechanism = body.read_cstring()?;
                if mechanism.is_empty() {
                    break;
                }
                mechanisms.push(mechanism);
            }
            BackendMessage::AuthenticationSASL(mechanisms)
        }
        11 => BackendMessage::AuthenticationSASLContinue(body.rest()),
        12 => BackendMessage::AuthenticationSASLFinal(body.rest()),
        other => {
            return Err(Error::connection(
                ConnectionErrorKind::Authentication,
                format!("unsupported authentication method (code {other})"),
            ));
        }
    };
    Ok(msg)
}

fn parse_error_fields(body: &mut Body<'_>) -> Result<ErrorFields> {
    let mut fields = ErrorFields::default();
    loop {
        let code = body.read_byte()?;
        if code == 0 {
            break;
        }
        let value = body.read_cstring()?;
        match code {
            // 'S' is localized; 'V' is not and wins when present
            b'S' if fields.severity.is_empty() => fields.severity = value,
            b'V' => fields.severity = value,
            b'C' => fields.code = value,
            b'M' => fields.message = value,
            b'D' => fields.detail = Some(value),
            b'H' => fields.hint = Some(value),
            b'P' => fields.position = value.parse().ok(),
            _ => {}
        }
    }
    Ok(fields)
}
