//! Message codec: framing, the XML and native binary dialects, the JSON
//! envelope, and the polymorphic dispatch that ties them together (spec
//! §4.1–§4.5).

mod dialect;
mod envelope;
mod error;
mod frame;
mod native;
mod payload;
mod sentinel;
mod xml;

pub use dialect::Dialect;
pub use envelope::BinBytesBuf;
pub use error::Error;
pub use frame::{Body, Header, Message};
pub use native::{NativeReader, NativeWriter};
pub use payload::{decode_bytes, decode_json, decode_struct, encode_bytes, encode_json, encode_struct, StructPayload};
pub use sentinel::NULL_SENTINEL;
pub use xml::{postprocess_xml, preprocess_xml};

use tokio::io::{AsyncRead, AsyncWrite};

/// Reads one framed message carrying a raw byte-slice payload (spec §4.5
/// row 1), verifying the header's `msg_type`. Returns `IntInfo` alongside
/// the payload since it carries the operation's status code.
pub async fn read_bytes<R: AsyncRead + Unpin>(
    stream: &mut R,
    expected_type: &str,
) -> Result<(i32, Vec<u8>), Error> {
    let msg = frame::read(stream).await?;
    check_type(&msg, expected_type)?;
    warn_on_error_region(&msg);
    Ok((msg.header.int_info, decode_bytes(msg.body.message)))
}

pub async fn write_bytes<W: AsyncWrite + Unpin>(
    stream: &mut W,
    payload: &[u8],
    bin: Vec<u8>,
    msg_type: &str,
    int_info: i32,
) -> Result<(), Error> {
    let msg = Message {
        header: Header {
            msg_type: msg_type.to_string(),
            int_info,
            ..Default::default()
        },
        body: Body {
            message: encode_bytes(payload),
            error: Vec::new(),
        },
        bin,
    };
    frame::write(&msg, stream).await
}

/// Reads a framed message whose payload is transported entirely inside
/// `IntInfo`, with an empty body (spec §4.5 row 2).
pub async fn read_int<R: AsyncRead + Unpin>(
    stream: &mut R,
    expected_type: &str,
) -> Result<i32, Error> {
    let msg = frame::read(stream).await?;
    check_type(&msg, expected_type)?;
    warn_on_error_region(&msg);
    Ok(msg.header.int_info)
}

pub async fn write_int<W: AsyncWrite + Unpin>(
    stream: &mut W,
    value: i32,
    bin: Vec<u8>,
    msg_type: &str,
) -> Result<(), Error> {
    let msg = Message {
        header: Header {
            msg_type: msg_type.to_string(),
            int_info: value,
            ..Default::default()
        },
        body: Body::default(),
        bin,
    };
    frame::write(&msg, stream).await
}

/// Reads a framed message carrying a native/XML struct payload.
pub async fn read_struct<R, T>(
    stream: &mut R,
    dialect: Dialect,
    expected_type: &str,
) -> Result<(i32, T), Error>
where
    R: AsyncRead + Unpin,
    T: StructPayload,
{
    let msg = frame::read(stream).await?;
    check_type(&msg, expected_type)?;
    warn_on_error_region(&msg);
    let value = decode_struct(msg.body.message, dialect)?;
    Ok((msg.header.int_info, value))
}

pub async fn write_struct<W, T>(
    stream: &mut W,
    payload: &T,
    bin: Vec<u8>,
    dialect: Dialect,
    msg_type: &str,
    int_info: i32,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    T: StructPayload,
{
    let msg = Message {
        header: Header {
            msg_type: msg_type.to_string(),
            int_info,
            ..Default::default()
        },
        body: Body {
            message: encode_struct(payload, dialect)?,
            error: Vec::new(),
        },
        bin,
    };
    frame::write(&msg, stream).await
}

/// Reads a framed message carrying a JSON-enveloped struct payload (no
/// XML element-name marker).
pub async fn read_json<R, T>(
    stream: &mut R,
    dialect: Dialect,
    expected_type: &str,
) -> Result<(i32, T), Error>
where
    R: AsyncRead + Unpin,
    T: serde::de::DeserializeOwned,
{
    let msg = frame::read(stream).await?;
    check_type(&msg, expected_type)?;
    warn_on_error_region(&msg);
    let value = decode_json(msg.body.message, dialect)?;
    Ok((msg.header.int_info, value))
}

pub async fn write_json<W, T>(
    stream: &mut W,
    payload: &T,
    bin: Vec<u8>,
    dialect: Dialect,
    msg_type: &str,
    int_info: i32,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg = Message {
        header: Header {
            msg_type: msg_type.to_string(),
            int_info,
            ..Default::default()
        },
        body: Body {
            message: encode_json(payload, dialect)?,
            error: Vec::new(),
        },
        bin,
    };
    frame::write(&msg, stream).await
}

fn check_type(msg: &Message, expected_type: &str) -> Result<(), Error> {
    if msg.header.msg_type != expected_type {
        return Err(Error::TypeMismatch {
            expected: expected_type.to_string(),
            got: msg.header.msg_type.clone(),
        });
    }
    Ok(())
}

/// A non-empty `Error` body region is a soft condition the server
/// reported; it is logged, not treated as a failure (spec §7, §9 open
/// question: this crate logs it and leaves parsing it to higher layers).
fn warn_on_error_region(msg: &Message) {
    if !msg.body.error.is_empty() {
        tracing::warn!(
            msg_type = %msg.header.msg_type,
            error = %String::from_utf8_lossy(&msg.body.error),
            "server reported a non-fatal error region"
        );
    }
}
