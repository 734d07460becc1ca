//! Wire framing (spec §4.1, §6): a 4-byte big-endian header length, the
//! header XML, the message and error body halves, and an optional
//! trailing binary blob.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::Error;
use super::xml::{postprocess_xml, preprocess_xml};

/// `MsgHeader_PI`, with its five child elements in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "MsgHeader_PI")]
struct HeaderXml {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(rename = "msgLen")]
    msg_len: u32,
    #[serde(rename = "errorLen")]
    error_len: u32,
    #[serde(rename = "bsLen")]
    bs_len: u32,
    #[serde(rename = "intInfo")]
    int_info: i32,
}

/// A framed message's header: tag, the three body-section byte counts, and
/// the signed status/API-number slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub msg_type: String,
    pub msg_len: u32,
    pub error_len: u32,
    pub bs_len: u32,
    pub int_info: i32,
}

impl From<&Header> for HeaderXml {
    fn from(h: &Header) -> Self {
        HeaderXml {
            msg_type: h.msg_type.clone(),
            msg_len: h.msg_len,
            error_len: h.error_len,
            bs_len: h.bs_len,
            int_info: h.int_info,
        }
    }
}

impl From<HeaderXml> for Header {
    fn from(h: HeaderXml) -> Self {
        Header {
            msg_type: h.msg_type,
            msg_len: h.msg_len,
            error_len: h.error_len,
            bs_len: h.bs_len,
            int_info: h.int_info,
        }
    }
}

/// The two independently-sized body regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub message: Vec<u8>,
    pub error: Vec<u8>,
}

/// A complete framed message: header, body, and optional binary blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: Body,
    pub bin: Vec<u8>,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            msg_type: String::new(),
            msg_len: 0,
            error_len: 0,
            bs_len: 0,
            int_info: 0,
        }
    }
}

/// Writes `msg` to `stream`, setting `msg_len`/`error_len`/`bs_len` from the
/// body/bin the caller has already populated. Invariant (spec §3): those
/// three fields must equal the actual body/bin lengths on every emitted
/// message, so `write` recomputes them rather than trusting the caller.
pub async fn write<W: AsyncWrite + Unpin>(msg: &Message, stream: &mut W) -> Result<(), Error> {
    let header = Header {
        msg_len: msg.body.message.len() as u32,
        error_len: msg.body.error.len() as u32,
        bs_len: msg.bin.len() as u32,
        ..msg.header.clone()
    };

    let header_xml = HeaderXml::from(&header);
    let raw = quick_xml::se::to_string(&header_xml).map_err(Error::MalformedHeader)?;
    let xml = preprocess_xml(raw.as_bytes())?;

    let mut len_buf = [0u8; 4];
    BigEndian::write_u32(&mut len_buf, xml.len() as u32);

    stream.write_all(&len_buf).await?;
    stream.write_all(&xml).await?;
    stream.write_all(&msg.body.message).await?;
    stream.write_all(&msg.body.error).await?;
    stream.write_all(&msg.bin).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one framed message from `stream`.
pub async fn read<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Message, Error> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let header_len = BigEndian::read_u32(&len_buf) as usize;

    let mut header_xml_raw = vec![0u8; header_len];
    stream.read_exact(&mut header_xml_raw).await?;
    let header_xml_repaired = postprocess_xml(&header_xml_raw)?;

    let header_xml: HeaderXml = quick_xml::de::from_str(&header_xml_repaired)
        .map_err(Error::Xml)?;
    let header: Header = header_xml.into();

    let mut message = vec![0u8; header.msg_len as usize];
    stream.read_exact(&mut message).await?;

    let mut error = vec![0u8; header.error_len as usize];
    stream.read_exact(&mut error).await?;

    let mut bin = vec![0u8; header.bs_len as usize];
    stream.read_exact(&mut bin).await?;

    Ok(Message {
        header,
        body: Body { message, error },
        bin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_header_and_body() {
        let msg = Message {
            header: Header {
                msg_type: "RODS_API_REQ".to_string(),
                int_info: 42,
                ..Default::default()
            },
            body: Body {
                message: b"hello".to_vec(),
                error: b"".to_vec(),
            },
            bin: b"binary-blob".to_vec(),
        };

        let (mut client, mut server) = tokio::io::duplex(4096);
        write(&msg, &mut client).await.unwrap();
        drop(client);

        let got = read(&mut server).await.unwrap();
        assert_eq!(got.header.msg_type, "RODS_API_REQ");
        assert_eq!(got.header.int_info, 42);
        assert_eq!(got.header.msg_len, 5);
        assert_eq!(got.header.bs_len, 11);
        assert_eq!(got.body.message, b"hello");
        assert_eq!(got.body.error, b"");
        assert_eq!(got.bin, b"binary-blob");
    }

    #[tokio::test]
    async fn short_read_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(&[0, 0, 0, 10]).await.unwrap();
        client.write_all(b"short").await.unwrap();
        drop(client);

        assert!(read(&mut server).await.is_err());
    }
}
