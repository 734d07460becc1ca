//! JSON envelope (spec §4.4). A struct payload lacking an XML element-name
//! marker is serialized to JSON and wrapped in a `BinBytesBuf`, which then
//! rides the ordinary struct dialect path so it looks, on the wire, like
//! any other native/XML struct.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::dialect::Dialect;
use super::error::Error;
use super::native::{NativeReader, NativeWriter};
use super::payload::{decode_struct, encode_struct, StructPayload};

/// Wraps a JSON document so it can ride the same message shape as other
/// struct payloads. `data` holds the raw JSON text in `Native` dialect and
/// base64-encoded JSON in `Xml` dialect (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "BinBytesBuf_PI")]
pub struct BinBytesBuf {
    #[serde(rename = "buflen")]
    pub length: u32,
    #[serde(rename = "buf")]
    pub data: String,
}

impl StructPayload for BinBytesBuf {
    const XML_TAG: &'static str = "BinBytesBuf_PI";

    fn encode_native(&self) -> Result<Vec<u8>, Error> {
        let mut w = NativeWriter::new();
        w.write_i32(self.length as i32);
        w.write_string(&self.data);
        Ok(w.into_bytes())
    }

    fn decode_native(buf: Vec<u8>) -> Result<Self, Error> {
        let mut r = NativeReader::new(buf);
        let length = r.read_i32()? as u32;
        let data = r.read_string()?;
        Ok(Self { length, data })
    }
}

/// Serializes `value` to JSON and wraps it as a `BinBytesBuf`, encoded per
/// `dialect` by the ordinary struct-dialect path.
pub fn marshal_json<T: Serialize>(value: &T, dialect: Dialect) -> Result<Vec<u8>, Error> {
    let json = serde_json::to_vec(value)?;
    let data = match dialect {
        Dialect::Native => {
            String::from_utf8(json.clone()).map_err(|e| Error::InvalidUtf8(e.utf8_error()))?
        }
        Dialect::Xml => STANDARD.encode(&json),
    };
    let envelope = BinBytesBuf {
        length: json.len() as u32,
        data,
    };
    encode_struct(&envelope, dialect)
}

/// Inverse of [`marshal_json`]: decodes the envelope, undoes the
/// dialect-specific transport encoding, trims any trailing NUL padding,
/// and parses the JSON.
pub fn unmarshal_json<T: DeserializeOwned>(buf: Vec<u8>, dialect: Dialect) -> Result<T, Error> {
    let envelope: BinBytesBuf = decode_struct(buf, dialect)?;
    let mut raw = match dialect {
        Dialect::Native => envelope.data.into_bytes(),
        Dialect::Xml => STANDARD.decode(envelope.data.as_bytes())?,
    };
    while raw.last() == Some(&0) {
        raw.pop();
    }
    Ok(serde_json::from_slice(&raw)?)
}
