//! RFC 6242 message framing as a tokio-util codec.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Framing, EOM_DELIMITER};
use crate::transport::TransportError;

/// Upper bound for a single chunk header's size field (RFC 6242: 4294967295).
const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// Codec for NETCONF messages. Starts in end-of-message framing, as every
/// session does until the hellos are exchanged.
#[derive(Debug, Default)]
pub struct NetconfCodec {
    framing: Framing,
}

impl NetconfCodec {
    /// Create a codec with 1.0 framing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current framing.
    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Switch framing; takes effect for the next message in either direction.
    pub fn set_framing(&mut self, framing: Framing) {
        self.framing = framing;
    }

    fn decode_eom(src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        let delimiter = EOM_DELIMITER.as_bytes();
        let Some(pos) = src
            .windows(delimiter.len())
            .position(|window| window == delimiter)
        else {
            return Ok(None);
        };

        let message = src.split_to(pos);
        src.advance(delimiter.len());
        to_string(&message).map(Some)
    }

    /// Parse a chunked message without consuming anything until it is complete.
    fn decode_chunked(src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        let mut pos = 0;
        let mut body = Vec::new();

        loop {
            if src.len() < pos + 4 {
                return Ok(None);
            }
            if &src[pos..pos + 2] != b"\n#" {
                return Err(TransportError::Framing(format!(
                    "expected chunk header at byte {}",
                    pos
                )));
            }
            pos += 2;

            if src[pos] == b'#' {
                if src[pos + 1] != b'\n' {
                    return Err(TransportError::Framing(
                        "malformed end-of-chunks marker".to_string(),
                    ));
                }
                src.advance(pos + 2);
                return to_string(&body).map(Some);
            }

            let Some(newline) = src[pos..].iter().position(|b| *b == b'\n') else {
                if src.len() - pos > 10 {
                    return Err(TransportError::Framing("chunk size too long".to_string()));
                }
                return Ok(None);
            };

            let size_field = std::str::from_utf8(&src[pos..pos + newline])
                .map_err(|_| TransportError::Framing("non-ascii chunk size".to_string()))?;
            let size: u64 = size_field
                .parse()
                .map_err(|_| TransportError::Framing(format!("invalid chunk size '{}'", size_field)))?;
            if size == 0 || size > MAX_CHUNK_SIZE {
                return Err(TransportError::Framing(format!(
                    "chunk size {} out of range",
                    size
                )));
            }

            let data_start = pos + newline + 1;
            let data_end = data_start + size as usize;
            if src.len() < data_end {
                return Ok(None);
            }
            body.extend_from_slice(&src[data_start..data_end]);
            pos = data_end;
        }
    }
}

fn to_string(bytes: &[u8]) -> Result<String, TransportError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| TransportError::Framing(format!("message is not UTF-8: {}", e)))
}

impl Decoder for NetconfCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        match self.framing {
            Framing::EndOfMessage => Self::decode_eom(src),
            Framing::Chunked => Self::decode_chunked(src),
        }
    }
}

impl Encoder<String> for NetconfCodec {
    type Error = TransportError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), TransportError> {
        match self.framing {
            Framing::EndOfMessage => {
                dst.reserve(item.len() + EOM_DELIMITER.len() + 1);
                dst.put_slice(item.as_bytes());
                dst.put_u8(b'\n');
                dst.put_slice(EOM_DELIMITER.as_bytes());
            }
            Framing::Chunked => {
                if !item.is_empty() {
                    dst.put_slice(format!("\n#{}\n", item.len()).as_bytes());
                    dst.put_slice(item.as_bytes());
                }
                dst.put_slice(b"\n##\n");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eom_decode_waits_for_delimiter() {
        let mut codec = NetconfCodec::new();
        let mut buf = BytesMut::from("<hello/>]]>");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"]]><rpc-reply/>");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("<hello/>"));
        assert_eq!(&buf[..], b"<rpc-reply/>");
    }

    #[test]
    fn test_chunked_decode_multiple_chunks() {
        let mut codec = NetconfCodec::new();
        codec.set_framing(Framing::Chunked);

        let mut buf = BytesMut::from("\n#4\n<rpc\n#24\n-reply><ok/></rpc-reply>\n##\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("<rpc-reply><ok/></rpc-reply>")
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_chunked_decode_partial() {
        let mut codec = NetconfCodec::new();
        codec.set_framing(Framing::Chunked);

        let mut buf = BytesMut::from("\n#10\n<rpc-r");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"eply\n##");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("<rpc-reply"));
    }

    #[test]
    fn test_chunked_rejects_garbage() {
        let mut codec = NetconfCodec::new();
        codec.set_framing(Framing::Chunked);
        let mut buf = BytesMut::from("<rpc-reply/>");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::Framing(_))
        ));

        let mut zero = BytesMut::from("\n#0\n\n##\n");
        assert!(codec.decode(&mut zero).is_err());
    }

    #[test]
    fn test_encode_both_framings() {
        let mut codec = NetconfCodec::new();
        let mut out = BytesMut::new();
        codec.encode("<rpc/>".to_string(), &mut out).unwrap();
        assert_eq!(&out[..], b"<rpc/>\n]]>]]>");

        codec.set_framing(Framing::Chunked);
        let mut out = BytesMut::new();
        codec.encode("<rpc/>".to_string(), &mut out).unwrap();
        assert_eq!(&out[..], b"\n#6\n<rpc/>\n##\n");

        let decoded = codec.decode(&mut out).unwrap();
        assert_eq!(decoded.as_deref(), Some("<rpc/>"));
    }
}
