//! Frame type and codec.
//!
//! Wire layout (big-endian decimals, US-ASCII structural bytes):
//!
//! ```text
//! CMD SP LEN10 SP SEQ10 LF          ; 27-byte header line
//! *( "kv" SP KEY SP LEN LF VALUE LF
//!  / "ro" SP RONUM SP LEN LF CONTENT LF
//!  / "po" SP DOTFORM ":" [PONUM] SP LEN LF CONTENT LF )
//! "end" LF
//! ```
//!
//! `LEN10` and `SEQ10` are exactly ten zero-padded decimal digits; item
//! lengths are variable-width decimal. The header-line `LEN10` counts every
//! byte after the header line's LF up to and including `end\n`.
//!
//! # Invariants
//!
//! - Length Accounting: a builder maintains an incremental byte counter as
//!   items are appended; [`Frame::encode`] emits exactly that many body
//!   bytes. The counter is never recomputed from scratch.
//!
//! - Ordering: headers, routing objects, and payload objects are kept in
//!   insertion order, and duplicates of a header key are permitted.
//!
//! - Exact Reads: decoding consumes the declared body byte-for-byte.
//!   Leftover bytes after `end\n`, a missing LF after a value, or an
//!   unrecognized item verb discard the whole frame.

use bytes::{BufMut, Bytes};

use crate::{WireError, payload::PayloadObject, ponum, routing::RoutingObject};

/// Protocol command codes (four ASCII bytes each).
pub mod commands {
    /// Router greeting, first frame on every connection.
    pub const HELLO: &str = "helo";
    /// Publish a message to a URI.
    pub const PUBLISH: &str = "publ";
    /// Publish with router-side persistence.
    pub const PERSIST: &str = "pers";
    /// Subscribe to a URI pattern.
    pub const SUBSCRIBE: &str = "subs";
    /// Tap-mode subscribe (no delivery acknowledgement).
    pub const TAP_SUBSCRIBE: &str = "tsub";
    /// List children of a URI; replies stream `child` headers.
    pub const LIST: &str = "list";
    /// Query persisted messages; also carries list-mode requests.
    pub const QUERY: &str = "quer";
    /// Tap-mode query.
    pub const TAP_QUERY: &str = "tque";
    /// Upload an access DOT to the registry.
    pub const PUT_DOT: &str = "putd";
    /// Upload an entity to the registry.
    pub const PUT_ENTITY: &str = "pute";
    /// Upload an access chain to the registry.
    pub const PUT_CHAIN: &str = "putc";
    /// Mint a declaration of trust.
    pub const MAKE_DOT: &str = "makd";
    /// Mint a new entity keypair.
    pub const MAKE_ENTITY: &str = "make";
    /// Assemble a delegation chain from DOT hashes.
    pub const MAKE_CHAIN: &str = "makc";
    /// Ask the router to discover chains granting permissions on a URI.
    pub const BUILD_CHAIN: &str = "bldc";
    /// Set the entity this session operates as.
    pub const SET_ENTITY: &str = "sete";
    /// Reply carrying an operation status.
    pub const RESPONSE: &str = "resp";
    /// Reply carrying streamed result data.
    pub const RESULT: &str = "rslt";
    /// Query account balances for the session entity.
    pub const ENTITY_BALANCES: &str = "ebal";
    /// Query the balance of one address.
    pub const ADDRESS_BALANCE: &str = "abal";
    /// Get or set chain-interaction parameters.
    pub const BC_PARAMS: &str = "bcip";
    /// Transfer value between accounts.
    pub const TRANSFER: &str = "xfer";
    /// Create a short alias.
    pub const MAKE_SHORT_ALIAS: &str = "mksa";
    /// Create a long alias.
    pub const MAKE_LONG_ALIAS: &str = "mkla";
    /// Resolve an alias to its value.
    pub const RESOLVE_ALIAS: &str = "resa";
    /// Offer to act as designated router for a namespace.
    pub const NEW_DR_OFFER: &str = "ndro";
    /// Accept a designated-router offer.
    pub const ACCEPT_DR_OFFER: &str = "adro";
    /// Resolve a registry object by key.
    pub const RESOLVE_REGISTRY: &str = "rsro";
    /// List designated-router offers for a namespace.
    pub const LIST_DR_OFFERS: &str = "ldro";
    /// Update the SRV record advertised for a designated router.
    pub const UPDATE_SRV_RECORD: &str = "usrv";
}

/// Well-known header keys.
pub mod headers {
    /// Operation outcome; anything other than `okay` is a failure.
    pub const STATUS: &str = "status";
    /// Failure detail accompanying a non-okay status.
    pub const REASON: &str = "reason";
    /// Stream delimiter; `true` terminates the reply stream.
    pub const FINISHED: &str = "finished";
    /// Router version, carried on the HELLO frame.
    pub const VERSION: &str = "version";
    /// Origin entity of an inbound message.
    pub const FROM: &str = "from";
    /// Resource URI.
    pub const URI: &str = "uri";
    /// Child segment streamed by list-mode queries.
    pub const CHILD: &str = "child";
    /// Verifying key of an entity.
    pub const VK: &str = "vk";
    /// Hash identifying a DOT or chain.
    pub const HASH: &str = "hash";
    /// Resolved alias content.
    pub const VALUE: &str = "value";
    /// Registry validity token.
    pub const VALIDITY: &str = "validity";
}

/// Byte length of the fixed frame header line.
pub const HEADER_LINE_LEN: usize = 27;

/// Body length of an empty frame (`end\n` alone).
const BASE_LENGTH: usize = 4;

/// One `kv` item: an ordered, duplicable key/value header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Printable key; never contains a space or newline.
    pub key: String,
    /// Opaque value bytes.
    pub value: Bytes,
}

/// One `po` item: a numeric type tag plus opaque content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    /// 32-bit payload-object type tag.
    pub ponum: u32,
    /// Raw content bytes.
    pub content: Bytes,
}

/// Parsed 27-byte frame header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    /// Four-character command code.
    pub cmd: String,
    /// Declared body length in bytes.
    pub length: usize,
    /// Sequence number correlating requests with replies.
    pub seqno: u32,
}

impl HeaderLine {
    /// Parse and validate the fixed header line.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedHeader`] on bad separators or a non-ASCII
    /// command; [`WireError::BadDecimal`] when either ten-digit field is
    /// not a decimal that fits 32 bits.
    pub fn parse(buf: &[u8; HEADER_LINE_LEN]) -> Result<Self, WireError> {
        if buf[4] != b' ' || buf[15] != b' ' || buf[26] != b'\n' {
            return Err(WireError::MalformedHeader);
        }
        let cmd = &buf[0..4];
        if !cmd.iter().all(|b| (0x21..=0x7e).contains(b)) {
            return Err(WireError::MalformedHeader);
        }
        let cmd = String::from_utf8_lossy(cmd).into_owned();
        let length = parse_padded_u32(&buf[5..15])? as usize;
        let seqno = parse_padded_u32(&buf[16..26])?;
        Ok(Self { cmd, length, seqno })
    }
}

/// Zero-padded decimal field; every byte must be a digit and the value
/// must fit in a u32.
fn parse_padded_u32(field: &[u8]) -> Result<u32, WireError> {
    let mut value: u64 = 0;
    for b in field {
        if !b.is_ascii_digit() {
            return Err(WireError::BadDecimal(String::from_utf8_lossy(field).into_owned()));
        }
        value = value * 10 + u64::from(b - b'0');
    }
    u32::try_from(value)
        .map_err(|_| WireError::BadDecimal(String::from_utf8_lossy(field).into_owned()))
}

/// A request or reply unit on the router connection.
///
/// Frames are built once, written once, and immutable after transmission.
/// The declared wire length is maintained incrementally by the `add_*`
/// builder methods so the emitter never recounts the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    cmd: String,
    seqno: u32,
    headers: Vec<Header>,
    ros: Vec<RoutingObject>,
    pos: Vec<PayloadEntry>,
    length: usize,
}

impl Frame {
    /// Create an empty frame for `cmd` with the given sequence number.
    pub fn new(cmd: &str, seqno: u32) -> Self {
        debug_assert_eq!(cmd.len(), 4, "command codes are four ASCII bytes");
        Self {
            cmd: cmd.to_owned(),
            seqno,
            headers: Vec::new(),
            ros: Vec::new(),
            pos: Vec::new(),
            length: BASE_LENGTH,
        }
    }

    /// Command code.
    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// Sequence number.
    pub fn seqno(&self) -> u32 {
        self.seqno
    }

    /// Declared body length: every byte after the header line's LF up to
    /// and including `end\n`.
    pub fn wire_length(&self) -> usize {
        self.length
    }

    /// Append a string-valued header.
    pub fn add_header(&mut self, key: &str, value: &str) {
        self.add_header_bytes(key, Bytes::copy_from_slice(value.as_bytes()));
    }

    /// Append a byte-valued header.
    pub fn add_header_bytes(&mut self, key: &str, value: impl Into<Bytes>) {
        let value = value.into();
        // 6 = "kv " + space + newline before content + newline after
        self.length += key.len() + decimal_width(value.len()) + 6 + value.len();
        self.headers.push(Header { key: key.to_owned(), value });
    }

    /// Append a routing object, transported verbatim.
    pub fn add_routing_object(&mut self, ro: RoutingObject) {
        // "ro " + ronum + space + length + newline + content + newline
        self.length += 3
            + decimal_width(usize::from(ro.ronum))
            + 1
            + decimal_width(ro.content.len())
            + 1
            + ro.content.len()
            + 1;
        self.ros.push(ro);
    }

    /// Append a typed payload object.
    pub fn add_payload_object(&mut self, po: &PayloadObject) {
        self.add_payload(po.ponum(), po.content().clone());
    }

    /// Append a raw payload entry.
    pub fn add_payload(&mut self, ponum: u32, content: impl Into<Bytes>) {
        let content = content.into();
        // "po " + dotform + colon + ponum + space + length + newline
        // + content + newline
        self.length += 3
            + ponum::dot_form(ponum).len()
            + 1
            + decimal_width(ponum as usize)
            + 1
            + decimal_width(content.len())
            + 1
            + content.len()
            + 1;
        self.pos.push(PayloadEntry { ponum, content });
    }

    /// All headers, in insertion order.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// All routing objects, in insertion order.
    pub fn routing_objects(&self) -> &[RoutingObject] {
        &self.ros
    }

    /// All payload entries, in insertion order.
    pub fn payloads(&self) -> &[PayloadEntry] {
        &self.pos
    }

    /// First value for `key`, lossily decoded to a string.
    pub fn first_header(&self, key: &str) -> Option<String> {
        self.first_header_bytes(key).map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// First value for `key` as raw bytes.
    pub fn first_header_bytes(&self, key: &str) -> Option<&Bytes> {
        self.headers.iter().find(|h| h.key == key).map(|h| &h.value)
    }

    /// Every value for `key`, in insertion order.
    pub fn all_headers(&self, key: &str) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| h.key == key)
            .map(|h| String::from_utf8_lossy(&h.value).into_owned())
            .collect()
    }

    /// Whether the first value of `key` equals `value`.
    pub fn header_is(&self, key: &str, value: &str) -> bool {
        self.first_header_bytes(key).is_some_and(|v| v.as_ref() == value.as_bytes())
    }

    /// Decode payload entry `index` through the constructor registry.
    pub fn payload_object(&self, index: usize) -> Result<PayloadObject, WireError> {
        let entry = self.pos.get(index).ok_or(WireError::Truncated)?;
        PayloadObject::load(entry.ponum, entry.content.clone())
    }

    /// Decode every payload entry, partitioning successes from failures so
    /// one malformed object never discards its siblings.
    pub fn payload_objects(&self) -> (Vec<PayloadObject>, Vec<WireError>) {
        let mut objects = Vec::with_capacity(self.pos.len());
        let mut errors = Vec::new();
        for entry in &self.pos {
            match PayloadObject::load(entry.ponum, entry.content.clone()) {
                Ok(po) => objects.push(po),
                Err(e) => errors.push(e),
            }
        }
        (objects, errors)
    }

    /// Encode the frame: header line, items in insertion order, `end\n`.
    ///
    /// # Errors
    ///
    /// [`WireError::BadCommand`] when the command code is not four
    /// printable ASCII bytes.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), WireError> {
        if self.cmd.len() != 4 || !self.cmd.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
            return Err(WireError::BadCommand(self.cmd.clone()));
        }
        dst.put_slice(format!("{} {:010} {:010}\n", self.cmd, self.length, self.seqno).as_bytes());
        for h in &self.headers {
            dst.put_slice(format!("kv {} {}\n", h.key, h.value.len()).as_bytes());
            dst.put_slice(&h.value);
            dst.put_u8(b'\n');
        }
        for ro in &self.ros {
            dst.put_slice(format!("ro {} {}\n", ro.ronum, ro.content.len()).as_bytes());
            dst.put_slice(&ro.content);
            dst.put_u8(b'\n');
        }
        for po in &self.pos {
            dst.put_slice(
                format!("po {}:{} {}\n", ponum::dot_form(po.ponum), po.ponum, po.content.len())
                    .as_bytes(),
            );
            dst.put_slice(&po.content);
            dst.put_u8(b'\n');
        }
        dst.put_slice(b"end\n");
        Ok(())
    }

    /// Decode one frame from `buf`.
    ///
    /// The declared body length is authoritative: exactly that many bytes
    /// are consumed after the header line, and bytes beyond them are
    /// ignored (the buffer may hold a partial stream).
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let head: &[u8; HEADER_LINE_LEN] =
            buf.get(..HEADER_LINE_LEN).and_then(|s| s.try_into().ok()).ok_or(WireError::Truncated)?;
        let line = HeaderLine::parse(head)?;
        let body = buf
            .get(HEADER_LINE_LEN..HEADER_LINE_LEN + line.length)
            .ok_or(WireError::Truncated)?;
        Self::decode_body(&line, body)
    }

    /// Decode the body that followed an already-parsed header line.
    ///
    /// Transports read the 27-byte header line first, then exactly
    /// `line.length` body bytes, then hand both here.
    pub fn decode_body(line: &HeaderLine, body: &[u8]) -> Result<Self, WireError> {
        let mut frame = Self::new(&line.cmd, line.seqno);
        let mut cur = BodyCursor { buf: body, pos: 0 };
        loop {
            let item = cur.line()?;
            if item == b"end" {
                let leftover = body.len() - cur.pos;
                if leftover != 0 {
                    return Err(WireError::TrailingBytes(leftover));
                }
                return Ok(frame);
            }
            let item = std::str::from_utf8(item).map_err(|_| WireError::BadUtf8)?;
            let tok: Vec<&str> = item.split(' ').collect();
            if tok.len() != 3 {
                return Err(WireError::MalformedItem(item.to_owned()));
            }
            match tok[0] {
                "kv" => {
                    let value = cur.value(parse_decimal(tok[2])? as usize)?;
                    frame.add_header_bytes(tok[1], value);
                }
                "ro" => {
                    let ronum = u8::try_from(parse_decimal(tok[1])?)
                        .map_err(|_| WireError::BadDecimal(tok[1].to_owned()))?;
                    let content = cur.value(parse_decimal(tok[2])? as usize)?;
                    frame.add_routing_object(RoutingObject { ronum, content });
                }
                "po" => {
                    let (dotform, num) =
                        tok[1].split_once(':').ok_or_else(|| WireError::MalformedItem(item.to_owned()))?;
                    // An empty numeric tag falls back to the dotted form.
                    let ponum = if num.is_empty() {
                        ponum::from_dot_form(dotform)?
                    } else {
                        parse_decimal(num)?
                    };
                    let content = cur.value(parse_decimal(tok[2])? as usize)?;
                    frame.add_payload(ponum, content);
                }
                verb => return Err(WireError::UnknownVerb(verb.to_owned())),
            }
        }
    }
}

/// Variable-width decimal as it appears in body item lines.
fn parse_decimal(field: &str) -> Result<u32, WireError> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WireError::BadDecimal(field.to_owned()));
    }
    field.parse::<u32>().map_err(|_| WireError::BadDecimal(field.to_owned()))
}

/// Width of `n` rendered in decimal; mirrors the emitter so the length
/// counter and the wire agree byte-for-byte.
fn decimal_width(n: usize) -> usize {
    let mut width = 1;
    let mut n = n / 10;
    while n > 0 {
        width += 1;
        n /= 10;
    }
    width
}

/// Positional reader over a frame body.
struct BodyCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyCursor<'a> {
    /// Bytes up to the next LF; consumes the LF.
    fn line(&mut self) -> Result<&'a [u8], WireError> {
        let rest = &self.buf[self.pos..];
        let nl = rest.iter().position(|b| *b == b'\n').ok_or(WireError::Truncated)?;
        self.pos += nl + 1;
        Ok(&rest[..nl])
    }

    /// Exactly `n` content bytes followed by their trailing LF.
    fn value(&mut self, n: usize) -> Result<Bytes, WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::Truncated)?;
        let content = self.buf.get(self.pos..end).ok_or(WireError::Truncated)?;
        if self.buf.get(end) != Some(&b'\n') {
            return Err(WireError::Truncated);
        }
        self.pos = end + 1;
        Ok(Bytes::copy_from_slice(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(frame: &Frame) -> Vec<u8> {
        let mut buf = Vec::new();
        frame.encode(&mut buf).expect("should encode");
        buf
    }

    #[test]
    fn header_line_boundary() {
        let mut frame = Frame::new(commands::HELLO, 0);
        frame.add_header("version", "2.4.15");
        let buf = wire(&frame);

        let head: &[u8; HEADER_LINE_LEN] = buf[..HEADER_LINE_LEN].try_into().unwrap();
        let line = HeaderLine::parse(head).expect("should parse");
        assert_eq!(line.cmd, "helo");
        assert_eq!(line.seqno, 0);
        assert_eq!(line.length, buf.len() - HEADER_LINE_LEN);

        // The header alone is not a frame; the body must follow.
        assert_eq!(Frame::decode(&buf[..HEADER_LINE_LEN]), Err(WireError::Truncated));
    }

    #[test]
    fn declared_length_matches_emitted_body() {
        let mut frame = Frame::new(commands::PUBLISH, 42);
        frame.add_header("uri", "scratch.ns/test");
        frame.add_header("doverify", "true");
        frame.add_header_bytes("blob", vec![0u8, 1, 2, 254]);
        frame.add_routing_object(RoutingObject {
            ronum: crate::ronum::ENTITY_WKEY,
            content: Bytes::from_static(b"opaque"),
        });
        frame.add_payload(0x4000_0100, Bytes::from_static(b"hello"));
        let buf = wire(&frame);
        assert_eq!(frame.wire_length(), buf.len() - HEADER_LINE_LEN);
    }

    #[test]
    fn round_trip_preserves_order_and_duplicates() {
        let mut frame = Frame::new(commands::PUBLISH, 7);
        frame.add_header("revoker", "a");
        frame.add_header("revoker", "b");
        frame.add_header("uri", "ns/x");
        frame.add_payload(0x4000_0100, Bytes::from_static(b"one"));
        frame.add_payload(0, Bytes::new());

        let decoded = Frame::decode(&wire(&frame)).expect("should decode");
        assert_eq!(decoded, frame);
        assert_eq!(decoded.all_headers("revoker"), vec!["a", "b"]);
    }

    #[test]
    fn empty_numeric_ponum_falls_back_to_dot_form() {
        let body = b"po 64.0.1.0: 5\nhello\nend\n";
        let line = HeaderLine {
            cmd: commands::RESULT.to_owned(),
            length: body.len(),
            seqno: 3,
        };
        let frame = Frame::decode_body(&line, body).expect("should decode");
        assert_eq!(frame.payloads().len(), 1);
        assert_eq!(frame.payloads()[0].ponum, 0x4000_0100);
        assert_eq!(frame.payloads()[0].content.as_ref(), b"hello");
    }

    #[test]
    fn unknown_verb_is_fatal() {
        let body = b"xx what 3\nabc\nend\n";
        let line = HeaderLine { cmd: "rslt".to_owned(), length: body.len(), seqno: 1 };
        assert_eq!(
            Frame::decode_body(&line, body),
            Err(WireError::UnknownVerb("xx".to_owned()))
        );
    }

    #[test]
    fn truncated_value_is_fatal() {
        let body = b"kv version 10\n2.4\nend\n";
        let line = HeaderLine { cmd: "helo".to_owned(), length: body.len(), seqno: 0 };
        assert_eq!(Frame::decode_body(&line, body), Err(WireError::Truncated));
    }

    #[test]
    fn bytes_after_end_are_fatal() {
        let body = b"end\nkv x 1\ny\n";
        let line = HeaderLine { cmd: "resp".to_owned(), length: body.len(), seqno: 2 };
        assert!(matches!(
            Frame::decode_body(&line, body),
            Err(WireError::TrailingBytes(_))
        ));
    }

    #[test]
    fn header_line_rejects_bad_separators() {
        let mut buf = [b'0'; HEADER_LINE_LEN];
        buf[0..4].copy_from_slice(b"helo");
        buf[4] = b'_';
        buf[15] = b' ';
        buf[26] = b'\n';
        assert_eq!(HeaderLine::parse(&buf), Err(WireError::MalformedHeader));
    }

    #[test]
    fn header_line_rejects_overflowing_seqno() {
        let rendered = format!("helo {:010} 9999999999\n", 4);
        let buf: &[u8; HEADER_LINE_LEN] = rendered.as_bytes().try_into().unwrap();
        assert!(matches!(HeaderLine::parse(buf), Err(WireError::BadDecimal(_))));
    }
}
