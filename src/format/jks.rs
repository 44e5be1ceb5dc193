//! Java KeyStore (JKS) binary container.
//!
//! Layout (all integers big-endian):
//! magic `FEEDFEED`, version, entry count, then per entry a tag
//! (1 = private key, 2 = trusted certificate), the alias as Java
//! modified UTF-8 with a u16 length, a millisecond timestamp and the
//! entry body. Version 2 prefixes every certificate with its type name.
//! The file ends with a SHA-1 digest over the UTF-16BE passphrase, the
//! string "Mighty Aphrodite" and everything before the digest.

use sha1::{Digest, Sha1};
use time::OffsetDateTime;

use super::{check_x509, ContainerFormat, ProbeOutcome, StoreFormat};
use crate::error::FormatError;
use crate::passphrase::Passphrase;
use crate::store::{JksKeyEntry, KeyMaterial, StoreEntry, TrustStore, TrustedCertificate};

const MAGIC: u32 = 0xFEED_FEED;
const VERSION_1: u32 = 1;
const VERSION_2: u32 = 2;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;
const CERT_TYPE: &str = "X.509";

pub struct Jks;

impl ContainerFormat for Jks {
    fn kind(&self) -> StoreFormat {
        StoreFormat::Jks
    }

    fn open(&self, bytes: &[u8], passphrase: &Passphrase) -> Result<TrustStore, ProbeOutcome> {
        let mut header = Reader::new(bytes);
        let (magic, version) = match (header.u32(), header.u32()) {
            (Ok(m), Ok(v)) => (m, v),
            _ => return Err(ProbeOutcome::WrongFormat("shorter than a JKS header".into())),
        };
        if magic != MAGIC {
            return Err(ProbeOutcome::WrongFormat(format!("magic {magic:#010x}")));
        }
        if version != VERSION_1 && version != VERSION_2 {
            return Err(ProbeOutcome::WrongFormat(format!("unsupported JKS version {version}")));
        }
        if bytes.len() < 12 + DIGEST_LEN {
            return Err(FormatError::Truncated.into());
        }

        let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
        if integrity_digest(passphrase, body) != digest {
            return Err(FormatError::IntegrityCheckFailed.into());
        }

        let mut r = Reader::new(&body[8..]);
        let count = r.u32()?;
        let mut store = TrustStore::new(StoreFormat::Jks);
        for _ in 0..count {
            let tag = r.u32()?;
            let alias = r.utf()?;
            let created = from_millis(r.i64()?)?;
            let entry = match tag {
                TAG_PRIVATE_KEY => {
                    let protected_key = r.bytes()?.to_vec();
                    let chain_len = r.u32()?;
                    let mut chain = Vec::new();
                    for _ in 0..chain_len {
                        chain.push(read_certificate(&mut r, version)?);
                    }
                    StoreEntry::Key(KeyMaterial::Jks(JksKeyEntry {
                        protected_key,
                        chain,
                        created,
                    }))
                }
                TAG_TRUSTED_CERT => {
                    let der = read_certificate(&mut r, version)?;
                    StoreEntry::Trusted(TrustedCertificate::with_created(der, created))
                }
                other => {
                    return Err(FormatError::MalformedEntry(format!("unknown entry tag {other}")).into())
                }
            };
            store.insert_entry(&alias, entry);
        }
        if !r.is_empty() {
            return Err(FormatError::MalformedEntry("trailing data after last entry".into()).into());
        }
        Ok(store)
    }

    fn encode(&self, store: &TrustStore, passphrase: &Passphrase) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&VERSION_2.to_be_bytes());
        out.extend_from_slice(&len_u32(store.len())?.to_be_bytes());

        for (alias, entry) in store.entries() {
            match entry {
                StoreEntry::Trusted(cert) => {
                    out.extend_from_slice(&TAG_TRUSTED_CERT.to_be_bytes());
                    write_utf(&mut out, alias)?;
                    out.extend_from_slice(&to_millis(cert.created()).to_be_bytes());
                    write_certificate(&mut out, cert.der())?;
                }
                StoreEntry::Key(KeyMaterial::Jks(key)) => {
                    out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
                    write_utf(&mut out, alias)?;
                    out.extend_from_slice(&to_millis(key.created).to_be_bytes());
                    write_bytes(&mut out, &key.protected_key)?;
                    out.extend_from_slice(&len_u32(key.chain.len())?.to_be_bytes());
                    for der in &key.chain {
                        write_certificate(&mut out, der)?;
                    }
                }
                StoreEntry::Key(_) => {
                    return Err(FormatError::UnsupportedEntry {
                        alias: alias.to_string(),
                        format: StoreFormat::Jks,
                    })
                }
            }
        }

        let digest = integrity_digest(passphrase, &out);
        out.extend_from_slice(&digest);
        Ok(out)
    }
}

fn integrity_digest(passphrase: &Passphrase, body: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    for unit in passphrase.utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(WHITENER);
    hasher.update(body);
    hasher.finalize().to_vec()
}

fn read_certificate(r: &mut Reader<'_>, version: u32) -> Result<Vec<u8>, FormatError> {
    if version == VERSION_2 {
        let cert_type = r.utf()?;
        if cert_type != CERT_TYPE {
            return Err(FormatError::MalformedCertificate(format!(
                "unsupported certificate type {cert_type}"
            )));
        }
    }
    let der = r.bytes()?;
    check_x509(der)?;
    Ok(der.to_vec())
}

fn write_certificate(out: &mut Vec<u8>, der: &[u8]) -> Result<(), FormatError> {
    write_utf(out, CERT_TYPE)?;
    write_bytes(out, der)
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), FormatError> {
    out.extend_from_slice(&len_u32(bytes.len())?.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<(), FormatError> {
    let encoded = encode_modified_utf8(s);
    let len = u16::try_from(encoded.len())
        .map_err(|_| FormatError::MalformedEntry(format!("alias too long: {} bytes", encoded.len())))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

fn len_u32(len: usize) -> Result<u32, FormatError> {
    u32::try_from(len).map_err(|_| FormatError::MalformedEntry(format!("length {len} exceeds u32")))
}

fn to_millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(ms: i64) -> Result<OffsetDateTime, FormatError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|_| FormatError::MalformedEntry(format!("timestamp {ms} out of range")))
}

/// Java's modified UTF-8: NUL takes two bytes, supplementary characters
/// are written as two three-byte surrogates.
fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

fn decode_modified_utf8(bytes: &[u8]) -> Result<String, FormatError> {
    let malformed = || FormatError::MalformedEntry("invalid modified UTF-8 alias".into());
    let cont = |i: usize| match bytes.get(i) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        _ => Err(malformed()),
    };

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | cont(i + 1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push((u16::from(b & 0x0F) << 12) | (cont(i + 1)? << 6) | cont(i + 2)?);
            i += 3;
        } else {
            return Err(malformed());
        }
    }
    String::from_utf16(&units).map_err(|_| malformed())
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.buf.len() < n {
            return Err(FormatError::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, FormatError> {
        let b = self.take(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(i64::from_be_bytes(arr))
    }

    fn bytes(&mut self) -> Result<&'a [u8], FormatError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn utf(&mut self) -> Result<String, FormatError> {
        let len = usize::from(self.u16()?);
        decode_modified_utf8(self.take(len)?)
    }
}
