//! In-memory record writer
//!
//! Records are appended to a growable buffer so that offsets written early
//! in the stream can be patched once later parts have been sized.

use super::records::{HEADER_LEN, MAX_RECORD_DATA};
use crate::error::{BiffError, Result};

/// Little-endian field helpers for building record payloads
pub trait PutLe {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_f64(&mut self, v: f64);
}

impl PutLe for Vec<u8> {
    #[inline]
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    #[inline]
    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn put_f64(&mut self, v: f64) {
        self.extend_from_slice(&v.to_le_bytes());
    }
}

/// Record stream writer backed by a byte buffer
pub struct RecordWriter {
    buffer: Vec<u8>,
    scratch: Vec<u8>,
}

impl Default for RecordWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordWriter {
    pub fn new() -> Self {
        RecordWriter {
            buffer: Vec::with_capacity(8192),
            scratch: Vec::with_capacity(256),
        }
    }

    /// Write one record
    pub fn write_record(&mut self, record_type: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_RECORD_DATA {
            return Err(BiffError::InvalidFormat(format!(
                "record 0x{record_type:04X} payload of {} bytes exceeds {MAX_RECORD_DATA}",
                payload.len()
            )));
        }
        self.buffer.reserve(HEADER_LEN + payload.len());
        self.buffer.extend_from_slice(&record_type.to_le_bytes());
        self.buffer.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        self.buffer.extend_from_slice(payload);
        Ok(())
    }

    /// Build a payload in a reused scratch buffer, then write it
    pub fn record_with<F>(&mut self, record_type: u16, build: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut payload = std::mem::take(&mut self.scratch);
        payload.clear();
        let built = build(&mut payload);
        let result = built.and_then(|_| self.write_record(record_type, &payload));
        self.scratch = payload;
        result
    }

    /// Append bytes that are already framed as records
    pub fn write_raw(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Current length of the stream
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Overwrite a `u32` previously written at `at`
    pub fn patch_u32(&mut self, at: usize, value: u32) -> Result<()> {
        match self.buffer.get_mut(at..at + 4) {
            Some(slot) => {
                slot.copy_from_slice(&value.to_le_bytes());
                Ok(())
            }
            None => Err(BiffError::InvalidFormat(format!(
                "patch position {at} is outside the stream"
            ))),
        }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}
