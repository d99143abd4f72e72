// VCDIFF decoder: instruction decoding and window reconstruction.
//
// Follows the state progression of the RFC 3284 decoder: parse the file
// header, then for each window parse the window header, read the three
// sub-sections, and execute instructions against the code table.
//
// Performance notes:
//   - Section buffers (data/inst/addr) are reused across windows in StreamDecoder
//   - Source COPY uses zero-copy slice access when source is in memory
//   - A reusable copy_buf handles non-contiguous sources without per-COPY allocation
//   - Output Vec is pre-sized to target_window_len

use std::io::{Read, Seek, SeekFrom};

use super::address_cache::AddressCache;
use super::adler32;
use super::code_table::{self, CodeTable, Instruction, XD3_ADD, XD3_CPY, XD3_NOOP, XD3_RUN};
use super::header::{FileHeader, WindowHeader};
use super::varint;

// ---------------------------------------------------------------------------
// Decoder error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("unsupported: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Source provider trait
// ---------------------------------------------------------------------------

/// Provides source data for COPY instructions that reference source bytes.
pub trait SourceProvider {
    /// Read bytes from the source at absolute offset `offset` into `buf`.
    /// Returns the number of bytes actually read.
    fn read_source(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, DecodeError>;

    /// Total source length (if known).
    fn source_len(&self) -> Option<u64>;

    /// Direct zero-copy slice access for in-memory sources.
    ///
    /// Returns `Some(slice)` if the source data at `[offset..offset+len]`
    /// is available as a contiguous memory slice. Returns `None` if the
    /// source is not contiguous (e.g., file-backed, chunked).
    ///
    /// When available, the decoder uses this to avoid intermediate buffer
    /// allocations on every COPY instruction.
    fn source_slice(&self, _offset: u64, _len: usize) -> Option<&[u8]> {
        None
    }
}

/// In-memory source.
impl SourceProvider for &[u8] {
    fn read_source(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, DecodeError> {
        let offset = offset as usize;
        if offset >= self.len() {
            return Ok(0);
        }
        let available = &self[offset..];
        let n = buf.len().min(available.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn source_len(&self) -> Option<u64> {
        Some(self.len() as u64)
    }

    fn source_slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let offset = offset as usize;
        if offset + len <= self.len() {
            Some(&self[offset..offset + len])
        } else {
            None
        }
    }
}

/// No-source provider (for delta streams without a source file).
pub struct NoSource;

impl SourceProvider for NoSource {
    fn read_source(&mut self, _offset: u64, _buf: &mut [u8]) -> Result<usize, DecodeError> {
        Err(DecodeError::InvalidInput(
            "COPY references source but no source provided".into(),
        ))
    }

    fn source_len(&self) -> Option<u64> {
        None
    }
}

// ---------------------------------------------------------------------------
// Window decoder
// ---------------------------------------------------------------------------

/// Borrowed DATA/INST/ADDR section triplet for one window.
#[derive(Clone, Copy)]
pub struct WindowSections<'a> {
    pub data: &'a [u8],
    pub inst: &'a [u8],
    pub addr: &'a [u8],
}

/// Decodes a single VCDIFF window given the three sections and a source.
///
/// `copy_buf` is a reusable buffer for source COPY operations when zero-copy
/// slice access is not available. It is resized as needed and persists across
/// calls to avoid per-COPY allocations.
pub fn decode_window<S: SourceProvider>(
    header: &WindowHeader,
    data_section: &[u8],
    inst_section: &[u8],
    addr_section: &[u8],
    source: &mut S,
    verify_checksum: bool,
    copy_buf: &mut Vec<u8>,
) -> Result<Vec<u8>, DecodeError> {
    let target_len = header.target_window_len as usize;
    let mut output = Vec::with_capacity(target_len);
    decode_window_into(
        header,
        WindowSections {
            data: data_section,
            inst: inst_section,
            addr: addr_section,
        },
        source,
        verify_checksum,
        copy_buf,
        &mut output,
    )?;
    Ok(output)
}

/// Decodes a single VCDIFF window, appending output to `output`.
///
/// This avoids the intermediate Vec allocation that `decode_window` performs.
/// Target self-copy addresses are adjusted for the base offset in `output`.
pub fn decode_window_into<S: SourceProvider>(
    header: &WindowHeader,
    sections: WindowSections<'_>,
    source: &mut S,
    verify_checksum: bool,
    copy_buf: &mut Vec<u8>,
    output: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    let mut acache = AddressCache::new();
    decode_window_with_cache(
        header,
        sections.data,
        sections.inst,
        sections.addr,
        source,
        verify_checksum,
        copy_buf,
        output,
        &mut acache,
    )
}

/// Internal: decode a window using a reusable AddressCache (avoids re-allocation).
#[allow(clippy::too_many_arguments)]
fn decode_window_with_cache<S: SourceProvider>(
    header: &WindowHeader,
    data_section: &[u8],
    inst_section: &[u8],
    addr_section: &[u8],
    source: &mut S,
    verify_checksum: bool,
    copy_buf: &mut Vec<u8>,
    output: &mut Vec<u8>,
    acache: &mut AddressCache,
) -> Result<(), DecodeError> {
    let target_len = header.target_window_len as usize;

    // Base offset: self-copy addresses in the current window are relative to
    // the window start, so we need to know where this window begins in the
    // (possibly multi-window) output buffer.
    let base_offset = output.len();
    output.reserve(target_len);

    acache.init();

    let mut data_pos: usize = 0;
    let mut inst_pos: usize = 0;
    let mut addr_pos: usize = 0;

    let code_table = code_table::default_code_table();

    // Current position in the target address space.
    let mut target_pos: u64 = 0;

    while inst_pos < inst_section.len() {
        let opcode = inst_section[inst_pos];
        inst_pos += 1;

        let entry = &code_table[opcode as usize];

        // Process first half-instruction.
        if entry.type1 != XD3_NOOP {
            execute_half_instruction(
                entry.type1,
                entry.size1,
                &mut inst_pos,
                inst_section,
                &mut data_pos,
                data_section,
                &mut addr_pos,
                addr_section,
                acache,
                header,
                &mut target_pos,
                output,
                source,
                copy_buf,
                base_offset,
            )?;
        }

        // Process second half-instruction.
        if entry.type2 != XD3_NOOP {
            execute_half_instruction(
                entry.type2,
                entry.size2,
                &mut inst_pos,
                inst_section,
                &mut data_pos,
                data_section,
                &mut addr_pos,
                addr_section,
                acache,
                header,
                &mut target_pos,
                output,
                source,
                copy_buf,
                base_offset,
            )?;
        }
    }

    // Validate target size.
    let written = output.len() - base_offset;
    if written as u64 != header.target_window_len {
        return Err(DecodeError::InvalidInput(format!(
            "target size mismatch: expected {}, got {}",
            header.target_window_len, written
        )));
    }

    // Validate checksum.
    if verify_checksum && let Some(expected) = header.adler32 {
        let actual = adler32::compute(&output[base_offset..]);
        if actual != expected {
            log::warn!("window at target offset {base_offset}: checksum mismatch");
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }
    }

    log::debug!("decoded window: {written} bytes at target offset {base_offset}");

    Ok(())
}

/// Execute a single half-instruction.
#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn execute_half_instruction<S: SourceProvider>(
    itype: u8,
    table_size: u8,
    inst_pos: &mut usize,
    inst_section: &[u8],
    data_pos: &mut usize,
    data_section: &[u8],
    addr_pos: &mut usize,
    addr_section: &[u8],
    acache: &mut AddressCache,
    header: &WindowHeader,
    target_pos: &mut u64,
    output: &mut Vec<u8>,
    source: &mut S,
    copy_buf: &mut Vec<u8>,
    base_offset: usize,
) -> Result<(), DecodeError> {
    let copy_window_len = header.copy_window_len;
    let copy_window_offset = header.copy_window_offset;

    // Resolve size: if table_size==0, read from instruction section.
    let size = if table_size == 0 {
        let (val, consumed) = varint::read_u32(&inst_section[*inst_pos..])
            .map_err(|e| DecodeError::InvalidInput(format!("bad instruction size: {e}")))?;
        *inst_pos += consumed;
        val
    } else {
        table_size as u32
    };

    let size_usize = size as usize;

    match itype {
        XD3_RUN => {
            // Read 1 byte from data section, repeat `size` times.
            if *data_pos >= data_section.len() {
                return Err(DecodeError::InvalidInput(
                    "data section underflow (RUN)".into(),
                ));
            }
            let byte = data_section[*data_pos];
            *data_pos += 1;
            output.resize(output.len() + size_usize, byte);
            *target_pos += size as u64;
        }

        XD3_ADD => {
            // Read `size` bytes from data section.
            let end = *data_pos + size_usize;
            if end > data_section.len() {
                return Err(DecodeError::InvalidInput(
                    "data section underflow (ADD)".into(),
                ));
            }
            output.extend_from_slice(&data_section[*data_pos..end]);
            *data_pos += size_usize;
            *target_pos += size as u64;
        }

        _ => {
            // COPY: itype >= XD3_CPY, mode = itype - XD3_CPY
            let mode = itype - XD3_CPY;

            // Decode address.
            let here = copy_window_len + *target_pos;
            let (addr, consumed) = acache
                .decode(mode, &addr_section[*addr_pos..], here)
                .map_err(|e| DecodeError::InvalidInput(format!("address decode: {e}")))?;
            *addr_pos += consumed;

            // Validate: copy must not span the source/target boundary.
            if addr < copy_window_len && addr + size as u64 > copy_window_len {
                return Err(DecodeError::InvalidInput(
                    "COPY spans source/target boundary".into(),
                ));
            }

            if addr < copy_window_len {
                if header.has_source() {
                    // Copy from the external source.
                    let src_offset = copy_window_offset + addr;

                    // Zero-copy fast path: use direct slice access when available.
                    if let Some(slice) = source.source_slice(src_offset, size_usize) {
                        output.extend_from_slice(slice);
                    } else {
                        // Fallback: use the reusable copy buffer.
                        copy_buf.resize(size_usize, 0);
                        let n = source.read_source(src_offset, copy_buf)?;
                        if n < size_usize {
                            return Err(DecodeError::InvalidInput(format!(
                                "source underflow: requested {size_usize} bytes at offset {src_offset}, got {n}"
                            )));
                        }
                        output.extend_from_slice(&copy_buf[..size_usize]);
                    }
                } else {
                    // VCD_TARGET window: the copy window is a region of the
                    // output already produced by an earlier window, addressed
                    // absolutely (not relative to this window's base_offset).
                    let abs_start = (copy_window_offset + addr) as usize;
                    let abs_end = abs_start + size_usize;
                    if abs_end > output.len() {
                        return Err(DecodeError::InvalidInput(
                            "target copy window underflow".into(),
                        ));
                    }
                    output.extend_from_within(abs_start..abs_end);
                }
            } else {
                // Target self-copy: addresses are relative to the current
                // window. Adjust by base_offset because `output` may already
                // contain previous windows.
                let tgt_offset = base_offset + (addr - copy_window_len) as usize;
                if tgt_offset + size_usize <= output.len() {
                    // Fast path: non-overlapping — use optimized bulk copy.
                    output.extend_from_within(tgt_offset..tgt_offset + size_usize);
                } else {
                    // Slow path: overlapping regions (RLE-like patterns where
                    // src and dst overlap). Must be byte-by-byte so reads see
                    // previously written output bytes.
                    for i in 0..size_usize {
                        let byte = output[tgt_offset + i];
                        output.push(byte);
                    }
                }
            }

            *target_pos += size as u64;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Stream decoder
// ---------------------------------------------------------------------------

/// Decodes a complete VCDIFF stream (file header + all windows).
///
/// Buffers are reused across windows to minimize allocations:
/// - Section buffers (data/inst/addr) grow to the largest section seen
/// - A copy buffer is reused across COPY instructions
pub struct StreamDecoder<R> {
    reader: R,
    file_header: Option<FileHeader>,
    verify_checksum: bool,
    /// Reusable section buffers (grow to largest section, never shrink).
    data_buf: Vec<u8>,
    inst_buf: Vec<u8>,
    addr_buf: Vec<u8>,
    /// Reusable buffer for source COPY (fallback when zero-copy unavailable).
    copy_buf: Vec<u8>,
    /// Reusable address cache (avoids re-allocation per window).
    acache: AddressCache,
}

impl<R: Read> StreamDecoder<R> {
    /// Create a new stream decoder.
    pub fn new(reader: R, verify_checksum: bool) -> Self {
        Self {
            reader,
            file_header: None,
            verify_checksum,
            data_buf: Vec::new(),
            inst_buf: Vec::new(),
            addr_buf: Vec::new(),
            copy_buf: Vec::new(),
            acache: AddressCache::new(),
        }
    }

    /// Read and return the file header.
    pub fn read_header(&mut self) -> Result<&FileHeader, DecodeError> {
        self.ensure_header()?;
        Ok(self.file_header.as_ref().unwrap())
    }

    /// Decode the file header if it hasn't been read yet.
    fn ensure_header(&mut self) -> Result<(), DecodeError> {
        if self.file_header.is_none() {
            let hdr = FileHeader::decode(&mut self.reader)?;
            self.file_header = Some(hdr);
        }
        Ok(())
    }

    /// Decode the next window into `output`.
    /// Returns `Ok(false)` when there are no more windows.
    pub fn decode_window<S: SourceProvider>(
        &mut self,
        source: &mut S,
        output: &mut Vec<u8>,
    ) -> Result<bool, DecodeError> {
        self.ensure_header()?;

        // Try to read the window header.
        let wh = match WindowHeader::decode(&mut self.reader)? {
            Some(wh) => wh,
            None => return Ok(false),
        };

        // Secondary compression of window sections is a non-goal: refuse
        // rather than silently passing compressed bytes to the executor.
        if wh.del_ind != 0 {
            return Err(DecodeError::Unsupported(
                "secondary compression of window sections".into(),
            ));
        }

        // Read sections into reusable buffers (resize, not re-allocate).
        self.data_buf.resize(wh.data_len as usize, 0);
        self.reader.read_exact(&mut self.data_buf)?;

        self.inst_buf.resize(wh.inst_len as usize, 0);
        self.reader.read_exact(&mut self.inst_buf)?;

        self.addr_buf.resize(wh.addr_len as usize, 0);
        self.reader.read_exact(&mut self.addr_buf)?;

        // Decode the window directly into the output buffer (no intermediate Vec).
        // Reuse the address cache across windows to avoid re-allocation.
        decode_window_with_cache(
            &wh,
            &self.data_buf,
            &self.inst_buf,
            &self.addr_buf,
            source,
            self.verify_checksum,
            &mut self.copy_buf,
            output,
            &mut self.acache,
        )?;

        Ok(true)
    }

    /// Decode all remaining windows, appending to `output`.
    ///
    /// When the underlying reader supports seeking, prefer
    /// [`StreamDecoder::decode_all_sized`], which pre-scans the patch for the
    /// total target size so the output buffer can be preallocated and the
    /// cross-window total verified.
    pub fn decode_all<S: SourceProvider>(
        &mut self,
        source: &mut S,
        output: &mut Vec<u8>,
    ) -> Result<(), DecodeError> {
        while self.decode_window(source, output)? {}
        Ok(())
    }

    /// Return the file header (panics if not yet read).
    pub fn file_header(&self) -> Option<&FileHeader> {
        self.file_header.as_ref()
    }
}

impl<R: Read + Seek> StreamDecoder<R> {
    /// Pre-scan the patch's window headers to compute the total target size
    /// without decoding any window body.
    ///
    /// Reads the file header (if not already read), then for each window
    /// reads only the `WindowHeader`, rejects secondary compression of
    /// window sections up front, and skips over the `data`/`inst`/`addr`
    /// sections without reading them. Sums `target_window_len` across all
    /// windows into `expectedOutputSize`, then rewinds the reader back to
    /// the position immediately following the file header so that a
    /// subsequent execute pass starts from the same place.
    pub fn expected_output_size(&mut self) -> Result<u64, DecodeError> {
        self.ensure_header()?;
        let header_end = self.reader.stream_position()?;

        let mut total: u64 = 0;
        loop {
            let wh = match WindowHeader::decode(&mut self.reader)? {
                Some(wh) => wh,
                None => break,
            };

            if wh.del_ind != 0 {
                return Err(DecodeError::Unsupported(
                    "secondary compression of window sections".into(),
                ));
            }

            total = total
                .checked_add(wh.target_window_len)
                .ok_or_else(|| DecodeError::InvalidInput("output size overflow".into()))?;

            let skip = wh
                .data_len
                .checked_add(wh.inst_len)
                .and_then(|n| n.checked_add(wh.addr_len))
                .ok_or_else(|| DecodeError::InvalidInput("window section size overflow".into()))?;
            let skip: i64 = skip
                .try_into()
                .map_err(|_| DecodeError::InvalidInput("window section size overflow".into()))?;
            self.reader.seek(SeekFrom::Current(skip))?;
        }

        self.reader.seek(SeekFrom::Start(header_end))?;
        Ok(total)
    }

    /// Decode all remaining windows, first pre-scanning the patch to compute
    /// `expectedOutputSize` (the sum of every window's `target_window_len`),
    /// preallocating `output` to that size, and verifying after the execute
    /// pass that the total bytes written matches exactly.
    pub fn decode_all_sized<S: SourceProvider>(
        &mut self,
        source: &mut S,
        output: &mut Vec<u8>,
    ) -> Result<u64, DecodeError> {
        let expected = self.expected_output_size()?;
        output.reserve(expected.saturating_sub(output.len() as u64) as usize);

        let start_len = output.len() as u64;
        while self.decode_window(source, output)? {}
        let written = output.len() as u64 - start_len;

        if written != expected {
            return Err(DecodeError::InvalidInput(format!(
                "total output size mismatch: expected {expected}, got {written}"
            )));
        }

        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// High-level convenience: decode in memory
// ---------------------------------------------------------------------------

/// Decode a VCDIFF delta from memory.
///
/// `delta` is the complete VCDIFF-encoded byte stream.
/// `source` is the source/dictionary data (may be empty).
/// Returns the reconstructed target.
pub fn decode_memory(delta: &[u8], source: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = StreamDecoder::new(std::io::Cursor::new(delta), true);
    let mut output = Vec::new();
    let mut src: &[u8] = source;
    decoder.decode_all_sized(&mut src, &mut output)?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Instruction iterator (for inspection/debugging)
// ---------------------------------------------------------------------------

/// Iterate over decoded instructions in a window's instruction section.
pub struct InstructionIterator<'a> {
    inst_data: &'a [u8],
    addr_data: &'a [u8],
    inst_pos: usize,
    addr_pos: usize,
    code_table: &'static CodeTable,
    acache: AddressCache,
    copy_window_len: u64,
    target_pos: u64,
    /// Buffered second instruction from a double opcode.
    pending_second: Option<(u8, u8)>,
}

impl<'a> InstructionIterator<'a> {
    pub fn new(inst_section: &'a [u8], addr_section: &'a [u8], copy_window_len: u64) -> Self {
        Self {
            inst_data: inst_section,
            addr_data: addr_section,
            inst_pos: 0,
            addr_pos: 0,
            code_table: code_table::default_code_table(),
            acache: AddressCache::new(),
            copy_window_len,
            target_pos: 0,
            pending_second: None,
        }
    }

    fn resolve_half(
        &mut self,
        itype: u8,
        table_size: u8,
    ) -> Result<Option<Instruction>, DecodeError> {
        if itype == XD3_NOOP {
            return Ok(None);
        }

        let size = if table_size == 0 {
            let (val, consumed) = varint::read_u32(&self.inst_data[self.inst_pos..])
                .map_err(|e| DecodeError::InvalidInput(format!("size varint: {e}")))?;
            self.inst_pos += consumed;
            val
        } else {
            table_size as u32
        };

        let inst = match itype {
            XD3_RUN => Instruction::Run { len: size },
            XD3_ADD => Instruction::Add { len: size },
            _ => {
                let mode = itype - XD3_CPY;
                let here = self.copy_window_len + self.target_pos;
                let (addr, consumed) = self
                    .acache
                    .decode(mode, &self.addr_data[self.addr_pos..], here)
                    .map_err(|e| DecodeError::InvalidInput(format!("address: {e}")))?;
                self.addr_pos += consumed;
                Instruction::Copy {
                    len: size,
                    addr,
                    mode,
                }
            }
        };

        self.target_pos += size as u64;
        Ok(Some(inst))
    }
}

impl Iterator for InstructionIterator<'_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        // First, drain any pending second half-instruction.
        if let Some((type2, size2)) = self.pending_second.take() {
            return match self.resolve_half(type2, size2) {
                Ok(Some(inst)) => Some(Ok(inst)),
                Ok(None) => self.next(),
                Err(e) => Some(Err(e)),
            };
        }

        if self.inst_pos >= self.inst_data.len() {
            return None;
        }

        let opcode = self.inst_data[self.inst_pos];
        self.inst_pos += 1;
        let entry = &self.code_table[opcode as usize];

        // Buffer second half.
        if entry.type2 != XD3_NOOP {
            self.pending_second = Some((entry.type2, entry.size2));
        }

        match self.resolve_half(entry.type1, entry.size1) {
            Ok(Some(inst)) => Some(Ok(inst)),
            Ok(None) => self.next(),
            Err(e) => Some(Err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
