// Minimal decode-only usage: apply a hand-assembled VCDIFF patch in memory.
//
// There is no encoder in this crate, so the patch bytes below are built by
// hand the same way the unit tests do -- a single ADD instruction carrying
// the whole target.

use deltapatch::compress::decoder;
use deltapatch::vcdiff::header::{FileHeader, WindowHeader};
use deltapatch::vcdiff::varint;

fn build_add_patch(target: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut inst = Vec::new();
    inst.push(1u8); // ADD, explicit size
    varint::write_u32(&mut inst, target.len() as u32).unwrap();
    data.extend_from_slice(target);

    let mut wh = WindowHeader {
        win_ind: 0,
        copy_window_len: 0,
        copy_window_offset: 0,
        enc_len: 0,
        target_window_len: target.len() as u64,
        del_ind: 0,
        data_len: data.len() as u64,
        inst_len: inst.len() as u64,
        addr_len: 0,
        adler32: None,
    };
    wh.enc_len = wh.compute_enc_len();

    let fh = FileHeader {
        hdr_ind: 0,
        secondary_id: None,
        app_header: None,
    };

    let mut out = Vec::new();
    fh.encode(&mut out).unwrap();
    wh.encode(&mut out).unwrap();
    out.extend_from_slice(&data);
    out.extend_from_slice(&inst);
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = b"Hello from the decoded target";
    let patch = build_add_patch(target);

    let restored = decoder::decode_all(&[], &patch)?;
    assert_eq!(restored, target);

    println!(
        "patch {} bytes -> restored {} bytes",
        patch.len(),
        restored.len()
    );
    Ok(())
}
