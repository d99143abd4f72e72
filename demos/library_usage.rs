// Streaming decode via DeltaDecoder, writing output one window at a time.

use deltapatch::compress::decoder::DeltaDecoder;
use deltapatch::vcdiff::header::{FileHeader, WindowHeader};
use deltapatch::vcdiff::varint;

fn build_add_patch(target: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut inst = Vec::new();
    inst.push(1u8);
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
    let target = b"ABCD-XXXX-ABCD-YYYY";
    let patch = build_add_patch(target);

    let mut dec = DeltaDecoder::new(std::io::Cursor::new(&patch));
    let mut src: &[u8] = &[];
    let mut out = Vec::new();
    dec.decode_to(&mut src, &mut out)?;

    assert_eq!(out, target);
    println!("windows decoded: {}", dec.windows_decoded());
    Ok(())
}
