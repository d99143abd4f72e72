// File-oriented decode: apply a patch file to a source file on disk.

use std::path::Path;

use deltapatch::io::apply_patch;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let source = Path::new("source.bin");
    let patch = Path::new("patch.vcdiff");
    let output = Path::new("restored.bin");

    let stats = apply_patch(source, patch, output)?;

    println!(
        "apply: source={} patch={} output={} windows={}",
        stats.source_size, stats.patch_size, stats.output_size, stats.windows
    );

    Ok(())
}
