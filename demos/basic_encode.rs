//! Basic encoding example: archive a small tree and look at its frames

use std::fs;
use strata_core::{
    codec::StripeEncoder, encoder::encode_frame, pack, unpack, CodecParams, Profile,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Strata Basic Encoding Example\n");

    // Build a throwaway tree
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("notes");
    fs::create_dir(&root)?;
    for i in 1..=3 {
        let text = format!("Entry {} of the field notebook\n", i).repeat(40 * i);
        fs::write(root.join(format!("day{}.txt", i)), text)?;
    }

    let stream = pack(&root)?;
    let tar = unpack(&stream)?;
    println!("Packed {} entries into {} tar bytes", stream.len(), tar.len());

    for profile in [Profile::Archive, Profile::Scan] {
        let params: CodecParams = profile.params();
        let encoder = StripeEncoder::new(tar.clone(), params)?;
        let layout = encoder.layout();

        println!("\nProfile {}:", profile.name());
        println!("  archive id: {}", layout.archive_id);
        println!(
            "  k={} m={} block={} -> {} data blocks in {} stripes",
            params.data_shards,
            params.parity_shards,
            params.block_size,
            layout.total_blocks,
            encoder.stripe_count()
        );

        let frames = encoder.encode_all()?;
        let wire: usize = frames
            .iter()
            .map(|f| encode_frame(f).map(|b| b.len()))
            .sum::<Result<usize, _>>()?;
        println!(
            "  {} frames, {} bytes on the wire ({:.2}x)",
            frames.len(),
            wire,
            wire as f64 / tar.len() as f64
        );
        for frame in frames.iter().take(3) {
            let h = &frame.header;
            println!(
                "    stripe {} slot {} payload_len {} crc {:08x}",
                h.stripe_index, h.slot_index, h.payload_len, h.checksum
            );
        }
    }

    Ok(())
}
