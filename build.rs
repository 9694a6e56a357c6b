use std::env;

use anyhow::*;
use fs_extra::{copy_items, dir::CopyOptions};

fn main() -> Result<()> {
    // The shader atlas is read from the build output directory at runtime, so
    // any edit to it has to re-trigger the copy.
    println!("cargo:rerun-if-changed=content/shaders.atlas");
    println!("cargo:rerun-if-changed=content/");

    let out_dir = env::var("OUT_DIR")?;
    let copy_options = CopyOptions::new().overwrite(true);
    copy_items(&["content/"], out_dir, &copy_options)
        .context("failed to copy content/ into the build output directory")?;

    Ok(())
}
