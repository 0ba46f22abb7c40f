//! Build script for the storefront crate.
//!
//! Fingerprints the stylesheet and the script so both can be served from
//! `static/*/derived/` with far-future cache headers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// One fingerprinted asset: `static/{dir}/{stem}.{ext}`.
struct Asset {
    dir: &'static str,
    stem: &'static str,
    ext: &'static str,
    env_var: &'static str,
}

const ASSETS: [Asset; 2] = [
    Asset {
        dir: "css",
        stem: "main",
        ext: "css",
        env_var: "CSS_HASH",
    },
    Asset {
        dir: "js",
        stem: "app",
        ext: "js",
        env_var: "JS_HASH",
    },
];

fn main() {
    let manifest_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo"));
    for asset in &ASSETS {
        fingerprint(&manifest_dir, asset);
    }
}

/// Short SHA-256 of the file contents, as used in derived file names.
fn short_hash(content: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(content));
    digest[..8].to_string()
}

/// Copy the asset to `derived/{stem}.{hash}.{ext}` and export the hash.
///
/// A missing source file exports an empty hash so templates still render.
fn fingerprint(manifest_dir: &Path, asset: &Asset) {
    let source_dir = manifest_dir.join("static").join(asset.dir);
    let source = source_dir.join(format!("{}.{}", asset.stem, asset.ext));
    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(&source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", source.display());
            println!("cargo:rustc-env={}=", asset.env_var);
            return;
        }
    };

    let hash = short_hash(&content);
    println!("cargo:rustc-env={}={hash}", asset.env_var);

    let derived_dir = source_dir.join("derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");
    let derived = derived_dir.join(format!("{}.{hash}.{}", asset.stem, asset.ext));
    fs::write(&derived, &content).expect("Failed to write fingerprinted asset");
}
