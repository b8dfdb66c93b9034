// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

fn main() {
    if cfg!(not(feature = "ffmpeg")) {
        return;
    }

    // Link against a local FFmpeg build when one is provided
    if let Ok(dir) = std::env::var("FFMPEG_DIR") {
        let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap();
        match target_os.as_str() {
            "windows" => {
                println!("cargo:rustc-link-search={dir}\\lib\\x64");
                println!("cargo:rustc-link-search={dir}\\lib");
            },
            _ => {
                println!("cargo:rustc-link-search={dir}/lib");
            }
        }
    }
}
