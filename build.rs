use std::env;
use std::path::{Path, PathBuf};

const TRACKED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "PKG_CONFIG_PATH", "VCPKG_ROOT", "VCPKGRS_TRIPLET"];

fn main() {
    for variable in TRACKED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if let Some(hint) = discovery_hint(&target_os) {
        println!("cargo:warning={hint}");
    }
}

/// Where ffmpeg-sys-next is likely to find libavfilter when FFMPEG_DIR is unset.
fn discovery_hint(target_os: &str) -> Option<String> {
    match target_os {
        "windows" => {
            let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
                return Some(
                    "FFMPEG_DIR is not set. Install ffmpeg[avfilter] via vcpkg and set VCPKG_ROOT or FFMPEG_DIR."
                        .to_string(),
                );
            };
            let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
            let install = PathBuf::from(vcpkg_root).join("installed").join(triplet);
            Some(if has_avfilter_headers(&install) {
                format!("Using vcpkg FFmpeg at {}; set FFMPEG_DIR to pin it.", install.display())
            } else {
                format!("No FFmpeg with libavfilter found under {}.", install.display())
            })
        }
        "macos" => ["/opt/homebrew", "/usr/local"]
            .iter()
            .map(|prefix| Path::new(prefix).join("opt/ffmpeg"))
            .find(|install| has_avfilter_headers(install))
            .filter(|_| env::var_os("PKG_CONFIG_PATH").is_none())
            .map(|install| {
                format!(
                    "Found Homebrew FFmpeg at {}; add its lib/pkgconfig to PKG_CONFIG_PATH if discovery fails.",
                    install.display()
                )
            }),
        _ => None,
    }
}

fn has_avfilter_headers(install: &Path) -> bool {
    install.join("include/libavfilter/avfilter.h").exists()
}
