//! Fetches a prebuilt PDFium into `<workspace>/lib` when
//! `HTR_DOWNLOAD_PDFIUM=1` is set. Without it the build never touches the
//! network and PDFium is looked up at runtime.

use flate2::read::GzDecoder;
use std::env;
use std::error::Error;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;

const DOWNLOAD_ENV_NAME: &str = "HTR_DOWNLOAD_PDFIUM";

const PDFIUM_BASE_URL: &str =
    "https://github.com/bblanchon/pdfium-binaries/releases/download/chromium/6721";

/// `(target_os, target_arch, archive)`
const PDFIUM_ARCHIVES: &[(&str, &str, &str)] = &[
    ("macos", "aarch64", "pdfium-mac-arm64.tgz"),
    ("macos", "x86_64", "pdfium-mac-x64.tgz"),
    ("linux", "aarch64", "pdfium-linux-arm64.tgz"),
    ("linux", "arm", "pdfium-linux-arm.tgz"),
    ("linux", "x86_64", "pdfium-linux-x64.tgz"),
    ("linux", "x86", "pdfium-linux-x86.tgz"),
];

fn archive_name() -> Result<&'static str, String> {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    PDFIUM_ARCHIVES
        .iter()
        .find(|(os, arch, _)| *os == target_os && *arch == target_arch)
        .map(|(_, _, archive)| *archive)
        .ok_or_else(|| format!("no prebuilt PDFium for {target_os} on {target_arch}"))
}

fn workspace_lib_dir() -> Result<PathBuf, String> {
    let manifest_dir = PathBuf::from(
        env::var("CARGO_MANIFEST_DIR").map_err(|e| format!("CARGO_MANIFEST_DIR: {e}"))?,
    );
    manifest_dir
        .parent()
        .map(|workspace| workspace.join("lib"))
        .ok_or_else(|| "manifest directory has no parent".to_string())
}

fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

fn download(archive: &str, tgz_path: &Path) -> Result<(), String> {
    let url = format!("{PDFIUM_BASE_URL}/{archive}");
    println!("Downloading PDFium from {url}...");

    let response =
        reqwest::blocking::get(&url).map_err(|e| format!("download of {url} failed: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("download of {url} failed: HTTP {}", response.status()));
    }

    let bytes = response
        .bytes()
        .map_err(|e| format!("reading {url} failed: {e}"))?;
    fs::write(tgz_path, &bytes).map_err(|e| format!("writing {}: {e}", tgz_path.display()))
}

fn unpack(tgz_path: &Path, into: &Path) -> Result<(), String> {
    let file = File::open(tgz_path).map_err(|e| format!("opening {}: {e}", tgz_path.display()))?;
    Archive::new(GzDecoder::new(file))
        .unpack(into)
        .map_err(|e| format!("unpacking PDFium: {e}"))
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-env-changed={DOWNLOAD_ENV_NAME}");
    println!("cargo:rerun-if-changed=build.rs");

    if env::var(DOWNLOAD_ENV_NAME).as_deref() != Ok("1") {
        return Ok(());
    }

    let lib_dir = workspace_lib_dir()?;
    if is_populated(&lib_dir) {
        println!("PDFium already present in {}", lib_dir.display());
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let unpack_dir = out_dir.join("pdfium");
    fs::create_dir_all(&unpack_dir)?;
    let tgz_path = out_dir.join("pdfium.tgz");

    download(archive_name()?, &tgz_path)?;
    unpack(&tgz_path, &unpack_dir)?;

    fs::remove_dir_all(&lib_dir).ok();
    fs::rename(unpack_dir.join("lib"), &lib_dir)?;
    println!("PDFium installed into {}", lib_dir.display());

    Ok(())
}
