use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const MIN_VERSION: &str = "1.13.0";

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err}");
        if let Some(source) = err.source() {
            eprintln!("caused by: {source}");
        }
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), BuildError> {
    println!("cargo:rerun-if-env-changed=WIMLIB_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=WIMLIB_LIB_DIR");
    println!("cargo:rerun-if-changed=build.rs");

    // The stub engine needs no native library.
    if env::var_os("CARGO_FEATURE_WIMLIB").is_none() {
        return Ok(());
    }

    let include_override = env::var_os("WIMLIB_INCLUDE_DIR").map(PathBuf::from);
    let lib_override = env::var_os("WIMLIB_LIB_DIR").map(PathBuf::from);

    if let Some(lib_dir) = lib_override {
        let include_dir = include_override.ok_or(BuildError::MissingIncludeDir)?;
        ensure_header_version(&include_dir)?;
        println!("cargo:rustc-link-search=native={}", lib_dir.display());
        println!("cargo:rustc-link-lib={}", default_lib_name());
        return Ok(());
    }

    let wimlib = pkg_config::Config::new()
        .atleast_version(MIN_VERSION)
        .probe("wimlib")
        .map_err(BuildError::PkgConfig)?;

    let include_dir = include_override.or_else(|| {
        wimlib
            .include_paths
            .iter()
            .find(|path| path.join("wimlib.h").exists())
            .cloned()
    });
    if let Some(include_dir) = include_dir {
        ensure_header_version(&include_dir)?;
    }
    Ok(())
}

fn default_lib_name() -> &'static str {
    match env::var("CARGO_CFG_TARGET_OS").as_deref() {
        Ok("windows") => "libwim",
        _ => "wim",
    }
}

fn ensure_header_version(include_dir: &Path) -> Result<(), BuildError> {
    let header = include_dir.join("wimlib.h");
    println!("cargo:rerun-if-changed={}", header.display());
    let contents =
        fs::read_to_string(&header).map_err(|source| BuildError::ReadHeader { source })?;

    let major = parse_define(&contents, "WIMLIB_MAJOR_VERSION").ok_or(BuildError::MissingDefine)?;
    let minor = parse_define(&contents, "WIMLIB_MINOR_VERSION").ok_or(BuildError::MissingDefine)?;
    let patch = parse_define(&contents, "WIMLIB_PATCH_VERSION").ok_or(BuildError::MissingDefine)?;

    if (major, minor, patch) < parse_min_version()? {
        return Err(BuildError::VersionTooOld {
            found: format!("{major}.{minor}.{patch}"),
        });
    }
    Ok(())
}

fn parse_define(contents: &str, name: &str) -> Option<u32> {
    contents.lines().find_map(|line| {
        let mut parts = line.trim_start().strip_prefix("#define")?.split_whitespace();
        (parts.next()? == name).then_some(())?;
        parts.next()?.parse::<u32>().ok()
    })
}

fn parse_min_version() -> Result<(u32, u32, u32), BuildError> {
    let mut parts = MIN_VERSION
        .split('.')
        .map(|part| part.parse::<u32>().ok());
    let mut next = || parts.next().flatten().ok_or(BuildError::InvalidMinVersion);
    Ok((next()?, next()?, next()?))
}

#[derive(Debug)]
enum BuildError {
    MissingIncludeDir,
    PkgConfig(pkg_config::Error),
    ReadHeader { source: std::io::Error },
    MissingDefine,
    InvalidMinVersion,
    VersionTooOld { found: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIncludeDir => {
                write!(f, "WIMLIB_LIB_DIR is set but WIMLIB_INCLUDE_DIR is not")
            }
            Self::PkgConfig(_) => write!(f, "wimlib pkg-config probe failed"),
            Self::ReadHeader { .. } => write!(f, "wimlib.h read failed"),
            Self::MissingDefine => write!(f, "wimlib.h is missing a version define"),
            Self::InvalidMinVersion => write!(f, "invalid wimlib minimum version"),
            Self::VersionTooOld { found } => {
                write!(f, "wimlib {found} is older than {MIN_VERSION}")
            }
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PkgConfig(err) => Some(err),
            Self::ReadHeader { source } => Some(source),
            _ => None,
        }
    }
}
