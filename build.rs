use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const ENV_PREFIX: &str = "DOCSCOUT_";
const GENERATED_FILE: &str = "scout_env_allowlist.rs";

fn rust_sources(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Keys are whole string literals such as `"DOCSCOUT_WORKERS"`. Prefixed
/// words inside longer text (the `DOCSCOUT_WARN` log marker, error hints)
/// are not configuration keys and stay out of the allowlist.
fn literal_env_keys(source: &str) -> impl Iterator<Item = &str> {
    let mut quoted: Vec<&str> = source.split('"').skip(1).collect();
    // Text after the last quote has no closing quote.
    quoted.pop();
    quoted.into_iter().filter(|literal| {
        literal
            .strip_prefix(ENV_PREFIX)
            .is_some_and(|rest| {
                !rest.is_empty()
                    && rest
                        .bytes()
                        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
            })
    })
}

fn write_generated_allowlist(out_dir: &Path) -> io::Result<()> {
    let mut keys = BTreeSet::new();
    for file in rust_sources(Path::new("src"))? {
        let content = fs::read_to_string(&file)?;
        keys.extend(literal_env_keys(&content).map(str::to_string));
    }

    let mut f = fs::File::create(out_dir.join(GENERATED_FILE))?;
    writeln!(f, "pub const GENERATED_SCOUT_ENV_PREFIX: &str = \"{ENV_PREFIX}\";")?;
    writeln!(f, "pub const GENERATED_SCOUT_ENV_ALLOWLIST: &[&str] = &[")?;
    for key in keys {
        writeln!(f, "    \"{key}\",")?;
    }
    writeln!(f, "];")?;
    Ok(())
}

fn main() -> io::Result<()> {
    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is set by cargo"))?;
    write_generated_allowlist(&out_dir)?;

    // Stamped into the run lock so `status` can tell which build last held it.
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        now.as_secs(),
        now.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
    Ok(())
}
