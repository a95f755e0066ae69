use std::path::PathBuf;

use tracing::{debug, trace, warn};

/// Optional files read before argument parsing, in load order. Variables that
/// are already set are never overwritten.
const ENV_FILES: [&str; 2] = [".env", ".env.secrets"];

/// Looks for `file_name` in the current directory, then at the workspace root
/// (two levels up, where binaries run from `crates/<name>`).
fn find_env_file(file_name: &str) -> Option<PathBuf> {
    let local = PathBuf::from(file_name);
    let workspace_root = PathBuf::from("./../../").join(file_name);

    if local.exists() {
        Some(local)
    } else if workspace_root.exists() {
        Some(workspace_root)
    } else {
        trace!(
            "No environment variables file found with name: {:?} in current directory or workspace root",
            file_name
        );
        None
    }
}

fn load_env_file(path: PathBuf) {
    match dotenv::from_filename(&path) {
        Ok(_) => debug!("Loaded environment variables from: {}", path.display()),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to load environment file"),
    }
}

pub fn load_optional_env_files() {
    for file_name in ENV_FILES {
        if let Some(path) = find_env_file(file_name) {
            load_env_file(path);
        }
    }
}

pub fn configure_env() -> Result<(), anyhow::Error> {
    load_optional_env_files();
    Ok(())
}

/// Splits a comma separated list, trimming blanks and dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;

        #[test]
        fn split_list_drops_blanks() {
            assert_eq!(
                split_list(" http://localhost:10001 ,,http://localhost:10002,"),
                vec!["http://localhost:10001", "http://localhost:10002"]
            );
            assert!(split_list("").is_empty());
        }

        #[test]
        fn missing_env_file_is_ignored() {
            assert!(find_env_file(".env.does-not-exist").is_none());
        }
    }
}
