//! Anchor Pack builder (spec §4.5).

use crate::hashing::clamp_by_bytes;
use std::path::Path;

const ANCHOR_FILES: &[&str] = &["AGENTS.md", "CLAUDE.md", "README.md"];
const ANCHOR_FILE_CLAMP: usize = 3_000;

/// Read the fixed anchor-file set from `repo_root`, clamp each to 3,000
/// bytes, and join as `## <name>\n<content>` blocks separated by a blank
/// line. `"No anchor files found."` if none of them exist.
pub async fn build_anchor_pack(repo_root: &Path) -> String {
    let repo_root = repo_root.to_path_buf();
    smol::unblock(move || build_anchor_pack_sync(&repo_root)).await
}

fn build_anchor_pack_sync(repo_root: &Path) -> String {
    let mut blocks = Vec::new();
    for name in ANCHOR_FILES {
        let path = repo_root.join(name);
        if let Ok(contents) = std::fs::read_to_string(&path) {
            let clamped = clamp_by_bytes(&contents, ANCHOR_FILE_CLAMP);
            blocks.push(format!("## {name}\n{clamped}"));
        }
    }
    if blocks.is_empty() {
        "No anchor files found.".to_string()
    } else {
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn no_anchor_files_returns_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let out = smol::block_on(build_anchor_pack(dir.path()));
        assert_eq!(out, "No anchor files found.");
    }

    #[test]
    fn reads_existing_anchor_files_in_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "readme body").unwrap();
        fs::write(dir.path().join("AGENTS.md"), "agents body").unwrap();
        let out = smol::block_on(build_anchor_pack(dir.path()));
        let agents_pos = out.find("## AGENTS.md").unwrap();
        let readme_pos = out.find("## README.md").unwrap();
        assert!(agents_pos < readme_pos);
        assert!(out.contains("agents body"));
        assert!(out.contains("readme body"));
    }

    #[test]
    fn clamps_each_file_independently() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CLAUDE.md"), "x".repeat(10_000)).unwrap();
        let out = smol::block_on(build_anchor_pack(dir.path()));
        assert!(out.len() < 10_000);
    }
}
