use std::path::Path;

use anyhow::{Context, Result};

use super::{CONFIG_DIR, CONFIG_FILE};

/// Hand-crafted config template with commented-out keys.
/// Used by `snapdiff init` so users can see the available knobs.
const CONFIG_TEMPLATE: &str = r#"# ─────────────────────────────────────────────────────────
# Comparison: all fields optional.
# ─────────────────────────────────────────────────────────
[diff]
# threshold = 0.03                  # tolerated brightness difference (0.0 = exact)
# highlight = [255, 0, 255, 255]    # RGBA of mismatched pixels in the diff panel

# ─────────────────────────────────────────────────────────
# Batch runs: all fields optional.
# ─────────────────────────────────────────────────────────
[batch]
# parallel = 4                      # image pairs diffed concurrently
"#;

pub fn config_file_exists() -> bool {
    Path::new(CONFIG_DIR).join(CONFIG_FILE).exists()
}

pub(crate) fn write_template_to(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(CONFIG_FILE);
    std::fs::write(&path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the hand-crafted config template (with commented-out keys).
pub fn write_template() -> Result<()> {
    write_template_to(Path::new(CONFIG_DIR))
}
