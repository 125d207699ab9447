use std::fs;
use std::io;
use std::path::Path;

/// 先寫入同目錄的臨時檔再 rename，讓快照檔不會出現半寫狀態。 / Writes to a
/// temporary sibling first, then renames, so the snapshot file is never
/// observed half-written.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}
