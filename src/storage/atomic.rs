//! 原子文件写入
//!
//! 词库与规则配置都通过 "临时文件 + SHA256 校验 + rename" 落盘，
//! 写入中途失败不会留下半截文件。

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

/// 计算字节内容的 SHA256 (十六进制)
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// 计算文件内容的 SHA256
pub fn file_hash(path: &Path) -> io::Result<String> {
    Ok(content_hash(&fs::read(path)?))
}

/// 原子写入文件，返回内容 hash
///
/// # Arguments
/// * `path` - 目标文件路径，父目录不存在时自动创建
/// * `content` - 要写入的内容
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<String> {
    let expected = content_hash(content);

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let temp_path = tempfile::NamedTempFile::new_in(parent)?.into_temp_path();
    fs::write(&temp_path, content)?;

    let written = file_hash(&temp_path)?;
    if written != expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Hash mismatch after write: expected {}, got {}", expected, written),
        ));
    }

    // TempPath::persist 在同一文件系统上为原子 rename
    temp_path.persist(path).map_err(|e| e.error)?;

    Ok(expected)
}

pub fn atomic_write_str(path: &Path, content: &str) -> io::Result<String> {
    atomic_write(path, content.as_bytes())
}
