use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

/// Minimal class file whose constant pool names `binary_name` as `this_class`.
pub fn class_bytes(binary_name: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&52u16.to_be_bytes());
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes.push(1);
    bytes.extend_from_slice(&(binary_name.len() as u16).to_be_bytes());
    bytes.extend_from_slice(binary_name.as_bytes());
    bytes.push(7);
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&0x0021u16.to_be_bytes());
    bytes.extend_from_slice(&2u16.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes
}

pub fn write_jar(path: &Path, entries: &[&str]) -> PathBuf {
    let file = File::create(path).expect("create jar");
    let mut writer = ZipWriter::new(file);
    for entry in entries {
        writer
            .start_file(*entry, FileOptions::default())
            .expect("start jar entry");
        writer.write_all(b"\xCA\xFE\xBA\xBE").expect("write jar entry");
    }
    writer.finish().expect("finish jar");
    path.to_path_buf()
}

pub fn write_class_dir(root: &Path, entries: &[&str]) -> PathBuf {
    for entry in entries {
        let path = root.join(entry);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create class dir");
        }
        fs::write(&path, b"\xCA\xFE\xBA\xBE").expect("write class file");
    }
    root.to_path_buf()
}
