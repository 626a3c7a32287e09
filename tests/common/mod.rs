//! Builds synthetic single-file bundle images for tests.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

use unbundle::{BUNDLE_SIGNATURE, FileType};

pub struct TestFile {
    pub path: String,
    pub kind: FileType,
    pub data: Vec<u8>,
    pub compress: bool,
}

/// Lays out `host stub | header offset | signature | payloads | manifest`
pub struct BundleBuilder {
    pub major_version: u32,
    pub bundle_id: String,
    pub flags: u64,
    pub files: Vec<TestFile>,
}

impl BundleBuilder {
    pub fn new(major_version: u32) -> Self {
        Self {
            major_version,
            bundle_id: "Bx3eQpT0k1Yz".to_string(),
            flags: 0,
            files: Vec::new(),
        }
    }

    pub fn file(mut self, path: &str, kind: FileType, data: &[u8]) -> Self {
        self.files.push(TestFile {
            path: path.to_string(),
            kind,
            data: data.to_vec(),
            compress: false,
        });
        self
    }

    pub fn compressed_file(mut self, path: &str, kind: FileType, data: &[u8]) -> Self {
        self.files.push(TestFile {
            path: path.to_string(),
            kind,
            data: data.to_vec(),
            compress: true,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut image = b"MZ\x90\x00host stub.......".to_vec();
        let placeholder = image.len();
        image.extend_from_slice(&[0u8; 8]);
        image.extend_from_slice(&BUNDLE_SIGNATURE);

        // (offset, size, compressed_size)
        let mut locations = Vec::new();
        for file in &self.files {
            let offset = image.len() as i64;
            if file.compress {
                let compressed = deflate(&file.data);
                image.extend_from_slice(&compressed);
                locations.push((offset, file.data.len() as i64, compressed.len() as i64));
            } else {
                image.extend_from_slice(&file.data);
                locations.push((offset, file.data.len() as i64, 0));
            }
        }

        let header_offset = image.len() as i64;
        image[placeholder..placeholder + 8].copy_from_slice(&header_offset.to_le_bytes());

        image.write_u32::<LittleEndian>(self.major_version).unwrap();
        image.write_u32::<LittleEndian>(0).unwrap();
        image
            .write_i32::<LittleEndian>(self.files.len() as i32)
            .unwrap();
        write_string(&mut image, &self.bundle_id);

        if self.major_version >= 2 {
            let find = |kind: FileType| {
                self.files
                    .iter()
                    .zip(&locations)
                    .find(|(f, _)| f.kind == kind)
                    .map(|(_, l)| (l.0, l.1))
                    .unwrap_or((0, 0))
            };
            for (offset, size) in [find(FileType::DepsJson), find(FileType::RuntimeConfigJson)] {
                image.write_i64::<LittleEndian>(offset).unwrap();
                image.write_i64::<LittleEndian>(size).unwrap();
            }
            image.write_u64::<LittleEndian>(self.flags).unwrap();
        }

        for (file, (offset, size, compressed_size)) in self.files.iter().zip(&locations) {
            image.write_i64::<LittleEndian>(*offset).unwrap();
            image.write_i64::<LittleEndian>(*size).unwrap();
            if self.major_version >= 6 {
                image.write_i64::<LittleEndian>(*compressed_size).unwrap();
            }
            image.write_u8(file.kind.as_u8()).unwrap();
            write_string(&mut image, &file.path);
        }

        image
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// 7-bit encoded length followed by UTF-8 bytes
pub fn write_string(buf: &mut Vec<u8>, s: &str) {
    let mut len = s.len() as u32;
    while len >= 0x80 {
        buf.push((len as u8) | 0x80);
        len >>= 7;
    }
    buf.push(len as u8);
    buf.extend_from_slice(s.as_bytes());
}
