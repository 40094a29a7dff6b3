//! STL file loading (binary and ASCII).

use super::{Mesh, Triangle};
use crate::geometry::Point3;
use crate::{Error, Result};
use log::{debug, info};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Load an STL file, auto-detecting binary vs ASCII format.
///
/// A file is treated as ASCII when it starts with the `solid` keyword and
/// its length does not match the binary layout for the declared triangle
/// count (some binary exporters also begin with "solid").
pub fn load_stl(path: &Path) -> Result<Mesh> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    if bytes.len() < 84 {
        return parse_ascii(&bytes).map_err(|e| {
            Error::InvalidGeometry(format!("{}: {}", path.display(), e))
        });
    }

    let declared = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let binary_len = 84 + declared * 50;
    let looks_ascii = bytes.starts_with(b"solid") && bytes.len() != binary_len;

    let mesh = if looks_ascii {
        debug!("parsing {} as ASCII STL", path.display());
        parse_ascii(&bytes)
            .map_err(|e| Error::InvalidGeometry(format!("{}: {}", path.display(), e)))?
    } else {
        debug!("parsing {} as binary STL", path.display());
        parse_binary(&bytes, declared)
            .map_err(|e| Error::InvalidGeometry(format!("{}: {}", path.display(), e)))?
    };

    info!(
        "loaded {} triangles from {}",
        mesh.len(),
        path.display()
    );
    Ok(mesh)
}

fn parse_binary(bytes: &[u8], count: usize) -> std::result::Result<Mesh, String> {
    let expected = 84 + count * 50;
    if bytes.len() < expected {
        return Err(format!(
            "binary STL truncated: {} bytes, {} expected for {} triangles",
            bytes.len(),
            expected,
            count
        ));
    }

    let mut triangles = Vec::with_capacity(count);
    let mut off = 84;
    for _ in 0..count {
        // 12 bytes of normal (ignored, recomputed from vertices), then 3 vertices
        let mut vs = [Point3::zero(); 3];
        for (i, v) in vs.iter_mut().enumerate() {
            let base = off + 12 + i * 12;
            *v = Point3::new(
                read_f32(bytes, base) as f64,
                read_f32(bytes, base + 4) as f64,
                read_f32(bytes, base + 8) as f64,
            );
        }
        triangles.push(Triangle::new(vs[0], vs[1], vs[2]));
        off += 50; // normal + vertices + attribute byte count
    }
    Ok(Mesh::from_triangles(triangles))
}

#[inline]
fn read_f32(bytes: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

fn parse_ascii(bytes: &[u8]) -> std::result::Result<Mesh, String> {
    let reader = BufReader::new(bytes);
    let mut triangles = Vec::new();
    let mut vertices: Vec<Point3> = Vec::with_capacity(3);

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("vertex") => {
                let mut coord = |axis: &str| -> std::result::Result<f64, String> {
                    words
                        .next()
                        .ok_or_else(|| format!("line {}: missing {} coordinate", lineno + 1, axis))?
                        .parse::<f64>()
                        .map_err(|e| format!("line {}: {}", lineno + 1, e))
                };
                let x = coord("x")?;
                let y = coord("y")?;
                let z = coord("z")?;
                vertices.push(Point3::new(x, y, z));
            }
            Some("endloop") => {
                if vertices.len() != 3 {
                    return Err(format!(
                        "line {}: facet with {} vertices",
                        lineno + 1,
                        vertices.len()
                    ));
                }
                triangles.push(Triangle::new(vertices[0], vertices[1], vertices[2]));
                vertices.clear();
            }
            _ => {}
        }
    }

    if triangles.is_empty() {
        return Err("no facets found".to_string());
    }
    Ok(Mesh::from_triangles(triangles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ascii() {
        let stl = b"solid test\n\
            facet normal 0 0 1\n\
            outer loop\n\
            vertex 0 0 0\n\
            vertex 1 0 0\n\
            vertex 0 1 0\n\
            endloop\n\
            endfacet\n\
            endsolid test\n";
        let mesh = parse_ascii(stl).unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.triangles()[0].v1, Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_parse_ascii_rejects_bad_facet() {
        let stl = b"solid bad\nouter loop\nvertex 0 0 0\nendloop\nendsolid\n";
        assert!(parse_ascii(stl).is_err());
    }

    #[test]
    fn test_parse_binary() {
        // one-triangle binary STL built by hand
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 12]); // normal
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 2.0]] {
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes()); // attributes
        let mesh = parse_binary(&bytes, 1).unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.triangles()[0].v2.z, 2.0);
    }

    #[test]
    fn test_parse_binary_truncated() {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&5u32.to_le_bytes());
        assert!(parse_binary(&bytes, 5).is_err());
    }
}
