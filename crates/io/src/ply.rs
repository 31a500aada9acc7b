use groundcloud_core::{Colors, Normals, PointCloud};
use std::fs;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
}

/// Scalar property type as declared in the PLY header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropType {
    Char,
    Uchar,
    Short,
    Ushort,
    Int,
    Uint,
    Float,
    Double,
}

impl PropType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => PropType::Char,
            "uchar" | "uint8" => PropType::Uchar,
            "short" | "int16" => PropType::Short,
            "ushort" | "uint16" => PropType::Ushort,
            "int" | "int32" => PropType::Int,
            "uint" | "uint32" => PropType::Uint,
            "float" | "float32" => PropType::Float,
            "double" | "float64" => PropType::Double,
            _ => return None,
        })
    }

    fn byte_size(self) -> usize {
        match self {
            PropType::Char | PropType::Uchar => 1,
            PropType::Short | PropType::Ushort => 2,
            PropType::Int | PropType::Uint | PropType::Float => 4,
            PropType::Double => 8,
        }
    }

    /// Decodes one little-endian value from the start of `b`.
    fn read_le(self, b: &[u8]) -> f64 {
        match self {
            PropType::Char => b[0] as i8 as f64,
            PropType::Uchar => b[0] as f64,
            PropType::Short => i16::from_le_bytes([b[0], b[1]]) as f64,
            PropType::Ushort => u16::from_le_bytes([b[0], b[1]]) as f64,
            PropType::Int => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            PropType::Uint => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            PropType::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            PropType::Double => {
                f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
        }
    }
}

struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    property_names: Vec<String>,
    property_types: Vec<PropType>,
    header_end_offset: usize, // byte offset just after "end_header\n"
}

impl PlyHeader {
    fn position(&self, name: &str) -> Option<usize> {
        self.property_names.iter().position(|n| n == name)
    }

    /// Byte offset of every property inside one binary vertex record.
    fn offsets(&self) -> Vec<usize> {
        let mut off = 0;
        self.property_types
            .iter()
            .map(|t| {
                let here = off;
                off += t.byte_size();
                here
            })
            .collect()
    }

    fn stride(&self) -> usize {
        self.property_types.iter().map(|t| t.byte_size()).sum()
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn parse_ply_header(data: &[u8]) -> io::Result<PlyHeader> {
    let end_marker = b"end_header\n";
    let header_end =
        find_bytes(data, end_marker).ok_or_else(|| invalid("missing end_header in PLY file"))?;
    let header_end_offset = header_end + end_marker.len();

    let header_text = std::str::from_utf8(&data[..header_end])
        .map_err(|_| invalid("PLY header not valid UTF-8"))?;

    let mut format = None;
    let mut vertex_count: usize = 0;
    let mut property_names: Vec<String> = Vec::new();
    let mut property_types: Vec<PropType> = Vec::new();
    let mut in_vertex_element = false;
    let mut seen_vertex_element = false;
    let mut seen_ply_magic = false;

    for line in header_text.lines() {
        let line = line.trim();

        if !seen_ply_magic {
            if line == "ply" {
                seen_ply_magic = true;
                continue;
            }
            return Err(invalid("file does not start with 'ply'"));
        }

        if line.starts_with("format") {
            if line.contains("ascii") {
                format = Some(PlyFormat::Ascii);
            } else if line.contains("binary_little_endian") {
                format = Some(PlyFormat::BinaryLittleEndian);
            } else {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported PLY format: {}", line),
                ));
            }
        } else if line.starts_with("element vertex") {
            // other elements before the vertices would shift the body
            if !property_types.is_empty() || seen_vertex_element {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "PLY vertex element must come first",
                ));
            }
            in_vertex_element = true;
            seen_vertex_element = true;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(invalid("invalid element vertex line"));
            }
            vertex_count = parts[2]
                .parse::<usize>()
                .map_err(|e| invalid(format!("invalid vertex count: {}", e)))?;
        } else if line.starts_with("element") {
            in_vertex_element = false;
        } else if line.starts_with("property") && in_vertex_element {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 && parts[1] == "list" {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "list properties on vertices are not supported",
                ));
            }
            if parts.len() >= 3 {
                let ptype = PropType::parse(parts[1]).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::Unsupported,
                        format!("unsupported property type: {}", parts[1]),
                    )
                })?;
                property_types.push(ptype);
                property_names.push(parts[2].to_string());
            }
        }
    }

    let format = format.ok_or_else(|| invalid("PLY format line missing"))?;

    Ok(PlyHeader {
        format,
        vertex_count,
        property_names,
        property_types,
        header_end_offset,
    })
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Reads the vertex element of an ASCII or binary little-endian PLY file.
///
/// `x`, `y` and `z` are required. `nx`/`ny`/`nz` and `red`/`green`/`blue`
/// become normals and colors when all three of a group are present. Any
/// scalar property type is accepted and widened to `f64`.
pub fn read_ply(path: impl AsRef<Path>) -> io::Result<PointCloud> {
    let data = fs::read(&path)?;
    let header = parse_ply_header(&data)?;

    let (idx_x, idx_y, idx_z) = match (
        header.position("x"),
        header.position("y"),
        header.position("z"),
    ) {
        (Some(ix), Some(iy), Some(iz)) => (ix, iy, iz),
        _ => return Err(invalid("PLY file missing required x, y, z properties")),
    };

    let normal_idx = match (
        header.position("nx"),
        header.position("ny"),
        header.position("nz"),
    ) {
        (Some(a), Some(b), Some(c)) => Some([a, b, c]),
        _ => None,
    };
    let color_idx = match (
        header.position("red"),
        header.position("green"),
        header.position("blue"),
    ) {
        (Some(a), Some(b), Some(c)) => Some([a, b, c]),
        _ => None,
    };

    let rows = match header.format {
        PlyFormat::Ascii => ascii_rows(&data[header.header_end_offset..], &header)?,
        PlyFormat::BinaryLittleEndian => binary_rows(&data[header.header_end_offset..], &header)?,
    };

    let n = rows.len();
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);
    for row in &rows {
        x.push(row[idx_x]);
        y.push(row[idx_y]);
        z.push(row[idx_z]);
    }
    let mut cloud = PointCloud::from_xyz(x, y, z);

    if let Some([a, b, c]) = normal_idx {
        cloud.normals = Some(Normals {
            nx: rows.iter().map(|r| r[a]).collect(),
            ny: rows.iter().map(|r| r[b]).collect(),
            nz: rows.iter().map(|r| r[c]).collect(),
        });
    }

    if let Some([a, b, c]) = color_idx {
        let byte = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        cloud.colors = Some(Colors {
            r: rows.iter().map(|r| byte(r[a])).collect(),
            g: rows.iter().map(|r| byte(r[b])).collect(),
            b: rows.iter().map(|r| byte(r[c])).collect(),
        });
    }

    Ok(cloud)
}

fn ascii_rows(body: &[u8], header: &PlyHeader) -> io::Result<Vec<Vec<f64>>> {
    let body = std::str::from_utf8(body).map_err(|_| invalid("PLY body not valid UTF-8"))?;
    let width = header.property_names.len();
    // every vertex line takes at least one byte, so the body bounds the count
    let mut rows = Vec::with_capacity(header.vertex_count.min(body.len()));

    for line in body.lines() {
        if rows.len() >= header.vertex_count {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < width {
            return Err(invalid(format!(
                "vertex line has {} fields, expected {}",
                parts.len(),
                width
            )));
        }
        let row = parts[..width]
            .iter()
            .map(|p| {
                p.parse::<f64>()
                    .map_err(|e| invalid(format!("failed to parse '{}': {}", p, e)))
            })
            .collect::<io::Result<Vec<f64>>>()?;
        rows.push(row);
    }

    if rows.len() < header.vertex_count {
        return Err(invalid(format!(
            "PLY declares {} vertices but contains {}",
            header.vertex_count,
            rows.len()
        )));
    }
    Ok(rows)
}

fn binary_rows(body: &[u8], header: &PlyHeader) -> io::Result<Vec<Vec<f64>>> {
    let stride = header.stride();
    let needed = header.vertex_count.checked_mul(stride).ok_or_else(|| {
        invalid(format!(
            "PLY declares {} vertices of {} bytes, which overflows",
            header.vertex_count, stride
        ))
    })?;
    if body.len() < needed {
        return Err(invalid(format!(
            "PLY binary body too short: need {} bytes, got {}",
            needed,
            body.len()
        )));
    }

    let offsets = header.offsets();
    let rows = body[..needed]
        .chunks_exact(stride.max(1))
        .take(header.vertex_count)
        .map(|record| {
            header
                .property_types
                .iter()
                .zip(&offsets)
                .map(|(t, &off)| t.read_le(&record[off..]))
                .collect()
        })
        .collect();
    Ok(rows)
}

fn header_text(cloud: &PointCloud, format: &str) -> String {
    let mut out = String::new();
    out.push_str("ply\n");
    out.push_str(&format!("format {} 1.0\n", format));
    out.push_str(&format!("element vertex {}\n", cloud.len()));
    out.push_str("property double x\n");
    out.push_str("property double y\n");
    out.push_str("property double z\n");

    if cloud.normals.is_some() {
        out.push_str("property double nx\n");
        out.push_str("property double ny\n");
        out.push_str("property double nz\n");
    }

    if cloud.colors.is_some() {
        out.push_str("property uchar red\n");
        out.push_str("property uchar green\n");
        out.push_str("property uchar blue\n");
    }

    out.push_str("end_header\n");
    out
}

/// Write a PLY file in ASCII format.
///
/// Coordinates and normals are written as `double` using Rust's shortest
/// round-trip formatting, so reading the file back is lossless.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut w = BufWriter::new(file);
    w.write_all(header_text(cloud, "ascii").as_bytes())?;

    for i in 0..cloud.len() {
        write!(w, "{} {} {}", cloud.x[i], cloud.y[i], cloud.z[i])?;

        if let Some(ref normals) = cloud.normals {
            write!(w, " {} {} {}", normals.nx[i], normals.ny[i], normals.nz[i])?;
        }

        if let Some(ref colors) = cloud.colors {
            write!(w, " {} {} {}", colors.r[i], colors.g[i], colors.b[i])?;
        }

        w.write_all(b"\n")?;
    }

    w.flush()
}

/// Write a PLY file in binary_little_endian format.
pub fn write_ply_binary(path: impl AsRef<Path>, cloud: &PointCloud) -> io::Result<()> {
    let file = fs::File::create(path)?;
    let mut w = BufWriter::new(file);
    w.write_all(header_text(cloud, "binary_little_endian").as_bytes())?;

    for i in 0..cloud.len() {
        w.write_all(&cloud.x[i].to_le_bytes())?;
        w.write_all(&cloud.y[i].to_le_bytes())?;
        w.write_all(&cloud.z[i].to_le_bytes())?;

        if let Some(ref normals) = cloud.normals {
            w.write_all(&normals.nx[i].to_le_bytes())?;
            w.write_all(&normals.ny[i].to_le_bytes())?;
            w.write_all(&normals.nz[i].to_le_bytes())?;
        }

        if let Some(ref colors) = cloud.colors {
            w.write_all(&[colors.r[i], colors.g[i], colors.b[i]])?;
        }
    }

    w.flush()
}
