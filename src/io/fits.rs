use crate::types::{Header, HeaderCard, HeaderValue, Spectrogram, SpectroError, SpectroResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{ArrayD, IxDyn};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// FITS logical record size
const BLOCK_SIZE: usize = 2880;
/// Header card size
const CARD_SIZE: usize = 80;

/// Keywords that describe data layout; regenerated on write, never copied from a template
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BSCALE", "BZERO",
    "BLANK", "TFIELDS", "END",
];

/// Payload of one header-data unit
#[derive(Debug, Clone)]
pub enum HduData {
    None,
    /// Image in C order: shape is (NAXISn, ..., NAXIS1)
    Image(ArrayD<f64>),
    Table(BinTable),
}

/// One header-data unit
#[derive(Debug, Clone)]
pub struct Hdu {
    pub header: Header,
    pub data: HduData,
}

/// Numeric columns of a binary table extension
#[derive(Debug, Clone, Default)]
pub struct BinTable {
    pub columns: Vec<TableColumn>,
}

/// One named column; each table row holds `repeat` values
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub name: String,
    pub rows: Vec<Vec<f64>>,
}

impl BinTable {
    /// Case-insensitive column lookup
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// In-memory FITS file
#[derive(Debug, Clone, Default)]
pub struct FitsFile {
    pub hdus: Vec<Hdu>,
}

/// Column element type from a TFORM code
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    UInt8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Non-numeric or unsupported; skipped but its width is honoured
    Opaque,
}

#[derive(Debug, Clone)]
struct ColumnLayout {
    name: String,
    kind: ColumnKind,
    repeat: usize,
    width: usize,
    scale: f64,
    zero: f64,
}

impl FitsFile {
    /// Read a FITS file, transparently decompressing gzip content
    pub fn open<P: AsRef<Path>>(path: P) -> SpectroResult<Self> {
        let path = path.as_ref();
        log::debug!("Opening FITS file: {}", path.display());

        let mut raw = Vec::new();
        File::open(path)?.read_to_end(&mut raw)?;

        if is_gzip_content(&raw) {
            let mut decoded = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| SpectroError::Format(format!(
                    "failed to decompress {}: {}", path.display(), e
                )))?;
            raw = decoded;
        }

        Self::from_bytes(&raw)
    }

    /// Parse a complete (uncompressed) FITS byte stream
    pub fn from_bytes(bytes: &[u8]) -> SpectroResult<Self> {
        let mut hdus = Vec::new();
        let mut offset = 0;

        while offset + BLOCK_SIZE <= bytes.len() {
            let (header, header_len) = parse_header(&bytes[offset..])?;
            let is_primary = hdus.is_empty();

            if is_primary && header.get_bool("SIMPLE") != Some(true) {
                return Err(SpectroError::Format("missing SIMPLE = T in primary header".to_string()));
            }

            let data_start = offset + header_len;
            let data_len = data_size(&header)?;
            if data_start + data_len > bytes.len() {
                return Err(SpectroError::Format(format!(
                    "data unit truncated: expected {} bytes, found {}",
                    data_len,
                    bytes.len().saturating_sub(data_start)
                )));
            }
            let unit = &bytes[data_start..data_start + data_len];

            let xtension = header.get_str("XTENSION").map(|s| s.trim().to_ascii_uppercase());
            let data = match xtension.as_deref() {
                None | Some("IMAGE") => read_image(&header, unit)?,
                Some("BINTABLE") => HduData::Table(read_bintable(&header, unit)?),
                Some(other) => {
                    log::debug!("Skipping unsupported {} extension", other);
                    HduData::None
                }
            };

            hdus.push(Hdu { header, data });
            offset = data_start + padded(data_len);
        }

        if hdus.is_empty() {
            return Err(SpectroError::Format("file contains no FITS header".to_string()));
        }

        log::debug!("Parsed {} HDU(s)", hdus.len());
        Ok(Self { hdus })
    }

    pub fn primary(&self) -> Option<&Hdu> {
        self.hdus.first()
    }

    /// Binary tables found in the extensions, in file order
    pub fn tables(&self) -> impl Iterator<Item = &BinTable> {
        self.hdus.iter().skip(1).filter_map(|hdu| match &hdu.data {
            HduData::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Primary image with the spectrogram header, plus an `AXIS` table
    /// holding `FREQUENCY` and `TIME` columns.
    pub fn from_spectrogram(spectrogram: &Spectrogram) -> Self {
        let data = spectrogram.data.mapv(f64::from).into_dyn();
        let primary = Hdu {
            header: spectrogram.header.clone(),
            data: HduData::Image(data),
        };

        let mut axis_header = Header::new();
        axis_header.set("EXTNAME", "AXIS", None);
        let table = BinTable {
            columns: vec![
                TableColumn {
                    name: "FREQUENCY".to_string(),
                    rows: vec![spectrogram.freqs.to_vec()],
                },
                TableColumn {
                    name: "TIME".to_string(),
                    rows: vec![spectrogram.time.to_vec()],
                },
            ],
        };

        Self {
            hdus: vec![
                primary,
                Hdu { header: axis_header, data: HduData::Table(table) },
            ],
        }
    }

    /// Serialize. Images are written as BITPIX = -32, table columns as `D`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let extend = self.hdus.len() > 1;

        for (index, hdu) in self.hdus.iter().enumerate() {
            let mut cards = Vec::new();
            let mut payload = Vec::new();

            match (&hdu.data, index == 0) {
                (HduData::Image(image), primary) => {
                    if primary {
                        cards.push(value_card("SIMPLE", &HeaderValue::Bool(true), None));
                    } else {
                        cards.push(value_card("XTENSION", &"IMAGE".into(), None));
                    }
                    cards.push(value_card("BITPIX", &HeaderValue::Int(-32), None));
                    cards.push(value_card("NAXIS", &image.ndim().into(), None));
                    for (axis, len) in image.shape().iter().rev().enumerate() {
                        cards.push(value_card(&format!("NAXIS{}", axis + 1), &(*len).into(), None));
                    }
                    if primary {
                        cards.push(value_card("EXTEND", &HeaderValue::Bool(extend), None));
                    } else {
                        cards.push(value_card("PCOUNT", &HeaderValue::Int(0), None));
                        cards.push(value_card("GCOUNT", &HeaderValue::Int(1), None));
                    }
                    for value in image.iter() {
                        payload.extend_from_slice(&(*value as f32).to_be_bytes());
                    }
                }
                (HduData::None, true) => {
                    cards.push(value_card("SIMPLE", &HeaderValue::Bool(true), None));
                    cards.push(value_card("BITPIX", &HeaderValue::Int(8), None));
                    cards.push(value_card("NAXIS", &HeaderValue::Int(0), None));
                    cards.push(value_card("EXTEND", &HeaderValue::Bool(extend), None));
                }
                (HduData::None, false) => {
                    cards.push(value_card("XTENSION", &"IMAGE".into(), None));
                    cards.push(value_card("BITPIX", &HeaderValue::Int(8), None));
                    cards.push(value_card("NAXIS", &HeaderValue::Int(0), None));
                    cards.push(value_card("PCOUNT", &HeaderValue::Int(0), None));
                    cards.push(value_card("GCOUNT", &HeaderValue::Int(1), None));
                }
                (HduData::Table(table), primary) => {
                    if primary {
                        // Tables cannot be primary; emit an empty primary first
                        cards.push(value_card("SIMPLE", &HeaderValue::Bool(true), None));
                        cards.push(value_card("BITPIX", &HeaderValue::Int(8), None));
                        cards.push(value_card("NAXIS", &HeaderValue::Int(0), None));
                        cards.push(value_card("EXTEND", &HeaderValue::Bool(true), None));
                        write_unit(&mut out, &cards, &[]);
                        cards.clear();
                    }
                    let (table_cards, table_payload) = encode_bintable(table);
                    cards.extend(table_cards);
                    payload = table_payload;
                }
            }

            for card in hdu.header.cards() {
                if is_structural(&card.keyword) {
                    continue;
                }
                cards.extend(format_card(card));
            }

            write_unit(&mut out, &cards, &payload);
        }

        out
    }

    /// Write to disk, gzip-compressing when the path ends in `.gz`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> SpectroResult<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes();
        let compress = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);

        let file = File::create(path)?;
        if compress {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&bytes)?;
            encoder.finish()?;
        } else {
            let mut file = file;
            file.write_all(&bytes)?;
        }

        log::info!("Wrote FITS file {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Write a spectrogram in the instrument's native container
pub fn write_spectrogram<P: AsRef<Path>>(spectrogram: &Spectrogram, path: P) -> SpectroResult<()> {
    FitsFile::from_spectrogram(spectrogram).write(path)
}

fn is_gzip_content(content: &[u8]) -> bool {
    content.len() >= 2 && content[0] == 0x1f && content[1] == 0x8b
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword.starts_with("NAXIS")
        || keyword.starts_with("TTYPE")
        || keyword.starts_with("TFORM")
        || keyword.starts_with("TSCAL")
        || keyword.starts_with("TZERO")
}

/// Parse header cards up to END; returns the header and its padded length
fn parse_header(bytes: &[u8]) -> SpectroResult<(Header, usize)> {
    let mut cards = Vec::new();
    let mut position = 0;

    loop {
        if position + CARD_SIZE > bytes.len() {
            return Err(SpectroError::Format("header is missing END card".to_string()));
        }
        let raw = String::from_utf8_lossy(&bytes[position..position + CARD_SIZE]);
        position += CARD_SIZE;

        let keyword = raw.get(..8).unwrap_or("").trim_end();
        if keyword == "END" {
            break;
        }
        if let Some(card) = parse_card(&raw) {
            cards.push(card);
        }
    }

    Ok((Header::from_cards(cards), padded(position)))
}

/// Parse one 80-character card; blank cards yield `None`
fn parse_card(card: &str) -> Option<HeaderCard> {
    let keyword = card.get(..8).unwrap_or(card).trim().to_ascii_uppercase();
    if keyword.is_empty() {
        return None;
    }
    let rest = card.get(8..).unwrap_or("");

    if keyword != "HISTORY" && keyword != "COMMENT" && rest.starts_with("= ") {
        let (value, comment) = parse_value_field(&rest[2..]);
        return Some(HeaderCard { keyword, value, comment });
    }

    let text = rest.trim_end();
    Some(HeaderCard {
        keyword,
        value: None,
        comment: if text.is_empty() { None } else { Some(text.trim_start().to_string()) },
    })
}

fn parse_value_field(field: &str) -> (Option<HeaderValue>, Option<String>) {
    let field = field.trim_start();

    if let Some(quoted) = field.strip_prefix('\'') {
        let mut text = String::new();
        let mut chars = quoted.char_indices().peekable();
        let mut remainder = "";
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    text.push('\'');
                    chars.next();
                    continue;
                }
                remainder = &quoted[i + 1..];
                break;
            }
            text.push(c);
        }
        let comment = remainder.split_once('/').map(|(_, c)| c.trim().to_string());
        return (
            Some(HeaderValue::Text(text.trim_end().to_string())),
            comment.filter(|c| !c.is_empty()),
        );
    }

    let (value, comment) = match field.split_once('/') {
        Some((v, c)) => (v.trim(), Some(c.trim().to_string())),
        None => (field.trim(), None),
    };
    let comment = comment.filter(|c| !c.is_empty());

    let parsed = if value.is_empty() {
        None
    } else if value == "T" {
        Some(HeaderValue::Bool(true))
    } else if value == "F" {
        Some(HeaderValue::Bool(false))
    } else if let Ok(v) = value.parse::<i64>() {
        Some(HeaderValue::Int(v))
    } else if let Ok(v) = value.replace('D', "E").replace('d', "E").parse::<f64>() {
        Some(HeaderValue::Float(v))
    } else {
        Some(HeaderValue::Text(value.to_string()))
    };

    (parsed, comment)
}

fn axis_lengths(header: &Header) -> SpectroResult<Vec<usize>> {
    let naxis = header.get_i64("NAXIS").unwrap_or(0);
    if naxis < 0 {
        return Err(SpectroError::Format(format!("invalid NAXIS = {}", naxis)));
    }
    (1..=naxis)
        .map(|i| {
            header
                .get_i64(&format!("NAXIS{}", i))
                .filter(|n| *n >= 0)
                .map(|n| n as usize)
                .ok_or_else(|| SpectroError::Format(format!("missing or invalid NAXIS{}", i)))
        })
        .collect()
}

/// Size in bytes of the (unpadded) data unit described by a header
fn data_size(header: &Header) -> SpectroResult<usize> {
    let bitpix = header
        .get_i64("BITPIX")
        .ok_or_else(|| SpectroError::Format("missing BITPIX".to_string()))?;
    let axes = axis_lengths(header)?;
    if axes.is_empty() {
        return Ok(0);
    }
    let pcount = header.get_i64("PCOUNT").unwrap_or(0).max(0) as usize;
    let gcount = header.get_i64("GCOUNT").unwrap_or(1).max(1) as usize;
    let elements: usize = axes.iter().product();
    Ok(bitpix.unsigned_abs() as usize / 8 * gcount * (pcount + elements))
}

fn read_image(header: &Header, unit: &[u8]) -> SpectroResult<HduData> {
    let axes = axis_lengths(header)?;
    if axes.is_empty() || unit.is_empty() {
        return Ok(HduData::None);
    }

    let bitpix = header.get_i64("BITPIX").unwrap_or(0);
    let bscale = header.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = header.get_f64("BZERO").unwrap_or(0.0);
    let blank = header.get_i64("BLANK");

    let count: usize = axes.iter().product();
    let width = bitpix.unsigned_abs() as usize / 8;
    if width == 0 || count * width > unit.len() {
        return Err(SpectroError::Format(format!("unsupported image layout (BITPIX = {})", bitpix)));
    }

    let mut values = Vec::with_capacity(count);
    for chunk in unit[..count * width].chunks_exact(width) {
        let raw = match bitpix {
            8 => integer_sample(chunk[0] as i64, blank),
            16 => integer_sample(i16::from_be_bytes([chunk[0], chunk[1]]) as i64, blank),
            32 => integer_sample(i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64, blank),
            64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                integer_sample(i64::from_be_bytes(buf), blank)
            }
            -32 => f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
            -64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_be_bytes(buf)
            }
            other => {
                return Err(SpectroError::Format(format!("unsupported BITPIX = {}", other)));
            }
        };
        values.push(raw * bscale + bzero);
    }

    let shape: Vec<usize> = axes.iter().rev().copied().collect();
    let image = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| SpectroError::Format(format!("image shape error: {}", e)))?;
    Ok(HduData::Image(image))
}

fn integer_sample(value: i64, blank: Option<i64>) -> f64 {
    if blank == Some(value) {
        f64::NAN
    } else {
        value as f64
    }
}

fn parse_tform(tform: &str) -> Option<(usize, ColumnKind, usize)> {
    let tform = tform.trim();
    let digits: String = tform.chars().take_while(|c| c.is_ascii_digit()).collect();
    let repeat = if digits.is_empty() { 1 } else { digits.parse().ok()? };
    let code = tform[digits.len()..].chars().next()?.to_ascii_uppercase();

    let (kind, element_width) = match code {
        'B' => (ColumnKind::UInt8, 1),
        'I' => (ColumnKind::Int16, 2),
        'J' => (ColumnKind::Int32, 4),
        'K' => (ColumnKind::Int64, 8),
        'E' => (ColumnKind::Float32, 4),
        'D' => (ColumnKind::Float64, 8),
        'L' | 'A' => (ColumnKind::Opaque, 1),
        'C' | 'P' => (ColumnKind::Opaque, 8),
        'M' | 'Q' => (ColumnKind::Opaque, 16),
        'X' => return Some((repeat, ColumnKind::Opaque, repeat.div_ceil(8))),
        _ => return None,
    };
    Some((repeat, kind, repeat * element_width))
}

fn read_bintable(header: &Header, unit: &[u8]) -> SpectroResult<BinTable> {
    let row_bytes = header.get_i64("NAXIS1").unwrap_or(0).max(0) as usize;
    let n_rows = header.get_i64("NAXIS2").unwrap_or(0).max(0) as usize;
    let n_fields = header.get_i64("TFIELDS").unwrap_or(0).max(0) as usize;

    let mut layouts = Vec::with_capacity(n_fields);
    for field in 1..=n_fields {
        let tform = header
            .get_str(&format!("TFORM{}", field))
            .ok_or_else(|| SpectroError::Format(format!("missing TFORM{}", field)))?;
        let (repeat, kind, width) = parse_tform(tform)
            .ok_or_else(|| SpectroError::Format(format!("unsupported TFORM{} = '{}'", field, tform)))?;
        layouts.push(ColumnLayout {
            name: header
                .get_str(&format!("TTYPE{}", field))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| format!("COL{}", field)),
            kind,
            repeat,
            width,
            scale: header.get_f64(&format!("TSCAL{}", field)).unwrap_or(1.0),
            zero: header.get_f64(&format!("TZERO{}", field)).unwrap_or(0.0),
        });
    }

    let used: usize = layouts.iter().map(|l| l.width).sum();
    if used > row_bytes || row_bytes * n_rows > unit.len() {
        return Err(SpectroError::Format(format!(
            "binary table layout inconsistent: columns need {} bytes, row is {}",
            used, row_bytes
        )));
    }

    let mut columns = Vec::new();
    let mut column_offset = 0;
    for layout in &layouts {
        if layout.kind != ColumnKind::Opaque {
            let mut rows = Vec::with_capacity(n_rows);
            for row in 0..n_rows {
                let start = row * row_bytes + column_offset;
                let cell = &unit[start..start + layout.width];
                rows.push(decode_cell(cell, layout));
            }
            columns.push(TableColumn { name: layout.name.clone(), rows });
        }
        column_offset += layout.width;
    }

    Ok(BinTable { columns })
}

fn decode_cell(cell: &[u8], layout: &ColumnLayout) -> Vec<f64> {
    let element_width = if layout.repeat == 0 { 0 } else { layout.width / layout.repeat };
    if element_width == 0 {
        return Vec::new();
    }
    cell.chunks_exact(element_width)
        .map(|b| {
            let raw = match layout.kind {
                ColumnKind::UInt8 => b[0] as f64,
                ColumnKind::Int16 => i16::from_be_bytes([b[0], b[1]]) as f64,
                ColumnKind::Int32 => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                ColumnKind::Int64 => i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64,
                ColumnKind::Float32 => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                ColumnKind::Float64 => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                ColumnKind::Opaque => f64::NAN,
            };
            raw * layout.scale + layout.zero
        })
        .collect()
}

fn encode_bintable(table: &BinTable) -> (Vec<String>, Vec<u8>) {
    let n_rows = table.columns.iter().map(|c| c.rows.len()).max().unwrap_or(0);
    let repeats: Vec<usize> = table
        .columns
        .iter()
        .map(|c| c.rows.iter().map(Vec::len).max().unwrap_or(0))
        .collect();
    let row_bytes: usize = repeats.iter().map(|r| r * 8).sum();

    let mut cards = vec![
        value_card("XTENSION", &"BINTABLE".into(), None),
        value_card("BITPIX", &HeaderValue::Int(8), None),
        value_card("NAXIS", &HeaderValue::Int(2), None),
        value_card("NAXIS1", &row_bytes.into(), None),
        value_card("NAXIS2", &n_rows.into(), None),
        value_card("PCOUNT", &HeaderValue::Int(0), None),
        value_card("GCOUNT", &HeaderValue::Int(1), None),
        value_card("TFIELDS", &table.columns.len().into(), None),
    ];
    for (i, (column, repeat)) in table.columns.iter().zip(&repeats).enumerate() {
        cards.push(value_card(&format!("TTYPE{}", i + 1), &column.name.as_str().into(), None));
        cards.push(value_card(&format!("TFORM{}", i + 1), &format!("{}D", repeat).into(), None));
    }

    let mut payload = Vec::with_capacity(row_bytes * n_rows);
    for row in 0..n_rows {
        for (column, repeat) in table.columns.iter().zip(&repeats) {
            let values = column.rows.get(row).map(Vec::as_slice).unwrap_or(&[]);
            for k in 0..*repeat {
                let v = values.get(k).copied().unwrap_or(f64::NAN);
                payload.extend_from_slice(&v.to_be_bytes());
            }
        }
    }

    (cards, payload)
}

fn write_unit(out: &mut Vec<u8>, cards: &[String], payload: &[u8]) {
    for card in cards {
        out.extend_from_slice(card.as_bytes());
    }
    out.extend_from_slice(&pad_card("END"));
    let header_end = padded(out.len());
    out.resize(header_end, b' ');

    if !payload.is_empty() {
        out.extend_from_slice(payload);
        let data_end = padded(out.len());
        out.resize(data_end, 0);
    }
}

fn pad_card(text: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = text
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .take(CARD_SIZE)
        .collect();
    bytes.resize(CARD_SIZE, b' ');
    bytes
}

fn format_value(value: &HeaderValue) -> String {
    match value {
        HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        HeaderValue::Int(v) => format!("{:>20}", v),
        HeaderValue::Float(v) => format!("{:>20}", format!("{:?}", v).to_uppercase()),
        HeaderValue::Text(s) => format!("'{:<8}'", s.replace('\'', "''")),
    }
}

fn value_card(keyword: &str, value: &HeaderValue, comment: Option<&str>) -> String {
    let key: String = keyword.chars().take(8).collect();
    let mut card = format!("{:<8}= {}", key, format_value(value));
    if let Some(comment) = comment {
        card.push_str(" / ");
        card.push_str(comment);
    }
    String::from_utf8(pad_card(&card)).unwrap_or_default()
}

/// Format a header card; long commentary text spans several cards
fn format_card(card: &HeaderCard) -> Vec<String> {
    match &card.value {
        Some(value) => vec![value_card(&card.keyword, value, card.comment.as_deref())],
        None => {
            let text = card.comment.as_deref().unwrap_or("");
            let chars: Vec<char> = text.chars().collect();
            let chunks: Vec<String> = if chars.is_empty() {
                vec![String::new()]
            } else {
                chars.chunks(CARD_SIZE - 8).map(|c| c.iter().collect()).collect()
            };
            chunks
                .into_iter()
                .map(|chunk| {
                    let line = format!("{:<8}{}", card.keyword, chunk);
                    String::from_utf8(pad_card(&line)).unwrap_or_default()
                })
                .collect()
        }
    }
}
