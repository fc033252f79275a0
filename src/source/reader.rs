use csv::{ByteRecord, ReaderBuilder};
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{Cursor, Read},
    path::Path,
};
use tracing::{debug, warn};
use zip::ZipArchive;

use super::{RawTable, SourceDescriptor, TabularReader};
use crate::error::LoadError;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Reads a plain CSV file (one implicit sheet) or a ZIP archive whose `.csv`
/// entries are the sheets of a workbook.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkbookReader;

impl TabularReader for WorkbookReader {
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(source = %descriptor.kind, path = %descriptor.path.display())
    )]
    fn read(&self, descriptor: &SourceDescriptor) -> Result<RawTable, LoadError> {
        let mut file = File::open(&descriptor.path).map_err(|e| descriptor.unavailable(e))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| descriptor.unavailable(e))?;

        let (sheet_label, data) = if bytes.starts_with(ZIP_MAGIC) {
            select_sheet(descriptor, bytes)?
        } else {
            if let Some(sheet) = &descriptor.sheet {
                debug!(sheet = %sheet, "plain CSV has a single sheet; ignoring sheet name");
            }
            (file_label(&descriptor.path), bytes)
        };

        parse_csv(descriptor, &sheet_label, &data)
    }
}

/// Buffer every `.csv` entry in archive order and pick the requested sheet.
fn select_sheet(
    descriptor: &SourceDescriptor,
    bytes: Vec<u8>,
) -> Result<(String, Vec<u8>), LoadError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| descriptor.malformed(format!("bad archive: {}", e)))?;

    let mut sheets: Vec<(String, usize)> = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| descriptor.malformed(format!("archive entry #{}: {}", i, e)))?;
        let name = entry.name().to_string();
        if entry.is_file() && name.to_lowercase().ends_with(".csv") {
            sheets.push((sheet_name(&name), i));
        }
    }

    if sheets.is_empty() {
        return Err(descriptor.malformed("archive holds no CSV sheets"));
    }

    let (label, index) = match &descriptor.sheet {
        Some(wanted) => {
            let wanted = wanted.trim();
            sheets
                .iter()
                .find(|(name, _)| name == wanted)
                .or_else(|| {
                    sheets
                        .iter()
                        .find(|(name, _)| name.to_uppercase() == wanted.to_uppercase())
                })
                .map(|(name, i)| (name.clone(), *i))
                .ok_or_else(|| {
                    let available: Vec<&str> = sheets.iter().map(|(n, _)| n.as_str()).collect();
                    descriptor.malformed(format!(
                        "sheet `{}` not found (available: {})",
                        wanted,
                        available.join(", ")
                    ))
                })?
        }
        None => {
            let (name, i) = &sheets[0];
            (format!("first sheet ({})", name), *i)
        }
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| descriptor.malformed(format!("archive entry #{}: {}", index, e)))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .map_err(|e| descriptor.malformed(format!("reading sheet `{}`: {}", label, e)))?;
    Ok((label, buf))
}

fn parse_csv(
    descriptor: &SourceDescriptor,
    sheet_label: &str,
    data: &[u8],
) -> Result<RawTable, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(data))
        .from_reader(data);

    let mut records = rdr.byte_records();
    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => return Err(descriptor.malformed(format!("header row: {}", e))),
        None => return Err(descriptor.malformed("no header row")),
    };
    let headers = build_headers(&header);
    let width = headers.len();

    let cap = descriptor.row_cap.unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    let mut truncated = false;
    for (idx, result) in records.enumerate() {
        if rows.len() == cap {
            truncated = true;
            break;
        }
        let record =
            result.map_err(|e| descriptor.malformed(format!("record {}: {}", idx + 1, e)))?;
        if record.len() > width {
            warn!(record = idx + 1, fields = record.len(), width, "extra fields dropped");
        }
        let mut row: Vec<String> = record.iter().take(width).map(decode_field).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    let label = if truncated {
        format!("{} (limited to {} rows)", sheet_label, cap)
    } else {
        sheet_label.to_string()
    };
    debug!(rows = rows.len(), columns = width, truncated, "raw table read");

    Ok(RawTable { headers, rows, label })
}

/// Blank headers become `Unnamed: <index>`; repeats get the first free `.N`
/// suffix, so every returned name is distinct.
fn build_headers(record: &ByteRecord) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::with_capacity(record.len());
    for (i, raw) in record.iter().enumerate() {
        let mut name = decode_field(raw);
        if i == 0 {
            name = name.trim_start_matches('\u{feff}').to_string();
        }
        if name.trim().is_empty() {
            name = format!("Unnamed: {}", i);
        }
        let mut unique = name.clone();
        while used.contains(&unique) {
            let n = repeats.entry(name.clone()).or_insert(0);
            *n += 1;
            unique = format!("{}.{}", name, n);
        }
        used.insert(unique.clone());
        headers.push(unique);
    }
    headers
}

/// UTF-8 when valid, otherwise Latin-1 (spreadsheet exports on Windows).
fn decode_field(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}

fn sniff_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or(&[]);
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    let commas = first_line.iter().filter(|&&b| b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn sheet_name(entry_name: &str) -> String {
    Path::new(entry_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| entry_name.to_string())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::SourceKind;
    use std::{fs, io::Write, path::PathBuf};
    use tempfile::tempdir;
    use zip::{write::SimpleFileOptions, ZipWriter};

    pub(crate) fn write_workbook(path: &Path, sheets: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (name, body) in sheets {
            zip.start_file(format!("{}.csv", name), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn desc(path: PathBuf) -> SourceDescriptor {
        SourceDescriptor::new(SourceKind::Default, path)
    }

    #[test]
    fn test_plain_csv_with_placeholders() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("plain.csv");
        fs::write(&path, "CLIENTE;;DATA;CLIENTE\nJBS;x;2024-01-02\n").unwrap();

        let table = WorkbookReader.read(&desc(path)).unwrap();
        assert_eq!(table.headers, vec!["CLIENTE", "Unnamed: 1", "DATA", "CLIENTE.1"]);
        assert_eq!(table.rows, vec![vec!["JBS", "x", "2024-01-02", ""]]);
        assert_eq!(table.label, "plain.csv");
    }

    #[test]
    fn test_suffixed_duplicates_stay_unique() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("dupes.csv");
        fs::write(&path, "A,A,A.1,A\n1,2,3,4\n").unwrap();

        let table = WorkbookReader.read(&desc(path)).unwrap();
        assert_eq!(table.headers, vec!["A", "A.1", "A.1.1", "A.2"]);
        let distinct: HashSet<&String> = table.headers.iter().collect();
        assert_eq!(distinct.len(), table.headers.len());
    }

    #[test]
    fn test_row_cap_truncates_and_labels() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("capped.csv");
        fs::write(&path, "A\n1\n2\n3\n").unwrap();

        let table = WorkbookReader.read(&desc(path).with_row_cap(2)).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.label, "capped.csv (limited to 2 rows)");
    }

    #[test]
    fn test_workbook_sheet_selection() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("book.zip");
        write_workbook(&path, &[("Resumo", "X\n9\n"), ("PLANILHA ÚNICA", "CLIENTE\nNITEX\n")]);

        let named = WorkbookReader
            .read(&desc(path.clone()).with_sheet("PLANILHA ÚNICA"))
            .unwrap();
        assert_eq!(named.headers, vec!["CLIENTE"]);
        assert_eq!(named.label, "PLANILHA ÚNICA");

        let first = WorkbookReader.read(&desc(path.clone())).unwrap();
        assert_eq!(first.headers, vec!["X"]);

        match WorkbookReader.read(&desc(path).with_sheet("NOPE")) {
            Err(LoadError::MalformedSource { reason, .. }) => assert!(reason.contains("NOPE")),
            other => panic!("expected MalformedSource, got {:?}", other),
        }
    }

    #[test]
    fn test_latin1_fields_are_decoded() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("latin1.csv");
        fs::write(&path, b"CLIENTE\nMOSAIC CUBAT\xc3O\n").unwrap();

        let table = WorkbookReader.read(&desc(path)).unwrap();
        assert_eq!(table.rows[0][0], "MOSAIC CUBATÃO");
    }

    #[test]
    fn test_missing_and_empty_files() {
        let tmp = tempdir().unwrap();
        assert!(matches!(
            WorkbookReader.read(&desc(tmp.path().join("none.csv"))),
            Err(LoadError::SourceUnavailable { .. })
        ));

        let empty = tmp.path().join("empty.csv");
        fs::write(&empty, "").unwrap();
        assert!(matches!(
            WorkbookReader.read(&desc(empty)),
            Err(LoadError::MalformedSource { .. })
        ));
    }
}
