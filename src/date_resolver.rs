/// Date resolution for files being organized.
///
/// This module determines the organizational date for a single file. Image
/// files are probed for an embedded EXIF capture date first; everything else
/// (and every image whose metadata is absent or unreadable) falls back to the
/// filesystem modification time. Resolution never fails: the caller always
/// gets a date and the source it came from.
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// File extensions that are probed for EXIF metadata, lowercase.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif"];

/// Date layout used for bucket directory names.
///
/// Constructed from a human-facing label; unrecognized labels silently map
/// to [`DateFormat::YearMonthDay`], never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    /// `15-01-2023`
    DayMonthYear,
    /// `01-15-2023`
    MonthDayYear,
    /// `2023-01-15`
    #[default]
    YearMonthDay,
}

impl DateFormat {
    /// Parses a format label such as `"DD-MM-YYYY"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datetidy::date_resolver::DateFormat;
    ///
    /// assert_eq!(DateFormat::from_label("DD-MM-YYYY"), DateFormat::DayMonthYear);
    /// assert_eq!(DateFormat::from_label("anything else"), DateFormat::YearMonthDay);
    /// ```
    pub fn from_label(label: &str) -> Self {
        match label {
            "DD-MM-YYYY" => DateFormat::DayMonthYear,
            "MM-DD-YYYY" => DateFormat::MonthDayYear,
            "YYYY-MM-DD" => DateFormat::YearMonthDay,
            _ => DateFormat::YearMonthDay,
        }
    }

    /// Returns the strftime pattern for this layout.
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "%d-%m-%Y",
            DateFormat::MonthDayYear => "%m-%d-%Y",
            DateFormat::YearMonthDay => "%Y-%m-%d",
        }
    }

    /// Returns the canonical label for this layout.
    pub fn label(&self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "DD-MM-YYYY",
            DateFormat::MonthDayYear => "MM-DD-YYYY",
            DateFormat::YearMonthDay => "YYYY-MM-DD",
        }
    }
}

/// Where a resolved date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DateSource {
    /// A capture timestamp embedded in the image's EXIF metadata.
    ExifMetadata,
    /// The filesystem's last-modification timestamp.
    ModificationTime,
}

impl DateSource {
    /// Returns a human-readable description of this source.
    pub fn describe(&self) -> &'static str {
        match self {
            DateSource::ExifMetadata => "EXIF data",
            DateSource::ModificationTime => "file modification time",
        }
    }
}

/// A single strategy for extracting a date from a file.
///
/// Probes are consulted in order; a probe that cannot produce a date for a
/// given file returns `None` and the next one is tried. This keeps the EXIF
/// capability optional: when decoding fails for any reason the probe simply
/// declines rather than failing the resolution.
trait DateProbe {
    fn probe(&self, path: &Path) -> Option<NaiveDateTime>;
    fn source(&self) -> DateSource;
}

/// Probes image files for an embedded EXIF date.
struct ExifDateProbe;

impl ExifDateProbe {
    /// EXIF date tags in priority order. `DateTimeOriginal` is the capture
    /// time; `DateTime` and `DateTimeDigitized` are later fallbacks.
    const DATE_TAGS: [exif::Tag; 3] = [
        exif::Tag::DateTimeOriginal,
        exif::Tag::DateTime,
        exif::Tag::DateTimeDigitized,
    ];
}

impl DateProbe for ExifDateProbe {
    fn probe(&self, path: &Path) -> Option<NaiveDateTime> {
        if !has_image_extension(path) {
            return None;
        }

        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

        for tag in Self::DATE_TAGS {
            let Some(field) = exif.get_field(tag, exif::In::PRIMARY) else {
                continue;
            };
            let Some(raw) = ascii_value(field) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if let Some(parsed) = parse_exif_datetime(raw) {
                return Some(parsed);
            }
        }

        None
    }

    fn source(&self) -> DateSource {
        DateSource::ExifMetadata
    }
}

/// Probes the filesystem's last-modification timestamp.
struct MtimeDateProbe;

impl DateProbe for MtimeDateProbe {
    fn probe(&self, path: &Path) -> Option<NaiveDateTime> {
        let modified = fs::metadata(path).ok()?.modified().ok()?;
        Some(DateTime::<Local>::from(modified).naive_local())
    }

    fn source(&self) -> DateSource {
        DateSource::ModificationTime
    }
}

/// Resolves the organizational date for a file and formats bucket names.
///
/// Holds the active [`DateFormat`] and an ordered list of date probes:
/// EXIF metadata first, modification time second.
pub struct DateResolver {
    format: DateFormat,
    probes: Vec<Box<dyn DateProbe>>,
}

impl DateResolver {
    /// Creates a resolver with the standard probe order.
    pub fn new(format: DateFormat) -> Self {
        Self {
            format,
            probes: vec![Box::new(ExifDateProbe), Box::new(MtimeDateProbe)],
        }
    }

    /// Returns the active date format.
    pub fn format(&self) -> DateFormat {
        self.format
    }

    /// Resolves the date for a file, reporting which source produced it.
    ///
    /// Never fails. If even the modification time cannot be read (the file
    /// vanished between listing and resolution), the current local time is
    /// reported as a modification-time result; the subsequent transfer step
    /// surfaces the missing file as a per-file error.
    pub fn resolve(&self, path: &Path) -> (NaiveDateTime, DateSource) {
        for probe in &self.probes {
            if let Some(date) = probe.probe(path) {
                return (date, probe.source());
            }
        }
        (Local::now().naive_local(), DateSource::ModificationTime)
    }

    /// Resolves the date for a file and formats it as a bucket name.
    pub fn bucket_for(&self, path: &Path) -> (String, DateSource) {
        let (date, source) = self.resolve(path);
        (date.format(self.format.pattern()).to_string(), source)
    }
}

/// Returns true if the path carries a recognized image extension.
fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Extracts the first ASCII string from an EXIF field, if it is one.
fn ascii_value(field: &exif::Field) -> Option<String> {
    match &field.value {
        exif::Value::Ascii(strings) => strings
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Parses an EXIF date string.
///
/// The canonical EXIF form is `YYYY:MM:DD HH:MM:SS`: the first two colons
/// become hyphens and the third a space before parsing. Values that fail
/// that form are retried as bare dates (`%Y-%m-%d`, then `%Y/%m/%d`).
fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let mut seen = 0;
    let normalized: String = raw
        .chars()
        .map(|c| {
            if c == ':' {
                seen += 1;
                match seen {
                    1 | 2 => '-',
                    3 => ' ',
                    _ => c,
                }
            } else {
                c
            }
        })
        .collect();

    if let Ok(parsed) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed);
    }

    for pattern in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, pattern) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_labels_round_trip() {
        for label in ["DD-MM-YYYY", "MM-DD-YYYY", "YYYY-MM-DD"] {
            assert_eq!(DateFormat::from_label(label).label(), label);
        }
    }

    #[test]
    fn test_unknown_format_defaults_to_year_month_day() {
        assert_eq!(DateFormat::from_label("DD/MM/YY"), DateFormat::YearMonthDay);
        assert_eq!(DateFormat::from_label(""), DateFormat::YearMonthDay);
        assert_eq!(DateFormat::from_label("yyyy-mm-dd"), DateFormat::YearMonthDay);
    }

    #[test]
    fn test_parse_canonical_exif_datetime() {
        let parsed = parse_exif_datetime("2023:01:15 10:30:00").expect("should parse");
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2023, 1, 15));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (10, 30, 0));
    }

    #[test]
    fn test_parse_bare_date_fallbacks() {
        let hyphen = parse_exif_datetime("2024-03-10").expect("should parse");
        assert_eq!((hyphen.year(), hyphen.month(), hyphen.day()), (2024, 3, 10));

        let slash = parse_exif_datetime("2024/03/10").expect("should parse");
        assert_eq!((slash.year(), slash.month(), slash.day()), (2024, 3, 10));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_exif_datetime("not a date").is_none());
        assert!(parse_exif_datetime("").is_none());
        assert!(parse_exif_datetime("15-01-2023").is_none());
    }

    #[test]
    fn test_image_extension_detection_is_case_insensitive() {
        assert!(has_image_extension(Path::new("photo.jpg")));
        assert!(has_image_extension(Path::new("photo.JPG")));
        assert!(has_image_extension(Path::new("scan.TIFF")));
        assert!(!has_image_extension(Path::new("notes.txt")));
        assert!(!has_image_extension(Path::new("archive")));
    }

    #[test]
    fn test_resolve_falls_back_to_mtime_for_plain_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("notes.txt");
        fs::write(&file_path, "contents").expect("Failed to write file");

        let resolver = DateResolver::new(DateFormat::YearMonthDay);
        let (_, source) = resolver.resolve(&file_path);
        assert_eq!(source, DateSource::ModificationTime);
    }

    #[test]
    fn test_resolve_falls_back_to_mtime_for_image_without_exif() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("broken.jpg");
        // Not a decodable image at all; the EXIF probe must decline quietly.
        fs::write(&file_path, b"\xFF\xD8\xFF\xD9").expect("Failed to write file");

        let resolver = DateResolver::new(DateFormat::YearMonthDay);
        let (_, source) = resolver.resolve(&file_path);
        assert_eq!(source, DateSource::ModificationTime);
    }

    #[test]
    fn test_bucket_uses_active_format() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("notes.txt");
        fs::write(&file_path, "contents").expect("Failed to write file");

        let resolver = DateResolver::new(DateFormat::DayMonthYear);
        let (bucket, _) = resolver.bucket_for(&file_path);
        // DD-MM-YYYY: two-digit day, two-digit month, four-digit year.
        let parts: Vec<&str> = bucket.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 4);
    }
}
