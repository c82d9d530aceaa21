//! Parser for the tagged lines the yt-dlp backend prints on stdout.
//!
//! The backend is started with print/progress templates that prefix every
//! interesting line with an `mdq-*` tag; everything else is ignored.

use std::path::PathBuf;

pub(crate) const TITLE_TAG: &str = "mdq-title";
pub(crate) const FILE_TAG: &str = "mdq-file";
pub(crate) const PROGRESS_TAG: &str = "mdq-progress";

#[derive(Debug, Clone, PartialEq)]
pub enum BackendLine {
    Title(String),
    File(PathBuf),
    Downloading {
        downloaded: Option<u64>,
        total: Option<u64>,
    },
    Finished,
}

/// Parses one stdout line. Returns `None` for untagged or unusable lines.
pub fn parse_line(line: &str) -> Option<BackendLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
    match tag {
        TITLE_TAG => {
            let title = rest.trim();
            (!title.is_empty() && title != "NA").then(|| BackendLine::Title(title.to_string()))
        }
        FILE_TAG => {
            let file = rest.trim();
            (!file.is_empty() && file != "NA").then(|| BackendLine::File(PathBuf::from(file)))
        }
        PROGRESS_TAG => parse_progress(rest),
        _ => None,
    }
}

// "<status> <downloaded> <total> <estimate>"
fn parse_progress(rest: &str) -> Option<BackendLine> {
    let mut fields = rest.split_whitespace();
    let status = fields.next()?;
    match status {
        "finished" => Some(BackendLine::Finished),
        "downloading" => {
            let downloaded = fields.next().and_then(number);
            let total = fields.next().and_then(number);
            let estimate = fields.next().and_then(number);
            Some(BackendLine::Downloading {
                downloaded,
                total: total.or(estimate),
            })
        }
        _ => None,
    }
}

// yt-dlp prints "NA" for missing fields and floats for estimates.
fn number(field: &str) -> Option<u64> {
    if field == "NA" || field == "None" {
        return None;
    }
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_file() {
        assert_eq!(
            parse_line("mdq-title Some Video: part 1"),
            Some(BackendLine::Title("Some Video: part 1".into()))
        );
        assert_eq!(
            parse_line("mdq-file /tmp/staging/clip.mp4\n"),
            Some(BackendLine::File(PathBuf::from("/tmp/staging/clip.mp4")))
        );
        assert_eq!(parse_line("mdq-title NA"), None);
    }

    #[test]
    fn parses_progress_with_total() {
        assert_eq!(
            parse_line("mdq-progress downloading 1024 4096 NA"),
            Some(BackendLine::Downloading {
                downloaded: Some(1024),
                total: Some(4096)
            })
        );
    }

    #[test]
    fn falls_back_to_estimate() {
        assert_eq!(
            parse_line("mdq-progress downloading 1024 NA 8191.5"),
            Some(BackendLine::Downloading {
                downloaded: Some(1024),
                total: Some(8191)
            })
        );
    }

    #[test]
    fn parses_finished() {
        assert_eq!(
            parse_line("mdq-progress finished 4096 4096 NA"),
            Some(BackendLine::Finished)
        );
    }

    #[test]
    fn ignores_other_output() {
        assert_eq!(parse_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("mdq-progress error NA NA NA"), None);
    }
}
