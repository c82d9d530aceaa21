//! Tests for status, cancel, retry, remove, clear and config.

use super::parse;
use crate::cli::{CliCommand, ConfigAction};
use std::path::Path;

#[test]
fn cli_parse_status() {
    match parse(&["mdq", "status"]) {
        CliCommand::Status { json } => assert!(!json),
        _ => panic!("expected Status"),
    }
    match parse(&["mdq", "status", "--json"]) {
        CliCommand::Status { json } => assert!(json),
        _ => panic!("expected Status --json"),
    }
}

#[test]
fn cli_parse_cancel_retry_remove() {
    match parse(&["mdq", "cancel", "42"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 42),
        _ => panic!("expected Cancel"),
    }
    match parse(&["mdq", "retry", "7"]) {
        CliCommand::Retry { id } => assert_eq!(id, 7),
        _ => panic!("expected Retry"),
    }
    match parse(&["mdq", "remove", "99"]) {
        CliCommand::Remove { id } => assert_eq!(id, 99),
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_clear() {
    match parse(&["mdq", "clear"]) {
        CliCommand::Clear { keep_failed } => assert!(!keep_failed),
        _ => panic!("expected Clear"),
    }
    match parse(&["mdq", "clear", "--keep-failed"]) {
        CliCommand::Clear { keep_failed } => assert!(keep_failed),
        _ => panic!("expected Clear --keep-failed"),
    }
}

#[test]
fn cli_parse_config() {
    match parse(&["mdq", "config", "show"]) {
        CliCommand::Config {
            action: ConfigAction::Show,
        } => {}
        _ => panic!("expected Config Show"),
    }
    match parse(&["mdq", "config", "set-download-dir", "/media/videos"]) {
        CliCommand::Config {
            action: ConfigAction::SetDownloadDir { path },
        } => assert_eq!(path, Path::new("/media/videos")),
        _ => panic!("expected Config SetDownloadDir"),
    }
}
