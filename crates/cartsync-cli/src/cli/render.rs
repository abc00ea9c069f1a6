//! Plain-text rendering. Every function returns a `String` so output can be tested
//! without a terminal.

use cartsync::api::{Refresh, RefreshSource};
use cartsync::model::{FileInfo, PickedRemote, Record, SyncMode};
use cartsync::pending::DrainReport;
use cartsync::store::record_store::MirrorOutcome;
use unicode_width::UnicodeWidthStr;

const COLUMNS: [&str; 6] = ["ID", "NAME", "QTY", "STORE", "PRICE", "BY"];

fn cells(record: &Record) -> [&str; 6] {
    [
        &record.id,
        &record.name,
        &record.quantity,
        &record.store,
        &record.price,
        &record.added_by,
    ]
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

pub fn render_list(records: &[Record]) -> String {
    if records.is_empty() {
        return "The list is empty.\n".to_string();
    }
    let mut widths = COLUMNS.map(|c| c.width());
    for record in records {
        for (width, cell) in widths.iter_mut().zip(cells(record)) {
            *width = (*width).max(cell.width());
        }
    }

    let mut out = String::new();
    let mut push_row = |row: [&str; 6]| {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| pad(cell, width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };
    push_row(COLUMNS);
    for record in records {
        push_row(cells(record));
    }
    out
}

pub fn render_refresh_note(refresh: &Refresh) -> Option<String> {
    match &refresh.source {
        RefreshSource::StaleFallback { error } => Some(format!(
            "Could not reach the remote ({error}); showing the last known list.\n"
        )),
        RefreshSource::LocalAhead => Some(
            "Local changes are not on the remote yet; showing the local list.\n".to_string(),
        ),
        _ => None,
    }
}

pub fn render_write(action: &str, outcome: MirrorOutcome) -> String {
    match outcome {
        MirrorOutcome::Queued => {
            format!("{action}. The remote is unreachable; it will be updated later.\n")
        }
        MirrorOutcome::Unchanged => "Nothing matched.\n".to_string(),
        MirrorOutcome::LocalOnly | MirrorOutcome::Pushed => format!("{action}.\n"),
    }
}

pub fn render_info(
    info: &FileInfo,
    remote: Option<&PickedRemote>,
    mode: SyncMode,
    pending: bool,
) -> String {
    let mut out = format!("File:      {}\n", info.path);
    if info.exists {
        out.push_str(&format!(
            "Items:     {} ({} bytes)\n",
            info.item_count, info.size_bytes
        ));
    } else {
        out.push_str("Items:     0 (not created yet)\n");
    }
    out.push_str(&format!("Sync mode: {}\n", mode.as_str()));
    if let Some(remote) = remote {
        out.push_str(&format!(
            "Remote:    {} ({})\n",
            remote.display_name, remote.uri
        ));
    }
    if pending {
        out.push_str("Pending:   remote is behind, will retry\n");
    }
    out
}

pub fn render_total(total: f64) -> String {
    format!("Total: {total:.2}\n")
}

pub fn render_drain(report: &DrainReport) -> String {
    if report.attempted() == 0 {
        return "Nothing to sync.\n".to_string();
    }
    let join = |features: &[cartsync::model::Feature]| {
        features
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut out = String::new();
    if !report.synced.is_empty() {
        out.push_str(&format!("Synced: {}\n", join(&report.synced)));
    }
    if !report.failed.is_empty() {
        out.push_str(&format!("Still pending: {}\n", join(&report.failed)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartsync::model::Feature;

    #[test]
    fn test_render_empty_list() {
        assert_eq!(render_list(&[]), "The list is empty.\n");
    }

    #[test]
    fn test_render_list_aligns_columns() {
        let records = vec![
            Record::new("Milk")
                .with_id("1")
                .quantity("2")
                .store("Market")
                .price("3.50")
                .added_by("Alice"),
            Record::new("Bread").with_id("22"),
        ];
        let out = render_list(&records);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ID  NAME   QTY  STORE   PRICE  BY");
        assert_eq!(lines[1], "1   Milk   2    Market  3.50   Alice");
        assert_eq!(lines[2], "22  Bread  1");
    }

    #[test]
    fn test_render_wide_characters() {
        let records = vec![Record::new("牛乳").with_id("1")];
        let out = render_list(&records);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ID  NAME  QTY  STORE  PRICE  BY");
        assert_eq!(lines[1], "1   牛乳  1");
    }

    #[test]
    fn test_render_queued_write() {
        assert!(render_write("Added Milk", MirrorOutcome::Queued).contains("unreachable"));
        assert_eq!(
            render_write("Added Milk", MirrorOutcome::Pushed),
            "Added Milk.\n"
        );
    }

    #[test]
    fn test_render_drain() {
        assert_eq!(render_drain(&DrainReport::default()), "Nothing to sync.\n");
        let report = DrainReport {
            skipped: false,
            synced: vec![Feature::shopping_list()],
            failed: vec![Feature::new("chores")],
        };
        assert_eq!(
            render_drain(&report),
            "Synced: shopping_list\nStill pending: chores\n"
        );
    }

    #[test]
    fn test_render_refresh_notes() {
        let refresh = |source| Refresh {
            records: Vec::new(),
            source,
        };
        assert_eq!(render_refresh_note(&refresh(RefreshSource::Remote)), None);
        assert!(render_refresh_note(&refresh(RefreshSource::LocalAhead))
            .unwrap()
            .contains("not on the remote yet"));
        let stale = refresh(RefreshSource::StaleFallback {
            error: "offline".to_string(),
        });
        assert!(render_refresh_note(&stale).unwrap().contains("offline"));
    }

    #[test]
    fn test_render_info() {
        let info = FileInfo {
            exists: true,
            size_bytes: 60,
            item_count: 1,
            path: "/data/documents/shopping_list.csv".to_string(),
        };
        let remote = PickedRemote::new("/cloud/list.csv", "Groceries");
        let out = render_info(&info, Some(&remote), SyncMode::Mirrored, true);
        assert!(out.contains("Items:     1 (60 bytes)"));
        assert!(out.contains("Sync mode: mirrored"));
        assert!(out.contains("Remote:    Groceries (/cloud/list.csv)"));
        assert!(out.contains("Pending:"));
    }
}
