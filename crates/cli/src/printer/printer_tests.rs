use super::*;

fn record(path: &str) -> FileRecord {
    FileRecord {
        path: path.to_owned(),
        name: "report".to_owned(),
        extension: ".pdf".to_owned(),
        size_kb: 12,
        modified_at: "2024-03-01 09:30:00".to_owned(),
        owner: "alice".to_owned(),
        observed_delta_size: 20,
    }
}

fn ctx(total: usize, truncated: bool) -> ListContext<'static> {
    ListContext {
        store: "/tmp/index.db",
        total,
        truncated,
    }
}

fn cfg(limit: usize, color: ColorChoice) -> PrinterConfig {
    PrinterConfig {
        limit,
        color,
        ..PrinterConfig::default()
    }
}

fn run(printer: &mut dyn RecordPrinter, rows: &[FileRecord], ctx: &ListContext) {
    printer.begin(ctx).unwrap();
    for row in rows {
        printer.print_row(row, ctx).unwrap();
    }
    printer.finish(ctx).unwrap();
}

#[test]
fn human_prints_header_rows_and_remainder() {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    {
        let mut printer = HumanPrinter::new(&mut out, &mut err, cfg(1, ColorChoice::Never));
        run(&mut printer, &[record("/srv/report.pdf")], &ctx(3, true));
    }

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].contains("SIZE_KB"));
    assert!(lines[1].ends_with("/srv/report.pdf"));
    assert!(lines[1].contains("alice"));
    assert_eq!(lines[2], "... and 2 more records");

    let err = String::from_utf8(err).unwrap();
    assert!(err.contains("3 records in /tmp/index.db"));
}

#[test]
fn human_color_wraps_only_the_path() {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    {
        let mut printer = HumanPrinter::new(&mut out, &mut err, cfg(10, ColorChoice::Always));
        run(&mut printer, &[record("/srv/report.pdf")], &ctx(1, false));
    }

    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("\x1b[32m/srv/report.pdf\x1b[0m"));
}

#[test]
fn human_auto_color_is_off_for_plain_writers() {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    {
        let mut printer = HumanPrinter::new(&mut out, &mut err, cfg(10, ColorChoice::Auto));
        run(&mut printer, &[record("/srv/a.pdf")], &ctx(1, false));
    }
    assert!(!String::from_utf8(out).unwrap().contains('\x1b'));
}

#[test]
fn empty_listing_has_no_header() {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    {
        let mut printer = HumanPrinter::new(&mut out, &mut err, cfg(10, ColorChoice::Never));
        run(&mut printer, &[], &ctx(0, false));
    }
    assert!(out.is_empty());
}

#[test]
fn json_rows_are_one_record_per_line() {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    {
        let mut printer = JsonPrinter::new(&mut out, &mut err, cfg(10, ColorChoice::Never));
        run(
            &mut printer,
            &[record("/srv/a.pdf"), record("/srv/b.pdf")],
            &ctx(2, false),
        );
    }

    let out = String::from_utf8(out).unwrap();
    let parsed: Vec<FileRecord> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(parsed, vec![record("/srv/a.pdf"), record("/srv/b.pdf")]);

    let summary: serde_json::Value = serde_json::from_slice(&err).unwrap();
    assert_eq!(summary["type"], "summary");
    assert_eq!(summary["total"], 2);
}

#[test]
fn color_choice_parsing_defaults_to_auto() {
    assert_eq!(ColorChoice::parse("always"), ColorChoice::Always);
    assert_eq!(ColorChoice::parse("never"), ColorChoice::Never);
    assert_eq!(ColorChoice::parse("sometimes"), ColorChoice::Auto);
}
