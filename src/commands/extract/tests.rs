use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;

use super::aggregate::Aggregator;
use super::candidate_keys::{candidate_key, candidate_keys_for};
use super::export::{count_rows, write_csv_outputs, write_sqlite};
use super::metadata::MetadataExtractor;
use super::providers::{LayoutTables, SidecarTables, TableSource, split_pages};
use super::results_table::{
    HeaderState, ResultsDocument, is_results_grid, locate_header, parse_results_document,
};
use super::roster::{LineClass, RosterParser, RosterState};
use super::row_repair::{RowRepairer, parse_count};
use super::station_id::parse_station_id;

fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter().map(|row| lines(row)).collect()
}

fn scratch_dir(label: &str) -> PathBuf {
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let dir = std::env::temp_dir().join(format!(
        "booth_extract_{}_{}_{}",
        label,
        std::process::id(),
        stamp
    ));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn header_grid() -> Vec<Vec<String>> {
    grid(&[
        &["Serial No.", "Polling Station No.", "Votes polled", "", "Total", "Rejected", "NOTA"],
        &["", "", "Alice", "Bob", "", "", ""],
        &["12", "45", "10", "7", "17", "1", "0"],
    ])
}

#[test]
fn roster_document_emits_single_and_two_line_records() {
    let parser = RosterParser::new().expect("parser");
    let pages = vec![lines(&["12 Community Hall", "13", "Govt School"])];

    let records = parser.parse_document(&pages);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].ps_number, 12);
    assert_eq!(records[0].ps_number_raw, "12");
    assert_eq!(records[0].polling_station_name, "Community Hall");
    assert_eq!(records[1].ps_number, 13);
    assert_eq!(records[1].polling_station_name, "Govt School");
    assert!(records[0].district_code.is_none());
    assert!(records[0].ac_name.is_none());
}

#[test]
fn roster_bare_id_followed_by_bare_id_drops_the_first() {
    let parser = RosterParser::new().expect("parser");
    let pages = vec![lines(&["14", "15A", "Anganwadi Building"])];

    let records = parser.parse_document(&pages);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ps_number_raw, "15A");
    assert_eq!(records[0].ps_number, 15);
    assert_eq!(records[0].ps_suffix, "A");
    assert_eq!(records[0].polling_station_name, "Anganwadi Building");
}

#[test]
fn roster_skips_noise_and_blank_lines_without_touching_pending_id() {
    let parser = RosterParser::new().expect("parser");
    let pages = vec![
        lines(&["Sl No   Polling Station", "21", "", "   \u{00A0} "]),
        lines(&["Taluk : Koyilandy", "Govt  L P\u{00A0}School  (North Wing)"]),
    ];

    let records = parser.parse_document(&pages);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ps_number, 21);
    assert_eq!(records[0].polling_station_name, "Govt L P School (North Wing)");
}

#[test]
fn roster_drops_text_without_pending_id_and_single_line_clears_pending() {
    let parser = RosterParser::new().expect("parser");
    let pages = vec![lines(&[
        "Orphan name line",
        "30",
        "31b Reading Room",
        "Stray continuation",
    ])];

    let records = parser.parse_document(&pages);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ps_number_raw, "31b");
    assert_eq!(records[0].ps_suffix, "B");
    assert_eq!(records[0].polling_station_name, "Reading Room");
}

#[test]
fn roster_attaches_first_page_metadata_to_every_record() {
    let parser = RosterParser::new().expect("parser");
    let pages = vec![
        lines(&[
            "DISTRICT NO & NAME : 4 - KOZHIKODE",
            "LAC No&Name:23 -  QUILANDY",
            "1 Govt Higher Secondary School",
        ]),
        lines(&["2", "Mappila U P School"]),
    ];

    let records = parser.parse_document(&pages);

    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.district_code.as_deref(), Some("4"));
        assert_eq!(record.district_name.as_deref(), Some("KOZHIKODE"));
        assert_eq!(record.ac_code.as_deref(), Some("23"));
        assert_eq!(record.ac_name.as_deref(), Some("QUILANDY"));
    }
}

#[test]
fn metadata_keeps_first_match_of_each_label() {
    let extractor = MetadataExtractor::new().expect("extractor");
    let metadata = extractor.extract(&lines(&[
        "district no & name : 4 - KOZHIKODE",
        "DISTRICT NO & NAME : 9 - WAYANAD",
    ]));

    assert_eq!(metadata.district_code.as_deref(), Some("4"));
    assert_eq!(metadata.district_name.as_deref(), Some("KOZHIKODE"));
    assert!(metadata.ac_code.is_none());
}

#[test]
fn roster_state_transitions_are_explicit() {
    let first = parse_station_id("7").expect("id");
    let second = parse_station_id("8").expect("id");

    let (state, emitted) = RosterState::Idle.advance(LineClass::BareId(first.clone()));
    assert_eq!(state, RosterState::Pending(first.clone()));
    assert!(emitted.is_none());

    let (state, emitted) = state.advance(LineClass::Blank);
    assert_eq!(state, RosterState::Pending(first.clone()));
    assert!(emitted.is_none());

    let (state, emitted) = state.advance(LineClass::BareId(second.clone()));
    assert_eq!(state, RosterState::Pending(second.clone()));
    assert!(emitted.is_none());

    let (state, emitted) = state.advance(LineClass::Text("Library".to_string()));
    assert_eq!(state, RosterState::Idle);
    assert_eq!(emitted, Some((second, "Library".to_string())));

    let (state, emitted) = state.advance(LineClass::Text("Nobody".to_string()));
    assert_eq!(state, RosterState::Idle);
    assert!(emitted.is_none());
}

#[test]
fn classify_line_orders_noise_before_station_patterns() {
    let parser = RosterParser::new().expect("parser");

    assert_eq!(parser.classify_line("  "), LineClass::Blank);
    assert_eq!(parser.classify_line("12 Block Office"), LineClass::Noise);
    assert!(matches!(
        parser.classify_line("12A  Town Hall"),
        LineClass::SingleLine { ref name, .. } if name == "Town Hall"
    ));
    assert!(matches!(parser.classify_line("112"), LineClass::BareId(_)));
    assert!(matches!(parser.classify_line("1234"), LineClass::Text(_)));
    assert!(matches!(parser.classify_line("1234 Market Road"), LineClass::Text(_)));
}

#[test]
fn results_grid_requires_shape_and_serial_label() {
    assert!(is_results_grid(&header_grid()));
    assert!(!is_results_grid(&grid(&[&["Serial", "a", "b", "c", "d"]])));
    assert!(!is_results_grid(&grid(&[&["Serial", "a", "b", "c"], &["", "", "", ""]])));
    assert!(!is_results_grid(&grid(&[
        &["Form 20", "a", "b", "c", "d"],
        &["", "", "", "", ""],
    ])));
    assert!(is_results_grid(&grid(&[
        &["  SERIAL\u{00A0}No. Of", "a", "b", "c", "d"],
        &["", "", "", "", ""],
    ])));
}

#[test]
fn locate_header_prefers_row_zero_then_row_one() {
    let header = locate_header(&header_grid(), "04", "102").expect("header");
    assert_eq!(header.candidates, vec!["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(header.total_index, 4);
    assert_eq!(header.ls_code, "04");
    assert_eq!(header.ac_code, "102");

    let row_one_total = grid(&[
        &["Serial No.", "PS No.", "Votes", "", "", "", "", ""],
        &["", "", "Carol", "Dan", "Erin", "Total of valid votes", "Rejected", "NOTA"],
    ]);
    let header = locate_header(&row_one_total, "04", "102").expect("header");
    assert_eq!(header.total_index, 5);
    assert_eq!(header.candidates.len(), 3);
    assert_eq!(header.candidates[2], "Erin");

    let no_total = grid(&[
        &["Serial No.", "PS No.", "Votes", "", ""],
        &["", "", "Carol", "Dan", "Rejected"],
    ]);
    assert!(locate_header(&no_total, "04", "102").is_none());
}

#[test]
fn header_derivation_is_idempotent_within_a_document() {
    let repairer = RowRepairer::new().expect("repairer");
    let mut document = ResultsDocument::new(&repairer, "04", "102", 2024);

    document.consume_grid(0, &header_grid());
    let first = document.header().clone();
    document.consume_grid(1, &header_grid());

    assert_eq!(document.header(), &first);
    let HeaderState::Locked(header) = first else {
        panic!("header should be locked");
    };
    assert_eq!(header.candidates, vec!["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(header.total_index, 4);

    let bundle = document.finish();
    assert_eq!(bundle.booth_totals.len(), 2);
}

#[test]
fn results_document_produces_totals_and_votes() {
    let repairer = RowRepairer::new().expect("repairer");
    let grids = vec![header_grid()];

    let bundle = parse_results_document(&repairer, &grids, "04", "102", 2024);

    assert!(bundle.header_found);
    assert_eq!(bundle.candidates, vec!["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(bundle.booth_totals.len(), 1);
    let total = &bundle.booth_totals[0];
    assert_eq!(total.serial_no, "12");
    assert_eq!(total.ps_number, 45);
    assert_eq!(total.ps_suffix, "");
    assert_eq!(total.total_valid, 17);
    assert_eq!(total.rejected, 1);
    assert_eq!(total.nota, 0);
    assert_eq!(total.year, 2024);

    assert_eq!(bundle.booth_votes.len(), 2);
    assert_eq!(bundle.booth_votes[0].candidate_name, "Alice");
    assert_eq!(bundle.booth_votes[0].votes, 10);
    assert_eq!(bundle.booth_votes[1].candidate_name, "Bob");
    assert_eq!(bundle.booth_votes[1].votes, 7);
    for vote in &bundle.booth_votes {
        assert_eq!(vote.serial_no, "12");
        assert_eq!(vote.ps_number, 45);
        assert_eq!(vote.ls, "04");
        assert_eq!(vote.ac, "102");
    }
}

#[test]
fn later_tables_reuse_the_locked_header_and_skip_unrelated_tables() {
    let repairer = RowRepairer::new().expect("repairer");
    let continuation = grid(&[
        &[
            "Serial No.",
            "Polling Station No.",
            "Votes polled",
            "",
            "Grand Total",
            "Rejected",
            "NOTA",
        ],
        &["", "", "Someone Else", "Another", "", "", ""],
        &["13", "46A", "3", "x", "3", "0", "2"],
    ]);
    let metadata = grid(&[
        &["Name of Constituency", "Quilandy", "", "", ""],
        &["Year", "2024", "", "", ""],
    ]);
    let grids = vec![metadata, header_grid(), continuation];

    let bundle = parse_results_document(&repairer, &grids, "04", "102", 2024);

    assert_eq!(bundle.candidates, vec!["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(bundle.booth_totals.len(), 2);
    let second = &bundle.booth_totals[1];
    assert_eq!(second.ps_number_raw, "46A");
    assert_eq!(second.ps_number, 46);
    assert_eq!(second.ps_suffix, "A");
    assert_eq!(second.nota, 2);

    let second_booth_votes = bundle
        .booth_votes
        .iter()
        .filter(|vote| vote.serial_no == "13")
        .collect::<Vec<_>>();
    assert_eq!(second_booth_votes.len(), 2);
    assert_eq!(second_booth_votes[0].candidate_name, "Alice");
    assert_eq!(second_booth_votes[0].votes, 3);
    assert_eq!(second_booth_votes[1].candidate_name, "Bob");
    assert_eq!(second_booth_votes[1].votes, 0);
}

#[test]
fn missing_total_in_first_results_table_fails_the_whole_document() {
    let repairer = RowRepairer::new().expect("repairer");
    let no_total = grid(&[
        &["Serial No.", "PS No.", "Votes", "", "", "", ""],
        &["", "", "Alice", "Bob", "Valid", "Rejected", "NOTA"],
        &["1", "1", "5", "5", "10", "0", "0"],
    ]);
    let grids = vec![no_total, header_grid()];

    let bundle = parse_results_document(&repairer, &grids, "04", "102", 2024);

    assert!(!bundle.header_found);
    assert!(bundle.candidates.is_empty());
    assert!(bundle.booth_votes.is_empty());
    assert!(bundle.booth_totals.is_empty());
    assert!(bundle.candidate_keys().is_empty());
}

#[test]
fn repair_identity_splits_merged_cells_in_either_column() {
    let repairer = RowRepairer::new().expect("repairer");

    let (serial, station) = repairer.repair_identity("100 100", "").expect("col0 merge");
    assert_eq!(serial, "100");
    assert_eq!(station.raw, "100");
    assert_eq!(station.number, 100);

    let (serial, station) = repairer.repair_identity("", "100 100").expect("col1 merge");
    assert_eq!(serial, "100");
    assert_eq!(station.raw, "100");

    let (serial, station) = repairer.repair_identity(" 7 ", "101b").expect("plain");
    assert_eq!(serial, "7");
    assert_eq!(station.raw, "101b");
    assert_eq!(station.number, 101);
    assert_eq!(station.suffix, "B");
}

#[test]
fn repair_identity_rejects_invalid_serial_or_station() {
    let repairer = RowRepairer::new().expect("repairer");

    assert!(repairer.repair_identity("Total", "").is_none());
    assert!(repairer.repair_identity("12A 13", "").is_none());
    assert!(repairer.repair_identity("12", "Postal").is_none());
    assert!(repairer.repair_identity("", "").is_none());
    assert!(repairer.repair_identity("12", "13AB").is_none());
}

#[test]
fn repair_row_skips_rows_too_short_for_summary_columns() {
    let repairer = RowRepairer::new().expect("repairer");
    let header = locate_header(&header_grid(), "04", "102").expect("header");

    let short = lines(&["12", "45", "10", "7", "17", "1"]);
    assert!(repairer.repair_row(&header, &short, 2024).is_none());

    let merged = lines(&["12 45", "", "10", "7", "17", "1", "0"]);
    let repaired = repairer.repair_row(&header, &merged, 2024).expect("repaired");
    assert_eq!(repaired.total.serial_no, "12");
    assert_eq!(repaired.total.ps_number_raw, "45");
    assert_eq!(repaired.votes.len(), 2);
}

#[test]
fn parse_count_is_total_and_defaults_to_zero() {
    assert_eq!(parse_count("17"), 17);
    assert_eq!(parse_count(" 17 "), 17);
    assert_eq!(parse_count("+4"), 4);
    assert_eq!(parse_count(""), 0);
    assert_eq!(parse_count("-"), 0);
    assert_eq!(parse_count("-3"), 0);
    assert_eq!(parse_count("1,234"), 0);
    assert_eq!(parse_count("12 3"), 0);
    assert_eq!(parse_count("N/A"), 0);
    assert_eq!(parse_count("99999999999999999999999"), 0);
}

#[test]
fn candidate_keys_are_positional_and_deterministic() {
    assert_eq!(candidate_key("04", "102", 1), "LS_04_AC102_C1");
    assert_eq!(candidate_key("04", "102", 1), candidate_key("04", "102", 1));
    assert_ne!(candidate_key("04", "102", 1), candidate_key("05", "102", 1));
    assert_ne!(candidate_key("04", "102", 1), candidate_key("04", "103", 1));
    assert_ne!(candidate_key("04", "102", 1), candidate_key("04", "102", 2));

    assert_eq!(
        candidate_keys_for("04", "102", 3),
        vec!["LS_04_AC102_C1", "LS_04_AC102_C2", "LS_04_AC102_C3"]
    );
}

#[test]
fn aggregator_unions_keys_and_appends_in_order() {
    let repairer = RowRepairer::new().expect("repairer");
    let parser = RosterParser::new().expect("parser");

    let mut results = Aggregator::default();
    let bundle = parse_results_document(&repairer, &[header_grid()], "04", "102", 2024);
    results.add_results(bundle.clone());
    results.add_results(bundle);
    assert_eq!(results.candidate_keys.len(), 2);
    assert_eq!(results.booth_totals.len(), 2);
    assert_eq!(results.booth_votes.len(), 4);

    let mut aggregate = Aggregator::default();
    aggregate.add_roster(parser.parse_document(&[lines(&["12 Community Hall"])]));
    aggregate.merge(results);

    assert_eq!(aggregate.booths.len(), 1);
    assert_eq!(aggregate.candidate_keys.len(), 2);
    assert_eq!(aggregate.booth_totals.len(), 2);
    assert_eq!(
        aggregate.candidate_keys.iter().next().map(String::as_str),
        Some("LS_04_AC102_C1")
    );
}

#[test]
fn sqlite_export_writes_all_tables() {
    let repairer = RowRepairer::new().expect("repairer");
    let parser = RosterParser::new().expect("parser");
    let mut aggregate = Aggregator::default();
    aggregate.add_roster(parser.parse_document(&[lines(&[
        "12 Community Hall",
        "13",
        "Govt School",
    ])]));
    aggregate.add_results(parse_results_document(&repairer, &[header_grid()], "04", "102", 2024));

    let mut connection = Connection::open_in_memory().expect("sqlite");
    write_sqlite(&mut connection, &aggregate).expect("write");
    // A second run replaces rather than appends.
    write_sqlite(&mut connection, &aggregate).expect("rewrite");

    assert_eq!(count_rows(&connection, "booths").expect("count"), 2);
    assert_eq!(count_rows(&connection, "candidates").expect("count"), 2);
    assert_eq!(count_rows(&connection, "booth_votes").expect("count"), 2);
    assert_eq!(count_rows(&connection, "booth_totals").expect("count"), 1);

    let votes: i64 = connection
        .query_row(
            "SELECT votes FROM booth_votes WHERE candidate_name = 'Bob'",
            [],
            |row| row.get(0),
        )
        .expect("bob votes");
    assert_eq!(votes, 7);
}

#[test]
fn csv_export_uses_output_column_names() {
    let repairer = RowRepairer::new().expect("repairer");
    let mut aggregate = Aggregator::default();
    aggregate.add_results(parse_results_document(&repairer, &[header_grid()], "04", "102", 2024));

    let dir = scratch_dir("csv");
    write_csv_outputs(&dir, &aggregate).expect("csv");

    let totals = fs::read_to_string(dir.join("booth_totals.csv")).expect("totals");
    let mut totals_lines = totals.lines();
    assert_eq!(
        totals_lines.next(),
        Some("ls,ac,serial_no,ps_number_raw,ps_number,ps_suffix,total_valid,rejected,nota,year")
    );
    assert_eq!(totals_lines.next(), Some("04,102,12,45,45,,17,1,0,2024"));

    let candidates = fs::read_to_string(dir.join("candidates.csv")).expect("candidates");
    assert_eq!(
        candidates.lines().collect::<Vec<_>>(),
        vec!["candidate_key", "LS_04_AC102_C1", "LS_04_AC102_C2"]
    );

    let votes = fs::read_to_string(dir.join("form20_parsed.csv")).expect("votes");
    assert!(votes.starts_with(
        "ls,ac,serial_no,ps_number_raw,ps_number,ps_suffix,candidate_name,votes,year"
    ));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn split_pages_drops_trailing_blank_pages() {
    let pages = split_pages("page one\n\u{000C}page\u{0000} two\n\u{000C}\n\u{000C}  ");
    assert_eq!(pages, vec!["page one\n".to_string(), "page two\n".to_string()]);
}

fn layout_page() -> String {
    [
        "FORM 20",
        "Final result sheet",
        "Serial No.   PS No.     Votes polled        Total     Rejected   NOTA",
        "                        Alice      Bob",
        "12           45         10         7        17        1          0",
        "",
        "13 14                   3          4        7         0          1",
    ]
    .join("\n")
}

#[test]
fn layout_grid_aligns_header_cells_with_data_columns() {
    let tables = LayoutTables::new(None).expect("layout tables");

    let grid = tables.grid_from_page(&layout_page()).expect("grid");

    assert_eq!(grid.len(), 4);
    assert_eq!(
        grid[0],
        lines(&["Serial No.", "PS No.", "Votes polled", "", "Total", "Rejected", "NOTA"])
    );
    assert_eq!(grid[1], lines(&["", "", "Alice", "Bob", "", "", ""]));
    assert_eq!(grid[2], lines(&["12", "45", "10", "7", "17", "1", "0"]));
    assert_eq!(grid[3], lines(&["13 14", "", "3", "4", "7", "0", "1"]));

    assert!(tables.grid_from_page("No tables here\n1  2  3\n").is_none());
}

#[test]
fn layout_grid_without_data_rows_keeps_raw_cells() {
    let tables = LayoutTables::new(None).expect("layout tables");

    let grid = tables
        .grid_from_page("Serial No.   PS No.   Total\n   Alice   Bob\n")
        .expect("grid");

    assert_eq!(grid[0], lines(&["Serial No.", "PS No.", "Total"]));
    assert_eq!(grid[1], lines(&["Alice", "Bob", ""]));
}

#[test]
fn layout_page_parses_into_booth_totals_and_votes() {
    let tables = LayoutTables::new(None).expect("layout tables");
    let repairer = RowRepairer::new().expect("repairer");
    let grid = tables.grid_from_page(&layout_page()).expect("grid");

    let bundle = parse_results_document(&repairer, &[grid], "04", "102", 2024);

    assert!(bundle.header_found);
    assert_eq!(bundle.candidates, vec!["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(bundle.booth_totals.len(), 2);
    let first = &bundle.booth_totals[0];
    assert_eq!(first.serial_no, "12");
    assert_eq!(first.ps_number, 45);
    assert_eq!((first.total_valid, first.rejected, first.nota), (17, 1, 0));
    let second = &bundle.booth_totals[1];
    assert_eq!(second.serial_no, "13");
    assert_eq!(second.ps_number, 14);
    assert_eq!((second.total_valid, second.rejected, second.nota), (7, 0, 1));

    let first_votes = bundle
        .booth_votes
        .iter()
        .filter(|vote| vote.serial_no == "12")
        .map(|vote| (vote.candidate_name.as_str(), vote.votes))
        .collect::<Vec<_>>();
    assert_eq!(first_votes, vec![("Alice", 10), ("Bob", 7)]);
}

#[test]
fn sidecar_tables_normalize_cells() {
    let dir = scratch_dir("sidecar");
    let pdf_path = dir.join("AC102.pdf");
    let sidecar = SidecarTables::sidecar_path(&pdf_path);
    assert_eq!(sidecar, dir.join("AC102.tables.json"));

    fs::write(
        &sidecar,
        r#"[[["Serial\nNo.", "PS No."], ["1", " 2 ", "3"]]]"#,
    )
    .expect("write sidecar");

    let grids = SidecarTables.tables(&pdf_path).expect("tables");
    assert_eq!(grids.len(), 1);
    assert_eq!(grids[0][0], lines(&["Serial No.", "PS No.", ""]));
    assert_eq!(grids[0][1], lines(&["1", "2", "3"]));

    assert!(SidecarTables.tables(&dir.join("missing.pdf")).is_err());

    let _ = fs::remove_dir_all(&dir);
}
