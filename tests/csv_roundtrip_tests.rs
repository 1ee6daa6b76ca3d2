//! CSV write → read round-trip tests


use rowport_core::config::CsvFormatOptions;
use rowport_core::row::OwnedRow;
use rowport_core::schema::{ColumnMeta, ColumnType, MetaData};
use rowport_core::value::Value;
use test_data_gen::{noise_bytes, people_metadata, person, read_csv, tricky_strings, write_csv};

fn text_metadata(n: usize) -> MetaData {
    MetaData::new(
        (1..=n)
            .map(|i| ColumnMeta::new(format!("c{}", i), ColumnType::VarChar))
            .collect(),
    )
}

fn dialects() -> Vec<CsvFormatOptions> {
    vec![
        CsvFormatOptions::default(),
        CsvFormatOptions::default().with_double_quote_escape(false),
        CsvFormatOptions::default()
            .with_column_delimiter(';')
            .with_quote_char('\''),
        CsvFormatOptions::default()
            .with_header(false)
            .with_row_delimiter('\r')
            .with_column_delimiter('\t'),
        CsvFormatOptions::default().with_buffer_sizes(7, 5),
    ]
}

#[test]
fn test_tricky_strings_roundtrip_in_every_dialect() {
    let strings = tricky_strings();
    let md = text_metadata(3);
    for opts in dialects() {
        let rows: Vec<OwnedRow> = strings
            .windows(3)
            .map(|w| OwnedRow::new(w.iter().map(|s| Value::from(*s)).collect()))
            .collect();
        let text = write_csv(&md, rows.clone(), opts.clone());
        let back = read_csv(&text, &md, opts.clone());
        assert_eq!(back, rows, "dialect {:?}\n{}", opts, text);
    }
}

#[test]
fn test_single_escape_dialect_needs_quote_free_endings() {
    // Without doubling, a value ending in a quote right before a delimiter
    // is indistinguishable from the closing quote.
    let opts = CsvFormatOptions::default().with_double_quote_escape(false);
    let md = text_metadata(1);
    let rows = vec![OwnedRow::new(vec![Value::from("mid \" quote")])];
    let text = write_csv(&md, rows.clone(), opts.clone());
    assert_eq!(read_csv(&text, &md, opts), rows);
}

#[test]
fn test_people_roundtrip_with_binary_and_nulls() {
    let md = people_metadata();
    let rows: Vec<OwnedRow> = (0..50)
        .map(|i| {
            let photo = match i % 3 {
                0 => None,
                1 => Some(Vec::new()),
                _ => Some(noise_bytes(i * 37, i as u64)),
            };
            person(i as i32, &format!("person \"{}\",\n", i), photo)
        })
        .collect();
    let opts = CsvFormatOptions::default();
    let text = write_csv(&md, rows.clone(), opts.clone());
    assert_eq!(read_csv(&text, &md, opts), rows);
}

#[test]
fn test_empty_string_vs_null_roundtrip() {
    let md = text_metadata(2);
    let rows = vec![
        OwnedRow::new(vec![Value::from(""), Value::Null]),
        OwnedRow::new(vec![Value::Null, Value::from("")]),
    ];
    let opts = CsvFormatOptions::default();
    let text = write_csv(&md, rows.clone(), opts.clone());
    assert_eq!(read_csv(&text, &md, opts), rows);

    // Without quoting, null and empty collapse into the empty string.
    let opts = CsvFormatOptions::default().with_quoting(false);
    let text = write_csv(&md, rows, opts.clone());
    let back = read_csv(&text, &md, opts);
    assert!(back
        .iter()
        .flat_map(|r| r.values())
        .all(|v| *v == Value::from("")));
}

#[test]
fn test_large_clob_and_blob_roundtrip() {
    let md = MetaData::new(vec![
        ColumnMeta::new("doc", ColumnType::LongVarChar),
        ColumnMeta::new("bin", ColumnType::LongVarBinary),
    ]);
    let doc: String = (0..20_000)
        .map(|i| match i % 7 {
            0 => '"',
            1 => ',',
            2 => '\n',
            3 => 'é',
            _ => 'x',
        })
        .collect();
    let bin = noise_bytes(50_000, 99);
    let rows = vec![OwnedRow::new(vec![Value::from(doc), Value::Bytes(bin)])];
    let opts = CsvFormatOptions::default();
    let text = write_csv(&md, rows.clone(), opts.clone());
    assert_eq!(read_csv(&text, &md, opts), rows);
}

#[test]
fn test_repeated_header_names_reserialise() {
    use rowport_io::{transfer, CsvReader, CsvWriter};

    let input = "a,a,b\n1,2,3\n";
    let mut reader = CsvReader::open(input.as_bytes(), CsvFormatOptions::default()).unwrap();
    let md = reader.metadata().clone();
    let out = CsvFormatOptions::default().with_quoting(false);
    let mut writer = CsvWriter::open(Vec::new(), md, out).unwrap();
    transfer(&mut reader, &mut writer, None).unwrap();
    assert_eq!(String::from_utf8(writer.finish().unwrap()).unwrap(), input);
}
