//! Multiplexed streams: typed dispatch and YAML-described layouts

use std::io::Write;

use flatbind::{
    field, BindError, CodecOptions, Column, DelimitedReader, DelimitedWriter, Dispatcher,
    DynamicRecord, MappingFile, MemberPath, MultiplexedReader, MultiplexedWriter, TypeMapping,
    Value, Variant,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Header {
    kind: String,
    batch: i64,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Detail {
    kind: String,
    sku: String,
    quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
enum Row {
    Header(Header),
    Detail(Detail),
}

fn header(row: &Row) -> Option<&Header> {
    match row {
        Row::Header(h) => Some(h),
        _ => None,
    }
}

fn detail(row: &Row) -> Option<&Detail> {
    match row {
        Row::Detail(d) => Some(d),
        _ => None,
    }
}

fn dispatcher() -> Result<Dispatcher<Row>, BindError> {
    let mut headers = TypeMapping::<Header>::new();
    headers.member(field!(Header, kind)?, Column::string("kind"))?;
    headers.member(field!(Header, batch)?, Column::int("batch"))?;

    let mut details = TypeMapping::<Detail>::new();
    details.member(field!(Detail, kind)?, Column::string("kind"))?;
    details.member(field!(Detail, sku)?, Column::string("sku"))?;
    details.member(field!(Detail, quantity)?, Column::int("quantity"))?;

    Ok(Dispatcher::new()
        .when(
            Variant::new(headers.finish(), Row::Header, header)
                .reading_when(|raw| raw.first().is_some_and(|kind| kind == "H")),
        )
        .when(
            Variant::new(details.finish(), Row::Detail, detail)
                .reading_when(|raw| raw.first().is_some_and(|kind| kind == "D")),
        ))
}

#[test]
fn test_typed_multiplex_round_trip() {
    let input = "H,7\nD,apple,3\nD,pear,1\nH,8\n";
    let reader = MultiplexedReader::new(
        DelimitedReader::new(input.as_bytes(), CodecOptions::default()),
        dispatcher().unwrap(),
    );
    let rows: Vec<Row> = reader.collect::<Result<_, _>>().unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[1],
        Row::Detail(Detail {
            kind: "D".to_string(),
            sku: "apple".to_string(),
            quantity: 3,
        })
    );

    let mut writer = MultiplexedWriter::new(
        DelimitedWriter::new(Vec::new(), CodecOptions::default()),
        dispatcher().unwrap(),
    );
    for row in &rows {
        writer.write(row).unwrap();
    }
    let text = String::from_utf8(writer.into_inner().into_inner().unwrap()).unwrap();
    assert_eq!(text, input);
}

#[test]
fn test_unclaimed_record_is_skippable() {
    let input = "H,7\nX,??\nD,fig,2\n";
    let mut reader = MultiplexedReader::new(
        DelimitedReader::new(input.as_bytes(), CodecOptions::default()),
        dispatcher().unwrap(),
    );

    assert!(reader.read().unwrap());
    assert!(matches!(reader.read(), Err(BindError::NoMatchingSchema)));
    assert!(reader.read().unwrap());
    assert!(matches!(reader.current(), Some(Row::Detail(d)) if d.sku == "fig"));
    assert_eq!(reader.metadata().physical_record_number(), 3);
}

const MAPPING: &str = r#"
codec:
  delimiter: '|'
schemas:
  - name: header
    when: { column: 0, matches: "^HDR$" }
    columns:
      - { name: RecordType }
      - { name: BatchDate, type: date, format: "%Y%m%d" }
  - name: payment
    when: { column: 0, matches: "^PAY$" }
    columns:
      - { name: RecordType }
      - { name: PayeeName, member: payee.name }
      - { name: PayeeAccount, member: payee.account, null_token: "-" }
      - { name: Amount, type: float, nullable: false }
"#;

#[test]
fn test_yaml_mapping_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MAPPING.as_bytes()).unwrap();

    let built = MappingFile::load_from_file(file.path()).unwrap().build().unwrap();
    let input = "HDR|20240301\nPAY|Ada|-|12.5\nPAY|Bob|NZ01|3\n";

    let records: Vec<DynamicRecord> = MultiplexedReader::new(
        DelimitedReader::new(input.as_bytes(), built.codec.clone()),
        built.dispatcher(),
    )
    .collect::<Result<_, _>>()
    .unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(
        records[0].get("batch_date"),
        Some(&Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    );
    let account = MemberPath::parse("payee.account").unwrap();
    assert_eq!(records[1].lookup(&account), Some(&Value::Null));
    assert_eq!(records[2].lookup(&account), Some(&Value::String("NZ01".to_string())));
    assert_eq!(records[2].get("amount"), Some(&Value::Float(3.0)));

    let mut writer = MultiplexedWriter::new(
        DelimitedWriter::new(Vec::new(), built.codec.clone()),
        built.dispatcher(),
    );
    for record in &records {
        writer.write(record).unwrap();
    }
    let text = String::from_utf8(writer.into_inner().into_inner().unwrap()).unwrap();
    assert_eq!(text, input);
}

#[test]
fn test_yaml_mapping_without_default_rejects_unknown_records() {
    let built = MappingFile::from_yaml_str(MAPPING).unwrap().build().unwrap();
    let input = "TRL|2\n";
    let mut reader = MultiplexedReader::new(
        DelimitedReader::new(input.as_bytes(), built.codec.clone()),
        built.dispatcher(),
    );

    assert!(matches!(reader.read(), Err(BindError::NoMatchingSchema)));
}
