//! Nested members around an ignored column: `start.x, start.y, <ignored>, end.x, end.y`

use std::sync::Arc;

use flatbind::{
    composite, field, CodecOptions, Column, DelimitedReader, DelimitedWriter, EntityMapper,
    MapperOptions, Mapping, MemberAccessor, RecordContext, TypeMapping, TypedReader, TypedWriter,
    Value,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Line {
    start: Point,
    end: Point,
}

fn line_mapping() -> Mapping<Line> {
    let start = Arc::new(composite!(Line, start: Point).unwrap());
    let end = Arc::new(composite!(Line, end: Point).unwrap());

    let mut mapping = TypeMapping::<Line>::new();
    mapping
        .member(MemberAccessor::nested(&start, field!(Point, x).unwrap()).unwrap(), Column::int("x1"))
        .unwrap();
    mapping
        .member(MemberAccessor::nested(&start, field!(Point, y).unwrap()).unwrap(), Column::int("y1"))
        .unwrap();
    mapping.ignored(Column::ignored("unused"));
    mapping
        .member(MemberAccessor::nested(&end, field!(Point, x).unwrap()).unwrap(), Column::int("x2"))
        .unwrap();
    mapping
        .member(MemberAccessor::nested(&end, field!(Point, y).unwrap()).unwrap(), Column::int("y2"))
        .unwrap();
    mapping.finish()
}

fn line() -> Line {
    Line {
        start: Point { x: 1, y: 2 },
        end: Point { x: 3, y: 4 },
    }
}

#[test]
fn test_ignored_column_shifts_physical_but_not_logical_indices() {
    let mapping = line_mapping();
    let registry = mapping.registry();

    let positions: Vec<(String, usize, Option<usize>)> = registry
        .bindings()
        .iter()
        .map(|b| {
            let name = match b.as_member() {
                Some(m) => m.accessor().name().to_string(),
                None => b.column().name().to_string(),
            };
            (name, b.physical_index(), b.logical_index())
        })
        .collect();

    assert_eq!(
        positions,
        vec![
            ("start.x".to_string(), 0, Some(0)),
            ("start.y".to_string(), 1, Some(1)),
            ("unused".to_string(), 2, None),
            ("end.x".to_string(), 3, Some(2)),
            ("end.y".to_string(), 4, Some(3)),
        ]
    );
    assert_eq!(registry.physical_count(), 5);
    assert_eq!(registry.logical_count(), 4);
}

#[test]
fn test_write_then_read_under_both_strategies() {
    let mapping = line_mapping();
    let ctx = RecordContext::default();

    for options in [MapperOptions::default(), MapperOptions::reflection()] {
        let mapper = EntityMapper::from_mapping(&mapping, &options).unwrap();

        let values = mapper.write_values(&ctx, &line()).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        assert_eq!(mapper.read(&ctx, &values).unwrap(), line());
    }
}

#[test]
fn test_delimited_layout() {
    let mapping = line_mapping();
    let mut writer = TypedWriter::new(DelimitedWriter::new(Vec::new(), CodecOptions::default()), &mapping).unwrap();
    writer.write(&line()).unwrap();
    let text = String::from_utf8(writer.into_inner().into_inner().unwrap()).unwrap();
    assert_eq!(text, "1,2,,3,4\n");

    for options in [MapperOptions::default(), MapperOptions::reflection()] {
        let lines: Vec<Line> = TypedReader::with_options(
            DelimitedReader::new("1,2,skipped,3,4\n".as_bytes(), CodecOptions::default()),
            &mapping,
            &options,
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(lines, vec![line()]);
    }
}
