use anyhow::Result;
use ironstream::io::{parser, read, read_data_file, read_data_file_as, write_file, Compression, DataFileOptions, Format};
use ironstream::testing::{
    assert_records_equal, chunked, mock_compressed_file, mock_text_file, sample_people, sample_people_csv,
    sample_people_ndjson, SamplePerson, TempFilePath,
};
use ironstream::{from_iter, StreamError};
use serde_json::{json, Value};

#[tokio::test]
async fn csv_parser_detects_separator_across_chunks() -> Result<()> {
    let text = sample_people_csv(';');
    let records = from_iter(chunked(text.as_bytes(), 5))
        .merge(parser(Format::Csv))
        .collect_vec()
        .await?;
    assert_eq!(records.len(), 4);
    assert_eq!(records[0], json!({"name": "ada", "city": "london", "age": "36"}));
    Ok(())
}

#[tokio::test]
async fn tsv_parser_ignores_quotes() -> Result<()> {
    let records = from_iter(vec!["a\tb\r\n\"x\ty\n"])
        .merge(parser(Format::Tsv))
        .collect_vec()
        .await?;
    assert_eq!(records, vec![json!({"a": "\"x", "b": "y"})]);
    Ok(())
}

#[tokio::test]
async fn ndjson_parse_error_names_the_line() {
    let result = from_iter(vec!["{\"a\":1}\n\n{\"a\":", "2}\n{bad\n"])
        .merge(parser(Format::Ndjson))
        .collect_vec()
        .await;
    match result {
        Err(StreamError::Parse { line, .. }) => assert_eq!(line, 4),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn lines_format_yields_strings() -> Result<()> {
    let records = from_iter(vec!["one\n\ntwo"]).merge(parser(Format::Lines)).collect_vec().await?;
    assert_eq!(records, vec![Value::from("one"), Value::from("two")]);
    Ok(())
}

#[tokio::test]
async fn read_reports_local_size() -> Result<()> {
    let file = mock_text_file("12345", ".txt")?;
    let (source, size) = read(&file.location()).await?;
    assert_eq!(size, Some(5));
    assert_eq!(source.to_text().await?, "12345");
    Ok(())
}

#[tokio::test]
async fn gzip_file_is_detected_by_extension() -> Result<()> {
    let file = mock_compressed_file(sample_people_ndjson(), Compression::Gzip, ".ndjson.gz")?;
    let people: Vec<SamplePerson> = read_data_file_as(&file.location(), &DataFileOptions::new(Format::Ndjson))
        .await?
        .collect_vec()
        .await?;
    assert_records_equal(&people, &sample_people());
    Ok(())
}

#[tokio::test]
async fn explicit_compression_overrides_extension() -> Result<()> {
    let file = mock_compressed_file(sample_people_csv(','), Compression::Zstd, ".data")?;
    let options = DataFileOptions::new(Format::Csv).with_compression(Compression::Zstd);
    let records = read_data_file(&file.location(), &options).await?.collect_vec().await?;
    assert_eq!(records.len(), 4);
    assert_eq!(records[3]["city"], "oslo");
    Ok(())
}

#[tokio::test]
async fn record_shape_mismatch_carries_index() -> Result<()> {
    let file = mock_text_file("{\"name\":\"a\",\"city\":\"b\",\"age\":\"1\"}\n{\"name\":1}\n", ".ndjson")?;
    let result = read_data_file_as::<SamplePerson>(&file.location(), &DataFileOptions::new(Format::Ndjson))
        .await?
        .collect_vec()
        .await;
    assert!(matches!(result, Err(StreamError::ItemCallback { index: 1, .. })));
    Ok(())
}

#[tokio::test]
async fn write_then_read_compressed_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("people.csv.gz");
    let text = sample_people_csv('\t');
    write_file(&path, from_iter(chunked(text.as_bytes(), 16)), None).await?;

    let raw = std::fs::read(&path)?;
    assert_eq!(Compression::from_magic(&raw), Compression::Gzip);

    let location = path.to_string_lossy().into_owned();
    let records = read_data_file(&location, &DataFileOptions::new(Format::Csv)).await?.collect_vec().await?;
    assert_eq!(records.len(), 4);
    assert_eq!(records[1], json!({"name": "bob", "city": "paris", "age": "41"}));
    Ok(())
}

#[tokio::test]
async fn write_file_accepts_text_chunks() -> Result<()> {
    let file = TempFilePath::with_suffix(".txt")?;
    write_file(file.path(), from_iter(vec!["a\n".to_string(), "b\n".to_string()]), Some(Compression::None)).await?;
    assert_eq!(std::fs::read_to_string(file.path())?, "a\nb\n");
    Ok(())
}

#[test]
fn options_deserialize_with_defaults() -> Result<()> {
    let options: DataFileOptions = serde_json::from_str(r#"{"format":"csv"}"#)?;
    assert_eq!(options, DataFileOptions::new(Format::Csv));
    let options: DataFileOptions = serde_json::from_str(r#"{"compression":"bzip2"}"#)?;
    assert_eq!(options.compression, Some(Compression::Bzip2));
    assert_eq!(options.format, Format::Lines);
    Ok(())
}
