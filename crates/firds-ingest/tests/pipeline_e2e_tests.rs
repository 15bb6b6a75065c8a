//! End-to-end tests for the ingestion pipeline
//!
//! A mock server plays the FIRDS register and file host; a recording
//! publisher stands in for S3.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use firds_ingest::config::IngestConfig;
use firds_ingest::extractor::ExtractError;
use firds_ingest::index::IndexError;
use firds_ingest::pipeline::{Pipeline, PipelineError};
use firds_ingest::publisher::Publisher;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const ARCHIVE_PATH: &str = "/firds/DLTINS_20210117_01of01.zip";
const PAYLOAD_NAME: &str = "DLTINS_20210117_01of01.xml";

const PAYLOAD_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<BizData xmlns="urn:iso:std:iso:20022:tech:xsd:head.003.001.01">
  <Hdr>
    <AppHdr xmlns="urn:iso:std:iso:20022:tech:xsd:head.001.001.01">
      <Fr><OrgId><Id><OrgId><Othr><Id>EU</Id></Othr></OrgId></Id></OrgId></Fr>
      <BizMsgIdr>DLTINS_20210117_01of01</BizMsgIdr>
    </AppHdr>
  </Hdr>
  <Pyld>
    <Document xmlns="urn:iso:std:iso:20022:tech:xsd:auth.036.001.02">
      <FinInstrmRptgRefDataDltaRpt>
        <RptHdr><RptgNtty><NtnlCmptntAuthrty>DE</NtnlCmptntAuthrty></RptgNtty></RptHdr>
        <FinInstrm>
          <TermntdRcrd>
            <FinInstrmGnlAttrbts>
              <Id>DE000A1R07V3</Id>
              <FullNm>Kreditanstalt fuer Wiederaufbau Var.Zins Anl. v.2014(2021)</FullNm>
              <ShrtNm>KFW/VAR UTS 20210706</ShrtNm>
              <ClssfctnTp>DBFTFB</ClssfctnTp>
              <NtnlCcy>EUR</NtnlCcy>
              <CmmdtyDerivInd>false</CmmdtyDerivInd>
            </FinInstrmGnlAttrbts>
            <Issr>549300GDPG70E3MBBU98</Issr>
          </TermntdRcrd>
        </FinInstrm>
        <FinInstrm>
          <TermntdRcrd>
            <FinInstrmGnlAttrbts>
              <Id>DE000A1R07X9</Id>
              <FullNm>Kreditanstalt fuer Wiederaufbau Anl.v.2014 (2024)</FullNm>
              <ShrtNm>KFW 1.5 06/11/24</ShrtNm>
              <ClssfctnTp>DBFTFB</ClssfctnTp>
              <NtnlCcy>EUR</NtnlCcy>
              <CmmdtyDerivInd>false</CmmdtyDerivInd>
            </FinInstrmGnlAttrbts>
            <Issr>529900W18LQJJN6SJ336</Issr>
          </TermntdRcrd>
        </FinInstrm>
      </FinInstrmRptgRefDataDltaRpt>
    </Document>
  </Pyld>
</BizData>"#;

// The issuer follows the boundary element, so each row carries the issuer of
// the record before it
const EXPECTED_CSV: &str = "\
FinInstrmGnlAttrbts.Id,FinInstrmGnlAttrbts.FullNm,FinInstrmGnlAttrbts.ClssfctnTp,FinInstrmGnlAttrbts.CmmdtyDerivInd,FinInstrmGnlAttrbts.NtnlCcy,Issr
DE000A1R07V3,Kreditanstalt fuer Wiederaufbau Var.Zins Anl. v.2014(2021),DBFTFB,false,EUR,
DE000A1R07X9,Kreditanstalt fuer Wiederaufbau Anl.v.2014 (2024),DBFTFB,false,EUR,549300GDPG70E3MBBU98
";

/// Publisher that records calls instead of talking to S3
#[derive(Clone)]
struct RecordingPublisher {
    outcome: bool,
    calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl RecordingPublisher {
    fn new(outcome: bool) -> Self {
        Self {
            outcome,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, file: &Path, bucket: &str) -> bool {
        assert!(file.is_file(), "published file must exist");
        self.calls
            .lock()
            .unwrap()
            .push((file.to_path_buf(), bucket.to_string()));
        self.outcome
    }
}

fn index_xml(entries: &[(&str, &str)]) -> String {
    let docs: String = entries
        .iter()
        .map(|(file_type, link)| {
            format!(
                r#"<doc>
      <str name="checksum">852b2dde71cf114289ad95ada2a4e406</str>
      <str name="download_link">{link}</str>
      <date name="publication_date">2021-01-17T00:00:00Z</date>
      <str name="file_type">{file_type}</str>
    </doc>"#
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <lst name="responseHeader"><int name="status">0</int></lst>
  <result name="response" numFound="{}" start="0">
    {docs}
  </result>
</response>"#,
        entries.len()
    )
}

fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Mount the register at `/XYZ` and the archive at [`ARCHIVE_PATH`]
async fn mount_firds(mock_server: &MockServer, file_type: &str, archive: Vec<u8>) {
    let link = format!("{}{}", mock_server.uri(), ARCHIVE_PATH);

    Mock::given(method("GET"))
        .and(path("/XYZ"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "filename=ABC.xml")
                .set_body_raw(index_xml(&[(file_type, link.as_str())]), "application/xml"),
        )
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(archive, "application/zip"))
        .mount(mock_server)
        .await;
}

fn config_in(dir: &TempDir) -> IngestConfig {
    IngestConfig::builder()
        .scratch_dir(dir.path().join("scratch"))
        .build()
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "DLTINS", zip_bytes(&[(PAYLOAD_NAME, PAYLOAD_XML)])).await;

    let dir = TempDir::new().unwrap();
    let publisher = RecordingPublisher::new(true);
    let pipeline = Pipeline::new(config_in(&dir), publisher.clone()).unwrap();

    let outcome = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap();

    let scratch = dir.path().join("scratch");
    assert_eq!(outcome.csv_path, scratch.join("DLTINS_20210117_01of01.csv"));
    assert_eq!(outcome.rows, 2);
    assert!(outcome.published);
    assert_eq!(std::fs::read_to_string(&outcome.csv_path).unwrap(), EXPECTED_CSV);

    assert!(scratch.join("ABC.xml").is_file());
    assert!(scratch.join("DLTINS_20210117_01of01.zip").is_file());
    assert!(scratch.join(PAYLOAD_NAME).is_file());

    assert_eq!(
        publisher.calls(),
        [(outcome.csv_path.clone(), "firds-dltins".to_string())]
    );
}

#[tokio::test]
async fn test_pipeline_respects_row_cap_and_bucket() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "DLTINS", zip_bytes(&[(PAYLOAD_NAME, PAYLOAD_XML)])).await;

    let dir = TempDir::new().unwrap();
    let config = IngestConfig::builder()
        .scratch_dir(dir.path().join("scratch"))
        .max_rows(Some(1))
        .bucket("reference-data")
        .build();
    let publisher = RecordingPublisher::new(true);
    let pipeline = Pipeline::new(config, publisher.clone()).unwrap();

    let outcome = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.rows, 1);
    let csv = std::fs::read_to_string(&outcome.csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert_eq!(publisher.calls()[0].1, "reference-data");
}

#[tokio::test]
async fn test_pipeline_without_publishing() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "DLTINS", zip_bytes(&[(PAYLOAD_NAME, PAYLOAD_XML)])).await;

    let dir = TempDir::new().unwrap();
    let config = IngestConfig::builder()
        .scratch_dir(dir.path().join("scratch"))
        .publish(false)
        .build();
    let publisher = RecordingPublisher::new(true);
    let pipeline = Pipeline::new(config, publisher.clone()).unwrap();

    let outcome = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap();

    assert!(!outcome.published);
    assert!(outcome.csv_path.is_file());
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn test_publish_failure_does_not_fail_run() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "DLTINS", zip_bytes(&[(PAYLOAD_NAME, PAYLOAD_XML)])).await;

    let dir = TempDir::new().unwrap();
    let publisher = RecordingPublisher::new(false);
    let pipeline = Pipeline::new(config_in(&dir), publisher.clone()).unwrap();

    let outcome = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap();

    assert!(!outcome.published);
    assert_eq!(outcome.rows, 2);
    assert_eq!(publisher.calls().len(), 1);
}

#[tokio::test]
async fn test_no_matching_entry() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "FULINS", zip_bytes(&[(PAYLOAD_NAME, PAYLOAD_XML)])).await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(&dir), RecordingPublisher::new(true)).unwrap();

    let err = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap_err();

    match err {
        PipelineError::NoMatchingEntry { file_type, .. } => assert_eq!(file_type, "DLTINS"),
        other => panic!("expected NoMatchingEntry, got {other:?}"),
    }
}

#[tokio::test]
async fn test_other_file_type() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "FULINS", zip_bytes(&[(PAYLOAD_NAME, PAYLOAD_XML)])).await;

    let dir = TempDir::new().unwrap();
    let config = IngestConfig::builder()
        .scratch_dir(dir.path().join("scratch"))
        .file_type("FULINS")
        .build();
    let pipeline = Pipeline::new(config, RecordingPublisher::new(true)).unwrap();

    let outcome = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.rows, 2);
}

#[tokio::test]
async fn test_malformed_index_is_parse_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/XYZ"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<response><result><doc></result></response>", "application/xml"),
        )
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(&dir), RecordingPublisher::new(true)).unwrap();

    let err = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Index(IndexError::Parse(_))));
    assert!(dir.path().join("scratch").join("index.xml").is_file());
}

#[tokio::test]
async fn test_empty_archive_is_fatal() {
    let mock_server = MockServer::start().await;
    mount_firds(&mock_server, "DLTINS", zip_bytes(&[])).await;

    let dir = TempDir::new().unwrap();
    let publisher = RecordingPublisher::new(true);
    let pipeline = Pipeline::new(config_in(&dir), publisher.clone()).unwrap();

    let err = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Extract(ExtractError::EmptyArchive { .. })
    ));
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn test_archive_download_failure() {
    let mock_server = MockServer::start().await;
    let link = format!("{}{}", mock_server.uri(), ARCHIVE_PATH);
    Mock::given(method("GET"))
        .and(path("/XYZ"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(index_xml(&[("DLTINS", link.as_str())]), "application/xml"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(ARCHIVE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config_in(&dir), RecordingPublisher::new(true)).unwrap();

    let err = pipeline
        .run(&format!("{}/XYZ", mock_server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Fetch(_)));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = IngestConfig::builder().tags(["A.B.C"]).build();

    let result = Pipeline::new(config, RecordingPublisher::new(true));

    assert!(matches!(result, Err(PipelineError::Config(_))));
}
